//! D&D 5e character creation guided by an AI Dungeon Master.
//!
//! This crate provides:
//! - A small character sheet and the tools Claude uses to read and write it
//! - A rulebook: per-topic rules plus the graph ordering the topics
//! - A conversation driver that walks the graph, one topic at a time
//! - Token usage and cost tracking
//!
//! # Quick Start
//!
//! ```ignore
//! use chargen_core::{CreationDriver, DriverConfig, Rulebook, Turn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut driver = CreationDriver::from_env(Rulebook::default(), DriverConfig::default())?;
//!     println!("{}", driver.start().await?);
//!
//!     let turn = driver.submit("I'd like to play a dwarf").await?;
//!     println!("{}", turn.display_text());
//!
//!     println!("{}", driver.sheet());
//!     Ok(())
//! }
//! ```

pub mod driver;
pub mod error;
pub mod llm;
pub mod memory;
pub mod rulebook;
pub mod sheet;
pub mod testing;
pub mod tools;
pub mod usage;

pub use driver::{CreationDriver, DriverConfig, Turn};
pub use error::CreationError;
pub use llm::LlmClient;
pub use rulebook::{NodeGraph, Rulebook, Topic};
pub use sheet::{Ability, CharacterSheet, SheetField, SheetUpdate};
pub use testing::ScriptedLlm;
pub use usage::{UsageReport, UsageTracker};
