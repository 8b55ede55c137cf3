//! Create a D&D 5e character by chatting with an AI Dungeon Master.
//!
//! The Dungeon Master walks through race, class, ability scores, background
//! and skill proficiencies one topic at a time, recording each choice on the
//! character sheet.
//!
//! ```bash
//! cargo run -p chargen -- --output thorin.json
//! ```
//!
//! Logs go to stderr; set `RUST_LOG=chargen_core=debug` to see tool calls.

mod session;

use anyhow::Context;
use chargen_core::{CreationDriver, DriverConfig, Rulebook, Topic};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chargen")]
#[command(about = "Create a D&D 5e character with an AI Dungeon Master")]
#[command(version)]
struct Cli {
    /// Claude model (defaults to the client's model)
    #[arg(long, env = "CHARGEN_MODEL")]
    model: Option<String>,

    /// Maximum tokens per response
    #[arg(long, env = "CHARGEN_MAX_TOKENS", default_value_t = 500)]
    max_tokens: usize,

    /// Sampling temperature (0.0 to 1.0)
    #[arg(long, env = "CHARGEN_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Topic to start on: race, class, ability_scores, background or skill_proficiencies
    #[arg(long, default_value = "race")]
    start: String,

    /// TOML rulebook replacing the built-in D&D 5e rules
    #[arg(long, env = "CHARGEN_RULES")]
    rules: Option<PathBuf>,

    /// Skip the extra turn announcing each finished topic
    #[arg(long)]
    no_announce: bool,

    /// Write the finished character sheet to this JSON file
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Tool rounds allowed per turn
    #[arg(long, default_value_t = 8)]
    max_tool_rounds: usize,
}

impl Cli {
    fn driver_config(&self) -> anyhow::Result<DriverConfig> {
        let start: Topic = self.start.parse()?;

        let mut config = DriverConfig::default()
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_starting_topic(start)
            .with_announce_transitions(!self.no_announce)
            .with_max_tool_rounds(self.max_tool_rounds);
        if let Some(ref model) = self.model {
            config = config.with_model(model);
        }
        Ok(config)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    if std::env::var("ANTHROPIC_API_KEY").map_or(true, |key| key.is_empty()) {
        eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export ANTHROPIC_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let rulebook = match cli.rules {
        Some(ref path) => Rulebook::load(path)
            .await
            .with_context(|| format!("Failed to load rulebook {}", path.display()))?,
        None => Rulebook::default(),
    };
    let config = cli.driver_config()?;
    info!(rulebook = %rulebook.name, start = %config.starting_topic, "Starting character creation");

    let driver = CreationDriver::from_env(rulebook, config)
        .context("Failed to create the Dungeon Master")?;

    session::run(driver, cli.output).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_driver_config() {
        let cli = Cli::parse_from(["chargen"]);
        let config = cli.driver_config().unwrap();
        let defaults = DriverConfig::default();

        assert_eq!(config.max_tokens, defaults.max_tokens);
        assert_eq!(config.temperature, defaults.temperature);
        assert_eq!(config.starting_topic, Topic::Race);
        assert_eq!(config.max_tool_rounds, defaults.max_tool_rounds);
        assert!(config.announce_transitions);
        assert!(config.model.is_none());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "chargen",
            "--start",
            "ability scores",
            "--no-announce",
            "--model",
            "claude-3-5-haiku-20241022",
            "-o",
            "sheet.json",
        ]);
        let config = cli.driver_config().unwrap();

        assert_eq!(config.starting_topic, Topic::AbilityScores);
        assert!(!config.announce_transitions);
        assert_eq!(config.model.as_deref(), Some("claude-3-5-haiku-20241022"));
        assert_eq!(cli.output, Some(PathBuf::from("sheet.json")));
    }

    #[test]
    fn test_unknown_start_topic() {
        let cli = Cli::parse_from(["chargen", "--start", "alignment"]);
        assert!(cli.driver_config().is_err());
    }
}
