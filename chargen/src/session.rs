//! The interactive line loop.
//!
//! Each line the player types is sent to the Dungeon Master. Lines starting
//! with `#` are commands handled locally.

use anyhow::Context;
use chargen_core::{CharacterSheet, CreationDriver, CreationError, LlmClient, Turn};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

const HELP: &str = "\
  #sheet  - Show the character sheet so far
  #usage  - Show token usage and cost
  #topic  - Show the current topic
  #help   - Show this help
  #quit   - Exit without finishing
  (anything else is sent to the Dungeon Master)";

/// A line typed by the player.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Say(&'a str),
    Sheet,
    Usage,
    Topic,
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> Input<'a> {
    /// `None` for blank lines.
    fn parse(line: &'a str) -> Option<Input<'a>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('#') else {
            return Some(Input::Say(line));
        };

        Some(match command.trim() {
            "sheet" | "status" => Input::Sheet,
            "usage" | "costs" => Input::Usage,
            "topic" => Input::Topic,
            "help" => Input::Help,
            "quit" | "exit" => Input::Quit,
            other => Input::Unknown(other),
        })
    }
}

/// Run the conversation until the sheet is finished, the player quits, or
/// input ends.
pub async fn run<C: LlmClient>(
    mut driver: CreationDriver<C>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("=== Character Creation ===");
    println!("Commands:");
    println!("{HELP}");
    println!();

    let intro = driver
        .start()
        .await
        .context("The Dungeon Master could not start")?;
    print_dm(&intro);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    prompt(&mut stdout);

    for line in stdin.lock().lines() {
        let line = line.context("Error reading input")?;
        let Some(input) = Input::parse(&line) else {
            prompt(&mut stdout);
            continue;
        };

        match input {
            Input::Say(text) => match driver.submit(text).await {
                Ok(turn) => {
                    print_dm(&turn.display_text());
                    if let Turn::Advanced { from, to, .. } = &turn {
                        println!("[TOPIC] {} -> {}", from.label(), to.label());
                    }
                    if turn.is_complete() {
                        finish(driver.sheet(), output.as_deref()).await?;
                        println!("[USAGE] {}", driver.usage());
                        return Ok(());
                    }
                }
                Err(CreationError::Finished) => break,
                Err(e) if driver.has_pending_transition() => {
                    println!("[ERROR] {e}");
                    println!("[ERROR] Moving on to the next topic failed; send any line to retry.");
                }
                Err(e) => println!("[ERROR] {e}"),
            },
            Input::Sheet => println!("[SHEET]\n{}", driver.sheet()),
            Input::Usage => println!("[USAGE] {}", driver.usage()),
            Input::Topic => {
                let current = driver.current_topic();
                match driver.rulebook().graph().next(current) {
                    Some(next) => println!("[TOPIC] {} (next: {})", current.label(), next.label()),
                    None => println!("[TOPIC] {} (last)", current.label()),
                }
            }
            Input::Help => println!("[HELP]\n{HELP}"),
            Input::Quit => {
                println!("Goodbye!");
                break;
            }
            Input::Unknown(command) => {
                println!("[ERROR] Unknown command #{command}. Type #help for help.")
            }
        }
        prompt(&mut stdout);
    }

    Ok(())
}

fn prompt(stdout: &mut io::Stdout) {
    print!("> ");
    stdout.flush().ok();
}

fn print_dm(text: &str) {
    println!("[DM]");
    for para in text.split("\n\n") {
        println!("{para}");
    }
    println!();
}

async fn finish(sheet: &CharacterSheet, output: Option<&Path>) -> anyhow::Result<()> {
    println!("[SHEET]\n{sheet}");

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(sheet)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("[SAVED] Character sheet written to {}", path.display());
    }
    Ok(())
}
