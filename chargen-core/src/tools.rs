//! Character sheet tools offered to the assistant.
//!
//! The driver parses each tool-use block into a [`ToolCall`] and runs it
//! against the sheet itself; there is no dynamic tool lookup.

use crate::sheet::{Ability, CharacterSheet, SheetField, SheetUpdate};
use claude::{Tool, ToolResult};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub const INSPECT_TOOL: &str = "inspect_character_sheet";
pub const UPDATE_TOOL: &str = "update_character_sheet";
pub const COMPLETE_TOOL: &str = "complete_topic";

/// Why a tool call could not be run. Reported back to the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("update_character_sheet needs at least one field")]
    EmptyUpdate,
}

impl ToolError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A parsed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Inspect,
    Update(SheetUpdate),
    CompleteTopic,
}

/// What running a tool call did.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    /// Result to send back to the assistant.
    pub result: ToolResult,
    /// Sheet fields written by this call.
    pub updated: Vec<SheetField>,
    /// Whether the assistant signalled that the current topic is settled.
    pub advance: bool,
}

impl ToolOutcome {
    /// An error result that changes nothing.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            result: ToolResult::error(message),
            updated: Vec::new(),
            advance: false,
        }
    }
}

/// The fixed set of sheet tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolRegistry;

impl ToolRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Tool definitions for the Claude API.
    pub fn definitions(&self) -> Vec<Tool> {
        vec![Self::inspect(), Self::update(), Self::complete_topic()]
    }

    /// Parse and run one tool call. Failures become error results, never
    /// driver errors.
    pub fn run(&self, name: &str, input: &Value, sheet: &mut CharacterSheet) -> ToolOutcome {
        match parse_tool_call(name, input) {
            Ok(call) => execute(call, sheet),
            Err(err) => ToolOutcome::rejected(err.to_string()),
        }
    }

    fn inspect() -> Tool {
        Tool {
            name: INSPECT_TOOL.to_string(),
            description: "Read the player's character sheet: race, class, ability scores, background and skill proficiencies. Unset fields are null or empty.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    fn update() -> Tool {
        Tool {
            name: UPDATE_TOOL.to_string(),
            description: "Write one or more fields of the player's character sheet. Only include the fields being changed. Ability scores are merged into the existing scores; skill proficiencies replace the existing list.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "race": {
                        "type": "string",
                        "description": "Chosen race, including subrace if any (e.g., 'Hill Dwarf')"
                    },
                    "class": {
                        "type": "string",
                        "description": "Chosen class (e.g., 'Fighter')"
                    },
                    "background": {
                        "type": "string",
                        "description": "Chosen background (e.g., 'Acolyte')"
                    },
                    "ability_scores": {
                        "type": "object",
                        "description": "Scores keyed by ability name: strength, dexterity, constitution, intelligence, wisdom, charisma",
                        "additionalProperties": { "type": "integer" }
                    },
                    "skill_proficiencies": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Full list of skill proficiencies (e.g., ['Athletics', 'Perception'])"
                    }
                },
                "required": []
            }),
        }
    }

    fn complete_topic() -> Tool {
        Tool {
            name: COMPLETE_TOOL.to_string(),
            description: "Call this once the current topic is settled and the character sheet has been updated, to move on to the next step of character creation.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }
}

/// Parse a tool-use block into a [`ToolCall`].
pub fn parse_tool_call(name: &str, input: &Value) -> Result<ToolCall, ToolError> {
    match name {
        INSPECT_TOOL => Ok(ToolCall::Inspect),
        COMPLETE_TOOL => Ok(ToolCall::CompleteTopic),
        UPDATE_TOOL => {
            let update = SheetUpdate {
                race: parse_text(input, "race")?,
                class: parse_text(input, "class")?,
                background: parse_text(input, "background")?,
                ability_scores: parse_scores(input)?,
                skill_proficiencies: parse_skills(input)?,
            };
            if update.is_empty() {
                return Err(ToolError::EmptyUpdate);
            }
            Ok(ToolCall::Update(update))
        }
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

/// Run a parsed call against the sheet.
pub fn execute(call: ToolCall, sheet: &mut CharacterSheet) -> ToolOutcome {
    match call {
        ToolCall::Inspect => ToolOutcome {
            result: sheet_result("", sheet),
            updated: Vec::new(),
            advance: false,
        },
        ToolCall::Update(update) => {
            let updated = sheet.apply(update);
            let names: Vec<&str> = updated.iter().map(SheetField::name).collect();
            ToolOutcome {
                result: sheet_result(&format!("Updated {}. Sheet is now: ", names.join(", ")), sheet),
                updated,
                advance: false,
            }
        }
        ToolCall::CompleteTopic => ToolOutcome {
            result: ToolResult::success("Topic complete."),
            updated: Vec::new(),
            advance: true,
        },
    }
}

fn sheet_result(prefix: &str, sheet: &CharacterSheet) -> ToolResult {
    match sheet.to_json() {
        Ok(json) => ToolResult::success(format!("{prefix}{json}")),
        Err(e) => ToolResult::error(format!("Failed to read the character sheet: {e}")),
    }
}

fn parse_text(input: &Value, field: &str) -> Result<Option<String>, ToolError> {
    match &input[field] {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        other => Err(ToolError::invalid(field, format!("expected a string, got {other}"))),
    }
}

fn parse_scores(input: &Value) -> Result<Option<BTreeMap<Ability, i32>>, ToolError> {
    let map = match &input["ability_scores"] {
        Value::Null => return Ok(None),
        Value::Object(map) => map,
        other => {
            return Err(ToolError::invalid(
                "ability_scores",
                format!("expected an object, got {other}"),
            ))
        }
    };

    let mut scores = BTreeMap::new();
    for (name, value) in map {
        let ability = Ability::parse(name)
            .ok_or_else(|| ToolError::invalid("ability_scores", format!("unknown ability '{name}'")))?;
        scores.insert(ability, coerce_score(name, value)?);
    }

    if scores.is_empty() {
        Ok(None)
    } else {
        Ok(Some(scores))
    }
}

fn coerce_score(name: &str, value: &Value) -> Result<i32, ToolError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| ToolError::invalid("ability_scores", format!("{name} is not an integer: {value}")))
}

fn parse_skills(input: &Value) -> Result<Option<BTreeSet<String>>, ToolError> {
    let skills: BTreeSet<String> = match &input["skill_proficiencies"] {
        Value::Null => return Ok(None),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(ToolError::invalid(
                    "skill_proficiencies",
                    format!("expected strings, got {other}"),
                )),
            })
            .collect::<Result<_, _>>()?,
        Value::String(s) => s.split(',').map(|part| part.trim().to_string()).collect(),
        other => {
            return Err(ToolError::invalid(
                "skill_proficiencies",
                format!("expected a list, got {other}"),
            ))
        }
    };

    Ok(Some(skills.into_iter().filter(|s| !s.is_empty()).collect()))
}
