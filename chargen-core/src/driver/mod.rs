//! The character creation conversation driver.
//!
//! [`CreationDriver`] walks the rulebook's node graph one topic at a time.
//! Each user message becomes a Claude request with the current topic's
//! system prompt and the sheet tools attached. Tool calls are run against
//! the [`CharacterSheet`] in place; when the assistant signals that the topic
//! is settled (the `complete_topic` tool, or replying with only the
//! sentinel), the driver moves to the next topic, or finishes if there is
//! none.

mod prompts;

pub use prompts::{entry_turn, system_prompt, transition_turn};

use crate::error::CreationError;
use crate::llm::LlmClient;
use crate::memory::{ConversationMemory, DEFAULT_HISTORY_LIMIT};
use crate::rulebook::{Rulebook, Topic};
use crate::sheet::{CharacterSheet, SheetField};
use crate::tools::{ToolOutcome, ToolRegistry, COMPLETE_TOOL};
use crate::usage::{UsageReport, UsageTracker};
use claude::{Claude, Message, Request, Role, StopReason};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

/// Reply text that marks the current topic as settled.
pub const DEFAULT_SENTINEL: &str = "change_node";

/// Message returned once the last topic is settled.
pub const DEFAULT_COMPLETION_MESSAGE: &str = "All done!";

/// Configuration for the creation driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Name the assistant introduces itself with.
    pub name: String,

    /// The model to use (defaults to the client's model).
    pub model: Option<String>,

    /// Maximum tokens per response.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// Topic the conversation opens on.
    pub starting_topic: Topic,

    /// Literal reply that advances to the next topic.
    pub sentinel: String,

    /// Text returned when the final topic is settled.
    pub completion_message: String,

    /// Send an extra turn announcing each transition before entering the
    /// next topic.
    pub announce_transitions: bool,

    /// Tool rounds allowed within one turn.
    pub max_tool_rounds: usize,

    /// Messages kept in conversation history.
    pub history_limit: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: "AI Dungeon Master".to_string(),
            model: None,
            max_tokens: 500,
            temperature: Some(0.0),
            starting_topic: Topic::Race,
            sentinel: DEFAULT_SENTINEL.to_string(),
            completion_message: DEFAULT_COMPLETION_MESSAGE.to_string(),
            announce_transitions: true,
            max_tool_rounds: 8,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl DriverConfig {
    /// Pin the model instead of using the client's default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the response token limit.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Open the conversation on `topic`.
    pub fn with_starting_topic(mut self, topic: Topic) -> Self {
        self.starting_topic = topic;
        self
    }

    /// Turn the transition announcement turn on or off.
    pub fn with_announce_transitions(mut self, announce: bool) -> Self {
        self.announce_transitions = announce;
        self
    }

    /// Limit the tool rounds allowed in one turn.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Keep at most `limit` messages of history.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}

/// Result of one [`CreationDriver::submit`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// Ordinary assistant output; the topic is unchanged.
    Reply(String),

    /// The topic was settled and the conversation moved on.
    Advanced {
        from: Topic,
        to: Topic,
        /// Sheet fields written while on `from`.
        updated: Vec<SheetField>,
        /// Reply to the transition announcement, when announcements are on.
        announcement: Option<String>,
        /// Opening reply for `to`.
        intro: String,
    },

    /// The final topic was settled.
    Complete {
        updated: Vec<SheetField>,
        message: String,
    },
}

impl Turn {
    /// Everything the user should see for this turn, in order.
    pub fn display_text(&self) -> String {
        match self {
            Turn::Reply(text) => text.clone(),
            Turn::Advanced {
                announcement,
                intro,
                ..
            } => match announcement {
                Some(a) if !a.trim().is_empty() => format!("{a}\n\n{intro}"),
                _ => intro.clone(),
            },
            Turn::Complete { message, .. } => message.clone(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Turn::Complete { .. })
    }
}

/// Text and tool effects of one request/response exchange.
#[derive(Debug, Default)]
struct Exchange {
    /// Text from every round, joined.
    text: String,
    /// Text from the last round only.
    final_text: String,
    updated: Vec<SheetField>,
    advance: bool,
}

/// A settled topic whose move to the next one has not finished.
#[derive(Debug, Clone)]
struct Transition {
    from: Topic,
    to: Topic,
    updated: Vec<SheetField>,
    announcement: Option<String>,
}

/// Drives a character creation conversation.
pub struct CreationDriver<C> {
    client: C,
    config: DriverConfig,
    rulebook: Rulebook,
    tools: ToolRegistry,
    sheet: CharacterSheet,
    memory: ConversationMemory,
    usage: UsageTracker,
    current: Topic,
    first_run: bool,
    finished: bool,
    /// Fields written since the current topic was entered.
    pending: Vec<SheetField>,
    /// Set when an error interrupted a move between topics.
    transition: Option<Transition>,
}

impl CreationDriver<Claude> {
    /// Create a driver backed by Claude, reading `ANTHROPIC_API_KEY`.
    pub fn from_env(rulebook: Rulebook, config: DriverConfig) -> Result<Self, CreationError> {
        let client = Claude::from_env()?;
        Self::new(client, rulebook, config)
    }
}

impl<C: LlmClient> CreationDriver<C> {
    /// Create a driver. No request is sent until [`start`](Self::start) or
    /// [`submit`](Self::submit).
    pub fn new(client: C, rulebook: Rulebook, config: DriverConfig) -> Result<Self, CreationError> {
        if !rulebook.graph().contains(config.starting_topic) {
            return Err(CreationError::Config(format!(
                "Starting topic {} is not in the rulebook",
                config.starting_topic
            )));
        }
        if config.max_tool_rounds == 0 {
            return Err(CreationError::Config(
                "max_tool_rounds must be at least 1".into(),
            ));
        }

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| client.default_model().to_string());

        Ok(Self {
            usage: UsageTracker::new(&model),
            memory: ConversationMemory::with_limit(config.history_limit),
            current: config.starting_topic,
            tools: ToolRegistry::new(),
            sheet: CharacterSheet::new(),
            first_run: true,
            finished: false,
            pending: Vec::new(),
            transition: None,
            client,
            config,
            rulebook,
        })
    }

    /// Start from an existing sheet instead of a blank one.
    pub fn with_sheet(mut self, sheet: CharacterSheet) -> Self {
        self.sheet = sheet;
        self
    }

    pub fn current_topic(&self) -> Topic {
        self.current
    }

    pub fn sheet(&self) -> &CharacterSheet {
        &self.sheet
    }

    pub fn history(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn usage(&self) -> UsageReport {
        self.usage.report()
    }

    pub fn rulebook(&self) -> &Rulebook {
        &self.rulebook
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the current topic is settled but the move to the next one
    /// failed. The next [`submit`](Self::submit) retries the move.
    pub fn has_pending_transition(&self) -> bool {
        self.transition.is_some()
    }

    /// Consume the driver, keeping the sheet.
    pub fn into_sheet(self) -> CharacterSheet {
        self.sheet
    }

    /// Enter the starting topic and return the assistant's introduction.
    pub async fn start(&mut self) -> Result<String, CreationError> {
        self.enter(self.config.starting_topic).await
    }

    /// Make `topic` current and send its opening turn.
    ///
    /// Entering a topic directly drops any interrupted transition.
    pub async fn enter(&mut self, topic: Topic) -> Result<String, CreationError> {
        if !self.rulebook.graph().contains(topic) {
            return Err(CreationError::Config(format!(
                "Topic {topic} is not in the rulebook"
            )));
        }

        let intro = self.enter_topic(topic).await?;
        self.transition = None;
        Ok(intro)
    }

    /// Send user input and act on the assistant's answer.
    ///
    /// If an earlier transition was interrupted by an error, it is retried
    /// instead and `input` is not sent.
    #[instrument(skip(self, input), fields(topic = %self.current))]
    pub async fn submit(&mut self, input: &str) -> Result<Turn, CreationError> {
        if self.finished {
            return Err(CreationError::Finished);
        }
        if let Some(transition) = self.transition.take() {
            debug!(from = %transition.from, to = %transition.to, "Retrying interrupted transition");
            return self.finish_transition(transition).await;
        }

        let exchange = self.exchange(self.current, input, true).await?;
        self.pending.extend(exchange.updated);

        if !(exchange.advance || self.is_sentinel(&exchange.final_text)) {
            return Ok(Turn::Reply(exchange.text));
        }

        self.first_run = false;
        let from = self.current;

        let Some(to) = self.rulebook.graph().next(from) else {
            self.finished = true;
            info!(topic = %from, "Final topic settled");
            return Ok(Turn::Complete {
                updated: self.take_pending(),
                message: self.config.completion_message.clone(),
            });
        };

        let transition = Transition {
            from,
            to,
            updated: self.take_pending(),
            announcement: None,
        };
        info!(from = %from, to = %to, updated = transition.updated.len(), "Topic settled");
        self.finish_transition(transition).await
    }

    /// Announce (when enabled) and enter the next topic. On failure the
    /// transition is kept so it can be retried.
    async fn finish_transition(&mut self, mut transition: Transition) -> Result<Turn, CreationError> {
        if self.config.announce_transitions && transition.announcement.is_none() {
            let text = transition_turn(transition.from, transition.to);
            match self.exchange(transition.from, &text, false).await {
                Ok(announce) => {
                    transition.updated.extend(announce.updated);
                    transition.announcement = Some(announce.text);
                }
                Err(err) => {
                    self.transition = Some(transition);
                    return Err(err);
                }
            }
        }

        match self.enter_topic(transition.to).await {
            Ok(intro) => Ok(Turn::Advanced {
                from: transition.from,
                to: transition.to,
                updated: unique(transition.updated),
                announcement: transition.announcement,
                intro,
            }),
            Err(err) => {
                self.transition = Some(transition);
                Err(err)
            }
        }
    }

    /// Send the opening turn for `topic`; it becomes current once the
    /// assistant has answered.
    #[instrument(skip(self), fields(first_run = self.first_run))]
    async fn enter_topic(&mut self, topic: Topic) -> Result<String, CreationError> {
        info!(topic = %topic, "Entering topic");

        let opening = entry_turn(topic, self.first_run, &self.config.name);
        let exchange = self.exchange(topic, &opening, false).await?;
        if self.is_sentinel(&exchange.final_text) {
            debug!(topic = %topic, "Ignoring advance signal in opening turn");
        }

        self.current = topic;
        self.pending = exchange.updated;
        Ok(exchange.text)
    }

    /// One user turn while `topic` is current. A failed exchange leaves the
    /// history and the sheet as they were.
    async fn exchange(
        &mut self,
        topic: Topic,
        user_text: &str,
        allow_advance: bool,
    ) -> Result<Exchange, CreationError> {
        let memory = self.memory.clone();
        let sheet = self.sheet.clone();

        let result = self.run_exchange(topic, user_text, allow_advance).await;
        if result.is_err() {
            self.memory = memory;
            self.sheet = sheet;
        }
        result
    }

    /// Request, run any tool calls, repeat until the assistant stops calling
    /// tools or signals an advance.
    async fn run_exchange(
        &mut self,
        topic: Topic,
        user_text: &str,
        allow_advance: bool,
    ) -> Result<Exchange, CreationError> {
        self.memory.add_user_message(user_text);

        let system = system_prompt(&self.rulebook, topic, &self.config.sentinel);
        let tools: Vec<_> = self
            .tools
            .definitions()
            .into_iter()
            .filter(|tool| allow_advance || tool.name != COMPLETE_TOOL)
            .collect();
        let mut messages = self.memory.get_messages();
        let mut exchange = Exchange::default();

        let mut settled = false;
        for round in 0..self.config.max_tool_rounds {
            let mut request = Request::new(messages.clone())
                .with_system(&system)
                .with_max_tokens(self.config.max_tokens)
                .with_tools(tools.clone());

            if let Some(ref model) = self.config.model {
                request = request.with_model(model);
            }
            if let Some(temp) = self.config.temperature {
                request = request.with_temperature(temp);
            }

            let response = self.client.complete(request).await?;
            self.usage.record(&response.usage);

            let text = response.text();
            exchange.final_text = text.trim().to_string();
            if !exchange.final_text.is_empty() {
                if !exchange.text.is_empty() {
                    exchange.text.push('\n');
                }
                exchange.text.push_str(&exchange.final_text);
            }

            let tool_uses = response.tool_uses();
            if response.stop_reason != StopReason::ToolUse || tool_uses.is_empty() {
                settled = true;
                break;
            }

            messages.push(Message {
                role: Role::Assistant,
                content: response.content.clone(),
            });

            let mut results = Vec::with_capacity(tool_uses.len());
            for tool_use in tool_uses {
                debug!(round, tool = %tool_use.name, "Running tool");
                let outcome = if !allow_advance && tool_use.name == COMPLETE_TOOL {
                    ToolOutcome::rejected("The topic can only be completed after the player answers.")
                } else {
                    self.tools.run(&tool_use.name, &tool_use.input, &mut self.sheet)
                };
                if outcome.result.is_error {
                    warn!(tool = %tool_use.name, error = %outcome.result.content, "Tool call failed");
                }
                exchange.updated.extend(outcome.updated);
                exchange.advance |= outcome.advance;
                results.push(outcome.result.into_block(tool_use.id));
            }

            if exchange.advance {
                settled = true;
                break;
            }

            messages.push(Message {
                role: Role::User,
                content: results,
            });
        }

        if !settled {
            return Err(CreationError::ToolLoop {
                rounds: self.config.max_tool_rounds,
            });
        }

        if !exchange.text.is_empty() {
            self.memory.add_assistant_message(&exchange.text);
        } else if exchange.advance {
            self.memory.add_assistant_message(&self.config.sentinel);
        }

        Ok(exchange)
    }

    /// Whether `text` is the sentinel alone, allowing surrounding quotes
    /// and a trailing period inside or outside them.
    fn is_sentinel(&self, text: &str) -> bool {
        let unquote = |s: &str| {
            s.trim()
                .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
                .trim()
                .to_string()
        };
        let stripped = unquote(unquote(text).trim_end_matches('.'));
        stripped.eq_ignore_ascii_case(&self.config.sentinel)
    }

    fn take_pending(&mut self) -> Vec<SheetField> {
        unique(std::mem::take(&mut self.pending))
    }
}

/// Deduplicate fields, in sheet order.
fn unique(fields: Vec<SheetField>) -> Vec<SheetField> {
    let set: BTreeSet<SheetField> = fields.into_iter().collect();
    set.into_iter().collect()
}
