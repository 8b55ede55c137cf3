//! Creation topics, their rules, and the graph that orders them.
//!
//! A [`Rulebook`] is the whole state table the driver runs on: the global
//! rules every turn sees, the rules for each topic, and the [`NodeGraph`]
//! saying which topic follows which. [`Rulebook::default`] is the standard
//! D&D 5e sequence; a TOML file can replace it.

use crate::error::CreationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A character creation topic (a node of the conversation graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "race")]
    Race,
    #[serde(rename = "class_", alias = "class")]
    Class,
    #[serde(rename = "ability_scores")]
    AbilityScores,
    #[serde(rename = "background")]
    Background,
    #[serde(rename = "skill_proficiencies")]
    SkillProficiencies,
}

impl Topic {
    /// Node identifier. `class` carries a trailing underscore.
    pub fn id(&self) -> &'static str {
        match self {
            Topic::Race => "race",
            Topic::Class => "class_",
            Topic::AbilityScores => "ability_scores",
            Topic::Background => "background",
            Topic::SkillProficiencies => "skill_proficiencies",
        }
    }

    /// Human-facing name used inside prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Topic::Race => "race",
            Topic::Class => "class",
            Topic::AbilityScores => "ability scores",
            Topic::Background => "background",
            Topic::SkillProficiencies => "skill proficiencies",
        }
    }

    pub fn all() -> [Topic; 5] {
        [
            Topic::Race,
            Topic::Class,
            Topic::AbilityScores,
            Topic::Background,
            Topic::SkillProficiencies,
        ]
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Topic {
    type Err = CreationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "race" => Ok(Topic::Race),
            "class" | "class_" => Ok(Topic::Class),
            "ability_scores" | "abilities" => Ok(Topic::AbilityScores),
            "background" => Ok(Topic::Background),
            "skill_proficiencies" | "skills" => Ok(Topic::SkillProficiencies),
            other => Err(CreationError::Config(format!("Unknown topic: {other}"))),
        }
    }
}

/// Successor mapping between topics.
///
/// Every successor is guaranteed to be a key, so walking the graph from any
/// key never leaves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeGraph {
    successors: BTreeMap<Topic, Vec<Topic>>,
}

impl NodeGraph {
    /// Build a graph, rejecting successors that are not themselves nodes.
    pub fn new(successors: BTreeMap<Topic, Vec<Topic>>) -> Result<Self, CreationError> {
        if successors.is_empty() {
            return Err(CreationError::Config("Node graph has no topics".into()));
        }
        for (topic, next) in &successors {
            if let Some(missing) = next.iter().find(|t| !successors.contains_key(t)) {
                return Err(CreationError::Config(format!(
                    "Topic {topic} leads to {missing}, which is not in the graph"
                )));
            }
        }
        Ok(Self { successors })
    }

    /// A straight line through `order`, ending at its last topic.
    pub fn linear(order: &[Topic]) -> Result<Self, CreationError> {
        let mut successors = BTreeMap::new();
        for (i, topic) in order.iter().enumerate() {
            let next = order.get(i + 1).map(|t| vec![*t]).unwrap_or_default();
            successors.insert(*topic, next);
        }
        Self::new(successors)
    }

    /// Successors of `topic`; empty for terminal topics and unknown keys.
    pub fn successors(&self, topic: Topic) -> &[Topic] {
        self.successors
            .get(&topic)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The topic the conversation moves to after `topic`, if any.
    pub fn next(&self, topic: Topic) -> Option<Topic> {
        self.successors(topic).first().copied()
    }

    pub fn contains(&self, topic: Topic) -> bool {
        self.successors.contains_key(&topic)
    }

    pub fn is_terminal(&self, topic: Topic) -> bool {
        self.successors(topic).is_empty()
    }

    pub fn topics(&self) -> impl Iterator<Item = Topic> + '_ {
        self.successors.keys().copied()
    }
}

impl Default for NodeGraph {
    fn default() -> Self {
        let successors = BTreeMap::from([
            (Topic::Race, vec![Topic::Class]),
            (Topic::Class, vec![Topic::AbilityScores]),
            (Topic::AbilityScores, vec![Topic::Background]),
            (Topic::Background, vec![Topic::SkillProficiencies]),
            (Topic::SkillProficiencies, vec![]),
        ]);
        Self { successors }
    }
}

/// Global rules, per-topic rules, and the node graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rulebook {
    /// Heading for the global rule set.
    pub name: String,
    /// Rules sent with every turn.
    pub global_rules: Vec<String>,
    topic_rules: BTreeMap<Topic, Vec<String>>,
    graph: NodeGraph,
}

impl Rulebook {
    pub fn new(
        name: impl Into<String>,
        global_rules: Vec<String>,
        topic_rules: BTreeMap<Topic, Vec<String>>,
        graph: NodeGraph,
    ) -> Self {
        Self {
            name: name.into(),
            global_rules,
            topic_rules,
            graph,
        }
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    /// Rules specific to `topic` (possibly empty).
    pub fn rules_for(&self, topic: Topic) -> &[String] {
        self.topic_rules
            .get(&topic)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Parse a rulebook from TOML.
    ///
    /// ```toml
    /// name = "Character Creation Rules"
    /// global_rules = ["You are the dungeon master of a 5e campaign."]
    ///
    /// [topics.race]
    /// next = ["class_"]
    ///
    /// [topics.class_]
    /// rules = ["Mention each class's primary ability."]
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, CreationError> {
        let file: RulebookFile = toml::from_str(source)
            .map_err(|e| CreationError::Config(format!("Failed to parse rulebook: {e}")))?;

        let mut successors = BTreeMap::new();
        let mut topic_rules = BTreeMap::new();
        for (topic, entry) in file.topics {
            successors.insert(topic, entry.next);
            topic_rules.insert(topic, entry.rules);
        }

        Ok(Self {
            name: file.name,
            global_rules: file.global_rules,
            topic_rules,
            graph: NodeGraph::new(successors)?,
        })
    }

    /// Load a rulebook from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CreationError> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            CreationError::Config(format!("Failed to read rulebook {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }
}

impl Default for Rulebook {
    fn default() -> Self {
        let global_rules = vec![
            "You are the dungeon master of a 5e campaign, assisting the user with character creation.",
            "Be brief when you respond; give minimal but complete information unless the user asks for more.",
            "Discuss only topics related to D&D.",
            "Whenever you see the word 'class_', treat it as 'class'.",
        ];

        let topic_rules = BTreeMap::from([
            (Topic::Race, vec![]),
            (Topic::Class, vec![]),
            (
                Topic::AbilityScores,
                vec![
                    "First, find out which method the user wants to use: standard array, point buy, or roll for scores.",
                    "Once you know the method, offer to optimize them for the user's class, which you can obtain from their character sheet.",
                    "If you optimize the ability scores, do not immediately update the character sheet with new ability scores. Instead, ask their permission.",
                    "Update the character sheet with new ability scores after the user gives permission to do so.",
                ],
            ),
            (
                Topic::Background,
                vec!["Update the character sheet with a new background only after the user gives permission to do so."],
            ),
            (
                Topic::SkillProficiencies,
                vec![
                    "The player's class allows them to choose skill proficiencies from a list specific to their class.",
                    "You'll want to check which skill proficiencies they already have, because there's no real reason to double up on them.",
                ],
            ),
        ]);

        Self {
            name: "Character Creation Rules".to_string(),
            global_rules: global_rules.into_iter().map(String::from).collect(),
            topic_rules: topic_rules
                .into_iter()
                .map(|(t, rules)| (t, rules.into_iter().map(String::from).collect()))
                .collect(),
            graph: NodeGraph::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RulebookFile {
    #[serde(default = "default_rulebook_name")]
    name: String,
    #[serde(default)]
    global_rules: Vec<String>,
    topics: BTreeMap<Topic, TopicEntry>,
}

#[derive(Debug, Deserialize)]
struct TopicEntry {
    #[serde(default)]
    rules: Vec<String>,
    #[serde(default)]
    next: Vec<Topic>,
}

fn default_rulebook_name() -> String {
    "Character Creation Rules".to_string()
}
