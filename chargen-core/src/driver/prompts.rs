//! Prompt text for each kind of turn.

use crate::rulebook::{Rulebook, Topic};

const NODE_ENTRY: &str = include_str!("prompts/node_entry.txt");
const ENTRY_TURN: &str = include_str!("prompts/entry_turn.txt");
const TRANSITION_TURN: &str = include_str!("prompts/transition_turn.txt");

/// System prompt while `topic` is current: global rules, topic entry rules,
/// then the topic's own rules.
pub fn system_prompt(rulebook: &Rulebook, topic: Topic, sentinel: &str) -> String {
    let mut prompt = String::new();

    push_ruleset(&mut prompt, &rulebook.name, rulebook.global_rules.iter().map(String::as_str));

    let entry = NODE_ENTRY
        .replace("{topic}", topic.label())
        .replace("{sentinel}", sentinel);
    push_ruleset(&mut prompt, "Topic Rules", entry.lines());

    let topic_rules = rulebook.rules_for(topic);
    if !topic_rules.is_empty() {
        let heading = format!("{} rules", capitalize(topic.label()));
        push_ruleset(&mut prompt, &heading, topic_rules.iter().map(String::as_str));
    }

    prompt.truncate(prompt.trim_end().len());
    prompt
}

/// The user-side message that opens a topic.
pub fn entry_turn(topic: Topic, first_run: bool, name: &str) -> String {
    ENTRY_TURN
        .replace("{first_run}", if first_run { "true" } else { "false" })
        .replace("{name}", name)
        .replace("{topic}", topic.label())
        .trim_end()
        .to_string()
}

/// The user-side message announcing a move between topics.
pub fn transition_turn(from: Topic, to: Topic) -> String {
    TRANSITION_TURN
        .replace("{from}", from.label())
        .replace("{to}", to.label())
        .trim_end()
        .to_string()
}

fn push_ruleset<'a>(prompt: &mut String, heading: &str, rules: impl Iterator<Item = &'a str>) {
    prompt.push_str("## ");
    prompt.push_str(heading);
    prompt.push('\n');
    for rule in rules.map(str::trim).filter(|r| !r.is_empty()) {
        prompt.push_str("- ");
        prompt.push_str(rule);
        prompt.push('\n');
    }
    prompt.push('\n');
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
