//! The character record built up during creation.
//!
//! Holds the five things the creation conversation decides. It is mutated
//! only through [`CharacterSheet::apply`], which the `update_character_sheet`
//! tool calls.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Dexterity => "Dexterity",
            Ability::Constitution => "Constitution",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }

    /// Parse a full name or abbreviation, ignoring case.
    pub fn parse(s: &str) -> Option<Ability> {
        match s.trim().to_lowercase().as_str() {
            "strength" | "str" => Some(Ability::Strength),
            "dexterity" | "dex" => Some(Ability::Dexterity),
            "constitution" | "con" => Some(Ability::Constitution),
            "intelligence" | "int" => Some(Ability::Intelligence),
            "wisdom" | "wis" => Some(Ability::Wisdom),
            "charisma" | "cha" => Some(Ability::Charisma),
            _ => None,
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// A field of the sheet, used to report what an update touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetField {
    Race,
    Class,
    AbilityScores,
    Background,
    SkillProficiencies,
}

impl SheetField {
    pub fn name(&self) -> &'static str {
        match self {
            SheetField::Race => "race",
            SheetField::Class => "class",
            SheetField::AbilityScores => "ability_scores",
            SheetField::Background => "background",
            SheetField::SkillProficiencies => "skill_proficiencies",
        }
    }
}

impl fmt::Display for SheetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The character record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub race: Option<String>,
    pub class: Option<String>,
    pub ability_scores: BTreeMap<Ability, i32>,
    pub background: Option<String>,
    pub skill_proficiencies: BTreeSet<String>,
}

/// A set of field assignments. `None` leaves the field alone.
///
/// Ability scores merge into the existing map; skill proficiencies replace
/// the existing set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetUpdate {
    pub race: Option<String>,
    pub class: Option<String>,
    pub ability_scores: Option<BTreeMap<Ability, i32>>,
    pub background: Option<String>,
    pub skill_proficiencies: Option<BTreeSet<String>>,
}

impl SheetUpdate {
    pub fn is_empty(&self) -> bool {
        self.race.is_none()
            && self.class.is_none()
            && self.ability_scores.is_none()
            && self.background.is_none()
            && self.skill_proficiencies.is_none()
    }
}

impl CharacterSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an update and return the fields it touched, in sheet order.
    pub fn apply(&mut self, update: SheetUpdate) -> Vec<SheetField> {
        let mut touched = Vec::new();

        if let Some(race) = update.race {
            self.race = Some(race);
            touched.push(SheetField::Race);
        }
        if let Some(class) = update.class {
            self.class = Some(class);
            touched.push(SheetField::Class);
        }
        if let Some(scores) = update.ability_scores {
            self.ability_scores.extend(scores);
            touched.push(SheetField::AbilityScores);
        }
        if let Some(background) = update.background {
            self.background = Some(background);
            touched.push(SheetField::Background);
        }
        if let Some(skills) = update.skill_proficiencies {
            self.skill_proficiencies = skills;
            touched.push(SheetField::SkillProficiencies);
        }

        touched
    }

    /// Get a single ability score if it has been set.
    pub fn score(&self, ability: Ability) -> Option<i32> {
        self.ability_scores.get(&ability).copied()
    }

    /// Whether every field has a value.
    pub fn is_complete(&self) -> bool {
        self.race.is_some()
            && self.class.is_some()
            && self.background.is_some()
            && Ability::all()
                .iter()
                .all(|a| self.ability_scores.contains_key(a))
            && !self.skill_proficiencies.is_empty()
    }

    /// The sheet as a JSON value, keyed the way the tools describe it.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl fmt::Display for CharacterSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unset = "(not chosen)";
        writeln!(f, "Race:       {}", self.race.as_deref().unwrap_or(unset))?;
        writeln!(f, "Class:      {}", self.class.as_deref().unwrap_or(unset))?;
        writeln!(f, "Background: {}", self.background.as_deref().unwrap_or(unset))?;

        write!(f, "Abilities: ")?;
        if self.ability_scores.is_empty() {
            writeln!(f, " {unset}")?;
        } else {
            for ability in Ability::all() {
                match self.score(ability) {
                    Some(score) => write!(f, " {ability} {score}")?,
                    None => write!(f, " {ability} -")?,
                }
            }
            writeln!(f)?;
        }

        if self.skill_proficiencies.is_empty() {
            write!(f, "Skills:     {unset}")
        } else {
            let skills: Vec<&str> = self.skill_proficiencies.iter().map(String::as_str).collect();
            write!(f, "Skills:     {}", skills.join(", "))
        }
    }
}
