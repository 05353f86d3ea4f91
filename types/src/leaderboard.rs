use std::{cmp::Ordering, collections::BTreeMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{SkillType, UnknownVariant};

/// A rankable statistic: one skill's level, or the power level ("ALL").
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatKey {
    Skill(SkillType),
    PowerLevel,
}

impl StatKey {
    /// Every rankable key: the non-child skills followed by the power level.
    pub fn all() -> impl Iterator<Item = StatKey> {
        SkillType::non_child_skills()
            .map(StatKey::Skill)
            .chain(std::iter::once(StatKey::PowerLevel))
    }
}

impl Display for StatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatKey::Skill(skill) => write!(f, "{skill}"),
            StatKey::PowerLevel => write!(f, "ALL"),
        }
    }
}

impl FromStr for StatKey {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatKey::PowerLevel);
        }
        match s.parse::<SkillType>() {
            Ok(skill) if !skill.is_child() => Ok(StatKey::Skill(skill)),
            _ => Err(UnknownVariant::new("stat", s)),
        }
    }
}

// Serialized through its text form so it can key JSON maps.
impl Serialize for StatKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StatKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub value: u32,
}

impl LeaderboardEntry {
    pub fn new(name: &str, value: u32) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }

    /// Leaderboard order: highest value first, ties by name ascending
    /// ignoring case.
    pub fn ranking_order(a: &Self, b: &Self) -> Ordering {
        b.value
            .cmp(&a.value)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    }
}

impl Display for LeaderboardEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.value)
    }
}

/// 1-based positions of one player per stat. Stats where the player has no
/// rank (zero value, or unknown player) are absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankResult {
    ranks: BTreeMap<StatKey, u32>,
}

impl RankResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: StatKey, rank: u32) {
        self.ranks.insert(key, rank);
    }

    pub fn get(&self, key: StatKey) -> Option<u32> {
        self.ranks.get(&key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatKey, u32)> + '_ {
        self.ranks.iter().map(|(key, rank)| (*key, *rank))
    }
}
