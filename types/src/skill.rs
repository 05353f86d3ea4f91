use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::UnknownVariant;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillType {
    Taming,
    Mining,
    Repair,
    Woodcutting,
    Unarmed,
    Herbalism,
    Excavation,
    Archery,
    Swords,
    Axes,
    Acrobatics,
    Fishing,
    Salvage,
}

impl SkillType {
    /// Every skill, stored ones first in column order.
    pub const ALL: [SkillType; 13] = [
        SkillType::Taming,
        SkillType::Mining,
        SkillType::Repair,
        SkillType::Woodcutting,
        SkillType::Unarmed,
        SkillType::Herbalism,
        SkillType::Excavation,
        SkillType::Archery,
        SkillType::Swords,
        SkillType::Axes,
        SkillType::Acrobatics,
        SkillType::Fishing,
        SkillType::Salvage,
    ];

    /// Child skills derive their level from parent skills and are never
    /// persisted or ranked.
    pub fn is_child(self) -> bool {
        matches!(self, SkillType::Salvage)
    }

    pub fn non_child_skills() -> impl Iterator<Item = SkillType> {
        Self::ALL.into_iter().filter(|skill| !skill.is_child())
    }

    /// Column name used by the relational schema.
    pub fn column(self) -> &'static str {
        match self {
            SkillType::Taming => "taming",
            SkillType::Mining => "mining",
            SkillType::Repair => "repair",
            SkillType::Woodcutting => "woodcutting",
            SkillType::Unarmed => "unarmed",
            SkillType::Herbalism => "herbalism",
            SkillType::Excavation => "excavation",
            SkillType::Archery => "archery",
            SkillType::Swords => "swords",
            SkillType::Axes => "axes",
            SkillType::Acrobatics => "acrobatics",
            SkillType::Fishing => "fishing",
            SkillType::Salvage => "salvage",
        }
    }

    pub fn abilities(self) -> &'static [AbilityType] {
        match self {
            SkillType::Mining => &[AbilityType::SuperBreaker, AbilityType::BlastMining],
            SkillType::Woodcutting => &[AbilityType::TreeFeller],
            SkillType::Unarmed => &[AbilityType::Berserk],
            SkillType::Herbalism => &[AbilityType::GreenTerra],
            SkillType::Excavation => &[AbilityType::GigaDrillBreaker],
            SkillType::Swords => &[AbilityType::SerratedStrikes],
            SkillType::Axes => &[AbilityType::SkullSplitter],
            _ => &[],
        }
    }
}

impl Display for SkillType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column().to_uppercase())
    }
}

impl FromStr for SkillType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|skill| skill.column().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant::new("skill", s))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbilityType {
    Berserk,
    GigaDrillBreaker,
    TreeFeller,
    GreenTerra,
    SerratedStrikes,
    SkullSplitter,
    SuperBreaker,
    BlastMining,
}

impl AbilityType {
    pub const ALL: [AbilityType; 8] = [
        AbilityType::Berserk,
        AbilityType::GigaDrillBreaker,
        AbilityType::TreeFeller,
        AbilityType::GreenTerra,
        AbilityType::SerratedStrikes,
        AbilityType::SkullSplitter,
        AbilityType::SuperBreaker,
        AbilityType::BlastMining,
    ];

    pub fn skill(self) -> SkillType {
        match self {
            AbilityType::Berserk => SkillType::Unarmed,
            AbilityType::GigaDrillBreaker => SkillType::Excavation,
            AbilityType::TreeFeller => SkillType::Woodcutting,
            AbilityType::GreenTerra => SkillType::Herbalism,
            AbilityType::SerratedStrikes => SkillType::Swords,
            AbilityType::SkullSplitter => SkillType::Axes,
            AbilityType::SuperBreaker | AbilityType::BlastMining => SkillType::Mining,
        }
    }

    /// Column in the cooldowns table. Blast mining predates the per-ability
    /// layout and keeps its own column next to mining.
    pub fn cooldown_column(self) -> &'static str {
        match self {
            AbilityType::BlastMining => "blast_mining",
            other => other.skill().column(),
        }
    }
}

impl Display for AbilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbilityType::Berserk => write!(f, "BERSERK"),
            AbilityType::GigaDrillBreaker => write!(f, "GIGA_DRILL_BREAKER"),
            AbilityType::TreeFeller => write!(f, "TREE_FELLER"),
            AbilityType::GreenTerra => write!(f, "GREEN_TERRA"),
            AbilityType::SerratedStrikes => write!(f, "SERRATED_STRIKES"),
            AbilityType::SkullSplitter => write!(f, "SKULL_SPLITTER"),
            AbilityType::SuperBreaker => write!(f, "SUPER_BREAKER"),
            AbilityType::BlastMining => write!(f, "BLAST_MINING"),
        }
    }
}
