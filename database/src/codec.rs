//! Flat-file line format for one player.
//!
//! The layout grew field by field over the product's history, so the field
//! positions below are fixed forever and decoding tolerates lines that stop
//! early: every missing trailing field takes its default.

use itertools::Itertools;
use stats_types::{AbilityType, HudType, MobHealthbarType, PlayerRecord, SkillType, MAX_LEVEL};
use thiserror::Error;

pub const FIELD_SEPARATOR: char = ':';
pub const FIELD_COUNT: usize = 39;

const NAME: usize = 0;
const HUD_TYPE: usize = 33;
const LAST_LOGIN: usize = 37;
const MOB_HEALTHBAR: usize = 38;

/// Field index of a skill's level.
pub fn level_index(skill: SkillType) -> Option<usize> {
    match skill {
        SkillType::Mining => Some(1),
        SkillType::Woodcutting => Some(5),
        SkillType::Repair => Some(7),
        SkillType::Unarmed => Some(8),
        SkillType::Herbalism => Some(9),
        SkillType::Excavation => Some(10),
        SkillType::Archery => Some(11),
        SkillType::Swords => Some(12),
        SkillType::Axes => Some(13),
        SkillType::Acrobatics => Some(14),
        SkillType::Taming => Some(24),
        SkillType::Fishing => Some(34),
        SkillType::Salvage => None,
    }
}

fn xp_index(skill: SkillType) -> Option<usize> {
    match skill {
        SkillType::Mining => Some(4),
        SkillType::Woodcutting => Some(6),
        SkillType::Repair => Some(15),
        SkillType::Unarmed => Some(16),
        SkillType::Herbalism => Some(17),
        SkillType::Excavation => Some(18),
        SkillType::Archery => Some(19),
        SkillType::Swords => Some(20),
        SkillType::Axes => Some(21),
        SkillType::Acrobatics => Some(22),
        SkillType::Taming => Some(25),
        SkillType::Fishing => Some(35),
        SkillType::Salvage => None,
    }
}

fn cooldown_index(ability: AbilityType) -> usize {
    match ability {
        AbilityType::Berserk => 26,
        AbilityType::GigaDrillBreaker => 27,
        AbilityType::TreeFeller => 28,
        AbilityType::GreenTerra => 29,
        AbilityType::SerratedStrikes => 30,
        AbilityType::SkullSplitter => 31,
        AbilityType::SuperBreaker => 32,
        AbilityType::BlastMining => 36,
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("blank line")]
    Blank,
    #[error("placeholder row {0:?}")]
    Placeholder(String),
}

/// Name field of a raw line, if the line looks like a record at all.
pub fn line_name(line: &str) -> Option<&str> {
    let name = line.split(FIELD_SEPARATOR).next()?.trim();
    if name.is_empty() || name.starts_with('#') {
        None
    } else {
        Some(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecordCodec {
    mob_healthbar_default: MobHealthbarType,
}

impl RecordCodec {
    pub fn new(mob_healthbar_default: MobHealthbarType) -> Self {
        Self {
            mob_healthbar_default,
        }
    }

    pub fn mob_healthbar_default(&self) -> MobHealthbarType {
        self.mob_healthbar_default
    }

    pub fn encode(&self, record: &PlayerRecord) -> String {
        let mut fields = vec![String::new(); FIELD_COUNT];
        fields[NAME] = record.name.clone();

        for skill in SkillType::non_child_skills() {
            if let Some(index) = level_index(skill) {
                fields[index] = record.level(skill).to_string();
            }
            if let Some(index) = xp_index(skill) {
                fields[index] = record.xp(skill).to_string();
            }
        }
        for ability in AbilityType::ALL {
            fields[cooldown_index(ability)] = record.cooldown(ability).to_string();
        }

        fields[HUD_TYPE] = record.hud_type.to_string();
        fields[LAST_LOGIN] = record.last_login.to_string();
        fields[MOB_HEALTHBAR] = record.mob_healthbar.to_string();

        // Legacy lines end with a separator after the last field.
        let mut line = fields.iter().join(&FIELD_SEPARATOR.to_string());
        line.push(FIELD_SEPARATOR);
        line
    }

    pub fn decode(&self, line: &str) -> Result<PlayerRecord, DecodeError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(DecodeError::Blank);
        }
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        let name = fields[NAME].trim();
        if name.is_empty() || name.starts_with('#') {
            return Err(DecodeError::Placeholder(name.to_string()));
        }

        let field = |index: usize| fields.get(index).map(|f| f.trim()).filter(|f| !f.is_empty());
        let mut record = PlayerRecord::new(name, self.mob_healthbar_default, 0);

        for skill in SkillType::non_child_skills() {
            if let Some(raw) = level_index(skill).and_then(field) {
                record.set_level(skill, parse_level(name, skill, raw));
            }
            if let Some(raw) = xp_index(skill).and_then(field) {
                record.set_xp(skill, parse_xp(name, skill, raw));
            }
        }

        for ability in AbilityType::ALL {
            if let Some(raw) = field(cooldown_index(ability)) {
                record.set_cooldown(ability, parse_integer(name, "cooldown", raw));
            }
        }

        if let Some(raw) = field(HUD_TYPE) {
            record.hud_type = raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Unknown hud type {:?} for {}, using default", raw, name);
                HudType::default()
            });
        }
        if let Some(raw) = field(LAST_LOGIN) {
            record.last_login = parse_integer(name, "last login", raw);
        }
        if let Some(raw) = field(MOB_HEALTHBAR) {
            record.mob_healthbar = raw.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    "Unknown mob healthbar type {:?} for {}, using default",
                    raw,
                    name
                );
                self.mob_healthbar_default
            });
        }

        Ok(record)
    }
}

fn parse_level(name: &str, skill: SkillType, raw: &str) -> u32 {
    if let Ok(level) = raw.parse::<u32>() {
        return level.min(MAX_LEVEL);
    }
    match raw.parse::<f64>() {
        Ok(level) if level.is_finite() && level >= 0.0 => {
            level.trunc().min(f64::from(MAX_LEVEL)) as u32
        }
        _ => {
            tracing::warn!("Malformed {} level {:?} for {}, using 0", skill, raw, name);
            0
        }
    }
}

fn parse_xp(name: &str, skill: SkillType, raw: &str) -> f32 {
    match raw.parse::<f32>() {
        Ok(xp) if xp.is_finite() && xp >= 0.0 => xp,
        _ => {
            tracing::warn!("Malformed {} xp {:?} for {}, using 0", skill, raw, name);
            0.0
        }
    }
}

fn parse_integer(name: &str, what: &str, raw: &str) -> i64 {
    raw.parse::<i64>()
        .or_else(|_| raw.parse::<f64>().map(|v| v as i64))
        .unwrap_or_else(|_| {
            tracing::warn!("Malformed {} {:?} for {}, using 0", what, raw, name);
            0
        })
}
