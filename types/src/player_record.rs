use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AbilityType, HudType, MobHealthbarType, SkillType};

/// Highest level a skill can hold. Stored levels above it are clamped.
pub const MAX_LEVEL: u32 = i32::MAX as u32;

/// One player's full persisted stat set.
///
/// Every non-child skill always has a level and an xp entry. The cooldown
/// map only holds abilities that are actually on cooldown; a missing entry
/// (or a stored `0`) means the ability is ready.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    levels: BTreeMap<SkillType, u32>,
    xp: BTreeMap<SkillType, f32>,
    cooldowns: BTreeMap<AbilityType, i64>,
    pub hud_type: HudType,
    pub mob_healthbar: MobHealthbarType,
    pub last_login: i64,
}

impl PlayerRecord {
    pub fn new(name: &str, mob_healthbar: MobHealthbarType, last_login: i64) -> Self {
        Self {
            name: name.to_string(),
            levels: SkillType::non_child_skills().map(|skill| (skill, 0)).collect(),
            xp: SkillType::non_child_skills().map(|skill| (skill, 0.0)).collect(),
            cooldowns: BTreeMap::new(),
            hud_type: HudType::default(),
            mob_healthbar,
            last_login,
        }
    }

    /// Level of a skill. Child skills are not stored and report 0.
    pub fn level(&self, skill: SkillType) -> u32 {
        self.levels.get(&skill).copied().unwrap_or(0)
    }

    pub fn set_level(&mut self, skill: SkillType, level: u32) {
        if !skill.is_child() {
            self.levels.insert(skill, level.min(MAX_LEVEL));
        }
    }

    pub fn xp(&self, skill: SkillType) -> f32 {
        self.xp.get(&skill).copied().unwrap_or(0.0)
    }

    /// Negative or non-finite progress is clamped to zero.
    pub fn set_xp(&mut self, skill: SkillType, xp: f32) {
        if !skill.is_child() {
            let xp = if xp.is_finite() && xp > 0.0 { xp } else { 0.0 };
            self.xp.insert(skill, xp);
        }
    }

    /// Cooldown timestamp of an ability, 0 when ready.
    pub fn cooldown(&self, ability: AbilityType) -> i64 {
        self.cooldowns.get(&ability).copied().unwrap_or(0)
    }

    pub fn set_cooldown(&mut self, ability: AbilityType, timestamp: i64) {
        if timestamp == 0 {
            self.cooldowns.remove(&ability);
        } else {
            self.cooldowns.insert(ability, timestamp);
        }
    }

    pub fn cooldowns(&self) -> impl Iterator<Item = (AbilityType, i64)> + '_ {
        self.cooldowns.iter().map(|(ability, ts)| (*ability, *ts))
    }

    /// Sum of all non-child skill levels, saturating at `u32::MAX`.
    pub fn power_level(&self) -> u32 {
        SkillType::non_child_skills()
            .map(|skill| self.level(skill))
            .fold(0u32, u32::saturating_add)
    }

    pub fn is_powerless(&self) -> bool {
        self.power_level() == 0
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_zero_valued() {
        let record = PlayerRecord::new("Alice", MobHealthbarType::Bar, 1_000);
        for skill in SkillType::non_child_skills() {
            assert_eq!(record.level(skill), 0);
            assert_eq!(record.xp(skill), 0.0);
        }
        assert_eq!(record.cooldowns().count(), 0);
        assert_eq!(record.hud_type, HudType::Standard);
        assert_eq!(record.mob_healthbar, MobHealthbarType::Bar);
        assert!(record.is_powerless());
    }

    #[test]
    fn test_power_level_ignores_child_skills() {
        let mut record = PlayerRecord::new("Bob", MobHealthbarType::Hearts, 0);
        record.set_level(SkillType::Mining, 10);
        record.set_level(SkillType::Fishing, 5);
        record.set_level(SkillType::Salvage, 99);
        assert_eq!(record.power_level(), 15);
        assert_eq!(record.level(SkillType::Salvage), 0);
    }

    #[test]
    fn test_levels_clamp_and_power_level_saturates() {
        let mut record = PlayerRecord::new("Eve", MobHealthbarType::Hearts, 0);
        for skill in SkillType::non_child_skills() {
            record.set_level(skill, u32::MAX);
        }
        assert_eq!(record.level(SkillType::Mining), MAX_LEVEL);
        assert_eq!(record.power_level(), u32::MAX);
        assert!(!record.is_powerless());
    }

    #[test]
    fn test_zero_cooldown_means_ready() {
        let mut record = PlayerRecord::new("Carol", MobHealthbarType::Hearts, 0);
        record.set_cooldown(AbilityType::Berserk, 1_700_000_000);
        assert_eq!(record.cooldowns().count(), 1);
        record.set_cooldown(AbilityType::Berserk, 0);
        assert_eq!(record.cooldowns().count(), 0);
        assert_eq!(record.cooldown(AbilityType::Berserk), 0);
    }

    #[test]
    fn test_names_match_case_insensitively() {
        let record = PlayerRecord::new("Dave", MobHealthbarType::Hearts, 0);
        assert!(record.is_named("dave"));
        assert!(record.is_named("DAVE"));
        assert!(!record.is_named("dav"));
    }
}
