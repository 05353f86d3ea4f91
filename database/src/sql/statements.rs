//! SQL text for the relational store, built once per table prefix.
//!
//! The prefix and column names are the only text ever spliced into a
//! statement. Player-supplied values are always bound parameters.

use std::collections::HashMap;

use itertools::Itertools;
use stats_types::{AbilityType, SkillType, StatKey};

use crate::error::StoreError;

pub const CHILD_TABLES: [&str; 4] = ["skills", "experience", "cooldowns", "huds"];

pub fn skill_columns() -> Vec<&'static str> {
    SkillType::non_child_skills().map(SkillType::column).collect()
}

pub fn cooldown_columns() -> Vec<&'static str> {
    AbilityType::ALL
        .iter()
        .map(|ability| ability.cooldown_column())
        .collect()
}

/// Sum of every skill column of the `skills` table aliased as `s`.
pub fn power_level_expr() -> String {
    format!(
        "({})",
        skill_columns().iter().map(|c| format!("s.{c}")).join(" + ")
    )
}

pub fn validate_prefix(prefix: &str) -> Result<(), StoreError> {
    if prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::Config(format!(
            "table prefix {prefix:?} may only contain letters, digits and '_'"
        )))
    }
}

fn stat_expr(stat: StatKey) -> String {
    match stat {
        StatKey::Skill(skill) => format!("s.{}", skill.column()),
        StatKey::PowerLevel => power_level_expr(),
    }
}

fn upsert(table: &str, columns: &[&str]) -> String {
    let placeholders = std::iter::repeat("?").take(columns.len() + 1).join(", ");
    let updates = columns
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .join(", ");
    format!(
        "INSERT INTO {table} (user_id, {}) VALUES ({placeholders}) \
         ON CONFLICT(user_id) DO UPDATE SET {updates}",
        columns.join(", ")
    )
}

#[derive(Debug, Clone)]
pub struct Statements {
    pub prefix: String,
    pub load: String,
    pub user_id: String,
    pub insert_user: String,
    pub ensure_children: Vec<String>,
    pub ensure_huds: String,
    pub update_login: String,
    pub upsert_skills: String,
    pub upsert_experience: String,
    pub upsert_cooldowns: String,
    pub upsert_huds: String,
    pub delete_user: String,
    pub delete_children: Vec<String>,
    pub sweep_orphans: Vec<String>,
    pub purge_powerless: String,
    pub purge_old: String,
    pub stored_names: String,
    pub player_levels: String,
    leaderboard: HashMap<StatKey, String>,
    rank_ahead: HashMap<StatKey, String>,
    rank_ties: HashMap<StatKey, String>,
}

impl Statements {
    pub fn new(prefix: &str) -> Result<Self, StoreError> {
        validate_prefix(prefix)?;
        let p = prefix;
        let skills = skill_columns();
        let cooldowns = cooldown_columns();
        let joined = format!("{p}users u JOIN {p}skills s ON s.user_id = u.id");

        let load_columns = skills
            .iter()
            .map(|c| format!("s.{c} AS skill_{c}"))
            .chain(skills.iter().map(|c| format!("e.{c} AS xp_{c}")))
            .chain(cooldowns.iter().map(|c| format!("c.{c} AS cd_{c}")))
            .join(", ");
        let load = format!(
            "SELECT u.id, u.name, u.lastlogin, {load_columns}, h.hudtype, h.mobhealthbar \
             FROM {p}users u \
             JOIN {p}skills s ON s.user_id = u.id \
             JOIN {p}experience e ON e.user_id = u.id \
             JOIN {p}cooldowns c ON c.user_id = u.id \
             JOIN {p}huds h ON h.user_id = u.id \
             WHERE u.name = ?"
        );

        let mut leaderboard = HashMap::new();
        let mut rank_ahead = HashMap::new();
        let mut rank_ties = HashMap::new();
        for stat in StatKey::all() {
            let expr = stat_expr(stat);
            leaderboard.insert(
                stat,
                format!(
                    "SELECT u.name, {expr} AS value FROM {joined} WHERE {expr} > 0 \
                     ORDER BY value DESC, u.name ASC LIMIT ? OFFSET ?"
                ),
            );
            rank_ahead.insert(
                stat,
                format!("SELECT COUNT(*) FROM {joined} WHERE {expr} > ?"),
            );
            rank_ties.insert(
                stat,
                format!("SELECT u.name FROM {joined} WHERE {expr} = ? ORDER BY u.name ASC"),
            );
        }

        Ok(Self {
            prefix: prefix.to_string(),
            load,
            user_id: format!("SELECT id FROM {p}users WHERE name = ?"),
            insert_user: format!("INSERT INTO {p}users (name, lastlogin) VALUES (?, ?)"),
            ensure_children: ["skills", "experience", "cooldowns"]
                .iter()
                .map(|t| format!("INSERT OR IGNORE INTO {p}{t} (user_id) VALUES (?)"))
                .collect(),
            ensure_huds: format!(
                "INSERT OR IGNORE INTO {p}huds (user_id, mobhealthbar) VALUES (?, ?)"
            ),
            update_login: format!("UPDATE {p}users SET lastlogin = ? WHERE id = ?"),
            upsert_skills: upsert(&format!("{p}skills"), &skills),
            upsert_experience: upsert(&format!("{p}experience"), &skills),
            upsert_cooldowns: upsert(&format!("{p}cooldowns"), &cooldowns),
            upsert_huds: upsert(&format!("{p}huds"), &["hudtype", "mobhealthbar"]),
            delete_user: format!("DELETE FROM {p}users WHERE id = ?"),
            delete_children: CHILD_TABLES
                .iter()
                .map(|t| format!("DELETE FROM {p}{t} WHERE user_id = ?"))
                .collect(),
            sweep_orphans: CHILD_TABLES
                .iter()
                .map(|t| {
                    format!("DELETE FROM {p}{t} WHERE user_id NOT IN (SELECT id FROM {p}users)")
                })
                .collect(),
            purge_powerless: format!(
                "DELETE FROM {p}users WHERE id IN \
                 (SELECT s.user_id FROM {p}skills s WHERE {} = 0) RETURNING name",
                power_level_expr()
            ),
            purge_old: format!(
                "DELETE FROM {p}users WHERE lastlogin > 0 AND lastlogin < ? RETURNING name"
            ),
            stored_names: format!("SELECT name FROM {p}users ORDER BY name ASC"),
            player_levels: format!(
                "SELECT {} FROM {joined} WHERE u.name = ?",
                skills.iter().map(|c| format!("s.{c}")).join(", ")
            ),
            leaderboard,
            rank_ahead,
            rank_ties,
        })
    }

    pub fn leaderboard(&self, stat: StatKey) -> Option<&str> {
        self.leaderboard.get(&stat).map(String::as_str)
    }

    pub fn rank_ahead(&self, stat: StatKey) -> Option<&str> {
        self.rank_ahead.get(&stat).map(String::as_str)
    }

    pub fn rank_ties(&self, stat: StatKey) -> Option<&str> {
        self.rank_ties.get(&stat).map(String::as_str)
    }
}
