pub mod hud;
pub mod leaderboard;
pub mod player_record;
pub mod skill;

pub use hud::{HudType, MobHealthbarType};
pub use leaderboard::{LeaderboardEntry, RankResult, StatKey};
pub use player_record::{PlayerRecord, MAX_LEVEL};
pub use skill::{AbilityType, SkillType};

/// Text that does not name any variant of a domain enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
