use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::UnknownVariant;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HudType {
    Disabled,
    #[default]
    Standard,
    Small,
    Retro,
}

impl Display for HudType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HudType::Disabled => write!(f, "DISABLED"),
            HudType::Standard => write!(f, "STANDARD"),
            HudType::Small => write!(f, "SMALL"),
            HudType::Retro => write!(f, "RETRO"),
        }
    }
}

impl FromStr for HudType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DISABLED" => Ok(HudType::Disabled),
            "STANDARD" => Ok(HudType::Standard),
            "SMALL" => Ok(HudType::Small),
            "RETRO" => Ok(HudType::Retro),
            _ => Err(UnknownVariant::new("hud type", s)),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MobHealthbarType {
    #[default]
    Hearts,
    Bar,
    Disabled,
}

impl Display for MobHealthbarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MobHealthbarType::Hearts => write!(f, "HEARTS"),
            MobHealthbarType::Bar => write!(f, "BAR"),
            MobHealthbarType::Disabled => write!(f, "DISABLED"),
        }
    }
}

impl FromStr for MobHealthbarType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HEARTS" => Ok(MobHealthbarType::Hearts),
            "BAR" => Ok(MobHealthbarType::Bar),
            "DISABLED" => Ok(MobHealthbarType::Disabled),
            _ => Err(UnknownVariant::new("mob healthbar type", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parses_back() {
        for hud in [HudType::Disabled, HudType::Standard, HudType::Small, HudType::Retro] {
            assert_eq!(hud.to_string().parse::<HudType>().unwrap(), hud);
        }
        for bar in [MobHealthbarType::Hearts, MobHealthbarType::Bar, MobHealthbarType::Disabled] {
            assert_eq!(bar.to_string().parse::<MobHealthbarType>().unwrap(), bar);
        }
    }

    #[test]
    fn test_unknown_text_is_an_error() {
        assert!("FANCY".parse::<HudType>().is_err());
        assert!("".parse::<MobHealthbarType>().is_err());
        assert_eq!("retro".parse::<HudType>().unwrap(), HudType::Retro);
    }
}
