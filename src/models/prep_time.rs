use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rough preparation effort for a meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrepTime {
    Short,
    Medium,
    Long,
    VeryLong,
}

impl fmt::Display for PrepTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrepTime::Short => write!(f, "short"),
            PrepTime::Medium => write!(f, "medium"),
            PrepTime::Long => write!(f, "long"),
            PrepTime::VeryLong => write!(f, "very-long"),
        }
    }
}

impl FromStr for PrepTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "short" => Ok(PrepTime::Short),
            "medium" => Ok(PrepTime::Medium),
            "long" => Ok(PrepTime::Long),
            "very-long" | "verylong" => Ok(PrepTime::VeryLong),
            _ => Err(format!(
                "Invalid prep time '{}'. Valid options: short, medium, long, very-long",
                s
            )),
        }
    }
}
