//! Mission status of a sub-unit
//!
//! created -> active -> {completed, failed}
//! active <-> paused
//! anything -> retired (terminal)

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Created,
    Active,
    Paused,
    Completed,
    Failed,
    Retired,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Created => "created",
            MissionStatus::Active => "active",
            MissionStatus::Paused => "paused",
            MissionStatus::Completed => "completed",
            MissionStatus::Failed => "failed",
            MissionStatus::Retired => "retired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == MissionStatus::Retired
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
