//! Governance errors
//!
//! Only misuse and collaborator failures are errors. Rejections (failed trust
//! validation, missing grants, unknown participants) are ordinary outcomes
//! and come back as `false` with an audit entry instead.

use crate::status::MissionStatus;
use thiserror::Error;

/// Errors raised by the governance core
#[derive(Error, Debug)]
pub enum GovernanceError {
    #[error("Sub-unit {unit} cannot {action} while {status}")]
    InvalidTransition {
        unit: String,
        status: MissionStatus,
        action: &'static str,
    },

    #[error("Sub-unit id already registered: {0}")]
    DuplicateUnit(String),

    #[error(transparent)]
    Task(#[from] anyhow::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GovernanceError {
    /// True for state-machine misuse
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, GovernanceError::InvalidTransition { .. })
    }
}

pub type Result<T> = std::result::Result<T, GovernanceError>;
