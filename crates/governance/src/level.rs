//! Security levels classify what a sub-unit may disclose outbound
//!
//! Levels form a hierarchy from least to most restrictive:
//! public < internal < confidential < secret < top_secret

use serde::{Deserialize, Serialize};
use std::fmt;

/// Disclosure classification of a sub-unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// No restrictions on disclosure
    Public,

    /// Restricted to the organization
    Internal,

    /// Limited disclosure
    Confidential,

    /// Highly restricted disclosure
    Secret,

    /// Maximum restrictions
    TopSecret,
}

impl Default for SecurityLevel {
    fn default() -> Self {
        SecurityLevel::Internal
    }
}

impl SecurityLevel {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "public" => Some(SecurityLevel::Public),
            "internal" => Some(SecurityLevel::Internal),
            "confidential" => Some(SecurityLevel::Confidential),
            "secret" => Some(SecurityLevel::Secret),
            "top_secret" | "topsecret" => Some(SecurityLevel::TopSecret),
            _ => None,
        }
    }

    /// Get the string name
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Public => "public",
            SecurityLevel::Internal => "internal",
            SecurityLevel::Confidential => "confidential",
            SecurityLevel::Secret => "secret",
            SecurityLevel::TopSecret => "top_secret",
        }
    }

    /// Check if this level is at least as restrictive as `other`
    pub fn dominates(&self, other: SecurityLevel) -> bool {
        *self >= other
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
