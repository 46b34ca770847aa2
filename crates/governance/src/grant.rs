//! Authorization grants
//!
//! A grant lets one sub-unit talk to another through the coordinator. Grants
//! are immutable once created; revoking one means removing it from the
//! coordinator. An expired grant stays in the collection but never matches.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Scope that allows every kind of data
pub const WILDCARD_SCOPE: &str = "*";

/// Time-bounded, directional permission between two sub-units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    pub from: String,
    pub to: String,
    pub bidirectional: bool,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthorizationGrant {
    /// Create a grant starting now; `ttl` of `None` never expires, and neither
    /// does a `ttl` that reaches past the last representable instant
    pub fn create(
        from: impl Into<String>,
        to: impl Into<String>,
        bidirectional: bool,
        scopes: Option<Vec<String>>,
        ttl: Option<Duration>,
    ) -> Self {
        let created_at = Utc::now();
        let scopes = match scopes {
            Some(scopes) if !scopes.is_empty() => scopes,
            _ => vec![WILDCARD_SCOPE.to_string()],
        };

        Self {
            from: from.into(),
            to: to.into(),
            bidirectional,
            scopes,
            created_at,
            expires_at: ttl.and_then(|ttl| created_at.checked_add_signed(ttl)),
        }
    }

    /// True once the expiry (if any) has been reached
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry check against an explicit clock reading
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires| expires <= now)
    }

    /// True if this grant authorizes `from` to talk to `to` right now
    pub fn matches(&self, from: &str, to: &str) -> bool {
        self.matches_at(from, to, Utc::now())
    }

    pub fn matches_at(&self, from: &str, to: &str, now: DateTime<Utc>) -> bool {
        if self.is_expired_at(now) {
            return false;
        }

        if self.from == from && self.to == to {
            return true;
        }

        self.bidirectional && self.from == to && self.to == from
    }

    /// True if either endpoint is `id`
    pub fn references(&self, id: &str) -> bool {
        self.from == id || self.to == id
    }

    /// True if the grant covers the given data scope
    pub fn allows_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == WILDCARD_SCOPE || s == scope)
    }
}
