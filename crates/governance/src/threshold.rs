//! Two-dimensional trust values: how much the sender is trusted and how much
//! the content is trusted. Both live in [0, 1].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A (sender, content) trust pair, clamped to [0, 1] on construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustThreshold {
    sender_trust: f64,
    content_trust: f64,
}

impl TrustThreshold {
    pub fn new(sender_trust: f64, content_trust: f64) -> Self {
        Self {
            sender_trust: clamp_unit(sender_trust),
            content_trust: clamp_unit(content_trust),
        }
    }

    pub fn sender_trust(&self) -> f64 {
        self.sender_trust
    }

    pub fn content_trust(&self) -> f64 {
        self.content_trust
    }

    /// Pointwise >= on both dimensions
    pub fn meets(&self, required: &TrustThreshold) -> bool {
        self.sender_trust >= required.sender_trust && self.content_trust >= required.content_trust
    }
}

impl fmt::Display for TrustThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sender={:.3} content={:.3}", self.sender_trust, self.content_trust)
    }
}

/// Clamp into [0, 1]; NaN counts as no trust at all
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
