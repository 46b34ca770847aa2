//! Trust evaluators
//!
//! An evaluator independently scores a sender and a piece of content, and can
//! flag either as known-bad. Policies hold several evaluators and never trust
//! one of them alone (see `policy`).
//!
//! `SimpleTrustEvaluator` is a reference heuristic built on substring markers.
//! Production scoring services implement the same trait and drop in without
//! touching the consensus logic.

use crate::threshold::clamp_unit;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

/// Capability contract for an independent trust scorer
#[async_trait]
pub trait TrustEvaluator: Send + Sync {
    /// Stable identifier of this evaluator
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Trust in the sender, in [0, 1]
    async fn evaluate_sender_trust(&self, sender_id: &str) -> f64;

    /// Trust in the content, in [0, 1]
    async fn evaluate_content_trust(&self, content: &str) -> f64;

    /// Authoritative veto: true if the sender or content is known-bad
    async fn is_flagged(&self, sender_id: &str, content: &str) -> bool;
}

/// Penalty applied to content carrying the malicious marker
pub const MALICIOUS_CONTENT_PENALTY: f64 = 0.3;

/// Penalty applied to content carrying the suspicious marker
pub const SUSPICIOUS_CONTENT_PENALTY: f64 = 0.6;

/// Bonus applied to content carrying the verified marker
pub const VERIFIED_CONTENT_BONUS: f64 = 1.2;

/// Default score for unknown senders and unmarked content
pub const DEFAULT_BASELINE: f64 = 0.7;

/// Case-insensitive substrings the reference heuristic reacts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMarkers {
    #[serde(default = "default_malicious")]
    pub malicious: String,

    #[serde(default = "default_suspicious")]
    pub suspicious: String,

    #[serde(default = "default_verified")]
    pub verified: String,
}

fn default_malicious() -> String {
    "malicious".to_string()
}

fn default_suspicious() -> String {
    "suspicious".to_string()
}

fn default_verified() -> String {
    "verified".to_string()
}

impl Default for ContentMarkers {
    fn default() -> Self {
        Self {
            malicious: default_malicious(),
            suspicious: default_suspicious(),
            verified: default_verified(),
        }
    }
}

impl ContentMarkers {
    fn is_malicious(&self, lowered: &str) -> bool {
        contains_marker(lowered, &self.malicious)
    }

    fn is_suspicious(&self, lowered: &str) -> bool {
        contains_marker(lowered, &self.suspicious)
    }

    fn is_verified(&self, lowered: &str) -> bool {
        contains_marker(lowered, &self.verified)
    }
}

/// An empty marker never matches
fn contains_marker(lowered: &str, marker: &str) -> bool {
    !marker.is_empty() && lowered.contains(&marker.to_lowercase())
}

#[derive(Debug, Default)]
struct Reputation {
    scores: HashMap<String, f64>,
    flagged: HashSet<String>,
}

/// Reference evaluator: per-sender reputations, a baseline, and a flag list
#[derive(Debug)]
pub struct SimpleTrustEvaluator {
    id: String,
    name: String,
    baseline: f64,
    markers: ContentMarkers,
    reputation: RwLock<Reputation>,
}

impl SimpleTrustEvaluator {
    /// Create an evaluator with the given baseline (clamped to [0, 1])
    pub fn new(id: impl Into<String>, name: impl Into<String>, baseline: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            baseline: clamp_unit(baseline),
            markers: ContentMarkers::default(),
            reputation: RwLock::new(Reputation::default()),
        }
    }

    /// Replace the content markers
    pub fn with_markers(mut self, markers: ContentMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn markers(&self) -> &ContentMarkers {
        &self.markers
    }

    /// Set the reputation for a sender (clamped to [0, 1])
    pub fn set_sender_reputation(&self, sender_id: &str, reputation: f64) {
        self.write()
            .scores
            .insert(sender_id.to_string(), clamp_unit(reputation));
    }

    /// Flag a sender as untrustworthy
    pub fn flag_sender(&self, sender_id: &str) {
        self.write().flagged.insert(sender_id.to_string());
    }

    /// Remove the flag from a sender
    pub fn unflag_sender(&self, sender_id: &str) {
        self.write().flagged.remove(sender_id);
    }

    /// Flagged senders, sorted
    pub fn flagged_senders(&self) -> Vec<String> {
        let mut flagged: Vec<String> = self.read().flagged.iter().cloned().collect();
        flagged.sort();
        flagged
    }

    /// Reputation table, sorted by sender
    pub fn reputations(&self) -> Vec<(String, f64)> {
        let mut scores: Vec<(String, f64)> = self
            .read()
            .scores
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        scores.sort_by(|a, b| a.0.cmp(&b.0));
        scores
    }

    fn sender_score(&self, sender_id: &str) -> f64 {
        self.read()
            .scores
            .get(sender_id)
            .copied()
            .unwrap_or(self.baseline)
    }

    fn content_score(&self, content: &str) -> f64 {
        let lowered = content.to_lowercase();
        let mut score = self.baseline;

        if self.markers.is_malicious(&lowered) {
            score *= MALICIOUS_CONTENT_PENALTY;
        } else if self.markers.is_suspicious(&lowered) {
            score *= SUSPICIOUS_CONTENT_PENALTY;
        }

        if self.markers.is_verified(&lowered) {
            score = (score * VERIFIED_CONTENT_BONUS).min(1.0);
        }

        clamp_unit(score)
    }

    fn flagged(&self, sender_id: &str, content: &str) -> bool {
        if self.read().flagged.contains(sender_id) {
            return true;
        }
        self.markers.is_malicious(&content.to_lowercase())
    }

    // A poisoned lock only means a writer panicked mid-insert; the maps are
    // still structurally valid.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Reputation> {
        self.reputation.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Reputation> {
        self.reputation.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TrustEvaluator for SimpleTrustEvaluator {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate_sender_trust(&self, sender_id: &str) -> f64 {
        self.sender_score(sender_id)
    }

    async fn evaluate_content_trust(&self, content: &str) -> f64 {
        self.content_score(content)
    }

    async fn is_flagged(&self, sender_id: &str, content: &str) -> bool {
        self.flagged(sender_id, content)
    }
}
