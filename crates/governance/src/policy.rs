//! Trust policy: consensus over independent evaluators
//!
//! A policy accepts inbound content only when:
//! 1. it has at least `minimum_agreement` evaluators (fail closed otherwise)
//! 2. no evaluator flags the sender or content (one flag vetoes)
//! 3. sender scores and content scores each converge: at least
//!    `minimum_agreement` scores lie within `agreement_tolerance` of the mean
//! 4. the mean (sender, content) pair meets the required threshold
//!
//! Evaluators are shared with the caller; the policy never owns their
//! lifetime. Aggregation is over an unordered multiset of scores, so query
//! order does not change the verdict.

use crate::evaluator::TrustEvaluator;
use crate::level::SecurityLevel;
use crate::threshold::{clamp_unit, TrustThreshold};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Minimum agreement can never be configured below this
pub const MINIMUM_AGREEMENT_FLOOR: usize = 2;

/// Tolerance used when none is configured
pub const DEFAULT_AGREEMENT_TOLERANCE: f64 = 0.1;

/// Outcome of an inbound evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verdict {
    Accepted { evaluated: TrustThreshold },
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

/// Why inbound content was rejected
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Fewer evaluators than the minimum agreement count
    Underprovisioned { evaluators: usize, required: usize },
    /// An evaluator vetoed the sender or content
    Flagged { evaluator: String },
    /// Sender scores did not converge
    SenderDisagreement,
    /// Content scores did not converge
    ContentDisagreement,
    /// Scores converged but their mean is below the required threshold
    BelowThreshold { evaluated: TrustThreshold },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Underprovisioned { evaluators, required } => write!(
                f,
                "policy under-provisioned ({} evaluators, {} must agree)",
                evaluators, required
            ),
            RejectReason::Flagged { evaluator } => write!(f, "flagged by evaluator {}", evaluator),
            RejectReason::SenderDisagreement => write!(f, "evaluators disagree on sender trust"),
            RejectReason::ContentDisagreement => write!(f, "evaluators disagree on content trust"),
            RejectReason::BelowThreshold { evaluated } => {
                write!(f, "trust below threshold ({})", evaluated)
            }
        }
    }
}

/// Trust policy assigned to a sub-unit at creation
#[derive(Clone)]
pub struct TrustPolicy {
    security_level: SecurityLevel,
    required: TrustThreshold,
    evaluators: Vec<Arc<dyn TrustEvaluator>>,
    minimum_agreement: usize,
    agreement_tolerance: f64,
}

impl TrustPolicy {
    /// Create a policy with the default agreement settings
    pub fn new(
        security_level: SecurityLevel,
        required: TrustThreshold,
        evaluators: Vec<Arc<dyn TrustEvaluator>>,
    ) -> Self {
        Self {
            security_level,
            required,
            evaluators,
            minimum_agreement: MINIMUM_AGREEMENT_FLOOR,
            agreement_tolerance: DEFAULT_AGREEMENT_TOLERANCE,
        }
    }

    /// Set the minimum agreement count (never below 2)
    pub fn with_minimum_agreement(mut self, minimum: usize) -> Self {
        self.minimum_agreement = minimum.max(MINIMUM_AGREEMENT_FLOOR);
        self
    }

    /// Set the agreement tolerance (clamped to [0, 1])
    pub fn with_agreement_tolerance(mut self, tolerance: f64) -> Self {
        self.agreement_tolerance = clamp_unit(tolerance);
        self
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    pub fn required_threshold(&self) -> TrustThreshold {
        self.required
    }

    pub fn evaluators(&self) -> &[Arc<dyn TrustEvaluator>] {
        &self.evaluators
    }

    pub fn minimum_agreement(&self) -> usize {
        self.minimum_agreement
    }

    pub fn agreement_tolerance(&self) -> f64 {
        self.agreement_tolerance
    }

    /// True if the policy can ever accept anything
    pub fn is_provisioned(&self) -> bool {
        self.evaluators.len() >= self.minimum_agreement
    }

    /// Accept or reject inbound content
    pub async fn validate_inbound(&self, sender_id: &str, content: &str) -> bool {
        self.evaluate_inbound(sender_id, content).await.is_accepted()
    }

    /// Evaluate inbound content, keeping the reason for a rejection
    pub async fn evaluate_inbound(&self, sender_id: &str, content: &str) -> Verdict {
        if !self.is_provisioned() {
            warn!(
                evaluators = self.evaluators.len(),
                required = self.minimum_agreement,
                "Trust policy under-provisioned, rejecting"
            );
            return Verdict::Rejected(RejectReason::Underprovisioned {
                evaluators: self.evaluators.len(),
                required: self.minimum_agreement,
            });
        }

        for evaluator in &self.evaluators {
            if evaluator.is_flagged(sender_id, content).await {
                debug!(evaluator = evaluator.id(), sender = sender_id, "Inbound vetoed by flag");
                return Verdict::Rejected(RejectReason::Flagged {
                    evaluator: evaluator.id().to_string(),
                });
            }
        }

        let mut sender_scores = Vec::with_capacity(self.evaluators.len());
        let mut content_scores = Vec::with_capacity(self.evaluators.len());
        for evaluator in &self.evaluators {
            sender_scores.push(clamp_unit(evaluator.evaluate_sender_trust(sender_id).await));
            content_scores.push(clamp_unit(evaluator.evaluate_content_trust(content).await));
        }

        if !self.converges(&sender_scores) {
            debug!(scores = ?sender_scores, "Sender trust scores did not converge");
            return Verdict::Rejected(RejectReason::SenderDisagreement);
        }
        if !self.converges(&content_scores) {
            debug!(scores = ?content_scores, "Content trust scores did not converge");
            return Verdict::Rejected(RejectReason::ContentDisagreement);
        }

        let evaluated = TrustThreshold::new(mean(&sender_scores), mean(&content_scores));
        if evaluated.meets(&self.required) {
            debug!(%evaluated, "Inbound accepted");
            Verdict::Accepted { evaluated }
        } else {
            debug!(%evaluated, required = %self.required, "Inbound below threshold");
            Verdict::Rejected(RejectReason::BelowThreshold { evaluated })
        }
    }

    /// Enough scores lie within tolerance of the mean
    fn converges(&self, scores: &[f64]) -> bool {
        if scores.len() < self.minimum_agreement {
            return false;
        }
        let avg = mean(scores);
        let agreeing = scores
            .iter()
            .filter(|score| (*score - avg).abs() <= self.agreement_tolerance)
            .count();
        agreeing >= self.minimum_agreement
    }
}

impl fmt::Debug for TrustPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.evaluators.iter().map(|e| e.id()).collect();
        f.debug_struct("TrustPolicy")
            .field("security_level", &self.security_level)
            .field("required", &self.required)
            .field("evaluators", &ids)
            .field("minimum_agreement", &self.minimum_agreement)
            .field("agreement_tolerance", &self.agreement_tolerance)
            .finish()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
