//! Test evaluators with fixed outputs

use crate::evaluator::TrustEvaluator;
use crate::level::SecurityLevel;
use crate::policy::TrustPolicy;
use crate::threshold::TrustThreshold;
use async_trait::async_trait;
use std::sync::Arc;

/// Returns the same scores for everything
pub struct FixedEvaluator {
    id: String,
    sender: f64,
    content: f64,
    flags: bool,
}

impl FixedEvaluator {
    pub fn new(id: &str, sender: f64, content: f64) -> Self {
        Self {
            id: id.to_string(),
            sender,
            content,
            flags: false,
        }
    }

    pub fn flagging(mut self) -> Self {
        self.flags = true;
        self
    }
}

#[async_trait]
impl TrustEvaluator for FixedEvaluator {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "fixed"
    }

    async fn evaluate_sender_trust(&self, _sender_id: &str) -> f64 {
        self.sender
    }

    async fn evaluate_content_trust(&self, _content: &str) -> f64 {
        self.content
    }

    async fn is_flagged(&self, _sender_id: &str, _content: &str) -> bool {
        self.flags
    }
}

/// One evaluator per (sender, content) pair
pub fn fixed_panel(scores: &[(f64, f64)]) -> Vec<Arc<dyn TrustEvaluator>> {
    scores
        .iter()
        .enumerate()
        .map(|(i, (sender, content))| {
            Arc::new(FixedEvaluator::new(&format!("fixed-{}", i), *sender, *content))
                as Arc<dyn TrustEvaluator>
        })
        .collect()
}

/// A policy that accepts anything not flagged
pub fn permissive_policy() -> TrustPolicy {
    TrustPolicy::new(
        SecurityLevel::Internal,
        TrustThreshold::new(0.5, 0.5),
        fixed_panel(&[(0.8, 0.8), (0.8, 0.8), (0.8, 0.8)]),
    )
}

/// A policy that rejects everything on threshold
pub fn strict_policy() -> TrustPolicy {
    TrustPolicy::new(
        SecurityLevel::Secret,
        TrustThreshold::new(0.99, 0.99),
        fixed_panel(&[(0.8, 0.8), (0.8, 0.8), (0.8, 0.8)]),
    )
}
