//! Governance configuration management
//!
//! Configuration file: ~/.config/subagentic/governance.yaml
//!
//! Describes the evaluator panel, the default trust policy handed to new
//! sub-units, and the coordinator identity. A missing file means defaults.

use crate::coordinator::Coordinator;
use crate::error::GovernanceError;
use crate::evaluator::{ContentMarkers, SimpleTrustEvaluator, TrustEvaluator, DEFAULT_BASELINE};
use crate::level::SecurityLevel;
use crate::policy::{TrustPolicy, MINIMUM_AGREEMENT_FLOOR};
use crate::threshold::TrustThreshold;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use subagentic_core::Paths;

/// Global governance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Default trust policy for new sub-units
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Independent evaluators consulted by the policy
    #[serde(default = "default_evaluators")]
    pub evaluators: Vec<EvaluatorConfig>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            policy: PolicyConfig::default(),
            evaluators: default_evaluators(),
        }
    }
}

impl GovernanceConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let paths = Paths::new();
        Self::load_from(&paths.config_file("governance"))
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read governance config from {:?}", path))?;
            let config: Self = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse governance config from {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to default location
    pub fn save(&self) -> Result<()> {
        let paths = Paths::new();
        self.save_to(&paths.config_file("governance"))
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write governance config to {:?}", path))?;
        Ok(())
    }

    /// Check for problems serde cannot catch
    pub fn validate(&self) -> std::result::Result<(), GovernanceError> {
        let mut seen = HashSet::new();
        for evaluator in &self.evaluators {
            if evaluator.id.trim().is_empty() {
                return Err(GovernanceError::Config("evaluator id cannot be empty".to_string()));
            }
            if !seen.insert(evaluator.id.as_str()) {
                return Err(GovernanceError::Config(format!(
                    "duplicate evaluator id: {}",
                    evaluator.id
                )));
            }
        }
        Ok(())
    }

    /// Build the configured evaluators
    pub fn build_evaluators(
        &self,
    ) -> std::result::Result<Vec<Arc<SimpleTrustEvaluator>>, GovernanceError> {
        self.validate()?;
        Ok(self.evaluators.iter().map(|e| Arc::new(e.build())).collect())
    }

    /// Build the default trust policy over the given evaluators
    pub fn build_policy(&self, evaluators: &[Arc<SimpleTrustEvaluator>]) -> TrustPolicy {
        let panel: Vec<Arc<dyn TrustEvaluator>> = evaluators
            .iter()
            .map(|e| Arc::clone(e) as Arc<dyn TrustEvaluator>)
            .collect();

        TrustPolicy::new(
            self.policy.security_level,
            TrustThreshold::new(self.policy.sender_trust, self.policy.content_trust),
            panel,
        )
        .with_minimum_agreement(self.policy.minimum_agreement)
        .with_agreement_tolerance(self.policy.agreement_tolerance)
    }

    /// Build a coordinator wired to the configured policy. The evaluators
    /// are returned too, for administrative calls (flagging, reputations).
    pub fn build_coordinator(
        &self,
    ) -> std::result::Result<(Coordinator, Vec<Arc<SimpleTrustEvaluator>>), GovernanceError> {
        let evaluators = self.build_evaluators()?;
        let policy = self.build_policy(&evaluators);
        Ok((Coordinator::new(self.coordinator.id.clone(), policy), evaluators))
    }
}

/// Coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_coordinator_id")]
    pub id: String,
}

fn default_coordinator_id() -> String {
    "FLA-001".to_string()
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            id: default_coordinator_id(),
        }
    }
}

/// Default trust policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub security_level: SecurityLevel,

    #[serde(default = "default_required_trust")]
    pub sender_trust: f64,

    #[serde(default = "default_required_trust")]
    pub content_trust: f64,

    /// Evaluators that must converge (never below 2)
    #[serde(default = "default_minimum_agreement")]
    pub minimum_agreement: usize,

    #[serde(default = "default_agreement_tolerance")]
    pub agreement_tolerance: f64,
}

fn default_required_trust() -> f64 {
    0.6
}

fn default_minimum_agreement() -> usize {
    MINIMUM_AGREEMENT_FLOOR
}

fn default_agreement_tolerance() -> f64 {
    0.15
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::default(),
            sender_trust: default_required_trust(),
            content_trust: default_required_trust(),
            minimum_agreement: default_minimum_agreement(),
            agreement_tolerance: default_agreement_tolerance(),
        }
    }
}

/// One reference evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_baseline")]
    pub baseline: f64,

    /// Known sender reputations
    #[serde(default)]
    pub reputations: BTreeMap<String, f64>,

    /// Senders this evaluator always vetoes
    #[serde(default)]
    pub flagged: Vec<String>,

    #[serde(default)]
    pub markers: ContentMarkers,
}

fn default_baseline() -> f64 {
    DEFAULT_BASELINE
}

impl EvaluatorConfig {
    fn new(id: &str, name: &str, baseline: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            baseline,
            reputations: BTreeMap::new(),
            flagged: Vec::new(),
            markers: ContentMarkers::default(),
        }
    }

    fn build(&self) -> SimpleTrustEvaluator {
        let name = if self.name.is_empty() { &self.id } else { &self.name };
        let evaluator = SimpleTrustEvaluator::new(self.id.clone(), name.clone(), self.baseline)
            .with_markers(self.markers.clone());

        for (sender, reputation) in &self.reputations {
            evaluator.set_sender_reputation(sender, *reputation);
        }
        for sender in &self.flagged {
            evaluator.flag_sender(sender);
        }
        evaluator
    }
}

fn default_evaluators() -> Vec<EvaluatorConfig> {
    vec![
        EvaluatorConfig::new("TB-001", "Trust Evaluator Alpha", 0.7),
        EvaluatorConfig::new("TB-002", "Trust Evaluator Beta", 0.75),
        EvaluatorConfig::new("TB-003", "Trust Evaluator Gamma", 0.8),
    ]
}
