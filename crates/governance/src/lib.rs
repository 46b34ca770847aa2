//! SubAgentic Governance - Trust-gated, mediated communication
//!
//! A coordinator supervises mission-scoped sub-units. Sub-units never talk to
//! each other directly: every message goes through the coordinator, which
//! checks for a live authorization grant, lets the sender's outbound gate see
//! it, and hands it to the receiver's trust policy.
//!
//! The trust policy does not believe any single evaluator:
//! - one flag from any evaluator vetoes the message outright
//! - sender and content scores must converge within a tolerance across
//!   several evaluators before their average is trusted
//! - the averaged pair must meet the policy's threshold on both dimensions
//!
//! Every decision lands in an audit trail, so "why was this rejected?" can be
//! answered without reading code.

pub mod audit;
pub mod collab;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod evaluator;
pub mod grant;
pub mod level;
pub mod policy;
pub mod status;
pub mod subunit;
pub mod threshold;

#[cfg(test)]
mod fixtures;

pub use audit::{AuditEntry, AuditQuery, AuditStats, AuditTrail, EventKind};
pub use collab::{DomainClassifier, KeywordClassifier, PlaceholderExecutor, TaskExecutor};
pub use config::GovernanceConfig;
pub use coordinator::Coordinator;
pub use error::{GovernanceError, Result};
pub use evaluator::{ContentMarkers, SimpleTrustEvaluator, TrustEvaluator};
pub use grant::AuthorizationGrant;
pub use level::SecurityLevel;
pub use policy::{RejectReason, TrustPolicy, Verdict};
pub use status::MissionStatus;
pub use subunit::{SubUnit, SubUnitHandle};
pub use threshold::TrustThreshold;
