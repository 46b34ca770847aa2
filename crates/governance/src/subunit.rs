//! Sub-units: mission-scoped, isolated execution contexts
//!
//! A sub-unit carries a fixed trust policy, a private key-value store and its
//! own activity trail. It only exchanges information through the coordinator,
//! and only while its mission is active.

use crate::audit::{AuditEntry, AuditTrail, EventKind};
use crate::collab::TaskExecutor;
use crate::error::{GovernanceError, Result};
use crate::policy::{TrustPolicy, Verdict};
use crate::status::MissionStatus;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use subagentic_core::format;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Shared reference to a live sub-unit. The coordinator keeps the
/// authoritative copy; callers get clones of the handle.
///
/// Do not hold a guard on a handle across a `Coordinator` call. The
/// coordinator locks sub-units while holding its own lock, so a held guard
/// stalls that call and every coordinator operation queued behind it.
pub type SubUnitHandle = Arc<Mutex<SubUnit>>;

pub struct SubUnit {
    id: String,
    domain: String,
    policy: TrustPolicy,
    status: MissionStatus,
    state: BTreeMap<String, String>,
    activity: AuditTrail,
    executor: Arc<dyn TaskExecutor>,
    received: u64,
}

impl SubUnit {
    pub fn new(
        id: impl Into<String>,
        domain: impl Into<String>,
        policy: TrustPolicy,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        let id = id.into();
        let domain = domain.into();
        let mut activity = AuditTrail::new(id.clone());
        activity.record(
            EventKind::Lifecycle,
            format!("Sub-unit created: {} for domain: {}", id, domain),
        );

        Self {
            id,
            domain,
            policy,
            status: MissionStatus::Created,
            state: BTreeMap::new(),
            activity,
            executor,
            received: 0,
        }
    }

    /// Wrap in a shareable handle
    pub fn into_handle(self) -> SubUnitHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn status(&self) -> MissionStatus {
        self.status
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    /// created -> active
    pub fn start_mission(&mut self) -> Result<()> {
        self.transition(&[MissionStatus::Created], MissionStatus::Active, "start mission")?;
        self.activity.record(EventKind::Lifecycle, "Mission started");
        Ok(())
    }

    /// Run a task through the executor. Only legal while active.
    pub async fn process_task(&mut self, task: &str) -> Result<String> {
        self.require(MissionStatus::Active, "process a task")?;

        self.activity
            .record(EventKind::Task, format!("Processing task: {}", task));

        match self.executor.execute(&self.domain, task).await {
            Ok(result) => {
                self.activity.record(
                    EventKind::Task,
                    format!("Task completed: {}", format::truncate(&result, 120)),
                );
                Ok(result)
            }
            Err(err) => {
                self.activity
                    .record(EventKind::Task, format!("Task failed: {}", err));
                Err(GovernanceError::Task(err))
            }
        }
    }

    /// Accept inbound content if active and the trust policy agrees.
    /// Rejection is a normal outcome, not an error.
    pub async fn receive_information(&mut self, sender_id: &str, content: &str) -> bool {
        if self.status != MissionStatus::Active {
            self.activity.record(
                EventKind::Rejected,
                format!(
                    "Rejected information from: {} - status: {}",
                    sender_id, self.status
                ),
            );
            return false;
        }

        match self.policy.evaluate_inbound(sender_id, content).await {
            Verdict::Accepted { evaluated } => {
                self.received += 1;
                let key = format!(
                    "received_{}_{}",
                    Utc::now().timestamp_micros(),
                    self.received
                );
                self.state.insert(key, content.to_string());
                self.activity.record(
                    EventKind::Accepted,
                    format!("Accepted information from: {} ({})", sender_id, evaluated),
                );
                debug!(unit = %self.id, sender = sender_id, "Inbound accepted");
                true
            }
            Verdict::Rejected(reason) => {
                self.activity.record(
                    EventKind::Rejected,
                    format!("Rejected information from: {} - {}", sender_id, reason),
                );
                debug!(unit = %self.id, sender = sender_id, %reason, "Inbound rejected");
                false
            }
        }
    }

    /// Outbound gate. The security level is recorded but not yet enforced:
    /// any active sub-unit may send.
    pub fn send_information(&mut self, recipient_id: &str, content: &str) -> bool {
        if self.status != MissionStatus::Active {
            self.activity.record(
                EventKind::Outbound,
                format!("Cannot send information - status: {}", self.status),
            );
            return false;
        }

        self.activity.record(
            EventKind::Outbound,
            format!(
                "Sending information to: {} ({} bytes, SL: {})",
                recipient_id,
                content.len(),
                self.policy.security_level()
            ),
        );
        true
    }

    /// active -> paused
    pub fn pause(&mut self) -> Result<()> {
        self.transition(&[MissionStatus::Active], MissionStatus::Paused, "pause")?;
        self.activity.record(EventKind::Lifecycle, "Mission paused");
        Ok(())
    }

    /// paused -> active
    pub fn resume(&mut self) -> Result<()> {
        self.transition(&[MissionStatus::Paused], MissionStatus::Active, "resume")?;
        self.activity.record(EventKind::Lifecycle, "Mission resumed");
        Ok(())
    }

    /// active | paused -> completed
    pub fn complete_mission(&mut self) -> Result<()> {
        self.transition(
            &[MissionStatus::Active, MissionStatus::Paused],
            MissionStatus::Completed,
            "complete mission",
        )?;
        self.activity.record(EventKind::Lifecycle, "Mission completed");
        Ok(())
    }

    /// active | paused -> failed
    pub fn fail_mission(&mut self, reason: &str) -> Result<()> {
        self.transition(
            &[MissionStatus::Active, MissionStatus::Paused],
            MissionStatus::Failed,
            "fail mission",
        )?;
        self.activity
            .record(EventKind::Lifecycle, format!("Mission failed: {}", reason));
        Ok(())
    }

    /// Move to retired and drop local state. Retiring twice is a no-op.
    pub fn retire(&mut self) {
        if self.status.is_terminal() {
            return;
        }

        info!(unit = %self.id, from = %self.status, "Retiring sub-unit");
        self.status = MissionStatus::Retired;
        self.state.clear();
        self.activity.record(EventKind::Lifecycle, "Sub-unit retired");
    }

    /// Snapshot of the activity trail
    pub fn activity_log(&self) -> Vec<AuditEntry> {
        self.activity.entries()
    }

    /// Snapshot of local state
    pub fn state_snapshot(&self) -> BTreeMap<String, String> {
        self.state.clone()
    }

    fn require(&self, status: MissionStatus, action: &'static str) -> Result<()> {
        if self.status == status {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn transition(
        &mut self,
        allowed: &[MissionStatus],
        to: MissionStatus,
        action: &'static str,
    ) -> Result<()> {
        if !allowed.contains(&self.status) {
            return Err(self.invalid(action));
        }

        debug!(unit = %self.id, from = %self.status, to = %to, "Mission transition");
        self.status = to;
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> GovernanceError {
        GovernanceError::InvalidTransition {
            unit: self.id.clone(),
            status: self.status,
            action,
        }
    }
}
