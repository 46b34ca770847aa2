//! Coordinator: creates, mediates and retires sub-units
//!
//! All coordinator state sits behind one lock that every operation holds for
//! its whole duration, reads included, so cross-operation invariants such as
//! "no grant references a retired unit" are never seen half-applied.
//!
//! Lock order is coordinator first, then at most one sub-unit at a time.

use crate::audit::{AuditEntry, AuditQuery, AuditStats, AuditTrail, EventKind};
use crate::collab::{DomainClassifier, KeywordClassifier, PlaceholderExecutor, TaskExecutor};
use crate::error::{GovernanceError, Result};
use crate::grant::AuthorizationGrant;
use crate::policy::TrustPolicy;
use crate::subunit::{SubUnit, SubUnitHandle};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct CoordinatorState {
    units: HashMap<String, SubUnitHandle>,
    grants: Vec<AuthorizationGrant>,
    default_policy: TrustPolicy,
    events: AuditTrail,
}

pub struct Coordinator {
    id: String,
    classifier: Arc<dyn DomainClassifier>,
    executor: Arc<dyn TaskExecutor>,
    state: Mutex<CoordinatorState>,
}

impl Coordinator {
    /// Create a coordinator with the keyword classifier and placeholder executor
    pub fn new(id: impl Into<String>, default_policy: TrustPolicy) -> Self {
        let id = id.into();
        let mut events = AuditTrail::new(format!("coordinator:{}", id));
        events.record(EventKind::Lifecycle, format!("Coordinator created: {}", id));

        Self {
            id,
            classifier: Arc::new(KeywordClassifier::default()),
            executor: Arc::new(PlaceholderExecutor),
            state: Mutex::new(CoordinatorState {
                units: HashMap::new(),
                grants: Vec::new(),
                default_policy,
                events,
            }),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn DomainClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Map free-text intent to a domain label
    pub async fn classify_domain(&self, intent: &str) -> String {
        let mut state = self.state.lock().await;
        self.classify_locked(&mut state, intent)
    }

    /// Create, start and register a sub-unit for `domain`
    pub async fn create_sub_unit(
        &self,
        domain: &str,
        policy: Option<TrustPolicy>,
    ) -> Result<SubUnitHandle> {
        let mut state = self.state.lock().await;
        self.create_locked(&mut state, domain, policy)
    }

    /// Look up a live sub-unit by id
    pub async fn reactivate_sub_unit(&self, id: &str) -> Option<SubUnitHandle> {
        let mut state = self.state.lock().await;
        match state.units.get(id).cloned() {
            Some(handle) => {
                state
                    .events
                    .record(EventKind::Lifecycle, format!("Reactivated sub-unit: {}", id));
                Some(handle)
            }
            None => {
                state.events.record(
                    EventKind::Lifecycle,
                    format!("Failed to reactivate sub-unit: {} - not found", id),
                );
                None
            }
        }
    }

    /// Add a grant. Earlier grants between the same pair are kept; any
    /// matching one authorizes.
    pub async fn authorize_communication(
        &self,
        from: &str,
        to: &str,
        bidirectional: bool,
        scopes: Option<Vec<String>>,
        ttl: Option<Duration>,
    ) {
        let mut state = self.state.lock().await;
        let grant = AuthorizationGrant::create(from, to, bidirectional, scopes, ttl);

        let expiry = grant
            .expires_at
            .map(|e| format!(", expires: {}", subagentic_core::format::timestamp(e)))
            .unwrap_or_default();
        state.events.record(
            EventKind::Authorization,
            format!(
                "Authorized communication: {} -> {} (bidirectional: {}, scopes: {}{})",
                from,
                to,
                bidirectional,
                grant.scopes.join(","),
                expiry
            ),
        );
        debug!(from, to, bidirectional, "Grant added");
        state.grants.push(grant);
    }

    /// Deliver `content` from one sub-unit to another.
    ///
    /// The sender's outbound step is not rolled back if the receiver then
    /// rejects the content.
    pub async fn mediate_communication(&self, from: &str, to: &str, content: &str) -> bool {
        let mut state = self.state.lock().await;

        if !state.grants.iter().any(|grant| grant.matches(from, to)) {
            debug!(from, to, "No matching grant");
            state.events.record(
                EventKind::Blocked,
                format!("Communication blocked: {} -> {} - not authorized", from, to),
            );
            return false;
        }

        let Some(sender) = state.units.get(from).cloned() else {
            state.events.record(
                EventKind::Blocked,
                format!("Communication failed: sender {} not found", from),
            );
            return false;
        };

        let Some(receiver) = state.units.get(to).cloned() else {
            state.events.record(
                EventKind::Blocked,
                format!("Communication failed: receiver {} not found", to),
            );
            return false;
        };

        // One sub-unit lock at a time; `from == to` must not deadlock
        let sent = sender.lock().await.send_information(to, content);
        if !sent {
            state.events.record(
                EventKind::Blocked,
                format!(
                    "Communication failed: {} -> {} - sender rejected outbound",
                    from, to
                ),
            );
            return false;
        }

        let delivered = receiver.lock().await.receive_information(from, content).await;
        state.events.record(
            EventKind::Mediation,
            format!(
                "Communication mediated: {} -> {} - success: {}",
                from, to, delivered
            ),
        );
        delivered
    }

    /// Retire a sub-unit and purge every grant that mentions it.
    /// Returns false if the id is unknown.
    pub async fn retire_sub_unit(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;

        let Some(handle) = state.units.remove(id) else {
            debug!(unit = id, "Retire requested for unknown sub-unit");
            state.events.record(
                EventKind::Lifecycle,
                format!("Retire requested for unknown sub-unit: {}", id),
            );
            return false;
        };

        handle.lock().await.retire();

        let before = state.grants.len();
        state.grants.retain(|grant| !grant.references(id));
        let purged = before - state.grants.len();

        info!(unit = id, purged, "Sub-unit retired");
        state.events.record(
            EventKind::Lifecycle,
            format!("Retired sub-unit: {} ({} grants purged)", id, purged),
        );
        true
    }

    /// Classify, spin up a sub-unit, run the task and complete the mission.
    ///
    /// The sub-unit stays registered afterwards, on success and on failure;
    /// retiring it is the caller's job.
    pub async fn process_user_task(&self, intent: &str, details: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        state
            .events
            .record(EventKind::Task, format!("Processing user task: {}", intent));

        let domain = self.classify_locked(&mut state, intent);
        let handle = self.create_locked(&mut state, &domain, None)?;

        let outcome = {
            let mut unit = handle.lock().await;
            match unit.process_task(details).await {
                Ok(result) => unit.complete_mission().map(|_| result),
                Err(err) => Err(err),
            }
        };

        if let Err(ref err) = outcome {
            warn!(%err, "User task failed");
            state
                .events
                .record(EventKind::Task, format!("Task processing failed: {}", err));
        }
        outcome
    }

    /// Snapshot of the live sub-units
    pub async fn active_sub_units(&self) -> HashMap<String, SubUnitHandle> {
        self.state.lock().await.units.clone()
    }

    /// Snapshot of current grants, in insertion order
    pub async fn grants(&self) -> Vec<AuthorizationGrant> {
        self.state.lock().await.grants.clone()
    }

    /// Snapshot of the event log
    pub async fn event_log(&self) -> Vec<AuditEntry> {
        self.state.lock().await.events.entries()
    }

    pub async fn audit(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        self.state.lock().await.events.query(query)
    }

    pub async fn stats(&self) -> AuditStats {
        self.state.lock().await.events.stats()
    }

    fn classify_locked(&self, state: &mut CoordinatorState, intent: &str) -> String {
        let domain = self.classifier.classify(intent);
        state.events.record(
            EventKind::Classification,
            format!("Classified intent '{}' as domain: {}", intent, domain),
        );
        domain
    }

    fn create_locked(
        &self,
        state: &mut CoordinatorState,
        domain: &str,
        policy: Option<TrustPolicy>,
    ) -> Result<SubUnitHandle> {
        let id = format!("SA-{}-{}", domain, Uuid::new_v4().simple());
        if state.units.contains_key(&id) {
            return Err(GovernanceError::DuplicateUnit(id));
        }

        let policy = policy.unwrap_or_else(|| state.default_policy.clone());
        let mut unit = SubUnit::new(id.clone(), domain, policy, Arc::clone(&self.executor));
        unit.start_mission()?;

        let handle = unit.into_handle();
        state.units.insert(id.clone(), Arc::clone(&handle));

        info!(unit = %id, domain, "Sub-unit created");
        state.events.record(
            EventKind::Lifecycle,
            format!("Created and started sub-unit: {} for domain: {}", id, domain),
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{permissive_policy, strict_policy};
    use crate::status::MissionStatus;
    use async_trait::async_trait;

    async fn pair(coordinator: &Coordinator) -> (String, String) {
        let a = coordinator.create_sub_unit("Research", None).await.unwrap();
        let b = coordinator.create_sub_unit("Analysis", None).await.unwrap();
        let a = a.lock().await.id().to_string();
        let b = b.lock().await.id().to_string();
        (a, b)
    }

    fn coordinator() -> Coordinator {
        Coordinator::new("FLA-TEST", permissive_policy())
    }

    #[tokio::test]
    async fn test_create_registers_active_unit() {
        let coordinator = coordinator();
        let handle = coordinator.create_sub_unit("Research", None).await.unwrap();

        let unit = handle.lock().await;
        assert!(unit.id().starts_with("SA-Research-"));
        assert_eq!(unit.status(), MissionStatus::Active);
        assert!(coordinator.active_sub_units().await.contains_key(unit.id()));
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let coordinator = coordinator();
        let (a, b) = pair(&coordinator).await;
        let c = coordinator.create_sub_unit("Research", None).await.unwrap();
        let c = c.lock().await.id().to_string();
        assert_ne!(a, c);
        assert_ne!(a, b);
        assert_eq!(coordinator.active_sub_units().await.len(), 3);
    }

    #[tokio::test]
    async fn test_custom_policy_is_used() {
        let coordinator = coordinator();
        let handle = coordinator
            .create_sub_unit("Vault", Some(strict_policy()))
            .await
            .unwrap();
        let unit = handle.lock().await;
        assert_eq!(unit.policy().security_level(), crate::level::SecurityLevel::Secret);
    }

    #[tokio::test]
    async fn test_mediation_requires_grant() {
        let coordinator = coordinator();
        let (a, b) = pair(&coordinator).await;

        assert!(!coordinator.mediate_communication(&a, &b, "hello").await);
        let log = coordinator.event_log().await;
        assert!(log.last().unwrap().message.contains("not authorized"));

        coordinator.authorize_communication(&a, &b, false, None, None).await;
        assert!(coordinator.mediate_communication(&a, &b, "hello").await);
    }

    #[tokio::test]
    async fn test_grant_directionality() {
        let coordinator = coordinator();
        let (a, b) = pair(&coordinator).await;

        coordinator.authorize_communication(&a, &b, false, None, None).await;
        assert!(coordinator.mediate_communication(&a, &b, "forward").await);
        assert!(!coordinator.mediate_communication(&b, &a, "back").await);

        coordinator.authorize_communication(&b, &a, true, None, None).await;
        assert!(coordinator.mediate_communication(&b, &a, "back").await);
        assert_eq!(coordinator.grants().await.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_grant_never_matches() {
        let coordinator = coordinator();
        let (a, b) = pair(&coordinator).await;

        coordinator
            .authorize_communication(&a, &b, true, None, Some(Duration::zero()))
            .await;
        assert!(!coordinator.mediate_communication(&a, &b, "late").await);
        // Expired grants stay until the unit is retired
        assert_eq!(coordinator.grants().await.len(), 1);
    }

    #[tokio::test]
    async fn test_huge_ttl_grant_matches() {
        let coordinator = coordinator();
        let (a, b) = pair(&coordinator).await;

        coordinator
            .authorize_communication(&a, &b, false, None, Some(Duration::weeks(100_000_000)))
            .await;
        assert!(coordinator.mediate_communication(&a, &b, "far future").await);
    }

    #[tokio::test]
    async fn test_unknown_participants_are_rejected() {
        let coordinator = coordinator();
        let (a, _) = pair(&coordinator).await;

        coordinator.authorize_communication(&a, "ghost", true, None, None).await;
        assert!(!coordinator.mediate_communication(&a, "ghost", "hi").await);
        assert!(!coordinator.mediate_communication("ghost", &a, "hi").await);

        let blocked = coordinator
            .audit(&AuditQuery::default().kind(EventKind::Blocked))
            .await;
        assert!(blocked[0].message.contains("receiver ghost not found"));
        assert!(blocked[1].message.contains("sender ghost not found"));
    }

    #[tokio::test]
    async fn test_receiver_rejection_still_records_send() {
        let coordinator = coordinator();
        let a = coordinator.create_sub_unit("Research", None).await.unwrap();
        let b = coordinator
            .create_sub_unit("Vault", Some(strict_policy()))
            .await
            .unwrap();
        let a_id = a.lock().await.id().to_string();
        let b_id = b.lock().await.id().to_string();

        coordinator.authorize_communication(&a_id, &b_id, false, None, None).await;
        assert!(!coordinator.mediate_communication(&a_id, &b_id, "secret plans").await);

        let sender_log = a.lock().await.activity_log();
        assert!(sender_log.iter().any(|e| e.kind == EventKind::Outbound));
        assert!(b.lock().await.state_snapshot().is_empty());

        let last = coordinator.event_log().await.pop().unwrap();
        assert!(last.message.ends_with("success: false"));
    }

    #[tokio::test]
    async fn test_inactive_sender_is_blocked() {
        let coordinator = coordinator();
        let a = coordinator.create_sub_unit("Research", None).await.unwrap();
        let (a_id, b_id) = {
            let b = coordinator.create_sub_unit("Analysis", None).await.unwrap();
            let b_id = b.lock().await.id().to_string();
            (a.lock().await.id().to_string(), b_id)
        };
        a.lock().await.pause().unwrap();

        coordinator.authorize_communication(&a_id, &b_id, false, None, None).await;
        assert!(!coordinator.mediate_communication(&a_id, &b_id, "hi").await);
    }

    #[tokio::test]
    async fn test_self_mediation_does_not_deadlock() {
        let coordinator = coordinator();
        let (a, _) = pair(&coordinator).await;
        coordinator.authorize_communication(&a, &a, false, None, None).await;
        assert!(coordinator.mediate_communication(&a, &a, "note to self").await);
    }

    #[tokio::test]
    async fn test_retirement_purges_grants() {
        let coordinator = coordinator();
        let (a, b) = pair(&coordinator).await;
        let c = coordinator.create_sub_unit("Ops", None).await.unwrap();
        let c = c.lock().await.id().to_string();

        coordinator.authorize_communication(&a, &b, true, None, None).await;
        coordinator.authorize_communication(&c, &a, false, None, None).await;
        coordinator.authorize_communication(&b, &c, false, None, None).await;

        let handle = coordinator.reactivate_sub_unit(&a).await.unwrap();
        assert!(coordinator.retire_sub_unit(&a).await);

        assert_eq!(handle.lock().await.status(), MissionStatus::Retired);
        let grants = coordinator.grants().await;
        assert_eq!(grants.len(), 1);
        assert!(grants.iter().all(|g| !g.references(&a)));

        assert!(!coordinator.mediate_communication(&a, &b, "hi").await);
        assert!(!coordinator.mediate_communication(&b, &a, "hi").await);
        assert!(coordinator.mediate_communication(&b, &c, "hi").await);
    }

    #[tokio::test]
    async fn test_retire_unknown_is_noop() {
        let coordinator = coordinator();
        let (a, _) = pair(&coordinator).await;
        assert!(coordinator.retire_sub_unit(&a).await);
        assert!(!coordinator.retire_sub_unit(&a).await);
        assert!(!coordinator.retire_sub_unit("missing").await);
        assert!(coordinator.reactivate_sub_unit(&a).await.is_none());

        let unknown = coordinator
            .audit(&AuditQuery::default().contains("unknown sub-unit"))
            .await;
        assert_eq!(unknown.len(), 2);
        assert!(unknown.iter().all(|e| e.kind == EventKind::Lifecycle));
        assert!(unknown[1].message.ends_with("missing"));
    }

    #[tokio::test]
    async fn test_held_unit_guard_stalls_coordinator() {
        let coordinator = Arc::new(coordinator());
        let (a, _) = pair(&coordinator).await;
        let handle = coordinator.reactivate_sub_unit(&a).await.unwrap();

        let guard = handle.lock().await;
        let retiring = {
            let coordinator = Arc::clone(&coordinator);
            let a = a.clone();
            tokio::spawn(async move { coordinator.retire_sub_unit(&a).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!retiring.is_finished());

        drop(guard);
        assert!(retiring.await.unwrap());
        assert_eq!(handle.lock().await.status(), MissionStatus::Retired);
    }

    #[tokio::test]
    async fn test_process_user_task() {
        let coordinator = coordinator();
        let result = coordinator
            .process_user_task("I need to analyze some data", "sentiment of reviews")
            .await
            .unwrap();
        assert_eq!(result, "Processed: sentiment of reviews in domain: DataAnalysis");

        // Completed task units are left registered
        let units = coordinator.active_sub_units().await;
        assert_eq!(units.len(), 1);
        let unit = units.values().next().unwrap().lock().await;
        assert_eq!(unit.status(), MissionStatus::Completed);
        assert_eq!(unit.domain(), "DataAnalysis");
    }

    struct BrokenExecutor;

    #[async_trait]
    impl TaskExecutor for BrokenExecutor {
        async fn execute(&self, _domain: &str, _task: &str) -> anyhow::Result<String> {
            anyhow::bail!("quota exhausted")
        }
    }

    #[tokio::test]
    async fn test_process_user_task_failure_propagates() {
        let coordinator = coordinator().with_executor(Arc::new(BrokenExecutor));
        let err = coordinator
            .process_user_task("write code", "auth middleware")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "quota exhausted");

        let failures = coordinator
            .audit(&AuditQuery::default().contains("Task processing failed"))
            .await;
        assert_eq!(failures.len(), 1);

        // Failed task units are not cleaned up either
        let units = coordinator.active_sub_units().await;
        let unit = units.values().next().unwrap().lock().await;
        assert_eq!(unit.status(), MissionStatus::Active);
    }

    #[tokio::test]
    async fn test_snapshots_are_detached() {
        let coordinator = coordinator();
        pair(&coordinator).await;

        let mut units = coordinator.active_sub_units().await;
        units.clear();
        let mut log = coordinator.event_log().await;
        log.clear();

        assert_eq!(coordinator.active_sub_units().await.len(), 2);
        assert!(!coordinator.event_log().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_mediation() {
        let coordinator = Arc::new(coordinator());
        let (a, b) = pair(&coordinator).await;
        coordinator.authorize_communication(&a, &b, true, None, None).await;

        let mut tasks = Vec::new();
        for i in 0..16 {
            let coordinator = Arc::clone(&coordinator);
            let (from, to) = if i % 2 == 0 { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
            tasks.push(tokio::spawn(async move {
                coordinator
                    .mediate_communication(&from, &to, &format!("message {}", i))
                    .await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }

        let stats = coordinator.stats().await;
        assert_eq!(
            coordinator
                .audit(&AuditQuery::default().kind(EventKind::Mediation))
                .await
                .len(),
            16
        );
        assert_eq!(stats.blocked, 0);
    }

    #[tokio::test]
    async fn test_custom_classifier() {
        let classifier = KeywordClassifier::new("Misc").rule("Ops", &["deploy"]);
        let coordinator = coordinator().with_classifier(Arc::new(classifier));

        let result = coordinator.process_user_task("deploy it", "roll out v2").await.unwrap();
        assert_eq!(result, "Processed: roll out v2 in domain: Ops");
        assert_eq!(coordinator.classify_domain("analyze data").await, "Misc");
    }

    #[tokio::test]
    async fn test_classify_is_logged() {
        let coordinator = coordinator();
        assert_eq!(coordinator.classify_domain("security review").await, "SecurityAudit");
        let entries = coordinator
            .audit(&AuditQuery::default().kind(EventKind::Classification))
            .await;
        assert_eq!(entries.len(), 1);
    }
}
