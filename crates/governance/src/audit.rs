//! Audit trails for coordinators and sub-units
//!
//! Every lifecycle transition and every accept/reject decision is recorded
//! with who, what, when and why. Trails are append-only and live in memory;
//! callers only ever receive snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use subagentic_core::format;

/// What kind of event an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Creation, start, pause, completion, retirement
    Lifecycle,
    /// Task processing
    Task,
    /// Inbound content accepted
    Accepted,
    /// Inbound content rejected
    Rejected,
    /// Outbound send (or refusal to send)
    Outbound,
    /// Grant created
    Authorization,
    /// Mediated delivery finished
    Mediation,
    /// Mediation refused before delivery
    Blocked,
    /// Intent classified into a domain
    Classification,
}

/// A single audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the event happened
    pub timestamp: DateTime<Utc>,

    /// Who recorded it (coordinator or sub-unit id)
    pub scope: String,

    pub kind: EventKind,

    pub message: String,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            format::timestamp(self.timestamp),
            self.scope,
            self.message
        )
    }
}

/// Append-only, ordered list of entries for one scope
#[derive(Debug, Clone)]
pub struct AuditTrail {
    scope: String,
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            entries: Vec::new(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Append an entry stamped with the current time
    pub fn record(&mut self, kind: EventKind, message: impl Into<String>) {
        self.entries.push(AuditEntry {
            timestamp: Utc::now(),
            scope: self.scope.clone(),
            kind,
            message: message.into(),
        });
    }

    /// Snapshot of every entry, oldest first
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matching entries, oldest first
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let mut matched: Vec<AuditEntry> = self
            .entries
            .iter()
            .filter(|entry| query.matches(entry))
            .cloned()
            .collect();

        // Keep the most recent `limit` entries
        if let Some(limit) = query.limit {
            if matched.len() > limit {
                matched.drain(..matched.len() - limit);
            }
        }

        matched
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats::from_entries(&self.entries)
    }
}

/// Query parameters for an audit trail
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    kind: Option<EventKind>,
    scope: Option<String>,
    since: Option<DateTime<Utc>>,
    contains: Option<String>,
    limit: Option<usize>,
}

impl AuditQuery {
    /// Filter by event kind
    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Filter by recording scope
    pub fn scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    /// Filter by time
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Filter by message substring
    pub fn contains(mut self, needle: &str) -> Self {
        self.contains = Some(needle.to_string());
        self
    }

    /// Limit results to the most recent N
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(kind) = self.kind {
            if entry.kind != kind {
                return false;
            }
        }

        if let Some(ref scope) = self.scope {
            if entry.scope != *scope {
                return false;
            }
        }

        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }

        if let Some(ref needle) = self.contains {
            if !entry.message.contains(needle.as_str()) {
                return false;
            }
        }

        true
    }
}

/// Audit statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub blocked: usize,
    pub lifecycle: usize,
}

impl AuditStats {
    pub fn from_entries(entries: &[AuditEntry]) -> Self {
        let mut stats = AuditStats::default();
        for entry in entries {
            stats.total += 1;
            match entry.kind {
                EventKind::Accepted => stats.accepted += 1,
                EventKind::Rejected => stats.rejected += 1,
                EventKind::Blocked => stats.blocked += 1,
                EventKind::Lifecycle => stats.lifecycle += 1,
                _ => {}
            }
        }
        stats
    }

    /// Share of inbound decisions that were accepted, in percent
    pub fn acceptance_rate(&self) -> f64 {
        let decided = self.accepted + self.rejected;
        if decided == 0 {
            return 0.0;
        }
        (self.accepted as f64) / (decided as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_display() {
        let mut trail = AuditTrail::new("coordinator:FLA-001");
        trail.record(EventKind::Lifecycle, "Coordinator created");

        let entries = trail.entries();
        assert_eq!(entries.len(), 1);
        let line = entries[0].to_string();
        assert!(line.starts_with('['));
        assert!(line.ends_with("[coordinator:FLA-001] Coordinator created"));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut trail = AuditTrail::new("unit");
        trail.record(EventKind::Task, "one");

        let mut snapshot = trail.entries();
        snapshot.clear();
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn test_query() {
        let mut trail = AuditTrail::new("unit");
        for i in 0..5 {
            let kind = if i % 2 == 0 { EventKind::Accepted } else { EventKind::Rejected };
            trail.record(kind, format!("message {}", i));
        }

        let accepted = trail.query(&AuditQuery::default().kind(EventKind::Accepted));
        assert_eq!(accepted.len(), 3);

        let last_two = trail.query(&AuditQuery::default().limit(2));
        assert_eq!(last_two[0].message, "message 3");
        assert_eq!(last_two[1].message, "message 4");

        let found = trail.query(&AuditQuery::default().contains("message 1"));
        assert_eq!(found.len(), 1);

        assert!(trail.query(&AuditQuery::default().scope("other")).is_empty());
    }

    #[test]
    fn test_query_since() {
        let mut trail = AuditTrail::new("unit");
        for message in ["a", "b", "c"] {
            trail.record(EventKind::Task, message);
        }
        let entries = trail.entries();
        let first = entries[0].timestamp;
        let last = entries[2].timestamp;

        let all = trail.query(&AuditQuery::default().since(first - chrono::Duration::seconds(1)));
        assert_eq!(all.len(), 3);

        let recent = trail.query(&AuditQuery::default().since(last));
        assert_eq!(recent.last().map(|e| e.message.as_str()), Some("c"));
        assert!(recent.iter().all(|e| e.timestamp >= last));

        let future = last + chrono::Duration::milliseconds(1);
        assert!(trail.query(&AuditQuery::default().since(future)).is_empty());
    }

    #[test]
    fn test_stats() {
        let mut trail = AuditTrail::new("unit");
        trail.record(EventKind::Lifecycle, "started");
        trail.record(EventKind::Accepted, "ok");
        trail.record(EventKind::Accepted, "ok");
        trail.record(EventKind::Rejected, "no");
        trail.record(EventKind::Blocked, "blocked");

        let stats = trail.stats();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.lifecycle, 1);
        assert!((stats.acceptance_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_entry_json() {
        let mut trail = AuditTrail::new("unit");
        trail.record(EventKind::Classification, "DataAnalysis");
        let json = serde_json::to_value(&trail.entries()[0]).unwrap();
        assert_eq!(json["kind"], "classification");
        assert_eq!(json["scope"], "unit");
    }
}
