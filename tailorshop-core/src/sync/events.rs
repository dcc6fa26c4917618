use serde::Serialize;

use crate::models::{EntityKind, QueuedOperation};

/// Notifications published by the sync service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum SyncEvent {
    Started,
    /// Overall progress, 0 to 100.
    Progress(u8),
    /// A queued operation was confirmed by the server and dequeued.
    OperationSynced(QueuedOperation),
    /// A queued operation hit the retry ceiling and was dropped. The local
    /// optimistic state it produced will not be reconciled by replay.
    OperationAbandoned(QueuedOperation),
    Completed(SyncReport),
}

/// Summary of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub replayed: usize,
    pub failed: usize,
    pub abandoned: usize,
    /// Collections that were refetched and written to the local store.
    pub refreshed: Vec<EntityKind>,
    /// Set when the pass stopped early on a storage failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Offline,
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Completed(SyncReport),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization() {
        let value = serde_json::to_value(SyncEvent::Progress(50)).unwrap();
        assert_eq!(value, json!({"event": "progress", "data": 50}));

        let value = serde_json::to_value(SyncEvent::Started).unwrap();
        assert_eq!(value, json!({"event": "started"}));
    }

    #[test]
    fn test_report_is_clean() {
        let mut report = SyncReport::default();
        assert!(report.is_clean());

        report.failed = 1;
        assert!(!report.is_clean());

        report.failed = 0;
        report.error = Some("disk full".into());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_outcome_report() {
        assert!(SyncOutcome::Skipped(SkipReason::Offline).report().is_none());
        let outcome = SyncOutcome::Completed(SyncReport::default());
        assert_eq!(outcome.report(), Some(&SyncReport::default()));
    }
}
