//! In-memory record of backup operations.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Finished records beyond this count are dropped, oldest first.
const MAX_FINISHED: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Create,
    Delete,
    Export,
    Restore,
    RestoreExported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    Requested,
    Running,
    Succeeded,
    Failed,
}

impl OperationState {
    pub fn is_finished(self) -> bool {
        matches!(self, OperationState::Succeeded | OperationState::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    pub id: Uuid,
    pub kind: OperationKind,
    pub archive: String,
    pub state: OperationState,
    pub requested_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Clone, Default)]
pub struct OperationTracker {
    records: Arc<DashMap<Uuid, OperationRecord>>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, kind: OperationKind, archive: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.records.insert(
            id,
            OperationRecord {
                id,
                kind,
                archive: archive.to_string(),
                state: OperationState::Requested,
                requested_at: Utc::now(),
                started_at: None,
                finished_at: None,
                error: None,
            },
        );
        self.prune();
        id
    }

    pub fn start(&self, id: Uuid) {
        if let Some(mut record) = self.records.get_mut(&id) {
            record.state = OperationState::Running;
            record.started_at = Some(Utc::now());
        }
    }

    pub fn succeed(&self, id: Uuid) {
        self.finish(id, None);
    }

    pub fn fail(&self, id: Uuid, error: impl ToString) {
        self.finish(id, Some(error.to_string()));
    }

    fn finish(&self, id: Uuid, error: Option<String>) {
        if let Some(mut record) = self.records.get_mut(&id) {
            record.state = if error.is_some() {
                OperationState::Failed
            } else {
                OperationState::Succeeded
            };
            record.finished_at = Some(Utc::now());
            record.error = error;
        }
    }

    pub fn get(&self, id: Uuid) -> Option<OperationRecord> {
        self.records.get(&id).map(|r| r.clone())
    }

    /// All records, newest first.
    pub fn list(&self) -> Vec<OperationRecord> {
        let mut records: Vec<OperationRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        records
    }

    fn prune(&self) {
        let mut finished: Vec<(DateTime<Utc>, Uuid)> = self
            .records
            .iter()
            .filter(|r| r.state.is_finished())
            .map(|r| (r.requested_at, r.id))
            .collect();
        if finished.len() <= MAX_FINISHED {
            return;
        }
        finished.sort();
        let excess = finished.len() - MAX_FINISHED;
        for (_, id) in finished.into_iter().take(excess) {
            self.records.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let tracker = OperationTracker::new();
        let id = tracker.request(OperationKind::Create, "repo::a");
        assert_eq!(tracker.get(id).unwrap().state, OperationState::Requested);

        tracker.start(id);
        assert_eq!(tracker.get(id).unwrap().state, OperationState::Running);

        tracker.fail(id, "disk full");
        let record = tracker.get(id).unwrap();
        assert_eq!(record.state, OperationState::Failed);
        assert_eq!(record.error.as_deref(), Some("disk full"));
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn test_finished_records_are_pruned() {
        let tracker = OperationTracker::new();
        for i in 0..MAX_FINISHED + 5 {
            let id = tracker.request(OperationKind::Delete, &format!("repo::{i}"));
            tracker.succeed(id);
        }
        let running = tracker.request(OperationKind::Create, "repo::running");
        tracker.start(running);

        let records = tracker.list();
        assert!(records.len() <= MAX_FINISHED + 2);
        assert!(tracker.get(running).is_some());
    }
}
