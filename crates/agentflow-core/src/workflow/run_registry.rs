//! Registry of in-flight runs, keyed by run ID.
//!
//! Two concurrent executions of the same workflow definition get distinct
//! run IDs and therefore distinct entries. An entry lives exactly as long as
//! its `RunGuard`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Public view of an in-flight run.
#[derive(Debug, Clone, Serialize)]
pub struct RunHandle {
    pub run_id: Uuid,
    pub workflow_id: String,
    pub workflow_name: String,
    pub started_at: DateTime<Utc>,
}

struct RunEntry {
    handle: RunHandle,
    cancel: CancellationToken,
}

#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<DashMap<Uuid, RunEntry>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run. The entry is removed when the returned guard drops.
    pub fn register(&self, handle: RunHandle) -> (RunGuard, CancellationToken) {
        let run_id = handle.run_id;
        let cancel = CancellationToken::new();
        self.runs.insert(
            run_id,
            RunEntry {
                handle,
                cancel: cancel.clone(),
            },
        );
        let guard = RunGuard {
            runs: Arc::clone(&self.runs),
            run_id,
        };
        (guard, cancel)
    }

    /// Signal cancellation. Returns `false` if the run is not in flight.
    pub fn cancel(&self, run_id: Uuid) -> bool {
        match self.runs.get(&run_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, run_id: Uuid) -> bool {
        self.runs.contains_key(&run_id)
    }

    /// In-flight runs, oldest first.
    pub fn list(&self) -> Vec<RunHandle> {
        let mut handles: Vec<RunHandle> =
            self.runs.iter().map(|entry| entry.handle.clone()).collect();
        handles.sort_by_key(|h| h.run_id);
        handles
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Removes its run from the registry on drop.
pub struct RunGuard {
    runs: Arc<DashMap<Uuid, RunEntry>>,
    run_id: Uuid,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.runs.remove(&self.run_id);
    }
}
