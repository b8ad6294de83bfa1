use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Up,
    Down,
}

impl Status {
    pub fn is_down(self) -> bool {
        matches!(self, Status::Down)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Up => "UP",
            Status::Down => "DOWN",
        })
    }
}

/// Result of probing one target during one cycle. Never mutated after
/// creation; folded into the cycle's [`Snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub service: String,
    pub port: u16,
    pub status: Status,
}

/// Verdicts of one service-group, keyed by category name.
pub type CategoryResults = BTreeMap<String, Vec<Verdict>>;

/// The complete result of one health-check cycle:
/// service-group -> category -> verdicts in target order.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    #[serde(flatten)]
    pub groups: BTreeMap<String, CategoryResults>,
    #[serde(skip)]
    pub completed_at: DateTime<Utc>,
}

/// Latest published snapshot, shared between the scheduler and the API.
///
/// `read` returns `None` until the first cycle completes, so callers can
/// tell "no data yet" apart from a snapshot with zero targets.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published snapshot wholesale. Readers observe either the
    /// old snapshot or the new one, never a mix.
    pub async fn publish(&self, snapshot: Snapshot) {
        *self.current.write().await = Some(Arc::new(snapshot));
    }

    pub async fn read(&self) -> Option<Arc<Snapshot>> {
        self.current.read().await.clone()
    }
}
