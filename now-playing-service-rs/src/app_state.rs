use std::{sync::Arc, time::Instant};

use tokio::sync::RwLock;

use crate::{
    cycle::CycleSummary,
    model::StationRecord,
    snapshot::{EncodedSnapshot, Snapshot, SnapshotError},
};

/// What the HTTP layer serves. Swapped wholesale once per cycle.
#[derive(Clone)]
pub struct AppState {
    published: Arc<RwLock<Published>>,
    started_at: Instant,
}

struct Published {
    snapshot: Arc<Snapshot>,
    encoded: Arc<EncodedSnapshot>,
    last_cycle: Option<CycleSummary>,
}

impl AppState {
    pub fn new(snapshot: Snapshot) -> Result<Self, SnapshotError> {
        let encoded = EncodedSnapshot::new(&snapshot)?;
        Ok(Self {
            published: Arc::new(RwLock::new(Published {
                snapshot: Arc::new(snapshot),
                encoded: Arc::new(encoded),
                last_cycle: None,
            })),
            started_at: Instant::now(),
        })
    }

    pub async fn publish(&self, snapshot: Snapshot, encoded: EncodedSnapshot, summary: CycleSummary) {
        let mut guard = self.published.write().await;
        guard.snapshot = Arc::new(snapshot);
        guard.encoded = Arc::new(encoded);
        guard.last_cycle = Some(summary);
    }

    pub async fn encoded(&self) -> Arc<EncodedSnapshot> {
        self.published.read().await.encoded.clone()
    }

    pub async fn station(&self, name: &str) -> Option<StationRecord> {
        self.published.read().await.snapshot.get(name).cloned()
    }

    pub async fn station_count(&self) -> usize {
        self.published.read().await.snapshot.len()
    }

    pub async fn last_cycle(&self) -> Option<CycleSummary> {
        self.published.read().await.last_cycle.clone()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
