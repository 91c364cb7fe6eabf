//! Periodic expiry sweep for chat documents, with an optional embedding
//! backfill pass for knowledge items left without a vector.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument};

use mande_core::defaults::{EMBED_BACKFILL_BATCH, EVENT_BUS_CAPACITY, SWEEP_INTERVAL_SECS};
use mande_core::{DocumentRepository, Error, Result};

use crate::embedding::EmbeddingTasks;

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Whether the sweeper runs at all.
    pub enabled: bool,
    /// Knowledge items re-embedded per tick (0 disables the backfill).
    pub backfill_batch: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(SWEEP_INTERVAL_SECS),
            enabled: true,
            backfill_batch: EMBED_BACKFILL_BATCH,
        }
    }
}

impl SweepConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `MANDE_SWEEP_ENABLED` | `true` | Enable/disable the sweeper |
    /// | `MANDE_SWEEP_INTERVAL_SECS` | `900` | Seconds between sweeps |
    pub fn from_env() -> Self {
        let enabled = std::env::var("MANDE_SWEEP_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let interval_secs = std::env::var("MANDE_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(SWEEP_INTERVAL_SECS)
            .max(1);

        Self {
            interval: Duration::from_secs(interval_secs),
            enabled,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_backfill_batch(mut self, batch: i64) -> Self {
        self.backfill_batch = batch;
        self
    }
}

/// Event emitted by the sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepEvent {
    /// Sweeper started.
    Started,
    /// Expired documents were removed.
    SweepCompleted { removed: u64 },
    /// A sweep failed; the next tick retries.
    SweepFailed { error: String },
    /// Backfill stored vectors for this many knowledge items.
    BackfillCompleted { stored: usize },
    /// Sweeper stopped.
    Stopped,
}

/// Handle for controlling a running sweeper.
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SweepEvent>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop after the current tick.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for sweeper events.
    pub fn events(&self) -> broadcast::Receiver<SweepEvent> {
        self.event_rx.resubscribe()
    }
}

/// Removes expired documents on an interval.
pub struct ExpirySweeper {
    documents: Arc<dyn DocumentRepository>,
    backfill: Option<EmbeddingTasks>,
    config: SweepConfig,
    event_tx: broadcast::Sender<SweepEvent>,
}

impl ExpirySweeper {
    pub fn new(documents: Arc<dyn DocumentRepository>, config: SweepConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            documents,
            backfill: None,
            config,
            event_tx,
        }
    }

    /// Also re-embed knowledge items on every tick.
    pub fn with_backfill(mut self, tasks: EmbeddingTasks) -> Self {
        self.backfill = Some(tasks);
        self
    }

    /// Delete every document whose `expires_at` has passed.
    #[instrument(skip(self), fields(subsystem = "jobs", component = "sweeper", op = "sweep"))]
    pub async fn sweep_once(&self) -> Result<u64> {
        let removed = self.documents.delete_expired(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Expired documents removed");
        } else {
            debug!("No expired documents");
        }
        Ok(removed)
    }

    /// Get a receiver for sweeper events. Subscribe before `start` to see
    /// the `Started` event.
    pub fn events(&self) -> broadcast::Receiver<SweepEvent> {
        self.event_tx.subscribe()
    }

    /// Start the sweeper and return a handle for control.
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        SweeperHandle {
            shutdown_tx,
            event_rx,
        }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Expiry sweeper is disabled, not starting");
            return;
        }

        info!(
            interval_secs = self.config.interval.as_secs(),
            backfill = self.backfill.is_some(),
            "Expiry sweeper started"
        );
        let _ = self.event_tx.send(SweepEvent::Started);

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Expiry sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }

        let _ = self.event_tx.send(SweepEvent::Stopped);
        info!("Expiry sweeper stopped");
    }

    async fn tick(&self) {
        match self.sweep_once().await {
            Ok(removed) => {
                let _ = self.event_tx.send(SweepEvent::SweepCompleted { removed });
            }
            Err(e) => {
                error!(error = %e, "Expiry sweep failed");
                let _ = self.event_tx.send(SweepEvent::SweepFailed {
                    error: e.to_string(),
                });
            }
        }

        let Some(tasks) = &self.backfill else {
            return;
        };
        if self.config.backfill_batch <= 0 {
            return;
        }
        match tasks.backfill(self.config.backfill_batch).await {
            Ok(stored) => {
                let _ = self.event_tx.send(SweepEvent::BackfillCompleted { stored });
            }
            Err(e) => error!(error = %e, "Embedding backfill failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mande_core::CreateDocumentRequest;
    use mande_db::InMemoryStore;
    use uuid::Uuid;

    async fn seed(store: &InMemoryStore, expires_in: chrono::Duration) -> Uuid {
        store
            .documents()
            .create_pending(CreateDocumentRequest {
                owner_id: Uuid::new_v4(),
                filename: "a.txt".into(),
                mime_type: "text/plain".into(),
                size_bytes: 3,
                expires_at: Utc::now() + expires_in,
            })
            .await
            .unwrap()
            .id
    }

    #[test]
    fn test_sweep_config_default() {
        let config = SweepConfig::default();
        assert_eq!(config.interval, Duration::from_secs(900));
        assert!(config.enabled);
        assert_eq!(config.backfill_batch, EMBED_BACKFILL_BATCH);
    }

    #[tokio::test]
    async fn test_sweep_once_removes_only_expired() {
        let store = InMemoryStore::new();
        seed(&store, chrono::Duration::hours(-1)).await;
        seed(&store, chrono::Duration::hours(-2)).await;
        seed(&store, chrono::Duration::hours(47)).await;

        let sweeper = ExpirySweeper::new(store.documents(), SweepConfig::default());
        assert_eq!(sweeper.sweep_once().await.unwrap(), 2);
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_started_sweeper_emits_events_and_stops() {
        let store = InMemoryStore::new();
        seed(&store, chrono::Duration::minutes(-5)).await;

        let sweeper = ExpirySweeper::new(
            store.documents(),
            SweepConfig::default().with_interval(Duration::from_millis(20)),
        );
        let mut events = sweeper.events();
        let handle = sweeper.start();

        assert_eq!(events.recv().await.unwrap(), SweepEvent::Started);
        assert_eq!(
            events.recv().await.unwrap(),
            SweepEvent::SweepCompleted { removed: 1 }
        );

        handle.shutdown().await.unwrap();
        loop {
            match events.recv().await.unwrap() {
                SweepEvent::Stopped => break,
                SweepEvent::SweepCompleted { removed } => assert_eq!(removed, 0),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_disabled_sweeper_does_nothing() {
        let store = InMemoryStore::new();
        seed(&store, chrono::Duration::minutes(-5)).await;

        let handle = ExpirySweeper::new(
            store.documents(),
            SweepConfig::default().with_enabled(false),
        )
        .start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(handle);

        assert_eq!(store.documents().delete_expired(Utc::now()).await.unwrap(), 1);
    }
}
