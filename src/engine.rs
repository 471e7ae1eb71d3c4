//! State-synchronization engine
//!
//! Keeps an in-memory mirror of unit state current by bulk-loading all
//! units once, then re-fetching single units as journal records name them.
//!
//! ```text
//!     ┌─────────┐
//!     │ Created │
//!     └────┬────┘
//!          │ run
//!   ┌──────▼───────┐  error   (propagates to caller)
//!   │ Bootstrapping│─────────►
//!   └──────┬───────┘
//!          │ loaded
//!   ┌──────▼───────┐  stream error   ┌────────────┐
//!   │  Following   │────────────────►│ Recovering │
//!   └──────┬───────┘◄────────────────└─────┬──────┘
//!          │ stop        retry delay       │ stop
//!     ┌────▼────┐◄──────────────────────────┘
//!     │ Stopped │
//!     └─────────┘
//! ```
//!
//! Exactly one worker task runs the loop; readers and `stop()` come from
//! arbitrary tasks and threads and never touch I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::dbus::{ClientError, ManagerClient, UnitCategory};
use crate::journal::{JournalTailer, TailError};
use crate::snapshot::UnitSnapshot;

/// Delay between a failed follow attempt and the next one.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// One applied refresh, emitted to subscribers in processing order.
#[derive(Debug, Clone)]
pub struct UnitUpdate {
    pub unit: String,
    pub snapshot: UnitSnapshot,
}

/// State map and sync timestamp read together under one lock, so both
/// belong to the same update.
#[derive(Debug, Clone)]
pub struct SyncView {
    pub units: HashMap<String, UnitSnapshot>,
    pub last_sync: DateTime<Utc>,
}

/// Everything guarded by the engine mutex. `units` and `last_sync` are
/// only ever written as a pair.
struct Shared {
    units: HashMap<String, UnitSnapshot>,
    last_sync: DateTime<Utc>,
    running: bool,
}

pub struct SyncEngine {
    manager: Arc<dyn ManagerClient>,
    tailer: Arc<dyn JournalTailer>,
    shared: Mutex<Shared>,
    /// Advisory stream health; written only by the worker.
    healthy: AtomicBool,
    retry_delay: Duration,
    updates: broadcast::Sender<UnitUpdate>,
}

impl SyncEngine {
    pub fn new(manager: Arc<dyn ManagerClient>, tailer: Arc<dyn JournalTailer>) -> Self {
        Self::with_retry_delay(manager, tailer, DEFAULT_RETRY_DELAY)
    }

    pub fn with_retry_delay(
        manager: Arc<dyn ManagerClient>,
        tailer: Arc<dyn JournalTailer>,
        retry_delay: Duration,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            manager,
            tailer,
            shared: Mutex::new(Shared {
                units: HashMap::new(),
                last_sync: Utc::now(),
                running: true,
            }),
            healthy: AtomicBool::new(false),
            retry_delay,
            updates,
        }
    }

    /// Copy of the current state map.
    pub fn units(&self) -> HashMap<String, UnitSnapshot> {
        self.shared.lock().unwrap().units.clone()
    }

    /// Time of the most recent successful sync.
    pub fn last_sync(&self) -> DateTime<Utc> {
        self.shared.lock().unwrap().last_sync
    }

    /// State map and timestamp from the same update.
    pub fn view(&self) -> SyncView {
        let shared = self.shared.lock().unwrap();
        SyncView {
            units: shared.units.clone(),
            last_sync: shared.last_sync,
        }
    }

    /// Whether records are currently flowing without stream errors.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().unwrap().running
    }

    /// Ask the worker to stop at the next record or backoff boundary.
    /// Idempotent; does not interrupt an in-flight journal read.
    pub fn stop(&self) {
        self.shared.lock().unwrap().running = false;
    }

    /// Updates applied after this call, in processing order.
    pub fn subscribe(&self) -> broadcast::Receiver<UnitUpdate> {
        self.updates.subscribe()
    }

    /// Spawn the worker onto the current runtime.
    pub fn start(self: &Arc<Self>) -> JoinHandle<Result<(), ClientError>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run().await })
    }

    /// Bootstrap, then follow the journal until stopped. A bootstrap
    /// failure is returned to the caller; nothing after it is.
    pub async fn run(&self) -> Result<(), ClientError> {
        self.bootstrap().await?;
        self.follow_loop().await;
        log::info!("sync engine stopped");
        Ok(())
    }

    /// Initial bulk load of every unit the manager knows.
    pub async fn bootstrap(&self) -> Result<(), ClientError> {
        let listed = self.manager.list_units().await?;
        let mut units = HashMap::with_capacity(listed.len());
        for unit in &listed {
            if !UnitCategory::from_identifier(&unit.name).is_supported() {
                log::debug!("{}: skipping, category not queryable", unit.name);
                continue;
            }
            let snapshot = self.manager.fetch_unit(unit.object_path.as_str()).await?;
            units.insert(unit.name.clone(), snapshot);
        }

        let count = units.len();
        {
            let mut shared = self.shared.lock().unwrap();
            shared.units = units;
            shared.last_sync = Utc::now();
        }
        log::info!("bootstrapped {} units", count);
        Ok(())
    }

    /// Follow/recover loop. Every stream failure is reported and retried
    /// after a fixed delay, forever, until `stop()`.
    async fn follow_loop(&self) {
        while self.is_running() {
            match self.follow_once().await {
                // Graceful exit at a record boundary after stop().
                Ok(()) => break,
                Err(err) => {
                    self.healthy.store(false, Ordering::Relaxed);
                    log::warn!(
                        "journal stream failed: {}; retrying in {:?}",
                        err,
                        self.retry_delay
                    );
                }
            }
            if !self.is_running() {
                break;
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    /// One follow attempt over a fresh journal stream.
    async fn follow_once(&self) -> Result<(), TailError> {
        let mut stream = self.tailer.follow().await?;
        loop {
            if !self.is_running() {
                return Ok(());
            }
            let record = match stream.next_record().await? {
                Some(record) => record,
                None => return Err(TailError::Ended),
            };
            self.healthy.store(true, Ordering::Relaxed);
            if !self.is_running() {
                return Ok(());
            }
            let Some(unit) = record.unit() else {
                continue;
            };
            // One unit failing to refresh must not stall the stream.
            match self.manager.fetch_unit(unit).await {
                Ok(snapshot) => self.apply_update(unit, snapshot),
                Err(err) => log::warn!("{}: refresh failed: {}", unit, err),
            }
        }
    }

    /// Replace one unit's snapshot and stamp the sync time as a single
    /// atomic pair, then notify subscribers.
    fn apply_update(&self, unit: &str, snapshot: UnitSnapshot) {
        let update = UnitUpdate {
            unit: unit.to_string(),
            snapshot: snapshot.clone(),
        };
        {
            let mut shared = self.shared.lock().unwrap();
            shared.units.insert(unit.to_string(), snapshot);
            shared.last_sync = Utc::now();
        }
        log::debug!("{}: state refreshed", unit);
        let _ = self.updates.send(update);
    }
}
