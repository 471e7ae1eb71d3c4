//! sysmon - Live mirror of systemd unit state
//!
//! Keeps an in-memory, thread-safe snapshot of every unit's properties
//! (load state, active state, sub state, description, object path) current
//! by:
//! - bulk-loading all units from the manager over D-Bus once, then
//! - tailing the journal and re-fetching a unit whenever a record names it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                     sysmon                       │
//! ├──────────────────────────────────────────────────┤
//! │ Journal Tailer │  Sync Engine  │  Manager Client │
//! ├──────────────────────────────────────────────────┤
//! │        journalctl        │     D-Bus (zbus)      │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Consumers read through [`engine::SyncEngine`] accessors from any thread;
//! the engine survives journal and bus failures by retrying forever with a
//! fixed delay, flagging itself unhealthy in between.

pub mod dbus;
pub mod engine;
pub mod journal;
pub mod snapshot;

pub use dbus::{ClientError, ListedUnit, ManagerClient, StartMode, SystemdClient};
pub use engine::{SyncEngine, SyncView, UnitUpdate};
pub use journal::{JournalTailer, JournalctlTailer, Record, RecordStream, TailError};
pub use snapshot::{PropertyValue, UnitSnapshot};
