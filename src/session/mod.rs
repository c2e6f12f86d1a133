//! Session persistence
//!
//! Open documents survive restarts: every content change is forwarded to a
//! debounced background saver which writes each document's latest text (plus
//! a short deduplicated history) to a JSON snapshot file keyed by URI.
//!
//! - [`SnapshotStore`]: the snapshot file and its history ring
//! - [`spawn_snapshot_saver`]: debounced, non-blocking writer task

pub mod saver;
pub mod snapshot;

pub use saver::{SnapshotHandle, spawn_snapshot_saver};
pub use snapshot::{DocumentSnapshot, HistoryEntry, SessionSnapshot, SnapshotStore};
