//! Debounced snapshot writer
//!
//! Edits arrive on an unbounded channel so the completion path never waits on
//! disk. The task keeps only the newest text per document and writes the
//! batch once no edit has arrived for the debounce interval. A shutdown (or a
//! dropped handle) flushes whatever is still pending.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace};

use super::snapshot::SnapshotStore;

#[derive(Debug)]
enum SaverCommand {
    Save { uri: String, text: String },
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Sending side of a running snapshot saver
#[derive(Debug)]
pub struct SnapshotHandle {
    tx: mpsc::UnboundedSender<SaverCommand>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotHandle {
    /// Queue `text` as the new contents of `uri`; never blocks
    pub fn submit(&self, uri: impl Into<String>, text: String) {
        let command = SaverCommand::Save {
            uri: uri.into(),
            text,
        };
        if self.tx.send(command).is_err() {
            trace!("Snapshot saver stopped, dropping edit");
        }
    }

    /// Write any pending text now and wait for it
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(SaverCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Flush and stop the saver task
    pub async fn shutdown(&self) {
        let _ = self.tx.send(SaverCommand::Shutdown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Snapshot saver task failed: {}", e);
            }
        }
    }
}

/// Start the saver task for `store`
pub fn spawn_snapshot_saver(store: Arc<SnapshotStore>, debounce: Duration) -> SnapshotHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<SaverCommand>();

    let task = tokio::spawn(async move {
        let mut pending: BTreeMap<String, String> = BTreeMap::new();
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(SaverCommand::Save { uri, text }) => {
                        pending.insert(uri, text);
                        deadline = Some(Instant::now() + debounce);
                    }
                    Some(SaverCommand::Flush(ack)) => {
                        deadline = None;
                        persist(&store, std::mem::take(&mut pending)).await;
                        let _ = ack.send(());
                    }
                    Some(SaverCommand::Shutdown) | None => {
                        persist(&store, std::mem::take(&mut pending)).await;
                        break;
                    }
                },
                _ = sleep_until(deadline), if deadline.is_some() => {
                    deadline = None;
                    persist(&store, std::mem::take(&mut pending)).await;
                }
            }
        }

        info!("Snapshot saver for {} terminated", store.path().display());
    });

    SnapshotHandle {
        tx,
        task: Mutex::new(Some(task)),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)).await
}

async fn persist(store: &Arc<SnapshotStore>, pending: BTreeMap<String, String>) {
    if pending.is_empty() {
        return;
    }

    let store = Arc::clone(store);
    let count = pending.len();
    match tokio::task::spawn_blocking(move || store.record_all(pending)).await {
        Ok(Ok(())) => debug!("Session snapshot written ({} documents)", count),
        Ok(Err(e)) => error!("Failed to write session snapshot: {:#}", e),
        Err(e) => error!("Snapshot write task panicked: {}", e),
    }
}
