mod types;

pub use types::*;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

/// How long a finished transfer row stays visible before removal.
pub const LINGER: Duration = Duration::from_millis(750);

/// Observable transfer event, broadcast to all subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TransferEvent {
    /// A transfer's declared size became known and a row was created.
    TransferStarted {
        #[serde(flatten)]
        transfer: ActiveTransfer,
    },
    /// Bytes arrived for an in-flight transfer.
    TransferProgress { id: Uuid, progress: f32 },
    /// A file was saved; carries the terminal row that replaced the placeholder.
    TransferFinished {
        #[serde(flatten)]
        transfer: ActiveTransfer,
    },
    /// A row left the visible list (delayed cleanup or failure).
    TransferRemoved { id: Uuid },
    /// The lifetime import tally changed.
    ImportedCountChanged { imported_count: u64 },
}

/// Process-wide observable upload state.
///
/// All mutation goes through methods on this hub; background connection
/// tasks never touch the collections directly. Every mutation publishes a
/// [`TransferEvent`] so UI layers can mirror the list without polling.
pub struct TransferHub {
    transfers: RwLock<Vec<ActiveTransfer>>,
    imported_count: AtomicU64,
    event_tx: broadcast::Sender<TransferEvent>,
}

impl TransferHub {
    pub fn new() -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(256);

        Arc::new(Self {
            transfers: RwLock::new(Vec::new()),
            imported_count: AtomicU64::new(0),
            event_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.event_tx.subscribe()
    }

    /// Get a clone of the event sender for use in other components.
    pub fn event_sender(&self) -> broadcast::Sender<TransferEvent> {
        self.event_tx.clone()
    }

    fn publish(&self, event: TransferEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("No subscribers for transfer event");
        }
    }

    /// Register a new in-flight transfer once its declared size is known.
    pub fn begin_transfer(&self, display_name: Option<String>, total_bytes: u64) -> Uuid {
        let transfer = ActiveTransfer::new(display_name, total_bytes);
        let id = transfer.id;

        {
            let mut transfers = self.transfers.write();
            transfers.push(transfer.clone());
        }

        tracing::debug!(
            transfer_id = %id,
            name = %transfer.display_name,
            total_bytes,
            "Transfer registered"
        );
        self.publish(TransferEvent::TransferStarted { transfer });
        id
    }

    /// Publish a progress update for an in-flight transfer.
    pub fn update_progress(&self, id: Uuid, progress: f32) {
        let published = {
            let mut transfers = self.transfers.write();
            if let Some(t) = transfers.iter_mut().find(|t| t.id == id) {
                t.update_progress(progress);
                Some(t.progress)
            } else {
                None
            }
        };

        if let Some(progress) = published {
            self.publish(TransferEvent::TransferProgress { id, progress });
        }
    }

    /// Replace the in-flight placeholder with one terminal row per saved
    /// file and bump the lifetime import tally. Returns the terminal rows so
    /// the caller can schedule their delayed removal.
    pub fn finish_transfer(
        &self,
        id: Uuid,
        saved: Vec<(String, u64, PathBuf)>,
    ) -> Vec<ActiveTransfer> {
        let terminals: Vec<ActiveTransfer> = saved
            .into_iter()
            .map(|(name, bytes, path)| ActiveTransfer::saved(name, bytes, path))
            .collect();

        {
            let mut transfers = self.transfers.write();
            transfers.retain(|t| t.id != id);
            transfers.extend(terminals.iter().cloned());
        }
        self.publish(TransferEvent::TransferRemoved { id });

        if !terminals.is_empty() {
            let count = self
                .imported_count
                .fetch_add(terminals.len() as u64, Ordering::SeqCst)
                + terminals.len() as u64;
            tracing::info!(imported = terminals.len(), lifetime = count, "Import complete");
            for t in &terminals {
                self.publish(TransferEvent::TransferFinished {
                    transfer: t.clone(),
                });
            }
            self.publish(TransferEvent::ImportedCountChanged {
                imported_count: count,
            });
        }

        terminals
    }

    /// Drop a row immediately, without a terminal replacement.
    pub fn remove_transfer(&self, id: Uuid) {
        let removed = {
            let mut transfers = self.transfers.write();
            let len_before = transfers.len();
            transfers.retain(|t| t.id != id);
            transfers.len() < len_before
        };

        if removed {
            self.publish(TransferEvent::TransferRemoved { id });
        }
    }

    /// Schedule delayed removal of a terminal row after [`LINGER`].
    pub fn schedule_removal(self: &Arc<Self>, id: Uuid) {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(LINGER).await;
            hub.remove_transfer(id);
        });
    }

    /// Snapshot of the visible rows, in insertion order.
    pub fn active_transfers(&self) -> Vec<ActiveTransfer> {
        let transfers = self.transfers.read();
        transfers.clone()
    }

    pub fn get_transfer(&self, id: Uuid) -> Option<ActiveTransfer> {
        let transfers = self.transfers.read();
        transfers.iter().find(|t| t.id == id).cloned()
    }

    /// Lifetime count of successfully saved files.
    pub fn imported_count(&self) -> u64 {
        self.imported_count.load(Ordering::SeqCst)
    }
}
