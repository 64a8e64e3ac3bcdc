//! Offline sync queue: durable local buffer of audit writes, flushed when connectivity returns.

mod queue;
mod remote;
mod store;

pub use queue::{DrainReport, DrainStatus, QueueEntry, QueueState, SyncPayload, SyncQueue};
pub use remote::{apply_payload, RemoteWriter, ServiceWriter};
pub use store::{JsonFileQueueStore, MemoryQueueStore, QueueStore};

use crate::access::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("remote write failed: {0}")]
    Remote(String),
    #[error("remote rejected the change: {0}")]
    Rejected(String),
    #[error("queue storage failed: {0}")]
    Store(#[from] std::io::Error),
    #[error("queue file is corrupt: {0}")]
    Encoding(#[from] serde_json::Error),
}
