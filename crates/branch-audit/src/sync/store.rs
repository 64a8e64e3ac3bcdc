use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::queue::QueueState;
use super::SyncError;

/// Durable backing for the queue. Every mutation is saved before it is acknowledged.
pub trait QueueStore: Send + Sync {
    fn load(&self) -> Result<QueueState, SyncError>;
    fn save(&self, state: &QueueState) -> Result<(), SyncError>;
}

#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    state: Mutex<QueueState>,
}

impl QueueStore for MemoryQueueStore {
    fn load(&self) -> Result<QueueState, SyncError> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, state: &QueueState) -> Result<(), SyncError> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state.clone();
        Ok(())
    }
}

/// Queue persisted as a JSON document on local disk.
#[derive(Debug, Clone)]
pub struct JsonFileQueueStore {
    path: PathBuf,
}

impl JsonFileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueueStore for JsonFileQueueStore {
    fn load(&self) -> Result<QueueState, SyncError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(QueueState::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, state: &QueueState) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}
