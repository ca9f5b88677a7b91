//! Durable stores backing the submission queue.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use beacon_core::Event;
use thiserror::Error;
use tracing::{debug, warn};

use crate::serializer::StorageSerializer;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to serialize event: {0}")]
    Serialization(String),

    #[error("Failed to deserialize event: {0}")]
    Deserialization(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One persisted queue entry.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: u64,
    pub event: Event,
}

/// Durable store for accepted events awaiting delivery. Entries drain in
/// the order they were saved.
pub trait EventStorage: Send + Sync {
    fn save(&self, event: &Event) -> Result<u64, StorageError>;
    fn load_batch(&self, limit: usize) -> Result<Vec<StoredEvent>, StorageError>;
    fn remove(&self, id: u64) -> Result<(), StorageError>;
    fn count(&self) -> usize;
    fn clear(&self) -> Result<(), StorageError>;
}

/// Volatile store; useful for tests and fire-and-forget configurations.
#[derive(Default)]
pub struct InMemoryStorage {
    entries: Mutex<BTreeMap<u64, Event>>,
    next_id: AtomicU64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStorage for InMemoryStorage {
    fn save(&self, event: &Event) -> Result<u64, StorageError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().unwrap().insert(id, event.clone());
        Ok(id)
    }

    fn load_batch(&self, limit: usize) -> Result<Vec<StoredEvent>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .map(|(id, event)| StoredEvent {
                id: *id,
                event: event.clone(),
            })
            .collect())
    }

    fn remove(&self, id: u64) -> Result<(), StorageError> {
        self.entries.lock().unwrap().remove(&id);
        Ok(())
    }

    fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

/// File-backed store: one file per event under a spool directory, named by
/// a zero-padded sequence number so directory order is drain order.
/// Survives process restart.
pub struct FileStorage {
    directory: PathBuf,
    serializer: Arc<dyn StorageSerializer>,
    next_id: AtomicU64,
}

impl FileStorage {
    pub fn new(
        directory: impl AsRef<Path>,
        serializer: Arc<dyn StorageSerializer>,
    ) -> Result<Self, StorageError> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;

        // Resume the sequence after whatever a previous process left behind.
        let mut max_id = 0u64;
        for path in Self::entry_paths(&directory)? {
            if let Some(id) = Self::id_from_path(&path) {
                max_id = max_id.max(id + 1);
            }
        }

        Ok(Self {
            directory,
            serializer,
            next_id: AtomicU64::new(max_id),
        })
    }

    fn entry_paths(directory: &Path) -> Result<Vec<PathBuf>, StorageError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(directory)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn id_from_path(path: &Path) -> Option<u64> {
        path.file_stem()?.to_str()?.parse().ok()
    }

    fn path_for(&self, id: u64) -> PathBuf {
        self.directory.join(format!("{:020}.json", id))
    }
}

impl EventStorage for FileStorage {
    fn save(&self, event: &Event) -> Result<u64, StorageError> {
        let payload = self.serializer.serialize(event)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        std::fs::write(self.path_for(id), payload)?;
        debug!(id, "Persisted event to spool directory");
        Ok(id)
    }

    fn load_batch(&self, limit: usize) -> Result<Vec<StoredEvent>, StorageError> {
        let mut batch = Vec::new();
        for path in Self::entry_paths(&self.directory)? {
            if batch.len() == limit {
                break;
            }
            let Some(id) = Self::id_from_path(&path) else {
                continue;
            };
            let payload = match std::fs::read_to_string(&path) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(?path, "Failed to read spooled event: {}", err);
                    continue;
                }
            };
            match self.serializer.deserialize(&payload) {
                Ok(event) => batch.push(StoredEvent { id, event }),
                Err(err) => {
                    // A poison entry would block the queue forever; drop it.
                    warn!(?path, "Discarding unreadable spooled event: {}", err);
                    let _ = std::fs::remove_file(&path);
                }
            }
        }
        Ok(batch)
    }

    fn remove(&self, id: u64) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn count(&self) -> usize {
        Self::entry_paths(&self.directory)
            .map(|paths| paths.len())
            .unwrap_or(0)
    }

    fn clear(&self) -> Result<(), StorageError> {
        for path in Self::entry_paths(&self.directory)? {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::JsonStorageSerializer;
    use beacon_core::EventType;

    fn event(message: &str) -> Event {
        Event::with_message(EventType::Log, message)
    }

    #[test]
    fn in_memory_storage_drains_in_save_order() {
        let storage = InMemoryStorage::new();
        storage.save(&event("one")).unwrap();
        storage.save(&event("two")).unwrap();
        storage.save(&event("three")).unwrap();

        let batch = storage.load_batch(2).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].event.message.as_deref(), Some("one"));
        assert_eq!(batch[1].event.message.as_deref(), Some("two"));

        storage.remove(batch[0].id).unwrap();
        assert_eq!(storage.count(), 2);
    }

    #[test]
    fn file_storage_round_trips_events() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), Arc::new(JsonStorageSerializer)).unwrap();

        let id = storage.save(&event("persisted")).unwrap();
        let batch = storage.load_batch(10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, id);
        assert_eq!(batch[0].event.message.as_deref(), Some("persisted"));

        storage.remove(id).unwrap();
        assert_eq!(storage.count(), 0);
    }

    #[test]
    fn file_storage_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage =
                FileStorage::new(dir.path(), Arc::new(JsonStorageSerializer)).unwrap();
            storage.save(&event("before restart")).unwrap();
        }

        let storage = FileStorage::new(dir.path(), Arc::new(JsonStorageSerializer)).unwrap();
        assert_eq!(storage.count(), 1);
        let batch = storage.load_batch(10).unwrap();
        assert_eq!(batch[0].event.message.as_deref(), Some("before restart"));

        // New ids keep increasing past what the previous process used.
        let id = storage.save(&event("after restart")).unwrap();
        assert!(id > batch[0].id);
    }

    #[test]
    fn poison_entries_are_discarded_not_returned() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), Arc::new(JsonStorageSerializer)).unwrap();
        storage.save(&event("good")).unwrap();
        std::fs::write(dir.path().join("00000000000000000099.json"), "not json").unwrap();

        let batch = storage.load_batch(10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].event.message.as_deref(), Some("good"));
        // The poison file is gone.
        assert_eq!(storage.count(), 1);
    }

    #[test]
    fn removing_a_missing_entry_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), Arc::new(JsonStorageSerializer)).unwrap();
        assert!(storage.remove(12345).is_ok());
    }
}
