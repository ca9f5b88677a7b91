//! Durable submission queue between the event pipeline and the remote
//! collector: storage serialization, spool stores, the submission-client
//! contract and the retrying drain loop.

pub mod client;
pub mod queue;
pub mod serializer;
pub mod storage;

pub use client::{InMemorySubmissionClient, SubmissionClient, SubmissionResponse};
pub use queue::{
    QueueError, SubmissionQueue, DEFAULT_BATCH_SIZE, DEFAULT_MAX_ITEMS, DEFAULT_WORKER_INTERVAL,
};
pub use serializer::{JsonStorageSerializer, StorageSerializer};
pub use storage::{EventStorage, FileStorage, InMemoryStorage, StorageError, StoredEvent};
