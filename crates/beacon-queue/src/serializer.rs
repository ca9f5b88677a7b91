//! Converts finalized events to and from their durable representation.

use beacon_core::Event;

use crate::storage::StorageError;

/// Converts a finalized event to and from the durable text representation
/// used by queue persistence.
pub trait StorageSerializer: Send + Sync {
    fn serialize(&self, event: &Event) -> Result<String, StorageError>;
    fn deserialize(&self, payload: &str) -> Result<Event, StorageError>;
}

/// The default JSON serializer.
///
/// Round trips preserve every structured sub-payload (identity, request
/// info, environment info, error trees). Known lossy path: a value that
/// started life as an object-shaped payload and one that was a plain map
/// are indistinguishable after a round trip — both come back as maps.
#[derive(Default)]
pub struct JsonStorageSerializer;

impl StorageSerializer for JsonStorageSerializer {
    fn serialize(&self, event: &Event) -> Result<String, StorageError> {
        serde_json::to_string(event).map_err(|err| StorageError::Serialization(err.to_string()))
    }

    fn deserialize(&self, payload: &str) -> Result<Event, StorageError> {
        serde_json::from_str(payload)
            .map_err(|err| StorageError::Deserialization(err.to_string()))
    }
}
