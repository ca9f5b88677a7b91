//! Core event model, plugin pipeline and configuration surface shared
//! across all Beacon crates.

pub mod config;
pub mod context;
pub mod error_model;
pub mod event;
pub mod exception;
pub mod matching;
pub mod pipeline;
pub mod plugin;

// Re-export commonly used types
pub use config::Configuration;
pub use context::{ContextData, EventContext, EventSubmitter, NullSubmitter};
pub use error_model::{error_keys, ErrorInfo, SimpleErrorInfo, StackFrame};
pub use event::{
    known_keys, known_tags, EnvironmentInfo, Event, EventType, RequestInfo, UserIdentity,
};
pub use exception::{AuxData, AuxKey, AuxKeyKind, CapturedException, PROCESSED_MARKER};
pub use matching::PatternSet;
pub use pipeline::EventPipeline;
pub use plugin::{EventPlugin, PluginError, PluginRegistration, PluginRegistry, DEFAULT_PRIORITY};

// Re-export external dependencies
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tracing;
pub use uuid;
