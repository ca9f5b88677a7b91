//! The language-neutral exception graph handed to the pipeline by capture
//! code, including the free-form auxiliary dictionary some runtimes attach
//! to exceptions.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use uuid::Uuid;

use crate::error_model::StackFrame;

/// Sentinel key written into an exception's auxiliary dictionary once its
/// entries have been copied into an error record.
pub const PROCESSED_MARKER: &str = "@beacon:processed";

/// The declared key type of an auxiliary dictionary.
///
/// Only dictionaries whose keys have a stable serializable rendering can
/// contribute entries to an error record; everything else is opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxKeyKind {
    /// String keys.
    Text,
    /// Untyped keys; individual entries decide whether they qualify.
    Any,
    Integer,
    Boolean,
    Guid,
    /// Enum variants, rendered by name.
    Enum,
    /// Plain value-structs with a stable rendering.
    Struct,
    /// Structured payloads recognized by the reporting agent itself.
    Payload,
    /// Key types with no stable rendering; never copied, never marked.
    Opaque,
}

impl AuxKeyKind {
    /// Whether a string sentinel key can be inserted into a dictionary of
    /// this kind.
    pub fn accepts_text_keys(self) -> bool {
        matches!(self, AuxKeyKind::Text | AuxKeyKind::Any)
    }

    /// Whether entries under this key kind qualify for copying at all.
    pub fn is_copyable(self) -> bool {
        !matches!(self, AuxKeyKind::Opaque)
    }
}

/// A single auxiliary-dictionary key.
#[derive(Debug, Clone, PartialEq)]
pub enum AuxKey {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Guid(Uuid),
    Enum(String),
    Struct(String),
    Payload(String),
    /// A key of a type with no stable rendering.
    Opaque,
}

impl AuxKey {
    /// Renders the key for use in an error record's data map; `None` for
    /// keys that cannot be rendered stably.
    pub fn as_data_key(&self) -> Option<String> {
        match self {
            AuxKey::Text(value) => Some(value.clone()),
            AuxKey::Integer(value) => Some(value.to_string()),
            AuxKey::Boolean(value) => Some(value.to_string()),
            AuxKey::Guid(value) => Some(value.to_string()),
            AuxKey::Enum(name) | AuxKey::Struct(name) | AuxKey::Payload(name) => {
                Some(name.clone())
            }
            AuxKey::Opaque => None,
        }
    }
}

/// The auxiliary dictionary of a captured exception.
#[derive(Debug, Clone)]
pub struct AuxData {
    kind: AuxKeyKind,
    entries: Vec<(AuxKey, Option<Value>)>,
}

impl AuxData {
    pub fn new(kind: AuxKeyKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn with_entries(kind: AuxKeyKind, entries: Vec<(AuxKey, Option<Value>)>) -> Self {
        Self { kind, entries }
    }

    pub fn kind(&self) -> AuxKeyKind {
        self.kind
    }

    pub fn push(&mut self, key: AuxKey, value: Option<Value>) {
        self.entries.push((key, value));
    }

    pub fn entries(&self) -> &[(AuxKey, Option<Value>)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_text_key(&self, key: &str) -> bool {
        self.entries
            .iter()
            .any(|(entry_key, _)| matches!(entry_key, AuxKey::Text(value) if value == key))
    }

    /// Whether a previous extraction pass already consumed this dictionary.
    pub fn is_marked_processed(&self) -> bool {
        self.contains_text_key(PROCESSED_MARKER)
    }

    /// Writes the processed sentinel when the dictionary can hold a string
    /// key; returns whether the mark was applied.
    pub fn mark_processed(&mut self) -> bool {
        if !self.kind.accepts_text_keys() {
            return false;
        }
        if !self.is_marked_processed() {
            self.entries
                .push((AuxKey::Text(PROCESSED_MARKER.to_string()), Some(Value::Bool(true))));
        }
        true
    }
}

/// A captured exception: type, message, stack, cause chain, aggregated
/// children, non-standard public properties and the auxiliary dictionary.
///
/// Instances are shared between pipeline runs through `Arc`; the auxiliary
/// dictionary sits behind a mutex so one run can mark it processed for the
/// next.
#[derive(Debug)]
pub struct CapturedException {
    pub type_name: String,
    pub message: String,
    pub stack: Vec<StackFrame>,
    pub cause: Option<Arc<CapturedException>>,
    pub aggregated: Vec<Arc<CapturedException>>,
    pub properties: BTreeMap<String, Value>,
    aux: Mutex<Option<AuxData>>,
}

impl CapturedException {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack: Vec::new(),
            cause: None,
            aggregated: Vec::new(),
            properties: BTreeMap::new(),
            aux: Mutex::new(None),
        }
    }

    /// An aggregate container holding independent child exceptions.
    pub fn aggregate(
        message: impl Into<String>,
        children: Vec<Arc<CapturedException>>,
    ) -> Self {
        let mut exception = Self::new("AggregateException", message);
        exception.aggregated = children;
        exception
    }

    pub fn with_stack(mut self, stack: Vec<StackFrame>) -> Self {
        self.stack = stack;
        self
    }

    pub fn with_cause(mut self, cause: CapturedException) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn with_aux(mut self, aux: AuxData) -> Self {
        self.aux = Mutex::new(Some(aux));
        self
    }

    pub fn is_aggregate(&self) -> bool {
        !self.aggregated.is_empty()
    }

    /// The auxiliary dictionary, when the source exception carried one.
    pub fn aux(&self) -> MutexGuard<'_, Option<AuxData>> {
        self.aux.lock().unwrap()
    }

    pub fn aux_marked_processed(&self) -> bool {
        self.aux
            .lock()
            .unwrap()
            .as_ref()
            .map_or(false, |aux| aux.is_marked_processed())
    }
}
