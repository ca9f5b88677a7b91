//! Structured error records produced by the error-extraction plugins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known keys inside an error record's `data` map.
pub mod error_keys {
    /// A single JSON-encoded string holding all non-standard exception
    /// properties.
    pub const EXTRA_PROPERTIES: &str = "@ext";
}

/// One frame of a captured stack trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

impl StackFrame {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            ..Default::default()
        }
    }

    pub fn at(function: impl Into<String>, file_name: impl Into<String>, line_number: u32) -> Self {
        Self {
            module: None,
            function: function.into(),
            file_name: Some(file_name.into()),
            line_number: Some(line_number),
        }
    }
}

/// The detailed error record: full stack frames and the nested inner-error
/// chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<StackFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<ErrorInfo>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

impl ErrorInfo {
    /// The frame closest to the failure, when any stack was captured.
    pub fn target_frame(&self) -> Option<&StackFrame> {
        self.stack.first()
    }

    /// Number of errors in the chain, the outermost included.
    pub fn chain_len(&self) -> usize {
        1 + self.inner.as_ref().map_or(0, |inner| inner.chain_len())
    }
}

/// The flat error record: type, message and rendered stack text only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleErrorInfo {
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_text: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}
