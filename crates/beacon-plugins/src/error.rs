//! Error extraction: turns a captured exception graph into a structured
//! error record, projects non-standard exception state into extra data and
//! suppresses duplicate submissions.

use std::collections::BTreeMap;
use std::sync::Arc;

use beacon_core::{
    error_keys, CapturedException, Configuration, ErrorInfo, EventContext, EventPlugin,
    PluginError, SimpleErrorInfo, PROCESSED_MARKER,
};
use serde_json::Value;
use tracing::debug;

use crate::dedup::{fingerprint, DedupCache};

/// Standard exception members, in normalized form, never projected into the
/// extra-properties entry.
const IGNORED_PROPERTY_KEYS: &[&str] = &[
    "message",
    "stack_trace",
    "source",
    "inner_exception",
    "data",
    "h_result",
    "target_site",
    "help_link",
];

/// Normalizes a property name to snake_case.
fn to_snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (index, ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let prev_lower = index > 0 && chars[index - 1].is_lowercase();
            let next_lower = index + 1 < chars.len() && chars[index + 1].is_lowercase();
            if index > 0 && (prev_lower || next_lower) {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(*ch);
        }
    }
    result
}

/// Applies the shared extra-data policy to an error record's data map:
/// non-standard public properties become one JSON-encoded entry, and the
/// exception's auxiliary dictionary is copied entry by entry.
///
/// Both extraction strategies go through this exact code path.
pub(crate) fn populate_extra_data(
    data: &mut BTreeMap<String, Value>,
    exception: &CapturedException,
    config: &Configuration,
) {
    let mut extra = serde_json::Map::new();
    for (name, value) in &exception.properties {
        if value.is_null() {
            continue;
        }
        let key = to_snake_case(name);
        if IGNORED_PROPERTY_KEYS.contains(&key.as_str()) {
            continue;
        }
        if config.is_data_key_excluded(name) || config.is_data_key_excluded(&key) {
            continue;
        }
        extra.insert(key, value.clone());
    }
    if !extra.is_empty() {
        if let Ok(json) = serde_json::to_string(&Value::Object(extra)) {
            data.insert(
                error_keys::EXTRA_PROPERTIES.to_string(),
                Value::String(json),
            );
        }
    }

    let mut aux_guard = exception.aux();
    let Some(aux) = aux_guard.as_mut() else {
        return;
    };
    if aux.is_marked_processed() {
        return;
    }
    if !aux.kind().is_copyable() {
        // A dictionary keyed by an opaque type contributes nothing and is
        // never marked.
        return;
    }

    for (key, value) in aux.entries() {
        let Some(value) = value else {
            continue;
        };
        let Some(data_key) = key.as_data_key() else {
            continue;
        };
        if data_key == PROCESSED_MARKER {
            continue;
        }
        if config.is_data_key_excluded(&data_key) {
            continue;
        }
        data.insert(data_key, value.clone());
    }

    aux.mark_processed();
}

fn build_error_info(exception: &CapturedException, config: &Configuration) -> ErrorInfo {
    let mut error = ErrorInfo {
        type_name: exception.type_name.clone(),
        message: (!exception.message.is_empty()).then(|| exception.message.clone()),
        stack: exception.stack.clone(),
        inner: exception
            .cause
            .as_ref()
            .map(|cause| Box::new(build_error_info(cause, config))),
        data: BTreeMap::new(),
    };
    populate_extra_data(&mut error.data, exception, config);
    error
}

fn render_stack_text(exception: &CapturedException) -> Option<String> {
    if exception.stack.is_empty() {
        return None;
    }
    let lines: Vec<String> = exception
        .stack
        .iter()
        .map(|frame| {
            let mut line = format!("  at {}", frame.function);
            if let Some(file) = &frame.file_name {
                line.push_str(" (");
                line.push_str(file);
                if let Some(number) = frame.line_number {
                    line.push_str(&format!(":{}", number));
                }
                line.push(')');
            }
            line
        })
        .collect();
    Some(lines.join("\n"))
}

/// Detailed error extraction: nested inner-error chain with full stack
/// frames. Duplicate fingerprints within the session window cancel the run
/// before anything is attached.
pub struct ErrorPlugin {
    dedup: Arc<DedupCache>,
}

impl ErrorPlugin {
    pub fn new(dedup: Arc<DedupCache>) -> Self {
        Self { dedup }
    }
}

impl Default for ErrorPlugin {
    fn default() -> Self {
        Self::new(Arc::new(DedupCache::default()))
    }
}

impl EventPlugin for ErrorPlugin {
    fn run(&self, context: &mut EventContext) -> Result<(), PluginError> {
        let Some(exception) = context.context_data.exception() else {
            return Ok(());
        };

        let config = context.config().clone();
        let error = build_error_info(&exception, &config);

        if !self.dedup.mark(&fingerprint(&exception)) {
            debug!(
                type_name = %exception.type_name,
                "Suppressing duplicate error within the dedup window"
            );
            context.cancel();
            return Ok(());
        }

        context.event.set_error(error);
        Ok(())
    }
}

/// Flat error extraction: type, message and rendered stack text, with the
/// same extra-data and duplicate-suppression policy as [`ErrorPlugin`].
pub struct SimpleErrorPlugin {
    dedup: Arc<DedupCache>,
}

impl SimpleErrorPlugin {
    pub fn new(dedup: Arc<DedupCache>) -> Self {
        Self { dedup }
    }
}

impl Default for SimpleErrorPlugin {
    fn default() -> Self {
        Self::new(Arc::new(DedupCache::default()))
    }
}

impl EventPlugin for SimpleErrorPlugin {
    fn run(&self, context: &mut EventContext) -> Result<(), PluginError> {
        let Some(exception) = context.context_data.exception() else {
            return Ok(());
        };

        let config = context.config().clone();
        let mut error = SimpleErrorInfo {
            type_name: exception.type_name.clone(),
            message: (!exception.message.is_empty()).then(|| exception.message.clone()),
            stack_text: render_stack_text(&exception),
            data: BTreeMap::new(),
        };
        populate_extra_data(&mut error.data, &exception, &config);

        if !self.dedup.mark(&fingerprint(&exception)) {
            debug!(
                type_name = %exception.type_name,
                "Suppressing duplicate error within the dedup window"
            );
            context.cancel();
            return Ok(());
        }

        context.event.set_simple_error(error);
        Ok(())
    }
}
