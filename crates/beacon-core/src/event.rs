//! The event model: a single reportable occurrence plus the structured
//! payloads it can carry.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_model::{ErrorInfo, SimpleErrorInfo};

/// Well-known `data` keys for structured sub-payloads.
pub mod known_keys {
    pub const ERROR: &str = "@error";
    pub const SIMPLE_ERROR: &str = "@simple_error";
    pub const ENVIRONMENT_INFO: &str = "@environment";
    pub const REQUEST_INFO: &str = "@request";
    pub const USER_IDENTITY: &str = "@user";
}

/// Well-known tag values.
pub mod known_tags {
    pub const CRITICAL: &str = "Critical";
    pub const INTERNAL: &str = "Internal";
}

/// Discriminates what kind of occurrence an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    Error,
    Log,
    FeatureUsage,
    SessionStart,
    SessionHeartbeat,
    SessionEnd,
    NotFound,
    Custom,
}

impl EventType {
    /// True for the session lifecycle types (start, heartbeat, end).
    pub fn is_session(&self) -> bool {
        matches!(
            self,
            EventType::SessionStart | EventType::SessionHeartbeat | EventType::SessionEnd
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Error => "error",
            EventType::Log => "log",
            EventType::FeatureUsage => "feature-usage",
            EventType::SessionStart => "session-start",
            EventType::SessionHeartbeat => "session-heartbeat",
            EventType::SessionEnd => "session-end",
            EventType::NotFound => "not-found",
            EventType::Custom => "custom",
        };
        write!(f, "{}", name)
    }
}

/// The identity reported for the user an event belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            name: None,
        }
    }

    pub fn with_name(identity: Option<String>, name: impl Into<String>) -> Self {
        Self {
            identity,
            name: Some(name.into()),
        }
    }

    /// True when neither an identity value nor a display name is present.
    pub fn is_empty(&self) -> bool {
        self.identity.as_deref().map_or(true, str::is_empty)
            && self.name.as_deref().map_or(true, str::is_empty)
    }

    /// True when the identity value itself is missing or blank, regardless
    /// of a display name.
    pub fn has_identity(&self) -> bool {
        self.identity.as_deref().is_some_and(|value| !value.is_empty())
    }
}

/// HTTP request facts attached by an external collector; the pipeline only
/// reads the user agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

impl RequestInfo {
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
            ..Default::default()
        }
    }
}

/// Host environment facts attached by an external collector; opaque to the
/// pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

/// A single reportable occurrence.
///
/// Created by the caller, mutated only by plugins while a pipeline run owns
/// it, and immutable once handed to the submission queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            date: Utc::now(),
            message: None,
            source: None,
            tags: BTreeSet::new(),
            data: BTreeMap::new(),
            reference_id: None,
        }
    }

    pub fn with_message(event_type: EventType, message: impl Into<String>) -> Self {
        let mut event = Self::new(event_type);
        event.message = Some(message.into());
        event
    }

    /// Adds a tag; duplicates are collapsed.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    fn set_payload<T: Serialize>(&mut self, key: &str, payload: &T) {
        let value = serde_json::to_value(payload).unwrap_or_else(|_| serde_json::json!({}));
        self.data.insert(key.to_string(), value);
    }

    fn payload<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set_user_identity(&mut self, identity: UserIdentity) {
        self.set_payload(known_keys::USER_IDENTITY, &identity);
    }

    pub fn user_identity(&self) -> Option<UserIdentity> {
        self.payload(known_keys::USER_IDENTITY)
    }

    pub fn set_request_info(&mut self, request: RequestInfo) {
        self.set_payload(known_keys::REQUEST_INFO, &request);
    }

    pub fn request_info(&self) -> Option<RequestInfo> {
        self.payload(known_keys::REQUEST_INFO)
    }

    pub fn set_environment_info(&mut self, environment: EnvironmentInfo) {
        self.set_payload(known_keys::ENVIRONMENT_INFO, &environment);
    }

    pub fn environment_info(&self) -> Option<EnvironmentInfo> {
        self.payload(known_keys::ENVIRONMENT_INFO)
    }

    pub fn set_error(&mut self, error: ErrorInfo) {
        self.set_payload(known_keys::ERROR, &error);
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.payload(known_keys::ERROR)
    }

    pub fn set_simple_error(&mut self, error: SimpleErrorInfo) {
        self.set_payload(known_keys::SIMPLE_ERROR, &error);
    }

    pub fn simple_error(&self) -> Option<SimpleErrorInfo> {
        self.payload(known_keys::SIMPLE_ERROR)
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new(EventType::Log)
    }
}
