//! Client-wide settings shared by every pipeline run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use serde_json::Value;

use crate::matching::PatternSet;
use crate::plugin::PluginRegistry;

/// Read-mostly configuration: default enrichment values, exclusion and bot
/// patterns, and the plugin registry itself. Shared as `Arc` across
/// concurrent pipeline runs.
pub struct Configuration {
    default_tags: RwLock<BTreeSet<String>>,
    default_data: RwLock<BTreeMap<String, Value>>,
    data_exclusions: RwLock<PatternSet>,
    user_agent_bot_patterns: RwLock<PatternSet>,
    reference_ids_enabled: AtomicBool,
    plugins: PluginRegistry,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self {
            default_tags: RwLock::new(BTreeSet::new()),
            default_data: RwLock::new(BTreeMap::new()),
            data_exclusions: RwLock::new(PatternSet::new()),
            user_agent_bot_patterns: RwLock::new(PatternSet::new()),
            reference_ids_enabled: AtomicBool::new(false),
            plugins: PluginRegistry::new(),
        }
    }

    /// Tag applied to every event, once.
    pub fn add_default_tag(&self, tag: impl Into<String>) {
        self.default_tags.write().unwrap().insert(tag.into());
    }

    pub fn default_tags(&self) -> BTreeSet<String> {
        self.default_tags.read().unwrap().clone()
    }

    /// Data entry applied to every event unless the key is already present
    /// or excluded.
    pub fn add_default_data(&self, key: impl Into<String>, value: Value) {
        self.default_data.write().unwrap().insert(key.into(), value);
    }

    pub fn default_data(&self) -> BTreeMap<String, Value> {
        self.default_data.read().unwrap().clone()
    }

    /// Glob patterns filtering data keys out of default data and extracted
    /// exception properties.
    pub fn add_data_exclusions<I, S>(&self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut exclusions = self.data_exclusions.write().unwrap();
        for pattern in patterns {
            exclusions.add(pattern);
        }
    }

    pub fn is_data_key_excluded(&self, key: &str) -> bool {
        self.data_exclusions.read().unwrap().matches(key)
    }

    /// Glob patterns identifying automated traffic by user agent.
    pub fn add_user_agent_bot_patterns<I, S>(&self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut bots = self.user_agent_bot_patterns.write().unwrap();
        for pattern in patterns {
            bots.add(pattern);
        }
    }

    pub fn is_bot_user_agent(&self, user_agent: &str) -> bool {
        self.user_agent_bot_patterns
            .read()
            .unwrap()
            .matches(user_agent)
    }

    /// Turns on reference-id assignment for error events.
    pub fn enable_reference_ids(&self) {
        self.reference_ids_enabled.store(true, Ordering::Relaxed);
    }

    pub fn reference_ids_enabled(&self) -> bool {
        self.reference_ids_enabled.load(Ordering::Relaxed)
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }
}
