//! Applies configuration-level default tags and data to every event.

use beacon_core::{EventContext, EventPlugin, PluginError};

/// Copies the configured default tags and data entries onto the event.
///
/// Idempotent: tags are a set, and a data key that is already present (or
/// excluded by pattern) is never applied.
#[derive(Default)]
pub struct ConfigurationDefaultsPlugin;

impl EventPlugin for ConfigurationDefaultsPlugin {
    fn run(&self, context: &mut EventContext) -> Result<(), PluginError> {
        let config = context.config().clone();

        for tag in config.default_tags() {
            context.event.tags.insert(tag);
        }

        for (key, value) in config.default_data() {
            if context.event.data.contains_key(&key) {
                continue;
            }
            if config.is_data_key_excluded(&key) {
                continue;
            }
            context.event.data.insert(key, value);
        }

        Ok(())
    }
}
