//! Reference-id assignment for error events.

use beacon_core::{EventContext, EventPlugin, EventType, PluginError};
use uuid::Uuid;

/// Assigns a fresh unique reference id to error events that lack one.
/// Inert until reference ids are enabled on the configuration.
#[derive(Default)]
pub struct ReferenceIdPlugin;

impl EventPlugin for ReferenceIdPlugin {
    fn run(&self, context: &mut EventContext) -> Result<(), PluginError> {
        if !context.config().reference_ids_enabled() {
            return Ok(());
        }
        if context.event.event_type != EventType::Error || context.event.reference_id.is_some() {
            return Ok(());
        }

        context.event.reference_id = Some(Uuid::new_v4().simple().to_string());
        Ok(())
    }
}
