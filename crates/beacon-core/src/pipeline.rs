//! Sequential execution of registered plugins against one event context.

use tracing::{debug, error};

use crate::context::EventContext;

/// Runs every registered plugin against a context in priority order.
///
/// Failures are isolated per plugin: a construction failure skips that
/// plugin, an execution failure is logged and the run continues. After
/// every plugin the cancellation flag is checked; once set, no further
/// plugin runs and the event must not be queued.
pub struct EventPipeline;

impl EventPipeline {
    pub fn run(context: &mut EventContext) {
        if context.is_cancelled() {
            return;
        }

        let registrations = context.config().plugins().sorted();
        for registration in registrations {
            let plugin = match registration.plugin() {
                Ok(plugin) => plugin,
                Err(err) => {
                    error!(plugin = registration.key(), "Failed to construct plugin: {}", err);
                    continue;
                }
            };

            if let Err(err) = plugin.run(context) {
                error!(plugin = registration.key(), "Plugin failed: {}", err);
            }

            if context.is_cancelled() {
                debug!(
                    plugin = registration.key(),
                    event_type = %context.event.event_type,
                    "Event processing cancelled"
                );
                break;
            }
        }
    }
}
