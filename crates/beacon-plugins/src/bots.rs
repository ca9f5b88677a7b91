//! Automated-traffic discard.

use beacon_core::{EventContext, EventPlugin, PluginError};
use tracing::debug;

/// Cancels events whose request user agent matches a configured bot
/// pattern. Events without request info pass through untouched.
#[derive(Default)]
pub struct IgnoreBotTrafficPlugin;

impl EventPlugin for IgnoreBotTrafficPlugin {
    fn run(&self, context: &mut EventContext) -> Result<(), PluginError> {
        let Some(request) = context.event.request_info() else {
            return Ok(());
        };
        let Some(user_agent) = request.user_agent else {
            return Ok(());
        };

        if context.config().is_bot_user_agent(&user_agent) {
            debug!(user_agent, "Discarding event from bot user agent");
            context.cancel();
        }
        Ok(())
    }
}
