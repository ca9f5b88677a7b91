//! Default user-identity attachment.

use beacon_core::{EventContext, EventPlugin, PluginError, UserIdentity};

/// Attaches the local machine account as the event's identity when no
/// identity of any kind has been set. An existing identity — even one that
/// only carries a display name — is never overwritten.
#[derive(Default)]
pub struct SetLocalIdentityPlugin;

fn local_username() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
}

impl EventPlugin for SetLocalIdentityPlugin {
    fn run(&self, context: &mut EventContext) -> Result<(), PluginError> {
        if context.event.user_identity().is_some() {
            return Ok(());
        }

        if let Some(username) = local_username() {
            context.event.set_user_identity(UserIdentity::new(username));
        }
        Ok(())
    }
}
