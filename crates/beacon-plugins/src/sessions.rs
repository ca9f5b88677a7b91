//! Session-event hygiene.

use beacon_core::{EventContext, EventPlugin, PluginError};
use tracing::debug;

/// Cancels session lifecycle events (start, heartbeat, end) that carry no
/// user identity value; sessions cannot be correlated without one.
/// Non-session events are never touched.
#[derive(Default)]
pub struct DiscardSessionsWithoutIdentityPlugin;

impl EventPlugin for DiscardSessionsWithoutIdentityPlugin {
    fn run(&self, context: &mut EventContext) -> Result<(), PluginError> {
        if !context.event.event_type.is_session() {
            return Ok(());
        }

        let has_identity = context
            .event
            .user_identity()
            .map_or(false, |identity| identity.has_identity());
        if !has_identity {
            debug!(
                event_type = %context.event.event_type,
                "Discarding session event without a user identity"
            );
            context.cancel();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{Configuration, Event, EventType, UserIdentity};
    use std::sync::Arc;

    fn run_case(event_type: EventType, identity: Option<&str>) -> bool {
        let mut event = Event::new(event_type);
        if let Some(identity) = identity {
            event.set_user_identity(UserIdentity::new(identity));
        }
        let mut context = EventContext::new(Arc::new(Configuration::new()), event);
        DiscardSessionsWithoutIdentityPlugin
            .run(&mut context)
            .unwrap();
        context.is_cancelled()
    }

    #[test]
    fn cancellation_matrix() {
        let cases = [
            (EventType::Error, None, false),
            (EventType::FeatureUsage, None, false),
            (EventType::Log, None, false),
            (EventType::NotFound, None, false),
            (EventType::SessionStart, None, true),
            (EventType::SessionStart, Some("123456789"), false),
            (EventType::SessionEnd, None, true),
            (EventType::SessionEnd, Some("123456789"), false),
            (EventType::SessionHeartbeat, None, true),
            (EventType::SessionHeartbeat, Some("123456789"), false),
        ];

        for (event_type, identity, cancelled) in cases {
            assert_eq!(
                run_case(event_type, identity),
                cancelled,
                "type {:?} identity {:?}",
                event_type,
                identity
            );
        }
    }

    #[test]
    fn display_name_alone_is_not_an_identity() {
        let mut event = Event::new(EventType::SessionStart);
        event.set_user_identity(UserIdentity::with_name(None, "Blake"));
        let mut context = EventContext::new(Arc::new(Configuration::new()), event);
        DiscardSessionsWithoutIdentityPlugin
            .run(&mut context)
            .unwrap();
        assert!(context.is_cancelled());
    }
}
