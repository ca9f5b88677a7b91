//! Aggregate-exception handling: transparent unwrap of single-child
//! containers, fan-out of multi-child ones.

use beacon_core::{ContextData, Event, EventContext, EventPlugin, EventType, PluginError};
use tracing::debug;

/// Handles captured aggregate exceptions.
///
/// A container with exactly one child is unwrapped in place so later
/// plugins see the child directly. A container with two or more children
/// cancels the current context and submits one fresh error event per child
/// through the context's submitter, each taking its own full pipeline pass.
#[derive(Default)]
pub struct SplitAggregateExceptionsPlugin;

impl EventPlugin for SplitAggregateExceptionsPlugin {
    fn run(&self, context: &mut EventContext) -> Result<(), PluginError> {
        let Some(exception) = context.context_data.exception() else {
            return Ok(());
        };
        if !exception.is_aggregate() {
            return Ok(());
        }

        if exception.aggregated.len() == 1 {
            context
                .context_data
                .set_exception(exception.aggregated[0].clone());
            return Ok(());
        }

        debug!(
            children = exception.aggregated.len(),
            "Splitting aggregate exception into independent events"
        );
        context.cancel();

        let submitter = context.submitter();
        for child in &exception.aggregated {
            let mut context_data = ContextData::new();
            context_data.set_exception(child.clone());
            submitter.submit(Event::new(EventType::Error), context_data);
        }
        Ok(())
    }
}
