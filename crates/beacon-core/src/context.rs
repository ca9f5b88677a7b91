//! Per-run pipeline state: the event under processing, the cancellation
//! flag and the type-keyed side-channel bag.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Configuration;
use crate::event::Event;
use crate::exception::CapturedException;

/// Type-keyed bag used to pass intermediate values (most importantly the
/// captured exception) between plugins without touching the event's public
/// data.
#[derive(Default)]
pub struct ContextData {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ContextData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Send + Sync + 'static>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn set_exception(&mut self, exception: Arc<CapturedException>) {
        self.set::<Arc<CapturedException>>(exception);
    }

    pub fn exception(&self) -> Option<Arc<CapturedException>> {
        self.get::<Arc<CapturedException>>().cloned()
    }

    pub fn has_exception(&self) -> bool {
        self.contains::<Arc<CapturedException>>()
    }
}

/// Queues fresh events into the owning client's pipeline. The only write
/// access plugins have to the client.
pub trait EventSubmitter: Send + Sync {
    fn submit(&self, event: Event, context_data: ContextData);
}

/// Submitter that drops everything; standalone contexts without a client
/// use it.
pub struct NullSubmitter;

impl EventSubmitter for NullSubmitter {
    fn submit(&self, _event: Event, _context_data: ContextData) {}
}

/// Mutable state shared by all plugin invocations of a single pipeline run.
/// Never reused across runs.
pub struct EventContext {
    pub event: Event,
    pub context_data: ContextData,
    cancelled: bool,
    config: Arc<Configuration>,
    submitter: Arc<dyn EventSubmitter>,
}

impl EventContext {
    pub fn new(config: Arc<Configuration>, event: Event) -> Self {
        Self::with_submitter(config, Arc::new(NullSubmitter), event, ContextData::new())
    }

    pub fn with_submitter(
        config: Arc<Configuration>,
        submitter: Arc<dyn EventSubmitter>,
        event: Event,
        context_data: ContextData,
    ) -> Self {
        Self {
            event,
            context_data,
            cancelled: false,
            config,
            submitter,
        }
    }

    /// Stops the run: remaining plugins are skipped and the event is never
    /// queued. Monotonic; there is no way to un-cancel.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn config(&self) -> &Arc<Configuration> {
        &self.config
    }

    pub fn submitter(&self) -> Arc<dyn EventSubmitter> {
        self.submitter.clone()
    }
}
