//! Plugin capability, keyed registrations with a lazy lifecycle, and the
//! priority-ordered registry.

use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::context::EventContext;

/// Priority assigned to registrations that don't declare one.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Errors that can occur during plugin operations
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin construction failed: {0}")]
    Construction(String),

    #[error("Plugin execution failed: {0}")]
    Execution(String),
}

/// The plugin capability: one processing entry point per event, plus an
/// optional disposal hook invoked on removal.
///
/// A plugin may read and mutate the event, write the context's side-channel
/// bag, submit new events through the context, or cancel the run.
pub trait EventPlugin: Send + Sync {
    fn run(&self, context: &mut EventContext) -> Result<(), PluginError>;

    fn dispose(&self) {}
}

/// Adapter turning a plain closure into an [`EventPlugin`]. Typed plugins
/// and inline functions are two constructors of the same interface value.
struct FnPlugin<F>(F);

impl<F> EventPlugin for FnPlugin<F>
where
    F: Fn(&mut EventContext) + Send + Sync,
{
    fn run(&self, context: &mut EventContext) -> Result<(), PluginError> {
        (self.0)(context);
        Ok(())
    }
}

type PluginFactory = Box<dyn Fn() -> Result<Arc<dyn EventPlugin>, PluginError> + Send + Sync>;

/// Lifecycle of a registration: registered (factory only), constructed
/// (single shared instance), disposed.
enum PluginState {
    Registered(PluginFactory),
    Constructed(Arc<dyn EventPlugin>),
    Disposed,
}

/// One keyed entry in the registry.
pub struct PluginRegistration {
    key: String,
    priority: i32,
    seq: u64,
    type_id: Option<TypeId>,
    state: Mutex<PluginState>,
}

impl PluginRegistration {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Materializes the plugin, constructing it on first use. A constructed
    /// instance is reused by every later run until the registration is
    /// removed.
    pub fn plugin(&self) -> Result<Arc<dyn EventPlugin>, PluginError> {
        let mut state = self.state.lock().unwrap();
        match &*state {
            PluginState::Constructed(plugin) => Ok(plugin.clone()),
            PluginState::Registered(factory) => {
                let plugin = factory()?;
                debug!(plugin = %self.key, "Constructed plugin");
                *state = PluginState::Constructed(plugin.clone());
                Ok(plugin)
            }
            PluginState::Disposed => Err(PluginError::Construction(format!(
                "plugin '{}' has been disposed",
                self.key
            ))),
        }
    }

    /// Tears the registration down; disposes the instance only if one was
    /// ever constructed.
    fn teardown(&self) {
        let previous = {
            let mut state = self.state.lock().unwrap();
            std::mem::replace(&mut *state, PluginState::Disposed)
        };
        if let PluginState::Constructed(plugin) = previous {
            debug!(plugin = %self.key, "Disposing plugin");
            plugin.dispose();
        }
    }
}

/// Ordered, keyed collection of plugin registrations.
///
/// Iteration order is ascending priority with insertion-order tie-break.
/// Re-adding an existing key replaces the entry in place, keeping its
/// original insertion sequence.
pub struct PluginRegistry {
    entries: Mutex<Vec<Arc<PluginRegistration>>>,
    next_seq: AtomicU64,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register an already-constructed plugin instance.
    pub fn add_plugin(
        &self,
        key: impl Into<String>,
        priority: i32,
        plugin: Arc<dyn EventPlugin>,
    ) {
        self.insert(key.into(), priority, None, PluginState::Constructed(plugin));
    }

    /// Register a plugin type; construction is deferred until the plugin is
    /// first needed. The key is the type name.
    pub fn add_plugin_type<T: EventPlugin + Default + 'static>(&self, priority: i32) {
        self.insert(
            std::any::type_name::<T>().to_string(),
            priority,
            Some(TypeId::of::<T>()),
            PluginState::Registered(Box::new(|| Ok(Arc::new(T::default()) as Arc<dyn EventPlugin>))),
        );
    }

    /// Register a factory; a malformed factory is only observed as a
    /// failure at first construction.
    pub fn add_plugin_factory(
        &self,
        key: impl Into<String>,
        priority: i32,
        factory: impl Fn() -> Result<Arc<dyn EventPlugin>, PluginError> + Send + Sync + 'static,
    ) {
        self.insert(
            key.into(),
            priority,
            None,
            PluginState::Registered(Box::new(factory)),
        );
    }

    /// Register an inline function plugin.
    pub fn add_plugin_fn(
        &self,
        key: impl Into<String>,
        priority: i32,
        plugin: impl Fn(&mut EventContext) + Send + Sync + 'static,
    ) {
        self.add_plugin(key, priority, Arc::new(FnPlugin(plugin)));
    }

    fn insert(&self, key: String, priority: i32, type_id: Option<TypeId>, state: PluginState) {
        let replaced = {
            let mut entries = self.entries.lock().unwrap();
            if let Some(existing) = entries.iter_mut().find(|entry| entry.key == key) {
                let replaced = existing.clone();
                // Overwrite in place, keeping the original insertion
                // sequence so an unchanged priority keeps its position.
                *existing = Arc::new(PluginRegistration {
                    key,
                    priority,
                    seq: replaced.seq,
                    type_id,
                    state: Mutex::new(state),
                });
                Some(replaced)
            } else {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                entries.push(Arc::new(PluginRegistration {
                    key,
                    priority,
                    seq,
                    type_id,
                    state: Mutex::new(state),
                }));
                None
            }
        };
        if let Some(registration) = replaced {
            registration.teardown();
        }
    }

    /// Remove a registration by key; a constructed instance is disposed
    /// synchronously, a never-constructed one is not constructed.
    pub fn remove(&self, key: &str) -> bool {
        let removed = {
            let mut entries = self.entries.lock().unwrap();
            match entries.iter().position(|entry| entry.key == key) {
                Some(index) => Some(entries.remove(index)),
                None => None,
            }
        };
        match removed {
            Some(registration) => {
                registration.teardown();
                true
            }
            None => false,
        }
    }

    /// Remove every registration added for the given plugin type.
    pub fn remove_by_type<T: EventPlugin + 'static>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        let removed: Vec<_> = {
            let mut entries = self.entries.lock().unwrap();
            let mut removed = Vec::new();
            entries.retain(|entry| {
                if entry.type_id == Some(type_id) {
                    removed.push(entry.clone());
                    false
                } else {
                    true
                }
            });
            removed
        };
        let found = !removed.is_empty();
        for registration in removed {
            registration.teardown();
        }
        found
    }

    /// Remove all registrations, disposing any constructed instances.
    pub fn clear(&self) {
        let removed: Vec<_> = {
            let mut entries = self.entries.lock().unwrap();
            entries.drain(..).collect()
        };
        for registration in removed {
            registration.teardown();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.sorted()
            .iter()
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Snapshot of the registrations in execution order.
    pub fn sorted(&self) -> Vec<Arc<PluginRegistration>> {
        let mut entries = self.entries.lock().unwrap().clone();
        entries.sort_by_key(|entry| (entry.priority, entry.seq));
        entries
    }
}
