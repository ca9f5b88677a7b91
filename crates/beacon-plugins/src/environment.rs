//! Attaches a snapshot of the host environment to events.

use std::sync::Arc;

use beacon_core::{known_keys, EnvironmentInfo, EventContext, EventPlugin, PluginError};
use once_cell::sync::OnceCell;

/// Collects the host environment snapshot. Implementations must be safe to
/// call from concurrent pipeline runs.
pub trait EnvironmentCollector: Send + Sync {
    fn collect(&self) -> EnvironmentInfo;
}

/// Collector backed by what the standard library exposes about the host.
#[derive(Default)]
pub struct LocalEnvironmentCollector;

impl EnvironmentCollector for LocalEnvironmentCollector {
    fn collect(&self) -> EnvironmentInfo {
        EnvironmentInfo {
            os_name: Some(std::env::consts::OS.to_string()),
            architecture: Some(std::env::consts::ARCH.to_string()),
            processor_count: std::thread::available_parallelism()
                .ok()
                .map(|count| count.get() as u32),
            machine_name: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("COMPUTERNAME"))
                .ok()
                .filter(|name| !name.is_empty()),
            ..Default::default()
        }
    }
}

/// Attaches the environment snapshot under its well-known data key.
///
/// The snapshot is collected once and reused; the plugin holds no other
/// mutable state, so any number of contexts may run it concurrently.
pub struct EnvironmentInfoPlugin {
    collector: Arc<dyn EnvironmentCollector>,
    snapshot: OnceCell<EnvironmentInfo>,
}

impl Default for EnvironmentInfoPlugin {
    fn default() -> Self {
        Self::new(Arc::new(LocalEnvironmentCollector))
    }
}

impl EnvironmentInfoPlugin {
    pub fn new(collector: Arc<dyn EnvironmentCollector>) -> Self {
        Self {
            collector,
            snapshot: OnceCell::new(),
        }
    }
}

impl EventPlugin for EnvironmentInfoPlugin {
    fn run(&self, context: &mut EventContext) -> Result<(), PluginError> {
        if context.event.data.contains_key(known_keys::ENVIRONMENT_INFO) {
            return Ok(());
        }

        let info = self
            .snapshot
            .get_or_init(|| self.collector.collect())
            .clone();
        context.event.set_environment_info(info);
        Ok(())
    }
}
