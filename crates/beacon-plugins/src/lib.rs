//! Built-in event plugins: enrichment defaults, environment and identity
//! attachment, bot and session filtering, error extraction with duplicate
//! suppression, and aggregate-exception splitting.

pub mod aggregate;
pub mod bots;
pub mod dedup;
pub mod defaults;
pub mod environment;
pub mod error;
pub mod identity;
pub mod reference_id;
pub mod sessions;

/// Pipeline priorities of the built-in plugins. Lower runs first.
pub mod priority {
    /// Aggregates must be split before error extraction sees them.
    pub const AGGREGATE: i32 = 10;
    pub const CONFIGURATION_DEFAULTS: i32 = 20;
    pub const ERROR: i32 = 30;
    pub const ENVIRONMENT: i32 = 50;
    pub const IDENTITY: i32 = 60;
    pub const BOT_DISCARD: i32 = 70;
    pub const SESSION_DISCARD: i32 = 80;
    pub const REFERENCE_ID: i32 = 90;
}

pub use aggregate::SplitAggregateExceptionsPlugin;
pub use bots::IgnoreBotTrafficPlugin;
pub use dedup::{fingerprint, DedupCache};
pub use defaults::ConfigurationDefaultsPlugin;
pub use environment::{EnvironmentCollector, EnvironmentInfoPlugin, LocalEnvironmentCollector};
pub use error::{ErrorPlugin, SimpleErrorPlugin};
pub use identity::SetLocalIdentityPlugin;
pub use reference_id::ReferenceIdPlugin;
pub use sessions::DiscardSessionsWithoutIdentityPlugin;
