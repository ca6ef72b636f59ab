// # Configuration Loader Trait
//
// Defines where the operator's configuration comes from.
//
// ## Purpose
//
// The scheduler reads configuration once at startup and again on every
// reload request. It never writes configuration; `save` exists for tooling
// that persists operator input.
//
// ## Implementations
//
// - JSON file: [`JsonFileConfigLoader`](crate::loader::JsonFileConfigLoader)
// - The daemon layers environment variables on top of the file

use async_trait::async_trait;

use crate::config::Configuration;

/// Trait for configuration loader implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O against its own backing store
///
/// ## Forbidden Capabilities
/// - ❌ Validate on behalf of the engine (the engine validates what it loads)
/// - ❌ Log credentials
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// Load the current configuration
    ///
    /// An absent backing store yields a default (empty) configuration;
    /// only unreadable or malformed storage is an error.
    async fn load(&self) -> Result<Configuration, crate::Error>;

    /// Persist a configuration
    async fn save(&self, config: &Configuration) -> Result<(), crate::Error>;
}
