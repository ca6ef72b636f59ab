// # ddns-core
//
// Core library for the multi-host DDNS reconciler.
//
// ## Architecture Overview
//
// This library keeps one DNS name pointed at this host's public address while
// other hosts share the same name:
// - **AddressResolver**: Trait for discovering the public address
// - **RecordStore**: Trait for listing, creating and updating provider records
// - **ConfigLoader**: Trait for loading and saving operator configuration
// - **Reconciler**: One confirm-then-mutate-then-verify cycle
// - **Scheduler**: Drives cycles on a tick, with reload and shutdown hooks
//
// ## Design Principles
//
// 1. **Confirm before mutating**: a change is acted on only after two agreeing observations
// 2. **Own record only**: a record is updated only if it holds this host's previous address
// 3. **Verify before recording**: session state follows what the provider shows
// 4. **Library-First**: the daemon is a thin wrapper around this crate

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;
pub mod record;
pub mod session;
pub mod loader;

// Re-export core types for convenience
pub use traits::{
    AddressResolver, AddressResolverFactory, ConfigLoader, IpVersion, RecordStore,
    RecordStoreFactory,
};
pub use engine::{CycleOutcome, EngineEvent, Reconciler, Scheduler, SchedulerHandle};
pub use config::{Configuration, EngineConfig};
pub use error::{ApiError, ApiErrorDetail, Error, Result};
pub use record::{AddressRecord, ObservedAddress, RecordType};
pub use session::SessionState;
pub use loader::JsonFileConfigLoader;
