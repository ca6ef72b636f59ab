//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressResolver`]: Discover the host's public address
//! - [`RecordStore`]: List, create and update records via a provider API
//! - [`ConfigLoader`]: Load and save operator configuration

pub mod address_resolver;
pub mod record_store;
pub mod config_loader;

pub use address_resolver::{AddressResolver, AddressResolverFactory, IpVersion};
pub use record_store::{RecordStore, RecordStoreFactory};
pub use config_loader::ConfigLoader;
