//! Configuration loader implementations

pub mod file;

pub use file::JsonFileConfigLoader;
