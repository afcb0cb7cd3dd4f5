//! Garnet core library: collector descriptors, on-disk config, errors.
//!
//! - [`types`]: newtypes and the immutable [`CollectorDescriptor`]
//! - [`error`]: [`ConfigError`]
//! - [`config`]: discover collector definitions in a config directory

pub mod config;
pub mod error;
pub mod types;

pub use config::{collectors_from_dir, load_collector};
pub use error::ConfigError;
pub use types::{CollectorConfig, CollectorDescriptor, CollectorName};
