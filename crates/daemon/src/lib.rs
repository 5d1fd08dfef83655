//! jobrelay daemon - composition root
//!
//! Hosts embed the dispatch core by building a [`ProviderRegistry`], loading
//! a [`DaemonConfig`] and calling [`Daemon::start`].
//!
//! [`ProviderRegistry`]: jobrelay_core::provider::ProviderRegistry

pub mod config;
mod daemon;
pub mod logging;

pub use config::{ConfigError, DaemonConfig, LogFormat};
pub use daemon::{Daemon, DaemonHandle};
pub use logging::init_logging;
