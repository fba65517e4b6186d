//! Configuration management for the postgresreplication provider.
//!
//! Provides environment detection, configuration loading from YAML files and
//! environment variables, secret handling, and the provider configuration shared
//! by every resource operation.

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::*;
pub use load::*;
pub use secret::*;
