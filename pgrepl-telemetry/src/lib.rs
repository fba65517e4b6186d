//! Telemetry for the postgresreplication provider.
//!
//! Sets up structured logging through [`tracing`]: JSON to rotating files in production and
//! pretty output on stderr during development.

pub mod tracing;
