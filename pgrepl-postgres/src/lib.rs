//! Postgres plumbing for the postgresreplication provider.
//!
//! Opens the single-use connections every resource operation runs on, validates the
//! identifiers interpolated into SQL, and wraps the catalog queries and functions used
//! to manage logical replication slots and table replica identities.

pub mod connection;
pub mod identifier;
pub mod replication;
#[cfg(feature = "test-utils")]
pub mod tokio;
