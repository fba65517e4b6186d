//! Provider plugin managing PostgreSQL logical replication primitives.
//!
//! Two resource types are exposed: `postgresreplication_slot`, a logical replication
//! slot bound to an output plugin and a database, and `postgresreplication_replica_identity`,
//! which sets the replica identity of a table to `FULL`. The [`provider::Provider`] is the
//! entry point a host uses to describe, configure and drive them.

pub mod error;
mod macros;
pub mod provider;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod state;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
