//! Helpers shared by the unit and integration tests of the provider.
//!
//! Tests touching the database expect a local Postgres with `wal_level=logical`.

pub mod database;
