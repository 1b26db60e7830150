//! Database abstraction layer
//!
//! This module provides the SQL executor interface, the per-engine dialects,
//! column introspection and the `sqlx` backed connections.

pub mod columns;
pub mod dialect;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(test)]
pub(crate) mod testing;

// Re-export the main trait
pub use columns::{Column, Columns};
pub use dialect::{Dialect, Driver};
pub use traits::{Connection, DatabaseError, ExecResult, Row};
