//! Thin synchronous access layer over a single SQLite database file.
//!
//! # Intention
//!
//! - Provide a small convenience surface (`read`, `read_one`, `write`,
//!   `write_many`) over one `rusqlite` connection.
//! - Leave everything hard (planning, locking, journaling, storage) to
//!   SQLite itself.
//!
//! # Architectural Boundaries
//!
//! - Only database access code belongs here.
//! - No schema management, pooling, caching, or business logic.

pub mod error;
pub mod sqlite;

pub use error::Error;
pub use sqlite::{DbAccess, DbConfig, Row, Value};
