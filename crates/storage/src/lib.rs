//! Route persistence: SQLite-backed store plus an in-memory fallback.

pub mod memory;
pub mod sqlite;

pub use {memory::MemoryRouteStore, sqlite::SqliteRouteStore};
