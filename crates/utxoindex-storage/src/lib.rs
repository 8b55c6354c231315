//! utxoindex-storage: pluggable `UtxoStore` backends.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "memory")]
pub use memory::InMemoryUtxoStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteUtxoStore;
