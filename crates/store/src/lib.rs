//! Persistent store for sessions and habit metrics.
//!
//! Reads may run from any task. Mutations go through
//! [`SessionStore::run_exclusive`], which executes one scoped transaction at
//! a time on the store's own execution context.

pub mod config;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use config::*;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::*;
