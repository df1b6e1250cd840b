//! Geodrop Persistence - Document store and shared low-latency store

pub mod kv;
pub mod sqlite;

pub use kv::{MemoryKv, SharedStore};
pub use sqlite::Database;
