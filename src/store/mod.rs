//! Durable storage for sender records.

pub mod libsql_backend;
pub mod memory;
mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlRepository;
pub use memory::MemoryRepository;
pub use traits::{AggregateStats, StatDeltas, UserRepository};
