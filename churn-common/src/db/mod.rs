//! Database initialization and access helpers

pub mod init;
pub mod retry;

pub use init::{init_database, init_memory_database};
pub use retry::retry_on_lock;
