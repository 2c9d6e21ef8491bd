//! State and history store adapter implementations for formflow.

pub mod file_store;
pub mod memory_store;
pub mod trim;

pub use file_store::FileStore;
pub use memory_store::{MemoryHistoryStore, MemoryStateStore};
pub use trim::KeepLastTrimmer;
