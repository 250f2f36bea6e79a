//! Utility implementations: in-memory storage and audit adapters

pub mod memory_storage;

pub use memory_storage::{MemoryAuditSink, MemoryMovementStore, MemoryStatementItemStore};
