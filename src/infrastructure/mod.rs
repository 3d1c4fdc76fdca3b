//! Storage adapters implementing the ledger ports.

pub mod in_memory;
mod preconditions;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
