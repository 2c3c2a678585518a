//! Adapters for the domain ports: stores, clocks and alert sinks.

pub mod alerts;
pub mod clock;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
