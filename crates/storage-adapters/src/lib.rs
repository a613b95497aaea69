//! # storage-adapters
//!
//! Implementations of the `DocumentStore` port. Only the in-memory store
//! ships here: the production deployment fronts a hosted document database
//! whose client SDK provides durability, indexing and transactions, so the
//! in-process store serves development and tests.

pub mod memory;

pub use memory::MemoryStore;
