//! Impls - port implementations for development and tests
//!
//! # Included
//! - **InMemoryCatalog**: every catalog manager port over in-process maps
//!
//! Production managers live with the storage they talk to, outside this
//! crate.

pub mod memory_catalog;

pub use self::memory_catalog::InMemoryCatalog;
