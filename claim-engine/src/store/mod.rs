//! Persistent store layer.
//!
//! - [`ClaimStore`] is the contract the engine depends on
//! - [`MemoryClaimStore`] keeps everything in memory, with fault injection
//! - [`SqliteClaimStore`] persists to a local SQLite database

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryClaimStore;
pub use sqlite::SqliteClaimStore;
pub use traits::{ClaimStore, ClaimWrite, CounterDelta, StoreError, UpsertOutcome};
