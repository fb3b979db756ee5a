//! Fact storage: the [`DataSource`] contract and its backends.
//!
//! - [`InMemoryDataSource`]: the reference backend
//! - [`ReplicatedDataSource`]: fans writes out to mirrors
//! - `persistent::PersistentDataSource`: WAL-backed files (`persistent` feature)

mod index;
mod memory;
mod replicated;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use index::FactIndex;
pub use memory::InMemoryDataSource;
pub use replicated::ReplicatedDataSource;
pub use traits::{DataSource, StorageError};
