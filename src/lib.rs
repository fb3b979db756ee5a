//! # itemdrive - a minimal entity–attribute–value fact store
//!
//! Data is stored as facts: typed attribute values of logical items. An
//! item is never stored directly; it is the set of facts sharing an item
//! identifier, assembled on read.
//!
//! ## Core Concepts
//!
//! - **Value / TypedValue**: a declared type plus one or more values, with a
//!   numerical projection for `number`, `boolean` and `date_time`
//! - **Fact**: a typed value with identity, attribute name, timestamp and a
//!   discard flag
//! - **FactQuery**: identity and attribute predicates evaluated by
//!   [`check_fact`] / [`check_item`]
//! - **DataSource**: the storage contract shared by every backend
//! - **ItemDrive**: composes items from facts on top of a data source
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use itemdrive::{AttributeQuery, FactQuery, InMemoryDataSource, ItemDrive, PartialFact, PartialItem, ValueType};
//!
//! let drive = ItemDrive::new(Arc::new(InMemoryDataSource::new()));
//! drive.insert_item(
//!     PartialItem::new()
//!         .item_type("person")
//!         .attribute(PartialFact::new().attribute("name").value(["Ethan"]))
//!         .attribute(PartialFact::new().attribute("age").value_type(ValueType::Number).numerical_value([30.0])),
//! )?;
//!
//! let adults = drive.fetch_items(&FactQuery::new().attribute(AttributeQuery::new("age").at_or_above(18.0)))?;
//! assert_eq!(adults.len(), 1);
//! # Ok::<(), itemdrive::DriveError>(())
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod drive;
pub mod error;
pub mod fact;
pub mod ids;
pub mod item;
pub mod logging;
pub mod query;
pub mod storage;
pub mod time;
pub mod typed_value;
pub mod value;

// Re-export primary types at crate root for convenience
pub use config::DriveConfig;
pub use drive::ItemDrive;
pub use error::{DriveError, DriveResult, ValidationError};
pub use fact::{make_fact, make_fact_at, Fact, FactFactory, PartialFact, DEFAULT_ITEM_TYPE};
pub use ids::{FactId, IdGenerator, ItemId, TimeOrderedIds};
pub use item::{facts_from, Item, PartialItem};
pub use query::{check_fact, check_item, AttributeQuery, FactQuery, QueryMode};
pub use storage::{DataSource, FactIndex, InMemoryDataSource, ReplicatedDataSource, StorageError};
pub use time::{Clock, FixedClock, SystemClock};
pub use typed_value::{make_typed_value, PartialTypedValue, TypedValue, DEFAULT_VALUE_TYPE};
pub use value::{to_numerical_value, to_value, Value, ValueType};
