//! Fact and item identifiers.
//!
//! Identifiers are opaque strings. Generated ones are time-ordered
//! (UUIDv7 seeded with the fact timestamp), but callers may supply any
//! non-empty string, e.g. when importing facts that already have identity.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::{NoContext, Timestamp, Uuid};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing identifier string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identity of a single fact.
    FactId
}

string_id! {
    /// Identity of the logical item a fact describes.
    ItemId
}

/// Source of fresh identifiers.
///
/// Implementations must return a distinct identifier on every call, even
/// when called repeatedly with the same timestamp.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    fn generate(&self, at: DateTime<Utc>) -> String;

    fn fact_id(&self, at: DateTime<Utc>) -> FactId {
        FactId(self.generate(at))
    }

    fn item_id(&self, at: DateTime<Utc>) -> ItemId {
        ItemId(self.generate(at))
    }
}

/// UUIDv7 identifiers whose time prefix is the given timestamp.
///
/// Identifiers generated for increasing timestamps sort in the same order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeOrderedIds;

impl IdGenerator for TimeOrderedIds {
    fn generate(&self, at: DateTime<Utc>) -> String {
        // v7 cannot encode pre-epoch instants; clamp them to the epoch.
        let secs = u64::try_from(at.timestamp()).unwrap_or(0);
        let ts = Timestamp::from_unix(NoContext, secs, at.timestamp_subsec_nanos());
        Uuid::new_v7(ts).to_string()
    }
}
