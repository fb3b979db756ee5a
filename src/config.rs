//! Item drive configuration.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fact::DEFAULT_ITEM_TYPE;
use crate::typed_value::DEFAULT_VALUE_TYPE;
use crate::value::ValueType;

/// Defaults applied by [`ItemDrive`](crate::ItemDrive) when drafts leave
/// fields unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Item type for drafts that declare none.
    pub default_item_type: String,
    /// Value type for attributes that declare none.
    pub default_value_type: ValueType,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            default_item_type: DEFAULT_ITEM_TYPE.to_string(),
            default_value_type: DEFAULT_VALUE_TYPE,
        }
    }
}

impl DriveConfig {
    /// # Errors
    /// `InvalidConfig` if the default item type is blank.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.default_item_type.trim().is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "default_item_type must not be empty".to_string(),
            });
        }
        Ok(self)
    }
}
