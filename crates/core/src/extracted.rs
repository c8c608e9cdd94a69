use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// The partial record produced by any extraction path (local OCR heuristics or an
/// external vision model). Every field is optional: a miss is not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
    /// Serialized as `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }

    pub fn field_count(&self) -> usize {
        usize::from(self.name.is_some())
            + usize::from(self.price.is_some())
            + usize::from(self.purchase_date.is_some())
    }

    /// Fill fields missing from `self` with the ones from `other`.
    pub fn or(self, other: ExtractedFields) -> ExtractedFields {
        ExtractedFields {
            name: self.name.or(other.name),
            price: self.price.or(other.price),
            purchase_date: self.purchase_date.or(other.purchase_date),
        }
    }
}
