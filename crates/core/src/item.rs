use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::extracted::ExtractedFields;
use crate::money::Money;

/// How an item's price is amortized into a perceived cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostType {
    #[default]
    Daily,
    PerUse,
}

impl fmt::Display for CostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostType::Daily => write!(f, "daily"),
            CostType::PerUse => write!(f, "per_use"),
        }
    }
}

impl std::str::FromStr for CostType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(CostType::Daily),
            "per_use" | "per-use" => Ok(CostType::PerUse),
            other => Err(format!("Unknown cost type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub price: Money,
    pub purchase_date: NaiveDate,
    pub usage_count: u32,
    pub cost_type: CostType,
    pub category: String,
    pub icon: String,
}

/// Whole days between purchase and `today`, never less than one.
pub fn days_held(purchase_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - purchase_date).num_days().max(1)
}

impl Item {
    pub fn days_held(&self, today: NaiveDate) -> i64 {
        days_held(self.purchase_date, today)
    }

    /// Price per day held or per recorded use, rounded to the fen.
    pub fn perceived_cost(&self, today: NaiveDate) -> Money {
        self.price.spread_over(self.cost_divisor(today))
    }

    fn cost_divisor(&self, today: NaiveDate) -> i64 {
        match self.cost_type {
            CostType::Daily => self.days_held(today),
            CostType::PerUse => i64::from(self.usage_count.max(1)),
        }
    }

    fn raw_cost(&self, today: NaiveDate) -> Decimal {
        self.price.amount() / Decimal::from(self.cost_divisor(today))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_value: Money,
    /// Sum of the per-day cost of every `Daily` item. Per-use items are excluded.
    pub daily_cost: Money,
}

impl Summary {
    pub fn from_items(items: &[Item], today: NaiveDate) -> Self {
        let total_value = items.iter().map(|i| i.price).sum();
        let daily: Decimal = items
            .iter()
            .filter(|i| i.cost_type == CostType::Daily)
            .map(|i| i.raw_cost(today))
            .sum();
        Summary {
            total_value,
            daily_cost: Money::new(daily.round_dp(2)),
        }
    }
}

// ── Drafts ────────────────────────────────────────────────────────────────────

/// Which side wins when an extraction result is merged into a draft that the
/// user may already have partly filled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Extracted values overwrite whatever the draft holds.
    PreferExtracted,
    /// Extracted values only fill empty draft fields.
    #[default]
    KeepExisting,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("Item name is required")]
    MissingName,
    #[error("Item price is required")]
    MissingPrice,
    #[error("Purchase date is required")]
    MissingPurchaseDate,
}

/// An item form in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemDraft {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub purchase_date: Option<NaiveDate>,
    pub usage_count: Option<u32>,
    pub cost_type: Option<CostType>,
    pub category: Option<String>,
    pub icon: Option<String>,
}

impl ItemDraft {
    pub fn apply(&mut self, fields: &ExtractedFields, policy: MergePolicy) {
        merge_field(&mut self.name, fields.name.clone(), policy);
        merge_field(&mut self.price, fields.price, policy);
        merge_field(&mut self.purchase_date, fields.purchase_date, policy);
    }

    pub fn into_item(self, id: impl Into<String>) -> Result<Item, DraftError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(DraftError::MissingName)?;
        Ok(Item {
            id: id.into(),
            name,
            price: self.price.ok_or(DraftError::MissingPrice)?,
            purchase_date: self.purchase_date.ok_or(DraftError::MissingPurchaseDate)?,
            usage_count: self.usage_count.unwrap_or(1).max(1),
            cost_type: self.cost_type.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            icon: self.icon.unwrap_or_default(),
        })
    }
}

fn merge_field<T>(slot: &mut Option<T>, incoming: Option<T>, policy: MergePolicy) {
    let Some(value) = incoming else { return };
    match policy {
        MergePolicy::PreferExtracted => *slot = Some(value),
        MergePolicy::KeepExisting => {
            if slot.is_none() {
                *slot = Some(value);
            }
        }
    }
}
