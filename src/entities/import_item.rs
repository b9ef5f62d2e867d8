//! Import item entity - One feed offer tracked through matching (`coupon_import_items`).
//!
//! Items keep a copy of the descriptive feed fields, the place they were
//! matched to (if any) and the suggestions computed at import time.
//! `external_id` is unique so a re-imported offer updates its row instead of
//! duplicating it.

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Matching status of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for a reviewer
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Matched by exact name during import
    #[sea_orm(string_value = "auto_matched")]
    AutoMatched,
    /// Linked by a reviewer
    #[sea_orm(string_value = "manual_matched")]
    ManualMatched,
    /// Dismissed by a reviewer
    #[sea_orm(string_value = "skipped")]
    Skipped,
}

impl ItemStatus {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AutoMatched => "auto_matched",
            Self::ManualMatched => "manual_matched",
            Self::Skipped => "skipped",
        }
    }

    /// True for the two statuses that carry a matched place.
    #[must_use]
    pub const fn is_matched(self) -> bool {
        matches!(self, Self::AutoMatched | Self::ManualMatched)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog place offered to the reviewer, as stored in `suggested_places`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceSummary {
    /// Place identifier
    pub place_id: String,
    /// Display name
    pub name: String,
    /// Formatted address
    pub address: Option<String>,
}

/// JSON list of suggestions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct SuggestedPlaces(pub Vec<PlaceSummary>);

/// Import item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupon_import_items")]
pub struct Model {
    /// Unique identifier for the item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Batch that last imported this item
    pub import_batch_id: i64,
    /// Identifier of the offer in the feed
    #[sea_orm(unique)]
    pub external_id: Option<String>,
    /// Merchant name used as the match key
    pub brand_name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub offer_link: Option<String>,
    pub image_link: Option<String>,
    pub original_price: Option<f64>,
    pub sale_price: Option<f64>,
    /// Three-letter currency code
    pub currency: String,
    pub availability: Option<String>,
    /// Google product category
    pub category_id: Option<i64>,
    /// Place the offer is linked to
    pub matched_place_id: Option<String>,
    pub matched_place_name: Option<String>,
    /// Current matching status
    pub status: ItemStatus,
    /// 100 when matched, otherwise empty
    pub match_confidence: Option<i32>,
    /// Places proposed to the reviewer at import time
    #[sea_orm(column_type = "Json", nullable)]
    pub suggested_places: Option<SuggestedPlaces>,
    /// When the item was first imported
    pub created_at: DateTimeUtc,
    /// When the item was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `ImportItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each item belongs to one batch
    #[sea_orm(
        belongs_to = "super::import_batch::Entity",
        from = "Column::ImportBatchId",
        to = "super::import_batch::Column::Id"
    )]
    ImportBatch,
}

impl Related<super::import_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ImportBatch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
