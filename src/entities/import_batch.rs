//! Import batch entity - One run of the coupon importer (`coupon_import_batches`).
//!
//! A batch groups the items created or updated together and carries the
//! aggregate progress counters shown to reviewers. Skipped items have no
//! counter of their own: `total_items` minus the three counters.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the feed of a batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Uploaded `.json` file
    #[sea_orm(string_value = "file")]
    File,
    /// Feed fetched over HTTP(S)
    #[sea_orm(string_value = "url")]
    Url,
}

/// Lifecycle of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Items are being written
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Import finished, items await review
    #[sea_orm(string_value = "ready")]
    Ready,
    /// No pending items remain
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Abandoned by a reviewer
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl BatchStatus {
    /// Returns the stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Import batch database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupon_import_batches")]
pub struct Model {
    /// Unique identifier for the batch
    #[sea_orm(primary_key)]
    pub id: i64,
    /// File upload or URL fetch
    pub source_type: SourceType,
    /// File name or URL the feed was read from
    pub source_name: Option<String>,
    /// Number of items in the batch
    pub total_items: i64,
    /// Items matched by exact name
    pub auto_matched_count: i64,
    /// Items linked by a reviewer
    pub manual_matched_count: i64,
    /// Items still waiting for a decision
    pub pending_count: i64,
    /// Current lifecycle status
    pub status: BatchStatus,
    /// When the batch was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `ImportBatch` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One batch has many items
    #[sea_orm(has_many = "super::import_item::Entity")]
    Items,
}

impl Related<super::import_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
