//! Location coupon entity - A coupon published on a place (`location_coupons`).
//!
//! Rows are written when a reviewer links an import item to a place. Re-linking
//! deactivates the item's earlier coupons instead of deleting them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Location coupon database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "location_coupons")]
pub struct Model {
    /// Unique identifier for the coupon
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Place the coupon is shown on
    pub place_id: String,
    /// Import item the coupon was published from
    pub import_item_id: i64,
    /// Batch of that item at publication time
    pub import_batch_id: i64,
    pub external_id: Option<String>,
    pub brand_name: String,
    /// Offer title, falling back to the brand name
    pub title: String,
    pub description: Option<String>,
    pub offer_link: Option<String>,
    pub image_link: Option<String>,
    pub original_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub currency: String,
    pub availability: Option<String>,
    pub category_id: Option<i64>,
    /// Only active coupons are shown to app users
    pub is_active: bool,
    /// When the coupon was published
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `LocationCoupon` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each coupon comes from one import item
    #[sea_orm(
        belongs_to = "super::import_item::Entity",
        from = "Column::ImportItemId",
        to = "super::import_item::Column::Id"
    )]
    ImportItem,
}

impl Related<super::import_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ImportItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
