//! Place entity - A user's favorited point of interest (`favorite_locations`).
//!
//! The import pipeline only reads this table. Several users can favorite the
//! same `place_id`, so a single real place may appear in more than one row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Favorite location database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "favorite_locations")]
pub struct Model {
    /// Row identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Stable identifier of the place in the external places provider
    pub place_id: String,
    /// Display name of the place
    pub name: String,
    /// Formatted address, when known
    pub address: Option<String>,
    /// User who favorited the place
    pub user_id: String,
}

/// `Place` has no relationships the importer navigates
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
