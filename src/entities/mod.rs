//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities mirror the backoffice tables the import pipeline reads and writes.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod import_batch;
pub mod import_item;
pub mod location_coupon;
pub mod place;

// Re-export specific types to avoid conflicts
pub use import_batch::{
    Column as ImportBatchColumn, Entity as ImportBatch, Model as ImportBatchModel,
};
pub use import_item::{Column as ImportItemColumn, Entity as ImportItem, Model as ImportItemModel};
pub use location_coupon::{
    Column as LocationCouponColumn, Entity as LocationCoupon, Model as LocationCouponModel,
};
pub use place::{Column as PlaceColumn, Entity as Place, Model as PlaceModel};
