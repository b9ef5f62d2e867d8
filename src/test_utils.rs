//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test places, batches, items and feed records with sensible defaults.

use crate::{
    core::feed::{DEFAULT_CURRENCY, FeedOfferRecord},
    entities::{
        import_batch::{self, BatchStatus, SourceType},
        import_item::{self, ItemStatus, PlaceSummary},
        place,
    },
    errors::Result,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Builds a catalog place without an address.
pub fn summary(place_id: &str, name: &str) -> PlaceSummary {
    PlaceSummary {
        place_id: place_id.to_string(),
        name: name.to_string(),
        address: None,
    }
}

/// Inserts a favorite location.
pub async fn create_test_place(
    db: &DatabaseConnection,
    place_id: &str,
    name: &str,
    user_id: &str,
) -> Result<place::Model> {
    let place = place::ActiveModel {
        place_id: Set(place_id.to_string()),
        name: Set(name.to_string()),
        address: Set(Some(format!("Rua {name}, 100"))),
        user_id: Set(user_id.to_string()),
        ..Default::default()
    };
    Ok(place.insert(db).await?)
}

/// Creates an empty `ready` batch sourced from a file.
pub async fn create_test_batch(db: &DatabaseConnection) -> Result<import_batch::Model> {
    let batch = import_batch::ActiveModel {
        source_type: Set(SourceType::File),
        source_name: Set(Some("test_feed.json".to_string())),
        total_items: Set(0),
        auto_matched_count: Set(0),
        manual_matched_count: Set(0),
        pending_count: Set(0),
        status: Set(BatchStatus::Ready),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    Ok(batch.insert(db).await?)
}

/// Inserts an item directly, bypassing the importer.
///
/// # Defaults
/// * matched items point at `place-<brand>` with confidence 100
/// * `title`: `"Oferta <brand>"`
/// * `currency`: BRL
pub async fn create_test_item(
    db: &DatabaseConnection,
    batch_id: i64,
    external_id: Option<&str>,
    brand_name: &str,
    status: ItemStatus,
) -> Result<import_item::Model> {
    let matched = status.is_matched();
    let now = chrono::Utc::now();

    let item = import_item::ActiveModel {
        import_batch_id: Set(batch_id),
        external_id: Set(external_id.map(str::to_string)),
        brand_name: Set(brand_name.to_string()),
        title: Set(Some(format!("Oferta {brand_name}"))),
        description: Set(None),
        offer_link: Set(None),
        image_link: Set(None),
        original_price: Set(Some(20.0)),
        sale_price: Set(Some(15.0)),
        currency: Set(DEFAULT_CURRENCY.to_string()),
        availability: Set(Some("in stock".to_string())),
        category_id: Set(None),
        matched_place_id: Set(matched.then(|| format!("place-{brand_name}"))),
        matched_place_name: Set(matched.then(|| brand_name.to_string())),
        status: Set(status),
        match_confidence: Set(matched.then_some(100)),
        suggested_places: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    Ok(item.insert(db).await?)
}

/// Builds a feed record with a title and prices.
pub fn offer(external_id: Option<&str>, brand_name: &str) -> FeedOfferRecord {
    FeedOfferRecord {
        external_id: external_id.map(str::to_string),
        brand_name: brand_name.to_string(),
        title: Some(format!("Oferta {brand_name}")),
        description: Some("Desconto especial".to_string()),
        offer_link: Some("https://ofertas.example.com/o".to_string()),
        image_link: None,
        original_price: Some(50.0),
        sale_price: Some(39.9),
        currency: DEFAULT_CURRENCY.to_string(),
        availability: Some("in stock".to_string()),
        category_id: None,
    }
}

/// Sets up a database with a small catalog of favorite places.
/// Returns the connection; the places are `p1` Restaurante Sol, `p2` Café Brasil,
/// `p3` Padaria São Jorge.
pub async fn setup_with_places() -> Result<DatabaseConnection> {
    let db = setup_test_db().await?;
    create_test_place(&db, "p1", "Restaurante Sol", "user_a").await?;
    create_test_place(&db, "p2", "Café Brasil", "user_a").await?;
    create_test_place(&db, "p3", "Padaria São Jorge", "user_b").await?;
    Ok(db)
}
