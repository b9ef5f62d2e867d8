//! Place catalog snapshot.
//!
//! The catalog is read once per session and handed to the matcher by reference.
//! Staleness between refreshes is accepted; callers reload it when they want
//! newly favorited places to be matchable.

use crate::{
    core::text::normalize,
    entities::{Place, import_item::PlaceSummary, place},
    errors::Result,
};
use sea_orm::{ConnectionTrait, EntityTrait, QueryOrder};
use std::collections::HashSet;
use tracing::debug;

/// A catalog place with its precomputed normalized name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// The place as shown to reviewers
    pub place: PlaceSummary,
    /// `normalize(place.name)`
    pub normalized_name: String,
}

/// Immutable, ordered set of known places, one entry per `place_id`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Builds a catalog keeping the first occurrence of every `place_id`.
    pub fn new(places: impl IntoIterator<Item = PlaceSummary>) -> Self {
        let mut seen = HashSet::new();
        let entries = places
            .into_iter()
            .filter(|place| seen.insert(place.place_id.clone()))
            .map(|place| CatalogEntry {
                normalized_name: normalize(&place.name),
                place,
            })
            .collect();

        Self { entries }
    }

    /// Loads every favorite location, oldest row first, so iteration order is stable
    /// across sessions.
    pub async fn load<C: ConnectionTrait>(db: &C) -> Result<Self> {
        let rows = Place::find()
            .order_by_asc(place::Column::Id)
            .all(db)
            .await?;
        let row_count = rows.len();

        let catalog = Self::new(rows.into_iter().map(|row| PlaceSummary {
            place_id: row.place_id,
            name: row.name,
            address: row.address,
        }));

        debug!(
            "Loaded place catalog: {} rows, {} distinct places",
            row_count,
            catalog.len()
        );
        Ok(catalog)
    }

    /// Entries in catalog order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Looks a place up by its identifier.
    #[must_use]
    pub fn get(&self, place_id: &str) -> Option<&PlaceSummary> {
        self.entries
            .iter()
            .map(|entry| &entry.place)
            .find(|place| place.place_id == place_id)
    }

    /// Number of distinct places.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no places to match against.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{errors::Result, test_utils::*};

    #[test]
    fn test_new_deduplicates_by_place_id() {
        let catalog = Catalog::new(vec![
            summary("p1", "Café Central"),
            summary("p2", "Bar do Zé"),
            summary("p1", "Cafe Central (duplicate favorite)"),
        ]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.entries()[0].normalized_name, "cafe central");
        assert_eq!(catalog.get("p1").unwrap().name, "Café Central");
        assert!(catalog.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_load_orders_by_row_and_dedupes() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_place(&db, "p2", "Bar do Zé", "user_a").await?;
        create_test_place(&db, "p1", "Café Central", "user_a").await?;
        create_test_place(&db, "p2", "Bar do Zé", "user_b").await?;

        let catalog = Catalog::load(&db).await?;
        let ids: Vec<&str> = catalog
            .entries()
            .iter()
            .map(|entry| entry.place.place_id.as_str())
            .collect();
        assert_eq!(ids, vec!["p2", "p1"]);

        Ok(())
    }
}
