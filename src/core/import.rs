//! Full import - Creates a batch from a parsed feed and matches every offer.
//!
//! Items are upserted on `external_id`, so importing the same feed twice updates
//! the existing rows (moving them into the new batch) instead of duplicating
//! them. Confirmed matches already stored for an offer are never downgraded.
//!
//! The whole run happens in one database transaction: either the batch and all
//! of its items are written, or nothing is.

use crate::{
    config::settings::MatchingConfig,
    core::{
        batch::{ImportSource, create_batch, set_batch_status},
        catalog::Catalog,
        counters::refresh_batch_counters,
        feed::FeedOfferRecord,
        matcher::{ExactMatch, find_exact_match, suggest_places},
    },
    entities::{
        ImportItem,
        import_batch::BatchStatus,
        import_item::{self, ItemStatus, SuggestedPlaces},
    },
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::OnConflict};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{info, instrument, warn};

/// Confidence stored for exact and manual matches.
pub const FULL_CONFIDENCE: i32 = 100;

/// Result of a full import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// The batch created by the run
    pub batch_id: i64,
    /// Items now in the batch
    pub total_items: i64,
    /// Offers seen for the first time
    pub new_items: usize,
    /// Offers that already had a row and were updated
    pub updated_items: usize,
    /// Updated offers whose stored match was kept
    pub preserved_matches: usize,
    /// Items matched by exact name (including preserved auto matches)
    pub auto_matched: i64,
    /// Items waiting for a reviewer
    pub pending: i64,
    /// Offers left pending because several places share their name
    pub ambiguous: usize,
}

/// How a single offer will be stored.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MatchPlan {
    pub status: ItemStatus,
    pub matched_place_id: Option<String>,
    pub matched_place_name: Option<String>,
    pub match_confidence: Option<i32>,
    pub suggested_places: Option<SuggestedPlaces>,
    /// The stored match of an existing row was carried over
    pub preserved: bool,
    /// Exact matching found more than one place
    pub ambiguous: bool,
}

/// Decides status, match and suggestions for one offer.
///
/// `existing` is the stored row with the same `external_id`, if any. When it is
/// already matched its match wins; otherwise the catalog decides. Suggestions
/// are always recomputed.
pub(crate) fn plan_match(
    record: &FeedOfferRecord,
    existing: Option<&import_item::Model>,
    catalog: &Catalog,
    config: &MatchingConfig,
) -> MatchPlan {
    let suggestions = suggest_places(&record.brand_name, catalog, config.suggestion_limit);
    let suggested_places = (!suggestions.is_empty()).then_some(SuggestedPlaces(suggestions));

    if let Some(existing) = existing.filter(|item| item.status.is_matched()) {
        return MatchPlan {
            status: existing.status,
            matched_place_id: existing.matched_place_id.clone(),
            matched_place_name: existing.matched_place_name.clone(),
            match_confidence: existing.match_confidence.or(Some(FULL_CONFIDENCE)),
            suggested_places,
            preserved: true,
            ambiguous: false,
        };
    }

    let exact = find_exact_match(&record.brand_name, catalog);
    if let ExactMatch::Ambiguous(places) = &exact {
        warn!(
            brand = %record.brand_name,
            candidates = places.len(),
            "Several places share this name, leaving the offer pending"
        );
    }

    match exact.place() {
        Some(place) => MatchPlan {
            status: ItemStatus::AutoMatched,
            matched_place_id: Some(place.place_id.clone()),
            matched_place_name: Some(place.name.clone()),
            match_confidence: Some(FULL_CONFIDENCE),
            suggested_places,
            preserved: false,
            ambiguous: false,
        },
        None => MatchPlan {
            status: ItemStatus::Pending,
            matched_place_id: None,
            matched_place_name: None,
            match_confidence: None,
            suggested_places,
            preserved: false,
            ambiguous: exact.is_ambiguous(),
        },
    }
}

/// Writes an item for `record` into `batch_id`, updating the row that already
/// holds the same `external_id` if there is one. Returns the stored row.
pub(crate) async fn upsert_item<C: ConnectionTrait>(
    db: &C,
    batch_id: i64,
    record: &FeedOfferRecord,
    plan: MatchPlan,
    now: DateTime<Utc>,
) -> Result<import_item::Model> {
    let item = import_item::ActiveModel {
        import_batch_id: Set(batch_id),
        external_id: Set(record.external_id.clone()),
        brand_name: Set(record.brand_name.clone()),
        title: Set(record.title.clone()),
        description: Set(record.description.clone()),
        offer_link: Set(record.offer_link.clone()),
        image_link: Set(record.image_link.clone()),
        original_price: Set(record.original_price),
        sale_price: Set(record.sale_price),
        currency: Set(record.currency.clone()),
        availability: Set(record.availability.clone()),
        category_id: Set(record.category_id),
        matched_place_id: Set(plan.matched_place_id),
        matched_place_name: Set(plan.matched_place_name),
        status: Set(plan.status),
        match_confidence: Set(plan.match_confidence),
        suggested_places: Set(plan.suggested_places),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    // without an external id there is nothing to conflict on
    let Some(external_id) = record.external_id.as_deref() else {
        return Ok(item.insert(db).await?);
    };

    let on_conflict = OnConflict::column(import_item::Column::ExternalId)
        .update_columns([
            import_item::Column::ImportBatchId,
            import_item::Column::BrandName,
            import_item::Column::Title,
            import_item::Column::Description,
            import_item::Column::OfferLink,
            import_item::Column::ImageLink,
            import_item::Column::OriginalPrice,
            import_item::Column::SalePrice,
            import_item::Column::Currency,
            import_item::Column::Availability,
            import_item::Column::CategoryId,
            import_item::Column::MatchedPlaceId,
            import_item::Column::MatchedPlaceName,
            import_item::Column::Status,
            import_item::Column::MatchConfidence,
            import_item::Column::SuggestedPlaces,
            import_item::Column::UpdatedAt,
        ])
        .to_owned();

    ImportItem::insert(item)
        .on_conflict(on_conflict)
        .exec_without_returning(db)
        .await?;

    ImportItem::find()
        .filter(import_item::Column::ExternalId.eq(external_id))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("import item with external id {external_id}")).into())
}

/// Loads stored items carrying any of `external_ids`, keyed by external id.
pub(crate) async fn existing_by_external_id<C: ConnectionTrait>(
    db: &C,
    external_ids: &BTreeSet<String>,
) -> Result<HashMap<String, import_item::Model>> {
    if external_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let items = ImportItem::find()
        .filter(import_item::Column::ExternalId.is_in(external_ids.iter().cloned()))
        .all(db)
        .await?;

    Ok(items
        .into_iter()
        .filter_map(|item| item.external_id.clone().map(|id| (id, item)))
        .collect())
}

/// Non-empty external ids of a record set, deduplicated.
pub(crate) fn external_ids(records: &[FeedOfferRecord]) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|record| record.external_id.clone())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Imports `records` into a new batch.
///
/// # Arguments
/// * `db` - Database connection
/// * `catalog` - Snapshot of known places used for matching
/// * `records` - Parsed feed; may be empty
/// * `source` - File name or URL recorded on the batch
/// * `config` - Suggestion limit
///
/// # Errors
/// [`crate::errors::Error::PersistenceFailed`] if any write fails; nothing is
/// kept in that case and the import can simply be retried.
#[instrument(skip_all, fields(records = records.len(), source = %source.source_name))]
pub async fn run_full_import(
    db: &DatabaseConnection,
    catalog: &Catalog,
    records: &[FeedOfferRecord],
    source: &ImportSource,
    config: &MatchingConfig,
) -> Result<ImportSummary> {
    let txn = db.begin().await?;

    let existing = existing_by_external_id(&txn, &external_ids(records)).await?;
    let batch = create_batch(&txn, source, records.len()).await?;

    let now = Utc::now();
    let mut known: HashSet<String> = existing.keys().cloned().collect();
    let mut new_items = 0;
    let mut updated_items = 0;
    let mut preserved_matches = 0;
    let mut ambiguous = 0;

    for record in records {
        let stored = record.external_id.as_ref().and_then(|id| existing.get(id));
        let plan = plan_match(record, stored, catalog, config);

        let is_new = record
            .external_id
            .as_ref()
            .is_none_or(|id| known.insert(id.clone()));
        if is_new {
            new_items += 1;
        } else {
            updated_items += 1;
        }
        if plan.preserved {
            preserved_matches += 1;
        }
        if plan.ambiguous {
            ambiguous += 1;
        }

        upsert_item(&txn, batch.id, record, plan, now).await?;
    }

    let counters = refresh_batch_counters(&txn, batch.id).await?;
    set_batch_status(&txn, batch.id, BatchStatus::Ready).await?;

    // rows that moved here leave stale counters behind on their old batches
    let donors: BTreeSet<i64> = existing
        .values()
        .map(|item| item.import_batch_id)
        .filter(|id| *id != batch.id)
        .collect();
    for donor in donors {
        refresh_batch_counters(&txn, donor).await?;
    }

    txn.commit().await?;

    let summary = ImportSummary {
        batch_id: batch.id,
        total_items: counters.total,
        new_items,
        updated_items,
        preserved_matches,
        auto_matched: counters.auto_matched,
        pending: counters.pending,
        ambiguous,
    };
    info!(
        batch_id = summary.batch_id,
        new = summary.new_items,
        updated = summary.updated_items,
        auto_matched = summary.auto_matched,
        pending = summary.pending,
        "Import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::{batch::get_batch, lifecycle::link_to_place},
        entities::{ImportBatch, import_batch::SourceType},
        test_utils::*,
    };
    use sea_orm::QueryOrder;

    fn file_source() -> ImportSource {
        ImportSource {
            source_type: SourceType::File,
            source_name: "feed.json".to_string(),
        }
    }

    async fn items_of(db: &DatabaseConnection) -> Result<Vec<import_item::Model>> {
        Ok(ImportItem::find()
            .order_by_asc(import_item::Column::Id)
            .all(db)
            .await?)
    }

    #[test]
    fn test_plan_match_exact_and_pending() {
        let catalog = Catalog::new(vec![summary("p1", "Restaurante Sol"), summary("p2", "Sol e Mar")]);
        let config = MatchingConfig::default();

        let plan = plan_match(&offer(Some("1"), "restaurante sol"), None, &catalog, &config);
        assert_eq!(plan.status, ItemStatus::AutoMatched);
        assert_eq!(plan.matched_place_id.as_deref(), Some("p1"));
        assert_eq!(plan.match_confidence, Some(100));
        // suggestions are computed even for exact matches
        let suggested: Vec<String> = plan
            .suggested_places
            .unwrap()
            .0
            .into_iter()
            .map(|p| p.place_id)
            .collect();
        assert_eq!(suggested, vec!["p1", "p2"]);

        let plan = plan_match(&offer(Some("2"), "Livraria Cultura"), None, &catalog, &config);
        assert_eq!(plan.status, ItemStatus::Pending);
        assert_eq!(plan.matched_place_id, None);
        assert_eq!(plan.match_confidence, None);
        assert_eq!(plan.suggested_places, None);
    }

    #[test]
    fn test_plan_match_ambiguous_stays_pending() {
        let catalog = Catalog::new(vec![summary("p1", "Bar Central"), summary("p2", "BAR CENTRAL")]);
        let plan = plan_match(&offer(None, "Bar Central"), None, &catalog, &MatchingConfig::default());
        assert_eq!(plan.status, ItemStatus::Pending);
        assert!(plan.ambiguous);
        assert_eq!(plan.suggested_places.unwrap().0.len(), 2);
    }

    #[test]
    fn test_plan_match_blank_brand_stays_pending() {
        let catalog = Catalog::new(vec![summary("blank", "   "), summary("p1", "Restaurante Sol")]);
        let plan = plan_match(&offer(Some("1"), ""), None, &catalog, &MatchingConfig::default());
        assert_eq!(plan.status, ItemStatus::Pending);
        assert_eq!(plan.matched_place_id, None);
        assert!(!plan.ambiguous);
    }

    #[tokio::test]
    async fn test_failed_import_leaves_no_batch() -> Result<()> {
        let db = setup_with_places().await?;
        let catalog = Catalog::load(&db).await?;
        db.execute_unprepared("DROP TABLE coupon_import_items").await?;

        // no external id, so the batch is created before the item write fails
        let records = [offer(None, "Restaurante Sol")];
        let result = run_full_import(&db, &catalog, &records, &file_source(), &MatchingConfig::default()).await;
        assert!(matches!(result, Err(crate::errors::Error::PersistenceFailed(_))));

        assert_eq!(ImportBatch::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_full_import_matches_and_counts() -> Result<()> {
        let db = setup_with_places().await?;
        let catalog = Catalog::load(&db).await?;
        let records = vec![
            offer(Some("1"), "Restaurante Sol"),
            offer(Some("2"), "cafe brasil"),
            offer(Some("3"), "Loja Desconhecida"),
            offer(None, "Sem Identificador"),
        ];

        let summary = run_full_import(&db, &catalog, &records, &file_source(), &MatchingConfig::default()).await?;
        assert_eq!(summary.total_items, 4);
        assert_eq!(summary.new_items, 4);
        assert_eq!(summary.updated_items, 0);
        assert_eq!(summary.auto_matched, 2);
        assert_eq!(summary.pending, 2);

        let batch = get_batch(&db, summary.batch_id).await?.unwrap();
        assert_eq!(batch.status, BatchStatus::Ready);
        assert_eq!(batch.total_items, 4);
        assert_eq!(batch.auto_matched_count, 2);
        assert_eq!(batch.pending_count, 2);
        assert_eq!(batch.source_name.as_deref(), Some("feed.json"));

        let items = items_of(&db).await?;
        assert_eq!(items.len(), 4);
        let cafe = items.iter().find(|i| i.external_id.as_deref() == Some("2")).unwrap();
        assert_eq!(cafe.matched_place_id.as_deref(), Some("p2"));
        assert_eq!(cafe.matched_place_name.as_deref(), Some("Café Brasil"));
        assert_eq!(cafe.status, ItemStatus::AutoMatched);
        let unknown = items.iter().find(|i| i.external_id.as_deref() == Some("3")).unwrap();
        assert_eq!(unknown.status, ItemStatus::Pending);
        assert!(unknown.matched_place_id.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_full_import_empty_feed() -> Result<()> {
        let db = setup_with_places().await?;
        let catalog = Catalog::load(&db).await?;

        let summary = run_full_import(&db, &catalog, &[], &file_source(), &MatchingConfig::default()).await?;
        assert_eq!(summary.total_items, 0);

        let batch = get_batch(&db, summary.batch_id).await?.unwrap();
        assert_eq!(batch.total_items, 0);
        assert_eq!(batch.status, BatchStatus::Ready);
        Ok(())
    }

    #[tokio::test]
    async fn test_reimport_does_not_duplicate_and_keeps_manual_match() -> Result<()> {
        let db = setup_with_places().await?;
        let catalog = Catalog::load(&db).await?;
        let config = MatchingConfig::default();
        let records = vec![offer(Some("1"), "Restaurante Sol"), offer(Some("2"), "Loja Nova")];

        let first = run_full_import(&db, &catalog, &records, &file_source(), &config).await?;

        // a reviewer links "Loja Nova" to the bakery by hand
        let loja = items_of(&db)
            .await?
            .into_iter()
            .find(|i| i.external_id.as_deref() == Some("2"))
            .unwrap();
        link_to_place(&db, loja.id, catalog.get("p3").unwrap()).await?;

        let second = run_full_import(&db, &catalog, &records, &file_source(), &config).await?;
        assert_ne!(first.batch_id, second.batch_id);
        assert_eq!(first.total_items, second.total_items);
        assert_eq!(second.new_items, 0);
        assert_eq!(second.updated_items, 2);
        assert_eq!(second.preserved_matches, 2);

        let items = items_of(&db).await?;
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.import_batch_id == second.batch_id));
        let loja = items.iter().find(|i| i.external_id.as_deref() == Some("2")).unwrap();
        assert_eq!(loja.status, ItemStatus::ManualMatched);
        assert_eq!(loja.matched_place_id.as_deref(), Some("p3"));

        let batch = get_batch(&db, second.batch_id).await?.unwrap();
        assert_eq!(batch.manual_matched_count, 1);
        assert_eq!(batch.auto_matched_count, 1);
        assert_eq!(batch.pending_count, 0);

        // the first batch no longer owns any item
        let old = get_batch(&db, first.batch_id).await?.unwrap();
        assert_eq!(old.total_items, 0);
        assert_eq!(old.pending_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reimport_rematches_pending_items() -> Result<()> {
        let db = setup_with_places().await?;
        let config = MatchingConfig::default();
        let records = vec![offer(Some("9"), "Livraria Nova")];

        let empty = Catalog::new(Vec::new());
        run_full_import(&db, &empty, &records, &file_source(), &config).await?;
        assert_eq!(items_of(&db).await?[0].status, ItemStatus::Pending);

        create_test_place(&db, "p9", "Livraria Nova", "user_c").await?;
        let catalog = Catalog::load(&db).await?;
        let summary = run_full_import(&db, &catalog, &records, &file_source(), &config).await?;
        assert_eq!(summary.auto_matched, 1);

        let item = &items_of(&db).await?[0];
        assert_eq!(item.status, ItemStatus::AutoMatched);
        assert_eq!(item.matched_place_id.as_deref(), Some("p9"));
        Ok(())
    }
}
