//! Incremental import - Merges more feed records into an existing batch.
//!
//! Unlike a full import, records that already exist in the batch only get
//! their descriptive fields refreshed. Their match and status are never
//! touched, so a confirmed link survives any number of later feed pages.

use crate::{
    config::settings::MatchingConfig,
    core::{
        batch::{require_batch, set_batch_status},
        catalog::Catalog,
        counters::{BatchCounters, refresh_batch_counters},
        feed::FeedOfferRecord,
        import::{existing_by_external_id, external_ids, plan_match, upsert_item},
        text::normalize,
    },
    entities::{ImportItem, import_batch::BatchStatus, import_item},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, Unchanged, prelude::*};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, instrument};

/// Result of merging records into a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncrementalSummary {
    /// The batch records were added to
    pub batch_id: i64,
    /// Records that refreshed an item already in the batch
    pub updated_items: usize,
    /// Records added to the batch
    pub new_items: usize,
    /// Added records that kept a match stored on another batch
    pub preserved_matches: usize,
    /// Counters of the whole batch after the merge
    pub counters: BatchCounters,
}

/// Lookup of the batch's items by external id and by normalized brand name.
#[derive(Debug, Default)]
struct BatchIndex {
    by_external_id: HashMap<String, i64>,
    by_name: HashMap<String, i64>,
}

impl BatchIndex {
    fn add(&mut self, item: &import_item::Model) {
        if let Some(external_id) = item.external_id.as_ref().filter(|id| !id.is_empty()) {
            self.by_external_id.entry(external_id.clone()).or_insert(item.id);
        }
        let name = normalize(&item.brand_name);
        if !name.is_empty() {
            self.by_name.entry(name).or_insert(item.id);
        }
    }

    /// External id first, then normalized brand name.
    fn find(&self, record: &FeedOfferRecord) -> Option<i64> {
        record
            .external_id
            .as_ref()
            .and_then(|id| self.by_external_id.get(id))
            .or_else(|| match normalize(&record.brand_name) {
                name if name.is_empty() => None,
                name => self.by_name.get(&name),
            })
            .copied()
    }
}

/// Refreshes the descriptive fields of an item, leaving match and status alone.
async fn refresh_offer_fields<C: ConnectionTrait>(
    db: &C,
    item_id: i64,
    record: &FeedOfferRecord,
    now: DateTime<Utc>,
) -> Result<()> {
    let item = import_item::ActiveModel {
        id: Unchanged(item_id),
        title: Set(record.title.clone()),
        description: Set(record.description.clone()),
        offer_link: Set(record.offer_link.clone()),
        image_link: Set(record.image_link.clone()),
        original_price: Set(record.original_price),
        sale_price: Set(record.sale_price),
        currency: Set(record.currency.clone()),
        availability: Set(record.availability.clone()),
        category_id: Set(record.category_id),
        updated_at: Set(now),
        ..Default::default()
    };

    ImportItem::update(item).exec(db).await?;
    Ok(())
}

/// Adds `records` to batch `batch_id`.
///
/// # Arguments
/// * `db` - Database connection
/// * `catalog` - Snapshot of known places used for new records
/// * `batch_id` - Target batch
/// * `records` - Parsed feed page
/// * `config` - Suggestion limit
///
/// # Errors
/// * [`Error::BatchNotFound`] if the batch does not exist
/// * [`Error::BatchClosed`] if the batch was cancelled
/// * [`Error::PersistenceFailed`] if any write fails; nothing is kept
#[instrument(skip(db, catalog, records, config), fields(records = records.len()))]
pub async fn add_to_batch(
    db: &DatabaseConnection,
    catalog: &Catalog,
    batch_id: i64,
    records: &[FeedOfferRecord],
    config: &MatchingConfig,
) -> Result<IncrementalSummary> {
    let txn = db.begin().await?;

    let batch = require_batch(&txn, batch_id).await?;
    if batch.status == BatchStatus::Cancelled {
        return Err(Error::BatchClosed {
            id: batch_id,
            status: batch.status,
        });
    }

    let batch_items = ImportItem::find()
        .filter(import_item::Column::ImportBatchId.eq(batch_id))
        .order_by_asc(import_item::Column::Id)
        .all(&txn)
        .await?;
    let mut index = BatchIndex::default();
    for item in &batch_items {
        index.add(item);
    }

    // rows of other batches carrying the same offers
    let mut elsewhere = existing_by_external_id(&txn, &external_ids(records)).await?;
    elsewhere.retain(|_, item| item.import_batch_id != batch_id);

    let now = Utc::now();
    let mut donors = BTreeSet::new();
    let mut updated_items = 0;
    let mut new_items = 0;
    let mut preserved_matches = 0;

    for record in records {
        if let Some(item_id) = index.find(record) {
            refresh_offer_fields(&txn, item_id, record, now).await?;
            updated_items += 1;
            continue;
        }

        let stored = record
            .external_id
            .as_ref()
            .and_then(|id| elsewhere.remove(id));
        if let Some(stored) = &stored {
            donors.insert(stored.import_batch_id);
        }

        let plan = plan_match(record, stored.as_ref(), catalog, config);
        if plan.preserved {
            preserved_matches += 1;
        }

        let item = upsert_item(&txn, batch_id, record, plan, now).await?;
        index.add(&item);
        new_items += 1;
    }

    let counters = refresh_batch_counters(&txn, batch_id).await?;
    for donor in donors {
        refresh_batch_counters(&txn, donor).await?;
    }

    if batch.status == BatchStatus::Completed && counters.pending > 0 {
        set_batch_status(&txn, batch_id, BatchStatus::Ready).await?;
        info!(batch_id, "Reopened completed batch for new pending items");
    }

    txn.commit().await?;

    info!(
        batch_id,
        updated = updated_items,
        new = new_items,
        pending = counters.pending,
        "Added records to batch"
    );
    Ok(IncrementalSummary {
        batch_id,
        updated_items,
        new_items,
        preserved_matches,
        counters,
    })
}
