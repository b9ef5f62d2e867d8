//! Item lifecycle - Reviewer decisions on single items.
//!
//! ```text
//! pending ──import──▶ auto_matched ──link──▶ manual_matched ◀─┐
//!    │                                            │           │
//!    ├──────────────────link─────────────────────▶└──relink───┘
//!    └──skip──▶ skipped (terminal)
//! ```
//!
//! Every decision updates the item, publishes or retires coupons, and adjusts
//! the owning batch's counters inside one database transaction. A batch whose
//! pending count reaches zero is completed in the same write.

use crate::{
    core::{batch::require_batch, import::FULL_CONFIDENCE},
    entities::{
        ImportItem, LocationCoupon,
        import_batch::{self, BatchStatus},
        import_item::{self, ItemStatus, PlaceSummary},
        location_coupon,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{DatabaseTransaction, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument};

/// Target status of linking an item in `from` to a place.
///
/// # Errors
/// [`Error::InvalidTransition`] for skipped items.
pub fn link_transition(from: ItemStatus) -> Result<ItemStatus> {
    match from {
        ItemStatus::Pending | ItemStatus::AutoMatched | ItemStatus::ManualMatched => {
            Ok(ItemStatus::ManualMatched)
        }
        ItemStatus::Skipped => Err(Error::InvalidTransition {
            from,
            action: "link",
        }),
    }
}

/// Target status of skipping an item in `from`; `None` when it is already skipped.
///
/// # Errors
/// [`Error::InvalidTransition`] for matched items.
pub fn skip_transition(from: ItemStatus) -> Result<Option<ItemStatus>> {
    match from {
        ItemStatus::Pending => Ok(Some(ItemStatus::Skipped)),
        ItemStatus::Skipped => Ok(None),
        ItemStatus::AutoMatched | ItemStatus::ManualMatched => Err(Error::InvalidTransition {
            from,
            action: "skip",
        }),
    }
}

/// Change to a batch's stored counters caused by one item moving between statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    /// Change to `auto_matched_count`
    pub auto_matched: i64,
    /// Change to `manual_matched_count`
    pub manual_matched: i64,
    /// Change to `pending_count`
    pub pending: i64,
}

impl CounterDelta {
    /// Delta of moving one item from `from` to `to`.
    #[must_use]
    pub fn between(from: ItemStatus, to: ItemStatus) -> Self {
        let mut delta = Self::default();
        if from != to {
            delta.shift(from, -1);
            delta.shift(to, 1);
        }
        delta
    }

    fn shift(&mut self, status: ItemStatus, amount: i64) {
        match status {
            ItemStatus::AutoMatched => self.auto_matched += amount,
            ItemStatus::ManualMatched => self.manual_matched += amount,
            ItemStatus::Pending => self.pending += amount,
            // skipped items are only counted through total_items
            ItemStatus::Skipped => {}
        }
    }
}

/// What [`link_to_place`] did.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    /// Status before the link
    pub previous_status: ItemStatus,
    /// The item after the update
    pub item: import_item::Model,
    /// The newly published coupon
    pub coupon: location_coupon::Model,
    /// The owning batch after its counters were adjusted
    pub batch: import_batch::Model,
}

/// What [`skip`] did.
#[derive(Debug, Clone)]
pub struct SkipOutcome {
    /// False when the item was already skipped and nothing was written
    pub changed: bool,
    /// The item as stored after the call
    pub item: import_item::Model,
    /// The owning batch as stored after the call
    pub batch: import_batch::Model,
}

async fn load_item(txn: &DatabaseTransaction, item_id: i64) -> Result<import_item::Model> {
    ImportItem::find_by_id(item_id)
        .one(txn)
        .await?
        .ok_or(Error::ItemNotFound { id: item_id })
}

async fn open_batch_of(txn: &DatabaseTransaction, item: &import_item::Model) -> Result<import_batch::Model> {
    let batch = require_batch(txn, item.import_batch_id).await?;
    if batch.status == BatchStatus::Cancelled {
        return Err(Error::BatchClosed {
            id: batch.id,
            status: batch.status,
        });
    }
    Ok(batch)
}

/// Applies a counter delta, never letting a counter drop below zero, and
/// completes the batch once nothing is pending.
async fn adjust_batch(
    txn: &DatabaseTransaction,
    batch: import_batch::Model,
    delta: CounterDelta,
) -> Result<import_batch::Model> {
    let auto_matched = (batch.auto_matched_count + delta.auto_matched).max(0);
    let manual_matched = (batch.manual_matched_count + delta.manual_matched).max(0);
    let pending = (batch.pending_count + delta.pending).max(0);
    let completes = pending == 0 && batch.status != BatchStatus::Completed;

    let mut active: import_batch::ActiveModel = batch.into();
    active.auto_matched_count = Set(auto_matched);
    active.manual_matched_count = Set(manual_matched);
    active.pending_count = Set(pending);
    if completes {
        active.status = Set(BatchStatus::Completed);
    }

    let batch = active.update(txn).await?;
    if completes {
        info!(batch_id = batch.id, "All items decided, batch completed");
    }
    Ok(batch)
}

fn coupon_for(item: &import_item::Model, place: &PlaceSummary) -> location_coupon::ActiveModel {
    let title = item
        .title
        .clone()
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| item.brand_name.clone());

    location_coupon::ActiveModel {
        place_id: Set(place.place_id.clone()),
        import_item_id: Set(item.id),
        import_batch_id: Set(item.import_batch_id),
        external_id: Set(item.external_id.clone()),
        brand_name: Set(item.brand_name.clone()),
        title: Set(title),
        description: Set(item.description.clone()),
        offer_link: Set(item.offer_link.clone()),
        image_link: Set(item.image_link.clone()),
        original_price: Set(item.original_price),
        sale_price: Set(item.sale_price),
        currency: Set(item.currency.clone()),
        availability: Set(item.availability.clone()),
        category_id: Set(item.category_id),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
}

/// Links an item to a place chosen by a reviewer and publishes its coupon.
///
/// Order inside the transaction: item update, retirement of the item's older
/// coupons, coupon insert, batch counters. Re-linking a matched item moves it
/// between counters without touching `pending_count`.
///
/// # Errors
/// * [`Error::ItemNotFound`] if the item does not exist
/// * [`Error::InvalidTransition`] if the item was skipped
/// * [`Error::BatchClosed`] if its batch was cancelled
#[instrument(skip(db, place), fields(place_id = %place.place_id))]
pub async fn link_to_place(db: &DatabaseConnection, item_id: i64, place: &PlaceSummary) -> Result<LinkOutcome> {
    let txn = db.begin().await?;

    let item = load_item(&txn, item_id).await?;
    let previous_status = item.status;
    let next_status = link_transition(previous_status)?;
    let batch = open_batch_of(&txn, &item).await?;

    let mut active: import_item::ActiveModel = item.into();
    active.matched_place_id = Set(Some(place.place_id.clone()));
    active.matched_place_name = Set(Some(place.name.clone()));
    active.status = Set(next_status);
    active.match_confidence = Set(Some(FULL_CONFIDENCE));
    active.updated_at = Set(Utc::now());
    let item = active.update(&txn).await?;

    LocationCoupon::update_many()
        .col_expr(location_coupon::Column::IsActive, Expr::value(false))
        .filter(location_coupon::Column::ImportItemId.eq(item.id))
        .filter(location_coupon::Column::IsActive.eq(true))
        .exec(&txn)
        .await?;
    let coupon = coupon_for(&item, place).insert(&txn).await?;

    let batch = adjust_batch(&txn, batch, CounterDelta::between(previous_status, next_status)).await?;

    txn.commit().await?;

    info!(
        item_id,
        from = %previous_status,
        coupon_id = coupon.id,
        "Linked item to place"
    );
    Ok(LinkOutcome {
        previous_status,
        item,
        coupon,
        batch,
    })
}

/// Marks a pending item as skipped.
///
/// Skipping an item that is already skipped changes nothing and reports
/// `changed = false`; counters are only decremented for a real transition.
///
/// # Errors
/// * [`Error::ItemNotFound`] if the item does not exist
/// * [`Error::InvalidTransition`] if the item is matched
/// * [`Error::BatchClosed`] if its batch was cancelled
#[instrument(skip(db))]
pub async fn skip(db: &DatabaseConnection, item_id: i64) -> Result<SkipOutcome> {
    let txn = db.begin().await?;

    let item = load_item(&txn, item_id).await?;
    let previous_status = item.status;
    let batch = open_batch_of(&txn, &item).await?;

    let Some(next_status) = skip_transition(previous_status)? else {
        txn.commit().await?;
        return Ok(SkipOutcome {
            changed: false,
            item,
            batch,
        });
    };

    let mut active: import_item::ActiveModel = item.into();
    active.status = Set(next_status);
    active.updated_at = Set(Utc::now());
    let item = active.update(&txn).await?;

    let batch = adjust_batch(&txn, batch, CounterDelta::between(previous_status, next_status)).await?;

    txn.commit().await?;

    info!(item_id, "Skipped item");
    Ok(SkipOutcome {
        changed: true,
        item,
        batch,
    })
}
