//! Batch counters - Re-derives a batch's aggregates from its items.
//!
//! Counters are always recomputed by scanning items rather than patched with
//! increments, so running a refresh again (for example after a crash between an
//! item write and a counter write) repairs them.

use crate::{
    entities::{ImportBatch, ImportItem, import_batch, import_item, import_item::ItemStatus},
    errors::{Error, Result},
};
use sea_orm::{QuerySelect, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::debug;

/// Per-status item counts of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounters {
    /// All items
    pub total: i64,
    /// Matched during import
    pub auto_matched: i64,
    /// Linked by a reviewer
    pub manual_matched: i64,
    /// Waiting for a reviewer
    pub pending: i64,
    /// Dismissed by a reviewer
    pub skipped: i64,
}

impl BatchCounters {
    /// Tallies a set of item statuses.
    pub fn from_statuses(statuses: impl IntoIterator<Item = ItemStatus>) -> Self {
        statuses
            .into_iter()
            .fold(Self::default(), |mut counters, status| {
                counters.total += 1;
                match status {
                    ItemStatus::Pending => counters.pending += 1,
                    ItemStatus::AutoMatched => counters.auto_matched += 1,
                    ItemStatus::ManualMatched => counters.manual_matched += 1,
                    ItemStatus::Skipped => counters.skipped += 1,
                }
                counters
            })
    }

    /// Reads the stored counters of a batch. Skipped items are whatever the
    /// other counters do not account for.
    #[must_use]
    pub const fn of_batch(batch: &import_batch::Model) -> Self {
        let accounted = batch.auto_matched_count + batch.manual_matched_count + batch.pending_count;
        let skipped = batch.total_items - accounted;
        Self {
            total: batch.total_items,
            auto_matched: batch.auto_matched_count,
            manual_matched: batch.manual_matched_count,
            pending: batch.pending_count,
            skipped: if skipped > 0 { skipped } else { 0 },
        }
    }

    /// True when every item is accounted for by exactly one status.
    #[must_use]
    pub const fn reconciles(&self) -> bool {
        self.total == self.auto_matched + self.manual_matched + self.pending + self.skipped
    }
}

/// Counts the current statuses of a batch's items without writing anything.
pub async fn count_batch_items<C: ConnectionTrait>(db: &C, batch_id: i64) -> Result<BatchCounters> {
    let statuses: Vec<ItemStatus> = ImportItem::find()
        .select_only()
        .column(import_item::Column::Status)
        .filter(import_item::Column::ImportBatchId.eq(batch_id))
        .into_tuple()
        .all(db)
        .await?;

    Ok(BatchCounters::from_statuses(statuses))
}

/// Rescans a batch's items and stores the resulting counters on the batch.
///
/// Status is left untouched; callers decide whether the new counts complete or
/// reopen the batch.
pub async fn refresh_batch_counters<C: ConnectionTrait>(db: &C, batch_id: i64) -> Result<BatchCounters> {
    let counters = count_batch_items(db, batch_id).await?;

    let updated = ImportBatch::update_many()
        .col_expr(import_batch::Column::TotalItems, Expr::value(counters.total))
        .col_expr(
            import_batch::Column::AutoMatchedCount,
            Expr::value(counters.auto_matched),
        )
        .col_expr(
            import_batch::Column::ManualMatchedCount,
            Expr::value(counters.manual_matched),
        )
        .col_expr(import_batch::Column::PendingCount, Expr::value(counters.pending))
        .filter(import_batch::Column::Id.eq(batch_id))
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        return Err(Error::BatchNotFound { id: batch_id });
    }

    debug!(batch_id, ?counters, "Refreshed batch counters");
    Ok(counters)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_from_statuses() {
        let counters = BatchCounters::from_statuses([
            ItemStatus::Pending,
            ItemStatus::AutoMatched,
            ItemStatus::Pending,
            ItemStatus::Skipped,
            ItemStatus::ManualMatched,
        ]);

        assert_eq!(counters.total, 5);
        assert_eq!(counters.pending, 2);
        assert_eq!(counters.auto_matched, 1);
        assert_eq!(counters.manual_matched, 1);
        assert_eq!(counters.skipped, 1);
        assert!(counters.reconciles());
        assert!(BatchCounters::default().reconciles());
    }

    #[tokio::test]
    async fn test_refresh_repairs_stale_counters() -> Result<()> {
        let db = setup_test_db().await?;
        let batch = create_test_batch(&db).await?;
        create_test_item(&db, batch.id, Some("e1"), "Loja A", ItemStatus::Pending).await?;
        create_test_item(&db, batch.id, Some("e2"), "Loja B", ItemStatus::Skipped).await?;
        create_test_item(&db, batch.id, None, "Loja C", ItemStatus::AutoMatched).await?;

        // the batch was created with zeroed counters
        let counters = refresh_batch_counters(&db, batch.id).await?;
        assert_eq!(counters.total, 3);
        assert_eq!(counters.pending, 1);
        assert_eq!(counters.skipped, 1);

        let stored = ImportBatch::find_by_id(batch.id).one(&db).await?.unwrap();
        assert_eq!(stored.total_items, 3);
        assert_eq!(stored.auto_matched_count, 1);
        assert_eq!(stored.manual_matched_count, 0);
        assert_eq!(stored.pending_count, 1);
        assert_eq!(BatchCounters::of_batch(&stored), counters);

        // a second refresh changes nothing
        assert_eq!(refresh_batch_counters(&db, batch.id).await?, counters);
        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_unknown_batch() -> Result<()> {
        let db = setup_test_db().await?;
        let result = refresh_batch_counters(&db, 999).await;
        assert!(matches!(result, Err(Error::BatchNotFound { id: 999 })));
        Ok(())
    }
}
