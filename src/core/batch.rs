//! Batch persistence - Creating, reading and closing import batches.

use crate::{
    entities::{
        ImportBatch,
        import_batch::{self, BatchStatus, SourceType},
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::info;

/// Where an import's feed came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSource {
    /// Upload or URL
    pub source_type: SourceType,
    /// File name or URL
    pub source_name: String,
}

/// Inserts a new batch in `processing` state with zeroed counters.
pub async fn create_batch<C: ConnectionTrait>(
    db: &C,
    source: &ImportSource,
    total_items: usize,
) -> Result<import_batch::Model> {
    let batch = import_batch::ActiveModel {
        source_type: Set(source.source_type),
        source_name: Set(Some(source.source_name.clone())),
        total_items: Set(i64::try_from(total_items).unwrap_or(i64::MAX)),
        auto_matched_count: Set(0),
        manual_matched_count: Set(0),
        pending_count: Set(0),
        status: Set(BatchStatus::Processing),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    Ok(batch.insert(db).await?)
}

/// Finds a batch by id.
pub async fn get_batch<C: ConnectionTrait>(db: &C, batch_id: i64) -> Result<Option<import_batch::Model>> {
    ImportBatch::find_by_id(batch_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a batch by id, failing with [`Error::BatchNotFound`] when it does not exist.
pub async fn require_batch<C: ConnectionTrait>(db: &C, batch_id: i64) -> Result<import_batch::Model> {
    get_batch(db, batch_id)
        .await?
        .ok_or(Error::BatchNotFound { id: batch_id })
}

/// Returns the most recently created batch, the one reviewers work on by default.
pub async fn latest_batch<C: ConnectionTrait>(db: &C) -> Result<Option<import_batch::Model>> {
    ImportBatch::find()
        .order_by_desc(import_batch::Column::CreatedAt)
        .order_by_desc(import_batch::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Overwrites a batch's status.
pub(crate) async fn set_batch_status<C: ConnectionTrait>(
    db: &C,
    batch_id: i64,
    status: BatchStatus,
) -> Result<()> {
    let updated = ImportBatch::update_many()
        .col_expr(import_batch::Column::Status, Expr::value(status.as_str()))
        .filter(import_batch::Column::Id.eq(batch_id))
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        return Err(Error::BatchNotFound { id: batch_id });
    }
    Ok(())
}

/// Cancels a batch that is still being worked on.
///
/// Cancelling an already cancelled batch is a no-op; a completed batch cannot
/// be cancelled. Items are left as they are.
pub async fn cancel_batch(db: &DatabaseConnection, batch_id: i64) -> Result<import_batch::Model> {
    let batch = require_batch(db, batch_id).await?;

    match batch.status {
        BatchStatus::Cancelled => Ok(batch),
        BatchStatus::Completed => Err(Error::BatchClosed {
            id: batch_id,
            status: batch.status,
        }),
        BatchStatus::Processing | BatchStatus::Ready => {
            set_batch_status(db, batch_id, BatchStatus::Cancelled).await?;
            info!(batch_id, "Cancelled import batch");
            require_batch(db, batch_id).await
        }
    }
}
