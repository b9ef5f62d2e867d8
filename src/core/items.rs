//! Item queries - Read-only views over imported items for the review screen.

use crate::{
    core::counters::BatchCounters,
    entities::{
        ImportItem,
        import_item::{self, ItemStatus},
    },
    errors::Result,
};
use sea_orm::{
    Condition, QueryOrder, QuerySelect,
    prelude::*,
    sea_query::{Expr, Func},
};

/// Items shown per page when no page size is given.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Narrows [`list_items`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    /// Only items in this status
    pub status: Option<ItemStatus>,
    /// Case-insensitive substring of the brand name or matched place name
    pub search: Option<String>,
}

/// One page of items plus the totals needed to render the pager.
#[derive(Debug, Clone)]
pub struct ItemPage {
    /// Items on this page, newest first
    pub items: Vec<import_item::Model>,
    /// Items matching the filter across all pages
    pub total_items: u64,
    /// Pages at the requested page size
    pub total_pages: u64,
    /// 1-based
    pub page: u64,
}

/// All items of a batch in the order they were created.
pub async fn list_batch_items<C: ConnectionTrait>(db: &C, batch_id: i64) -> Result<Vec<import_item::Model>> {
    ImportItem::find()
        .filter(import_item::Column::ImportBatchId.eq(batch_id))
        .order_by_asc(import_item::Column::CreatedAt)
        .order_by_asc(import_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

fn filter_condition(filter: &ItemFilter) -> Condition {
    let mut condition = Condition::all();

    if let Some(status) = filter.status {
        condition = condition.add(import_item::Column::Status.eq(status));
    }

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", term.to_lowercase());
        let lower = |column: import_item::Column| Expr::expr(Func::lower(Expr::col(column)));
        condition = condition.add(
            Condition::any()
                .add(lower(import_item::Column::BrandName).like(pattern.clone()))
                .add(lower(import_item::Column::MatchedPlaceName).like(pattern)),
        );
    }

    condition
}

/// Lists items across all batches, newest first, one page at a time.
///
/// # Arguments
/// * `page` - 1-based page number; 0 is treated as 1
/// * `page_size` - defaults to [`DEFAULT_PAGE_SIZE`]
pub async fn list_items<C: ConnectionTrait>(
    db: &C,
    filter: &ItemFilter,
    page: u64,
    page_size: Option<u64>,
) -> Result<ItemPage> {
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let page = page.max(1);

    let paginator = ImportItem::find()
        .filter(filter_condition(filter))
        .order_by_desc(import_item::Column::CreatedAt)
        .order_by_desc(import_item::Column::Id)
        .paginate(db, page_size);

    let totals = paginator.num_items_and_pages().await?;
    let items = paginator.fetch_page(page - 1).await?;

    Ok(ItemPage {
        items,
        total_items: totals.number_of_items,
        total_pages: totals.number_of_pages,
        page,
    })
}

/// Status counts over every imported item.
pub async fn item_stats<C: ConnectionTrait>(db: &C) -> Result<BatchCounters> {
    let statuses: Vec<ItemStatus> = ImportItem::find()
        .select_only()
        .column(import_item::Column::Status)
        .into_tuple()
        .all(db)
        .await?;

    Ok(BatchCounters::from_statuses(statuses))
}
