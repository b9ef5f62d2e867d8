use nearbyme_coupons::{
    config::{
        database::{create_connection, create_tables},
        settings::load_app_configuration,
    },
    core::{
        catalog::Catalog,
        import::run_full_import,
        incremental::add_to_batch,
        source::{FeedSource, load_feed},
    },
    errors::{Error, Result},
};
use dotenvy::dotenv;
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Feed to import; falls back to `[feed] default_source` in config.toml.
const FEED_SOURCE_VAR: &str = "COUPON_FEED_SOURCE";
/// When set, records are added to this batch instead of starting a new one.
const TARGET_BATCH_VAR: &str = "COUPON_TARGET_BATCH";

fn target_batch() -> Result<Option<i64>> {
    match env::var(TARGET_BATCH_VAR) {
        Ok(value) => value
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|e| Error::Config {
                message: format!("{TARGET_BATCH_VAR} must be a batch id: {e}"),
            }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::EnvVar(e)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the main application configuration
    let app_config = load_app_configuration()?;
    info!("Successfully processed application configuration.");

    // 4. Connect and make sure the tables exist
    let db = create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    create_tables(&db).await?;

    // 5. Snapshot the favorite places once for the whole run
    let catalog = Catalog::load(&db).await?;
    if catalog.is_empty() {
        warn!("No favorite places found, every offer will stay pending");
    }

    // 6. Load and parse the feed before touching any batch
    let source_value = match env::var(FEED_SOURCE_VAR) {
        Ok(value) => value,
        Err(env::VarError::NotPresent) => app_config.feed.default_source.clone().ok_or_else(|| Error::Config {
            message: format!("Set {FEED_SOURCE_VAR} or [feed] default_source"),
        })?,
        Err(e) => return Err(Error::EnvVar(e)),
    };
    let feed = load_feed(&FeedSource::parse(&source_value)?)
        .await
        .inspect_err(|e| error!("Failed to load feed: {}", e))?;

    // 7. Import
    if let Some(batch_id) = target_batch()? {
        let summary = add_to_batch(&db, &catalog, batch_id, &feed.records, &app_config.matching).await?;
        info!(
            batch_id = summary.batch_id,
            updated = summary.updated_items,
            new = summary.new_items,
            preserved = summary.preserved_matches,
            pending = summary.counters.pending,
            "Incremental import finished"
        );
    } else {
        let summary = run_full_import(&db, &catalog, &feed.records, &feed.source, &app_config.matching).await?;
        info!(
            batch_id = summary.batch_id,
            total = summary.total_items,
            new = summary.new_items,
            updated = summary.updated_items,
            auto_matched = summary.auto_matched,
            pending = summary.pending,
            ambiguous = summary.ambiguous,
            "Full import finished"
        );
    }

    Ok(())
}
