//! Feed sources - Reading a feed document from a local file or a URL.
//!
//! Loading only fetches and parses. No batch exists until an importer is
//! handed the records, so a rejected document leaves the store untouched.

use crate::{
    core::{
        batch::ImportSource,
        feed::{FeedOfferRecord, parse_feed},
    },
    entities::import_batch::SourceType,
    errors::{Error, Result},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Where to read a feed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// A `.json` file on disk
    File(PathBuf),
    /// An `http(s)` URL
    Url(String),
}

impl FeedSource {
    /// Interprets a configured source: anything starting with `http` is a URL,
    /// everything else a file path.
    ///
    /// # Errors
    /// [`Error::Config`] when the value is blank or names a file that is not `.json`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::Config {
                message: "Feed source is empty".to_string(),
            });
        }

        if value.starts_with("http") {
            return Ok(Self::Url(value.to_string()));
        }

        let path = PathBuf::from(value);
        if !is_json_file(&path) {
            return Err(Error::Config {
                message: format!("Feed file must be a .json file: {value}"),
            });
        }
        Ok(Self::File(path))
    }

    /// The batch metadata recorded for this source.
    #[must_use]
    pub fn import_source(&self) -> ImportSource {
        match self {
            Self::File(path) => ImportSource {
                source_type: SourceType::File,
                source_name: path
                    .file_name()
                    .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned()),
            },
            Self::Url(url) => ImportSource {
                source_type: SourceType::Url,
                source_name: url.clone(),
            },
        }
    }
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Parsed records plus the source they came from.
#[derive(Debug, Clone)]
pub struct LoadedFeed {
    /// Validated offers in feed order
    pub records: Vec<FeedOfferRecord>,
    /// Type and name recorded on the batch
    pub source: ImportSource,
}

/// Reads and parses a feed.
///
/// # Errors
/// * [`Error::Fetch`] if the file cannot be read or the URL does not answer 2xx
/// * [`Error::Feed`] if the document is rejected by the parser
#[instrument]
pub async fn load_feed(source: &FeedSource) -> Result<LoadedFeed> {
    let import_source = source.import_source();
    let raw = match source {
        FeedSource::File(path) => read_file(path, &import_source.source_name).await?,
        FeedSource::Url(url) => download(url).await?,
    };
    debug!(bytes = raw.len(), "Feed fetched");

    let records = parse_feed(&raw)?;
    info!(
        records = records.len(),
        source = %import_source.source_name,
        "Feed parsed"
    );

    Ok(LoadedFeed {
        records,
        source: import_source,
    })
}

async fn read_file(path: &Path, source_name: &str) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| Error::Fetch {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}

async fn download(url: &str) -> Result<Vec<u8>> {
    let fetch_error = |message: String| Error::Fetch {
        source_name: url.to_string(),
        message,
    };

    let response = reqwest::get(url)
        .await
        .map_err(|e| fetch_error(e.to_string()))?;
    if !response.status().is_success() {
        return Err(fetch_error(format!("HTTP {}", response.status())));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;
    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::ParseError;

    const SAMPLE: &str = r#"{"feed":{"rss":{"channel":{"item":[
        {"g:id":"X","g:brand":"Restaurante Sol","g:title":"Oferta","g:price":"10.00 BRL","g:sale_price":"8.50 BRL"}
    ]}}}}"#;

    fn temp_feed(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nearbyme-feed-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_source() {
        assert_eq!(
            FeedSource::parse("https://ofertas.example.com/feed.json").unwrap(),
            FeedSource::Url("https://ofertas.example.com/feed.json".to_string())
        );
        assert_eq!(
            FeedSource::parse(" data/feed.JSON ").unwrap(),
            FeedSource::File(PathBuf::from("data/feed.JSON"))
        );
        assert!(matches!(FeedSource::parse("feed.xml"), Err(Error::Config { .. })));
        assert!(matches!(FeedSource::parse("   "), Err(Error::Config { .. })));
    }

    #[test]
    fn test_import_source() {
        let file = FeedSource::File(PathBuf::from("/tmp/uploads/cupons.json")).import_source();
        assert_eq!(file.source_type, SourceType::File);
        assert_eq!(file.source_name, "cupons.json");

        let url = FeedSource::Url("https://ofertas.example.com/feed".to_string()).import_source();
        assert_eq!(url.source_type, SourceType::Url);
        assert_eq!(url.source_name, "https://ofertas.example.com/feed");
    }

    #[tokio::test]
    async fn test_load_file() -> Result<()> {
        let path = temp_feed("sample.json", SAMPLE);
        let feed = load_feed(&FeedSource::File(path)).await?;

        assert_eq!(feed.records.len(), 1);
        assert_eq!(feed.records[0].brand_name, "Restaurante Sol");
        assert_eq!(feed.source.source_name, "sample.json");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let path = std::env::temp_dir().join("nearbyme-does-not-exist.json");
        let result = load_feed(&FeedSource::File(path)).await;
        assert!(matches!(result, Err(Error::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_bad_document_is_parse_error() {
        let path = temp_feed("broken.json", "{\"feed\": ");
        let result = load_feed(&FeedSource::File(path)).await;
        assert!(matches!(result, Err(Error::Feed(ParseError::MalformedJson(_)))));
    }
}
