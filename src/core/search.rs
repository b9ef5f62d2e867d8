//! Place search - Looking up places for a reviewer beyond the local catalog.
//!
//! The remote service is a single HTTP function. When it is unreachable or
//! answers with something unusable, [`search_places`] falls back to ranking the
//! local catalog so a reviewer always gets candidates.

use crate::{
    config::settings::SearchConfig,
    core::{
        catalog::Catalog,
        matcher::{CandidateOptions, ScoredPlace, find_candidates},
    },
    entities::import_item::PlaceSummary,
    errors::{Error, Result},
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

/// Remote results carry no score of their own.
pub const REMOTE_SIMILARITY: u8 = 100;

/// A place-search backend.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Returns places matching `query`, best first.
    async fn search(&self, query: &str) -> Result<Vec<ScoredPlace>>;
}

/// Display name as sent by the search function: either plain text or a
/// localized object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DisplayName {
    Text(String),
    Localized { text: String },
}

impl DisplayName {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) | Self::Localized { text } => text,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemotePlace {
    id: String,
    display_name: Option<DisplayName>,
    formatted_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    places: Vec<RemotePlace>,
}

impl SearchResponse {
    fn into_places(self) -> Vec<ScoredPlace> {
        self.places
            .into_iter()
            .map(|remote| ScoredPlace {
                place: PlaceSummary {
                    place_id: remote.id,
                    name: remote
                        .display_name
                        .map(DisplayName::into_text)
                        .unwrap_or_default(),
                    address: remote.formatted_address,
                },
                similarity: REMOTE_SIMILARITY,
            })
            .collect()
    }
}

/// Maps a raw search-function response body to scored places.
///
/// # Errors
/// [`Error::PlaceSearch`] when the body is not the expected JSON object.
pub fn parse_search_response(body: &[u8]) -> Result<Vec<ScoredPlace>> {
    let response: SearchResponse = serde_json::from_slice(body).map_err(|e| Error::PlaceSearch {
        message: format!("Unexpected response: {e}"),
    })?;
    Ok(response.into_places())
}

/// Calls the place-search HTTP function.
pub struct HttpPlaceSearch {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpPlaceSearch {
    /// Client for the function at `url`, sending `api_key` as a bearer token.
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
        }
    }

    /// Builds a client from `[search]` settings; `None` when no URL is configured.
    #[must_use]
    pub fn from_config(config: &SearchConfig) -> Option<Self> {
        config
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| Self::new(url, config.api_key.clone()))
    }
}

#[async_trait]
impl PlaceSearch for HttpPlaceSearch {
    async fn search(&self, query: &str) -> Result<Vec<ScoredPlace>> {
        let search_error = |e: reqwest::Error| Error::PlaceSearch {
            message: e.to_string(),
        };

        let mut request = self
            .client
            .post(&self.url)
            .json(&json!({ "action": "search", "query": query }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(search_error)?;
        if !response.status().is_success() {
            return Err(Error::PlaceSearch {
                message: format!("HTTP {}", response.status()),
            });
        }

        let body = response.bytes().await.map_err(search_error)?;
        parse_search_response(&body)
    }
}

/// Finds places for a reviewer's query.
///
/// Blank queries return nothing without calling the service. Any service
/// failure is logged and answered from the local catalog instead.
#[instrument(skip(service, catalog))]
pub async fn search_places(
    service: &dyn PlaceSearch,
    query: &str,
    catalog: &Catalog,
    options: CandidateOptions,
) -> Vec<ScoredPlace> {
    if query.trim().is_empty() {
        return Vec::new();
    }

    match service.search(query).await {
        Ok(places) => {
            debug!(results = places.len(), "Remote place search succeeded");
            places
        }
        Err(e) => {
            warn!(error = %e, "Place search failed, falling back to local catalog");
            find_candidates(query, catalog, options)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::summary;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSearch {
        result: fn() -> Result<Vec<ScoredPlace>>,
        calls: AtomicUsize,
    }

    impl StubSearch {
        fn new(result: fn() -> Result<Vec<ScoredPlace>>) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PlaceSearch for StubSearch {
        async fn search(&self, _query: &str) -> Result<Vec<ScoredPlace>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn catalog() -> Catalog {
        Catalog::new([summary("p1", "Restaurante Sol"), summary("p2", "Café Brasil")])
    }

    #[test]
    fn test_parse_response_shapes() {
        let body = r#"{"places":[
            {"id":"a","displayName":{"text":"Padaria Central","languageCode":"pt"},"formattedAddress":"Rua A, 1"},
            {"id":"b","displayName":"Bar do Zé"},
            {"id":"c"}
        ]}"#;

        let places = parse_search_response(body.as_bytes()).unwrap();
        assert_eq!(places.len(), 3);
        assert_eq!(places[0].place.place_id, "a");
        assert_eq!(places[0].place.name, "Padaria Central");
        assert_eq!(places[0].place.address.as_deref(), Some("Rua A, 1"));
        assert_eq!(places[1].place.name, "Bar do Zé");
        assert_eq!(places[1].place.address, None);
        assert_eq!(places[2].place.name, "");
        assert!(places.iter().all(|p| p.similarity == REMOTE_SIMILARITY));
    }

    #[test]
    fn test_parse_response_without_places() {
        assert!(parse_search_response(b"{}").unwrap().is_empty());
        assert!(matches!(
            parse_search_response(b"not json"),
            Err(Error::PlaceSearch { .. })
        ));
    }

    #[test]
    fn test_from_config_requires_url() {
        assert!(HttpPlaceSearch::from_config(&SearchConfig::default()).is_none());
        let config = SearchConfig {
            url: Some("https://search.example.com/fn".to_string()),
            api_key: Some("secret".to_string()),
        };
        let service = HttpPlaceSearch::from_config(&config).unwrap();
        assert_eq!(service.url, "https://search.example.com/fn");
        assert_eq!(service.api_key.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_remote_results_are_returned() {
        let service = StubSearch::new(|| {
            Ok(vec![ScoredPlace {
                place: summary("remote-1", "Sol Nascente"),
                similarity: REMOTE_SIMILARITY,
            }])
        });

        let places = search_places(&service, "sol", &catalog(), CandidateOptions::default()).await;
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].place.place_id, "remote-1");
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_catalog() {
        let service = StubSearch::new(|| {
            Err(Error::PlaceSearch {
                message: "HTTP 500".to_string(),
            })
        });

        let places = search_places(&service, "Cafe Brasil", &catalog(), CandidateOptions::default()).await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(places[0].place.place_id, "p2");
        assert_eq!(places[0].similarity, 100);
    }

    #[tokio::test]
    async fn test_blank_query_skips_service() {
        let service = StubSearch::new(|| Ok(Vec::new()));
        let places = search_places(&service, "  ", &catalog(), CandidateOptions::default()).await;
        assert!(places.is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }
}
