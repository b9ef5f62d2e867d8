//! Place matching - Finds the catalog place an offer belongs to.
//!
//! Three strategies live here and are deliberately kept apart:
//! - [`find_exact_match`]: normalized-name equality, the only thing that auto-matches
//! - [`find_candidates`]: similarity-ranked shortlist for reviewer-driven search
//! - [`suggest_places`]: permissive containment/token filter stored on imported items
//!
//! Matching never fails; "nothing found" is an empty result.

use crate::{
    config::settings::MatchingConfig,
    core::{
        catalog::{Catalog, CatalogEntry},
        text::{normalize, similarity},
    },
    entities::import_item::PlaceSummary,
};
use serde::Serialize;
use std::collections::HashSet;

/// Outcome of an exact-name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExactMatch<'a> {
    /// No place has this normalized name
    None,
    /// Exactly one place has this normalized name
    Unique(&'a PlaceSummary),
    /// Several distinct places share the normalized name, in catalog order.
    /// Never auto-matched: a reviewer has to pick.
    Ambiguous(Vec<&'a PlaceSummary>),
}

impl<'a> ExactMatch<'a> {
    /// The matched place, only when the match is unambiguous.
    #[must_use]
    pub fn place(&self) -> Option<&'a PlaceSummary> {
        match self {
            Self::Unique(place) => Some(*place),
            Self::None | Self::Ambiguous(_) => None,
        }
    }

    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous(_))
    }
}

/// Finds the catalog places whose normalized name equals the normalized `name`.
/// A blank name matches nothing.
#[must_use]
pub fn find_exact_match<'a>(name: &str, catalog: &'a Catalog) -> ExactMatch<'a> {
    let wanted = normalize(name);
    if wanted.is_empty() {
        return ExactMatch::None;
    }
    let mut hits: Vec<&PlaceSummary> = catalog
        .entries()
        .iter()
        .filter(|entry| entry.normalized_name == wanted)
        .map(|entry| &entry.place)
        .collect();

    match hits.len() {
        0 => ExactMatch::None,
        1 => hits.pop().map_or(ExactMatch::None, ExactMatch::Unique),
        _ => ExactMatch::Ambiguous(hits),
    }
}

/// Limits for [`find_candidates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateOptions {
    /// Candidates scoring below this are dropped
    pub min_score: u8,
    /// At most this many candidates are returned
    pub max_results: usize,
}

impl Default for CandidateOptions {
    fn default() -> Self {
        Self {
            min_score: 30,
            max_results: 10,
        }
    }
}

impl From<&MatchingConfig> for CandidateOptions {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            min_score: config.min_score,
            max_results: config.max_results,
        }
    }
}

/// A place with its similarity to the searched name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredPlace {
    #[serde(flatten)]
    pub place: PlaceSummary,
    /// 0-100
    pub similarity: u8,
}

/// Ranks every catalog place by similarity to `name`.
///
/// Places below `min_score` are dropped, the rest are sorted best first with
/// ties kept in catalog order, and the list is cut at `max_results`.
#[must_use]
pub fn find_candidates(name: &str, catalog: &Catalog, options: CandidateOptions) -> Vec<ScoredPlace> {
    let mut scored: Vec<ScoredPlace> = catalog
        .entries()
        .iter()
        .map(|entry| ScoredPlace {
            similarity: similarity(name, &entry.place.name),
            place: entry.place.clone(),
        })
        .filter(|candidate| candidate.similarity >= options.min_score)
        .collect();

    // stable: equal scores keep catalog order
    scored.sort_by(|a, b| b.similarity.cmp(&a.similarity));
    scored.truncate(options.max_results);
    scored
}

/// Picks up to `limit` places loosely related to `name`: one normalized name
/// contains the other, or they share a whole word. No score threshold applies.
#[must_use]
pub fn suggest_places(name: &str, catalog: &Catalog, limit: usize) -> Vec<PlaceSummary> {
    let wanted = normalize(name);
    if wanted.is_empty() {
        return Vec::new();
    }
    let wanted_tokens: HashSet<&str> = wanted.split_whitespace().collect();

    catalog
        .entries()
        .iter()
        .filter(|entry| is_loosely_related(&wanted, &wanted_tokens, entry))
        .take(limit)
        .map(|entry| entry.place.clone())
        .collect()
}

fn is_loosely_related(wanted: &str, wanted_tokens: &HashSet<&str>, entry: &CatalogEntry) -> bool {
    let candidate = entry.normalized_name.as_str();
    if candidate.is_empty() {
        return false;
    }

    candidate.contains(wanted)
        || wanted.contains(candidate)
        || candidate
            .split_whitespace()
            .any(|token| wanted_tokens.contains(token))
}
