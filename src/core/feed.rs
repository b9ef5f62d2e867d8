//! Feed parsing - Turns a Google-Shopping-style JSON feed into offer records.
//!
//! The feed is expected as `{ "feed": { "rss": { "channel": { "item": [...] } } } }`
//! where each item carries `g:`-prefixed keys. The document is validated as a
//! whole: if any item is malformed nothing is returned, so a half-valid feed can
//! never create a half-populated batch.

use crate::errors::ParseError;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Currency assumed when a price string has none.
pub const DEFAULT_CURRENCY: &str = "BRL";

static PRICE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[\d,.]+").ok());
static CURRENCY_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[A-Z]{3}").ok());

/// One offer extracted from the feed.
///
/// Records only exist between parsing and persistence; downstream code relies on
/// the parser having validated their shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedOfferRecord {
    /// `g:id`, stringified
    pub external_id: Option<String>,
    /// `g:brand`, the merchant name matched against places
    pub brand_name: String,
    /// `g:title`
    pub title: Option<String>,
    /// `g:description`
    pub description: Option<String>,
    /// `g:link`
    pub offer_link: Option<String>,
    /// `g:image_link`
    pub image_link: Option<String>,
    /// Amount of `g:price`
    pub original_price: Option<f64>,
    /// Amount of `g:sale_price`
    pub sale_price: Option<f64>,
    /// Currency code of `g:price`, BRL when absent
    pub currency: String,
    /// `g:availability`
    pub availability: Option<String>,
    /// `g:google_product_category`, `None` for 0
    pub category_id: Option<i64>,
}

/// Parses raw feed bytes.
///
/// # Errors
/// * [`ParseError::MalformedJson`] when the bytes are not JSON
/// * [`ParseError::InvalidStructure`] when the layout is wrong or any item lacks `g:brand`
pub fn parse_feed(raw: &[u8]) -> Result<Vec<FeedOfferRecord>, ParseError> {
    let document: Value = serde_json::from_slice(raw)?;
    parse_document(&document)
}

/// Validates and flattens an already decoded feed document.
pub fn parse_document(document: &Value) -> Result<Vec<FeedOfferRecord>, ParseError> {
    let items = feed_items(document)?;

    let mut objects = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let object = item.as_object().ok_or_else(|| invalid(format!("item {index} is not an object")))?;
        if brand_of(object).is_none() {
            return Err(invalid(format!("item {index} has no usable g:brand")));
        }
        objects.push(object);
    }

    Ok(objects.into_iter().map(record_from_item).collect())
}

fn feed_items(document: &Value) -> Result<&Vec<Value>, ParseError> {
    if !document.is_object() {
        return Err(invalid("document root is not an object"));
    }

    document
        .pointer("/feed/rss/channel/item")
        .ok_or_else(|| invalid("missing feed.rss.channel.item"))?
        .as_array()
        .ok_or_else(|| invalid("feed.rss.channel.item is not a list"))
}

fn invalid(reason: impl Into<String>) -> ParseError {
    ParseError::InvalidStructure {
        reason: reason.into(),
    }
}

fn record_from_item(item: &Map<String, Value>) -> FeedOfferRecord {
    let price = scalar_text(item.get("g:price"));

    FeedOfferRecord {
        external_id: scalar_text(item.get("g:id")).filter(|id| !id.is_empty()),
        brand_name: brand_of(item).unwrap_or_default(),
        title: scalar_text(item.get("g:title")),
        description: scalar_text(item.get("g:description")),
        offer_link: scalar_text(item.get("g:link")),
        image_link: scalar_text(item.get("g:image_link")),
        original_price: price.as_deref().and_then(parse_price),
        sale_price: scalar_text(item.get("g:sale_price"))
            .as_deref()
            .and_then(parse_price),
        currency: price
            .as_deref()
            .and_then(extract_currency)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        availability: scalar_text(item.get("g:availability")),
        category_id: item
            .get("g:google_product_category")
            .and_then(category_of),
    }
}

fn brand_of(item: &Map<String, Value>) -> Option<String> {
    scalar_text(item.get("g:brand"))
}

/// Strings are taken as-is and numbers are stringified; anything else is absent.
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// A zero category means "uncategorized" in the feed.
fn category_of(value: &Value) -> Option<i64> {
    let category = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }?;
    (category != 0).then_some(category)
}

/// Extracts the amount from a price string such as `"67.90 BRL"` or `"R$ 12,50"`.
///
/// The first run of digits, commas and dots is taken, commas become dots and the
/// longest leading decimal is parsed, so `"1,234.56"` reads as `1.234`.
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    let pattern = PRICE_PATTERN.as_ref()?;
    let candidate = pattern.find(text)?.as_str().replace(',', ".");

    // at most one decimal point survives
    let mut parts = candidate.splitn(3, '.');
    let whole = parts.next().unwrap_or_default();
    let prefix = match parts.next() {
        Some(fraction) => format!("{whole}.{fraction}"),
        None => whole.to_string(),
    };

    prefix.parse::<f64>().ok().filter(|amount| amount.is_finite())
}

/// Returns the first three consecutive upper-case letters of a price string.
#[must_use]
pub fn extract_currency(text: &str) -> Option<String> {
    let pattern = CURRENCY_PATTERN.as_ref()?;
    pattern.find(text).map(|found| found.as_str().to_string())
}
