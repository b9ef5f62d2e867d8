//! Text canonicalization and string similarity.
//!
//! Every name comparison in the importer goes through [`normalize`]; raw
//! strings are never compared directly.

use unicode_normalization::UnicodeNormalization;

/// Range of the Unicode "Combining Diacritical Marks" block.
const COMBINING_MARKS: std::ops::RangeInclusive<char> = '\u{0300}'..='\u{036f}';

/// Canonicalizes a name for comparison: lower-case, canonical decomposition
/// with diacritics removed, surrounding whitespace trimmed.
///
/// `"  Café BRASIL "` becomes `"cafe brasil"`.
#[must_use]
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !COMBINING_MARKS.contains(c))
        .collect();

    stripped.trim().to_string()
}

/// Scores how alike two names are, from 0 (nothing in common) to 100 (equal
/// after normalization).
///
/// The score is `1 - edit_distance / longest_length`, rounded to a whole
/// percentage. An empty name only ever scores 100 against another empty name.
#[must_use]
pub fn similarity(a: &str, b: &str) -> u8 {
    let a = normalize(a);
    let b = normalize(b);

    if a == b {
        return 100;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0;
    }

    let distance = strsim::levenshtein(&a, &b);
    let longest = len_a.max(len_b);

    #[allow(clippy::cast_precision_loss)]
    let ratio = 1.0 - distance as f64 / longest as f64;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = (ratio * 100.0).round().clamp(0.0, 100.0) as u8;
    score
}
