//! Name normalization for cross-provider entity matching.
//!
//! Every comparison in the matching layers goes through these functions,
//! so they are deliberately pure, total, and rule-based: suffix
//! stripping, substring containment and shared-token checks rather than
//! edit distance or phonetics. Widening recall here directly raises the
//! risk of merging two different real-world people or clubs.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Generational and ordinal suffixes stripped from trailing name tokens.
const NAME_SUFFIXES: &[&str] = &[
    "jr", "sr", "i", "ii", "iii", "iv", "v", "1st", "2nd", "3rd", "4th", "5th",
];

/// Normalize a name for comparison: trim, decompose and drop accents,
/// lowercase, fold hyphens/underscores to spaces, collapse whitespace.
///
/// Total and idempotent; empty input yields an empty string.
pub fn normalize(name: &str) -> String {
    name.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            '-' | '_' => ' ',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove generational/ordinal suffixes from the trailing tokens,
/// repeatedly, so "baldwin iv jr" and "Baldwin IV" both reduce to
/// "baldwin". Never strips the only remaining token.
pub fn strip_suffix(name: &str) -> String {
    let mut tokens: Vec<&str> = name.split_whitespace().collect();
    while tokens.len() > 1 {
        let last = tokens[tokens.len() - 1]
            .trim_end_matches('.')
            .to_lowercase();
        if NAME_SUFFIXES.contains(&last.as_str()) {
            tokens.pop();
        } else {
            break;
        }
    }
    tokens.join(" ")
}

/// Equal after `normalize`.
pub fn names_equal(a: &str, b: &str) -> bool {
    let (a, b) = (normalize(a), normalize(b));
    !a.is_empty() && a == b
}

/// Equal after `normalize`, or after additionally stripping
/// generational suffixes from both sides.
pub fn names_equal_fuzzy(a: &str, b: &str) -> bool {
    if names_equal(a, b) {
        return true;
    }
    let (a, b) = (strip_suffix(&normalize(a)), strip_suffix(&normalize(b)));
    !a.is_empty() && a == b
}

/// Team-name equality tolerant of provider formatting differences:
/// exact normalized match; substring containment (sponsor-prefixed
/// names like "Maccabi Playtika Tel Aviv" vs "Maccabi Tel Aviv"); or a
/// shared first token (club-type word) plus shared last token (city)
/// when both names have at least two tokens.
pub fn team_names_equal(a: &str, b: &str) -> bool {
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    if a.contains(&b) || b.contains(&a) {
        return true;
    }
    let a_tokens: Vec<&str> = a.split(' ').collect();
    let b_tokens: Vec<&str> = b.split(' ').collect();
    a_tokens.len() >= 2
        && b_tokens.len() >= 2
        && a_tokens.first() == b_tokens.first()
        && a_tokens.last() == b_tokens.last()
}

/// Storage key for last-name candidate lookups: normalized, then
/// suffix-stripped, so "Baldwin IV" and "Baldwin" share a key.
pub fn last_name_key(last_name: &str) -> String {
    strip_suffix(&normalize(last_name))
}

/// Split a full name into (first, last): first whitespace token is the
/// first name, the remainder joined is the last name. A single-token
/// input yields `(token, "")`.
pub fn parse_full_name(full: &str) -> (String, String) {
    // "LAST, FIRST" listings put the family name before the comma.
    if let Some((last, first)) = full.split_once(',') {
        return (first.trim().to_string(), last.trim().to_string());
    }
    let mut tokens = full.split_whitespace();
    let first = tokens.next().unwrap_or("").to_string();
    let last = tokens.collect::<Vec<_>>().join(" ");
    (first, last)
}
