//! Deterministic scene-header normalization.
//!
//! Two headers with equal [`normalization_key`]s are certainly the same place
//! and are merged by [`pre_merge`] before any external call.

use std::sync::LazyLock;

use locscout_core::UniqueLocation;
use regex::Regex;

use crate::merge::merge_by;

static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:INT|EXT)\.?\s*/\s*(?:INT|EXT)\.?|I\s*/\s*E\.?|INTERIOR\b|EXTERIOR\b|(?:INT|EXT)\.|(?:INT|EXT)(?:\s|$))\s*",
    )
    .expect("valid regex")
});

static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\s*[-–—]+\s*(?:MOMENTS? LATER|LATER THAT (?:DAY|NIGHT)|SAME TIME|CONTINUOUS(?: ACTION)?|DAY|NIGHT|MORNING|AFTERNOON|EVENING|DAWN|DUSK|SUNSET|SUNRISE|LATER|SAME)\.?\s*$",
    )
    .expect("valid regex")
});

static PAREN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid regex"));

const QUOTES: [char; 7] = ['"', '\'', '`', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}'];
const DASHES: [char; 3] = ['-', '\u{2013}', '\u{2014}'];

fn strip_markers(mut s: String) -> String {
    loop {
        let without_prefix = PREFIX_RE.replace(s.trim(), "").into_owned();
        let without_suffix = SUFFIX_RE.replace(without_prefix.trim(), "").into_owned();
        let next = without_suffix.trim().to_string();
        if next == s {
            return next;
        }
        s = next;
    }
}

fn normalize_once(header: &str) -> String {
    let upper: String = header
        .to_uppercase()
        .chars()
        .filter(|c| !QUOTES.contains(c))
        .collect();
    let without_parens = PAREN_RE.replace_all(&upper, " ");
    let stripped = strip_markers(without_parens.into_owned());
    let spaced = stripped.replace(DASHES, " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | ':' | ';'))
        .to_string()
}

/// Normalization key for a raw scene header.
///
/// Uppercases, drops quote characters and parenthetical asides, strips a
/// leading INT/EXT marker and a trailing dash-separated time-of-day suffix,
/// then collapses hyphens and whitespace. Runs to a fixpoint, so
/// `normalization_key(&normalization_key(x)) == normalization_key(x)`.
#[must_use]
pub fn normalization_key(header: &str) -> String {
    let mut current = normalize_once(header);
    // After the first pass every change removes characters or replaces a dash,
    // so this converges quickly; the bound guards pathological input.
    for _ in 0..16 {
        let next = normalize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Merges locations whose headers share a non-empty normalization key.
///
/// First-seen order is preserved; each group's survivor is its first member.
#[must_use]
pub fn pre_merge(locations: Vec<UniqueLocation>) -> Vec<UniqueLocation> {
    merge_by(locations, |loc| {
        let key = normalization_key(loc.header());
        (!key.is_empty()).then_some(key)
    })
    .into_iter()
    .map(|group| group.location)
    .collect()
}
