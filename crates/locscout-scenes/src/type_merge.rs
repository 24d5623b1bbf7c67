//! Coarse merging of generic sets by canonical room type.
//!
//! Any bedroom, any hallway, any bar: productions scout these once, so
//! locations that classify to the same type collapse into one synthetic
//! location headed `INT. <TYPE>`.

use std::collections::HashSet;
use std::sync::LazyLock;

use locscout_core::{InteriorExterior, UniqueLocation};
use regex::Regex;

use crate::merge::merge_by;
use crate::normalize::normalization_key;

/// Ordered (pattern, canonical type) table. First match wins, so narrower
/// types precede broader ones.
static TYPE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\bDORM(?:ITORY)?\s+ROOM\b", "DORM ROOM"),
        (r"\bBEDROOM\b", "BEDROOM"),
        (r"\bBATHROOM\b|\bRESTROOM\b", "BATHROOM"),
        (r"\bHALLWAY\b|\bCORRIDOR\b", "HALLWAY"),
        (r"\bSTAIRWELL\b|\bSTAIRCASE\b", "STAIRWELL"),
        (r"\bELEVATOR\b", "ELEVATOR"),
        (r"\bKITCHEN\b", "KITCHEN"),
        (r"\bLIVING\s+ROOM\b", "LIVING ROOM"),
        (r"\bCLASSROOM\b|\bLECTURE\s+HALL\b", "CLASSROOM"),
        (r"\bPARKING\s+(?:LOT|GARAGE)\b", "PARKING LOT"),
        (r"\bBAR\b|\bPUB\b|\bTAVERN\b", "BAR"),
        (r"\bCAR\b", "CAR"),
    ]
    .into_iter()
    .map(|(pattern, canonical)| (Regex::new(pattern).expect("valid regex"), canonical))
    .collect()
});

/// Canonical type for a header, if any pattern matches its normalization key.
#[must_use]
pub fn classify(header: &str) -> Option<&'static str> {
    let key = normalization_key(header);
    TYPE_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&key))
        .map(|(_, canonical)| *canonical)
}

fn typed_header(canonical: &str, interior_exterior: InteriorExterior) -> String {
    match interior_exterior {
        InteriorExterior::Interior => format!("INT. {canonical}"),
        InteriorExterior::Exterior => format!("EXT. {canonical}"),
        InteriorExterior::Both => format!("INT./EXT. {canonical}"),
    }
}

/// Merges locations that share a canonical type.
///
/// Headers whose normalization key is in `protected` are left out of
/// classification. A type seen only once keeps its original header.
#[must_use]
pub fn merge_by_type(
    locations: Vec<UniqueLocation>,
    protected: &HashSet<String>,
) -> Vec<UniqueLocation> {
    merge_by(locations, |loc| {
        if protected.contains(&normalization_key(loc.header())) {
            return None;
        }
        classify(loc.header()).map(str::to_string)
    })
    .into_iter()
    .map(|group| {
        let mut location = group.location;
        if let (Some(canonical), true) = (group.key, group.members > 1) {
            let header = typed_header(&canonical, location.interior_exterior());
            location.rename(header);
        }
        location
    })
    .collect()
}
