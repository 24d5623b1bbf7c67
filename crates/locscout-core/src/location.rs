//! Screenplay locations as produced by scene extraction and consumed by deduplication.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Whether a location is shot inside, outside, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteriorExterior {
    #[serde(alias = "INT", alias = "int", alias = "INTERIOR")]
    Interior,
    #[serde(alias = "EXT", alias = "ext", alias = "EXTERIOR")]
    Exterior,
    #[serde(alias = "INT/EXT", alias = "int/ext", alias = "BOTH")]
    Both,
}

impl InteriorExterior {
    /// Returns `self` when both sides agree, otherwise [`InteriorExterior::Both`].
    #[must_use]
    pub fn widen(self, other: Self) -> Self {
        if self == other {
            self
        } else {
            Self::Both
        }
    }

    #[must_use]
    pub fn is_exterior_only(self) -> bool {
        self == Self::Exterior
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interior => "interior",
            Self::Exterior => "exterior",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for InteriorExterior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shooting time bucket. Scene headers carry finer labels (DUSK, MORNING) that
/// collapse into day or night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    #[serde(alias = "DAY")]
    Day,
    #[serde(alias = "NIGHT")]
    Night,
    #[serde(alias = "BOTH")]
    Both,
}

impl TimeOfDay {
    /// Returns `self` when both sides agree, otherwise [`TimeOfDay::Both`].
    #[must_use]
    pub fn widen(self, other: Self) -> Self {
        if self == other {
            self
        } else {
            Self::Both
        }
    }

    /// Maps a scene-header time label onto a bucket. Unknown labels yield `None`.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "DAY" | "MORNING" | "DAWN" | "SUNRISE" | "AFTERNOON" => Some(Self::Day),
            "NIGHT" | "EVENING" | "DUSK" | "SUNSET" => Some(Self::Night),
            "BOTH" => Some(Self::Both),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Night => "night",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneOccurrence {
    pub page_number: u32,
    pub context_snippet: String,
}

impl SceneOccurrence {
    #[must_use]
    pub fn new(page_number: u32, context_snippet: impl Into<String>) -> Self {
        Self {
            page_number,
            context_snippet: context_snippet.into(),
        }
    }
}

/// A physical location inferred from the script.
///
/// Fields are private so the two invariants hold for every value: there is at
/// least one occurrence, and `page_numbers` is the sorted, de-duplicated union
/// of the occurrence pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UniqueLocationInput")]
pub struct UniqueLocation {
    header: String,
    interior_exterior: InteriorExterior,
    time_of_day: TimeOfDay,
    occurrences: Vec<SceneOccurrence>,
    page_numbers: Vec<u32>,
}

/// Wire shape accepted on input. Any incoming `page_numbers` are ignored and
/// recomputed from the occurrences.
#[derive(Deserialize)]
struct UniqueLocationInput {
    #[serde(alias = "scene_header")]
    header: String,
    #[serde(alias = "int_ext")]
    interior_exterior: InteriorExterior,
    time_of_day: TimeOfDay,
    occurrences: Vec<SceneOccurrence>,
}

impl TryFrom<UniqueLocationInput> for UniqueLocation {
    type Error = CoreError;

    fn try_from(input: UniqueLocationInput) -> Result<Self, Self::Error> {
        Self::new(
            input.header,
            input.interior_exterior,
            input.time_of_day,
            input.occurrences,
        )
    }
}

impl UniqueLocation {
    /// Builds a location from its occurrences.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyOccurrences`] when `occurrences` is empty.
    pub fn new(
        header: impl Into<String>,
        interior_exterior: InteriorExterior,
        time_of_day: TimeOfDay,
        mut occurrences: Vec<SceneOccurrence>,
    ) -> Result<Self, CoreError> {
        let header = header.into();
        if occurrences.is_empty() {
            return Err(CoreError::EmptyOccurrences(header));
        }
        occurrences.sort_by_key(|o| o.page_number);
        let mut location = Self {
            header,
            interior_exterior,
            time_of_day,
            occurrences,
            page_numbers: Vec::new(),
        };
        location.recompute_pages();
        Ok(location)
    }

    /// Convenience constructor for a location seen exactly once.
    #[must_use]
    pub fn single(
        header: impl Into<String>,
        interior_exterior: InteriorExterior,
        time_of_day: TimeOfDay,
        page_number: u32,
        context_snippet: impl Into<String>,
    ) -> Self {
        Self {
            header: header.into(),
            interior_exterior,
            time_of_day,
            occurrences: vec![SceneOccurrence::new(page_number, context_snippet)],
            page_numbers: vec![page_number],
        }
    }

    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    #[must_use]
    pub fn interior_exterior(&self) -> InteriorExterior {
        self.interior_exterior
    }

    #[must_use]
    pub fn time_of_day(&self) -> TimeOfDay {
        self.time_of_day
    }

    #[must_use]
    pub fn occurrences(&self) -> &[SceneOccurrence] {
        &self.occurrences
    }

    #[must_use]
    pub fn page_numbers(&self) -> &[u32] {
        &self.page_numbers
    }

    #[must_use]
    pub fn earliest_page(&self) -> u32 {
        // Non-empty by construction.
        self.page_numbers.first().copied().unwrap_or(u32::MAX)
    }

    /// All occurrence snippets joined in page order, used as LLM context.
    #[must_use]
    pub fn combined_context(&self) -> String {
        self.occurrences
            .iter()
            .map(|o| format!("[Page {}]\n{}", o.page_number, o.context_snippet.trim()))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    /// Replaces the display header without touching occurrences.
    pub fn rename(&mut self, header: impl Into<String>) {
        self.header = header.into();
    }

    /// Absorbs `other` into `self`.
    ///
    /// Occurrences and pages are unioned, interior/exterior and time of day
    /// widen to `Both` on disagreement, and the longer (more complete) header
    /// survives. Ties keep the survivor's header.
    pub fn absorb(&mut self, other: UniqueLocation) {
        if other.header.trim().len() > self.header.trim().len() {
            self.header = other.header;
        }
        self.interior_exterior = self.interior_exterior.widen(other.interior_exterior);
        self.time_of_day = self.time_of_day.widen(other.time_of_day);
        self.occurrences.extend(other.occurrences);
        self.occurrences.sort_by_key(|o| o.page_number);
        self.recompute_pages();
    }

    fn recompute_pages(&mut self) {
        let mut pages: Vec<u32> = self.occurrences.iter().map(|o| o.page_number).collect();
        pages.sort_unstable();
        pages.dedup();
        self.page_numbers = pages;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kitchen(page: u32, ie: InteriorExterior, tod: TimeOfDay) -> UniqueLocation {
        UniqueLocation::single("INT. KITCHEN", ie, tod, page, format!("kitchen on {page}"))
    }

    #[test]
    fn new_rejects_empty_occurrences() {
        let result = UniqueLocation::new(
            "INT. VOID",
            InteriorExterior::Interior,
            TimeOfDay::Day,
            Vec::new(),
        );
        assert_eq!(
            result,
            Err(CoreError::EmptyOccurrences("INT. VOID".to_string()))
        );
    }

    #[test]
    fn new_sorts_occurrences_and_dedups_pages() {
        let location = UniqueLocation::new(
            "INT. OFFICE",
            InteriorExterior::Interior,
            TimeOfDay::Day,
            vec![
                SceneOccurrence::new(12, "b"),
                SceneOccurrence::new(3, "a"),
                SceneOccurrence::new(12, "c"),
            ],
        )
        .unwrap();
        assert_eq!(location.page_numbers(), &[3, 12]);
        assert_eq!(location.occurrences()[0].page_number, 3);
        assert_eq!(location.earliest_page(), 3);
    }

    #[test]
    fn absorb_unions_pages_and_widens_fields() {
        let mut a = kitchen(10, InteriorExterior::Interior, TimeOfDay::Day);
        let b = kitchen(4, InteriorExterior::Exterior, TimeOfDay::Night);
        a.absorb(b);
        assert_eq!(a.page_numbers(), &[4, 10]);
        assert_eq!(a.occurrences().len(), 2);
        assert_eq!(a.interior_exterior(), InteriorExterior::Both);
        assert_eq!(a.time_of_day(), TimeOfDay::Both);
    }

    #[test]
    fn absorb_keeps_agreeing_fields() {
        let mut a = kitchen(1, InteriorExterior::Interior, TimeOfDay::Night);
        a.absorb(kitchen(2, InteriorExterior::Interior, TimeOfDay::Night));
        assert_eq!(a.interior_exterior(), InteriorExterior::Interior);
        assert_eq!(a.time_of_day(), TimeOfDay::Night);
    }

    #[test]
    fn absorb_keeps_more_complete_header() {
        let mut short = UniqueLocation::single(
            "INT. MARK'S ROOM",
            InteriorExterior::Interior,
            TimeOfDay::Day,
            1,
            "",
        );
        let long = UniqueLocation::single(
            "INT. MARK'S DORM ROOM",
            InteriorExterior::Interior,
            TimeOfDay::Day,
            5,
            "",
        );
        short.absorb(long);
        assert_eq!(short.header(), "INT. MARK'S DORM ROOM");
    }

    #[test]
    fn deserialize_recomputes_pages_and_accepts_short_markers() {
        let json = r#"{
            "scene_header": "EXT. PIER",
            "int_ext": "EXT",
            "time_of_day": "NIGHT",
            "occurrences": [
                {"page_number": 9, "context_snippet": "waves"},
                {"page_number": 2, "context_snippet": "gulls"}
            ],
            "page_numbers": [100]
        }"#;
        let location: UniqueLocation = serde_json::from_str(json).unwrap();
        assert_eq!(location.header(), "EXT. PIER");
        assert_eq!(location.interior_exterior(), InteriorExterior::Exterior);
        assert_eq!(location.page_numbers(), &[2, 9]);
    }

    #[test]
    fn deserialize_rejects_missing_occurrences() {
        let json = r#"{
            "header": "INT. NOWHERE",
            "interior_exterior": "interior",
            "time_of_day": "day",
            "occurrences": []
        }"#;
        assert!(serde_json::from_str::<UniqueLocation>(json).is_err());
    }

    #[test]
    fn time_label_buckets() {
        assert_eq!(TimeOfDay::from_label("dusk"), Some(TimeOfDay::Night));
        assert_eq!(TimeOfDay::from_label("MORNING"), Some(TimeOfDay::Day));
        assert_eq!(TimeOfDay::from_label("CONTINUOUS"), None);
    }
}
