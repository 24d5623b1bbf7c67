use std::fmt::Write as _;

use locscout_core::UniqueLocation;
use locscout_llm::truncate_chars;

pub(crate) const NAME_PASS_PROMPT: &str = r#"Analyze these screenplay scene headers to identify duplicates.

Scene headers:
{headers}

Do TWO things:

1. MERGE headers that CLEARLY refer to the same location based on names:
   - "MARK'S DORM ROOM" and "MARK'S ROOM" = same (shortened)
   - "CAMERON AND TYLER'S DORM ROOM" and "TYLER AND CAMERON'S DORM ROOM" = same (name order)
   - "PORCELLIAN CLUB" and "PORCELLIAN" = same (suffix dropped)

2. FLAG headers that are generic or ambiguous and MIGHT be the same location but need script context to decide:
   - Generic names like "BEDROOM", "HALLWAY", "KITCHEN", "OFFICE", "CAR"
   - Only flag if the same generic name appears multiple times

Return JSON:
{
  "merge": {
    "canonical_header": ["header1", "header2"]
  },
  "needs_context": ["INT. BEDROOM", "INT. HALLWAY"]
}

Only include headers that have duplicates or need context review. Respond with valid JSON only."#;

pub(crate) const CONTEXT_PASS_PROMPT: &str = r#"These screenplay locations have generic names. Look at the script context to determine if they are the SAME or DIFFERENT physical locations.

{contexts}

For each location name, decide based on:
- Characters present (same characters = likely same place)
- Setting details mentioned
- Story continuity

Return JSON with your decision for each:
{
  "INT. BEDROOM": "same",
  "INT. HALLWAY": "different"
}

Respond with valid JSON only."#;

pub(crate) const ANALYSIS_PROMPT: &str = r#"You are a professional film location scout analyzing a screenplay to extract detailed location requirements.

Analyze this screenplay location and extract everything a location scout would need to find a real-world filming location.

SCENE HEADER: {header}
SCRIPT CONTEXT (from {occurrences} scene(s) in the script):
{context}

RULES:
1. Only include details that are explicitly mentioned or clearly implied in the script.
2. Keep output brief when the script is sparse. Do not pad with generic filmmaking advice.
3. Do not include requirements that apply to every location (camera space, sound control, crew parking).
4. special_requirements lists only things the script specifically mentions: props, stunts, architectural features, specific actions.

Provide a JSON response:
{
  "vibe": {
    "primary": "<one of: {vibes}>",
    "secondary": "<one of the above, or null>",
    "descriptors": ["<3-5 visual descriptors from script details>"],
    "confidence": <0.0-1.0, how much detail the script provides>
  },
  "constraints": {
    "interior_exterior": "<interior, exterior, or both>",
    "time_of_day": "<day, night, or both>",
    "special_requirements": ["<script-specific needs only>"]
  },
  "location_description": "<what this location should look like: architecture, key features, atmosphere, era>",
  "scouting_notes": "<deal-breakers or must-haves specific to this location, or 'Standard location requirements.'>",
  "estimated_shoot_hours": <integer estimate from scene complexity and page count>,
  "priority": "<exactly one of: critical, important, flexible>"
}

Respond with valid JSON only."#;

pub(crate) fn name_pass(locations: &[UniqueLocation]) -> String {
    let headers = locations
        .iter()
        .map(|loc| format!("- {}", loc.header()))
        .collect::<Vec<_>>()
        .join("\n");
    NAME_PASS_PROMPT.replace("{headers}", &headers)
}

/// Renders each flagged group as a markdown section listing every member's
/// pages and a bounded number of cut snippets.
pub(crate) fn context_pass(
    groups: &[(String, Vec<&UniqueLocation>)],
    snippet_chars: usize,
    max_snippets: usize,
) -> String {
    let mut contexts = String::new();
    for (flagged, members) in groups {
        let _ = writeln!(contexts, "\n## {flagged}");
        for (i, member) in members.iter().enumerate() {
            let pages = member
                .page_numbers()
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                contexts,
                "Occurrence {} \"{}\" (pages {pages}):",
                i + 1,
                member.header()
            );
            let snippets: Vec<_> = member
                .occurrences()
                .iter()
                .filter(|o| !o.context_snippet.trim().is_empty())
                .take(max_snippets)
                .collect();
            if snippets.is_empty() {
                contexts.push_str("  No context\n");
            }
            for occurrence in snippets {
                let _ = writeln!(
                    contexts,
                    "  p.{}: {}...",
                    occurrence.page_number,
                    truncate_chars(occurrence.context_snippet.trim(), snippet_chars)
                );
            }
        }
    }
    CONTEXT_PASS_PROMPT.replace("{contexts}", contexts.trim_start())
}

pub(crate) fn analysis(location: &UniqueLocation, vibes: &str) -> String {
    ANALYSIS_PROMPT
        .replace("{header}", location.header())
        .replace("{occurrences}", &location.occurrences().len().to_string())
        .replace("{context}", &location.combined_context())
        .replace("{vibes}", vibes)
}
