//! Search-query and prompt construction for venue discovery.

use std::collections::HashSet;
use std::fmt::Write as _;

use locscout_core::requirement::DEFAULT_TARGET_CITY;
use locscout_core::{InteriorExterior, LocationRequirement, VibeCategory};

/// Five search terms per vibe, most representative first.
#[must_use]
pub fn search_terms(vibe: VibeCategory) -> &'static [&'static str] {
    match vibe {
        VibeCategory::Industrial => &[
            "warehouse",
            "factory",
            "industrial loft",
            "manufacturing facility",
            "workshop",
        ],
        VibeCategory::Luxury => &[
            "luxury hotel",
            "upscale restaurant",
            "mansion",
            "penthouse",
            "high-end venue",
        ],
        VibeCategory::UrbanGritty => &[
            "dive bar",
            "parking garage",
            "bodega",
            "laundromat",
            "pawn shop",
        ],
        VibeCategory::Suburban => &[
            "suburban home",
            "community center",
            "strip mall",
            "diner",
            "local church",
        ],
        VibeCategory::Natural => &["park", "botanical garden", "hiking trail", "lake", "beach"],
        VibeCategory::RetroVintage => &[
            "retro diner",
            "antique shop",
            "vintage theater",
            "classic car garage",
            "old bookstore",
        ],
        VibeCategory::Futuristic => &[
            "modern office",
            "tech campus",
            "contemporary art museum",
            "glass building",
            "innovation center",
        ],
        VibeCategory::Institutional => &[
            "hospital",
            "school",
            "library",
            "government building",
            "courthouse",
        ],
        VibeCategory::Commercial => &[
            "office building",
            "shopping center",
            "bank",
            "corporate lobby",
            "conference center",
        ],
        VibeCategory::Residential => &[
            "apartment building",
            "townhouse",
            "loft apartment",
            "brownstone",
            "condo",
        ],
    }
}

const CITY_COORDINATES: [(&str, f64, f64); 8] = [
    ("Los Angeles, CA", 34.0522, -118.2437),
    ("New York, NY", 40.7128, -74.0060),
    ("Atlanta, GA", 33.7490, -84.3880),
    ("Chicago, IL", 41.8781, -87.6298),
    ("Vancouver, BC", 49.2827, -123.1207),
    ("Toronto, ON", 43.6532, -79.3832),
    ("London, UK", 51.5074, -0.1278),
    ("Sydney, Australia", -33.8688, 151.2093),
];

/// Latitude/longitude used to bias venue search. Unknown cities fall back to
/// Los Angeles.
#[must_use]
pub fn city_coordinates(city: &str) -> (f64, f64) {
    let wanted = city.trim();
    CITY_COORDINATES
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(wanted))
        .or_else(|| {
            CITY_COORDINATES
                .iter()
                .find(|(name, _, _)| *name == DEFAULT_TARGET_CITY)
        })
        .map_or((34.0522, -118.2437), |(_, lat, lng)| (*lat, *lng))
}

/// Builds a short maps-style query such as `"dive bar neon outdoor in Atlanta, GA"`.
///
/// Parts are the first vibe term, the first descriptor, `outdoor` for
/// exterior-only scenes, and the first special requirement. A part is skipped
/// when any of its words already appeared.
#[must_use]
pub fn build_search_query(requirement: &LocationRequirement) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut add = |text: &str| {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        if words.iter().any(|w| used.contains(w)) {
            return;
        }
        used.extend(words);
        parts.push(text.to_string());
    };

    if let Some(term) = search_terms(requirement.vibe.primary).first().copied() {
        add(term);
    }
    if let Some(descriptor) = requirement.vibe.descriptors.first() {
        add(descriptor);
    }
    if requirement.constraints.interior_exterior == InteriorExterior::Exterior {
        add("outdoor");
    }
    if let Some(special) = requirement.constraints.special_requirements.first() {
        add(special);
    }

    format!("{} in {}", parts.join(" "), requirement.target_city)
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

/// Full prompt for the venue-finding completion. The model is asked for a
/// bare JSON array of venue records.
#[must_use]
pub fn build_grounding_prompt(requirement: &LocationRequirement, query: &str) -> String {
    let (lat, lng) = city_coordinates(&requirement.target_city);
    let mut prompt = String::new();
    let _ = writeln!(prompt, "You are a professional location scout for film productions.");
    let _ = writeln!(prompt, "Find real-world locations that match the following requirements:\n");
    let _ = writeln!(prompt, "**Scene:** {}", requirement.scene_header);
    let _ = writeln!(
        prompt,
        "**Vibe:** {} (descriptors: {})",
        requirement.vibe.primary,
        requirement.vibe.descriptors.join(", ")
    );
    let _ = writeln!(prompt, "**Search Query:** {query}");
    let _ = writeln!(
        prompt,
        "**Search Area:** within {:.0} km of {lat:.4}, {lng:.4}",
        requirement.search_radius_km
    );
    if !requirement.script_excerpt.trim().is_empty() {
        let _ = writeln!(
            prompt,
            "\n**Scene Context from Script:**\n{}",
            requirement.script_excerpt.trim()
        );
    }
    let _ = writeln!(prompt, "\n**Physical Requirements:**");
    let _ = writeln!(
        prompt,
        "- Interior/Exterior: {}",
        requirement.constraints.interior_exterior
    );
    let _ = writeln!(prompt, "- Time of Day: {}", requirement.constraints.time_of_day);
    let _ = writeln!(
        prompt,
        "- Special requirements: {}",
        join_or_none(&requirement.constraints.special_requirements)
    );
    let _ = write!(
        prompt,
        r#"
**Instructions:**
1. Search for {max} locations in {city} that match these requirements
2. Prioritize venues that:
   - Allow filming or private events
   - Have the right aesthetic
   - Meet the physical constraints
   - Have contact information (a phone number is critical)

For each location provide the venue name, full address, Google Place ID,
phone number and website if available, why it matches the scene (reference
the script context), rating and review count, and any concerns for filming.

Format your response as a JSON array:
```json
[
  {{
    "venue_name": "Example Venue",
    "formatted_address": "123 Main St, Los Angeles, CA 90001",
    "place_id": "ChIJ...",
    "phone_number": "+1-555-123-4567",
    "website_url": "https://example.com",
    "latitude": 34.0522,
    "longitude": -118.2437,
    "google_rating": 4.5,
    "google_review_count": 127,
    "match_reasoning": "Exposed brick and high ceilings suit the confrontation scene.",
    "potential_concerns": ["Limited parking"]
  }}
]
```

Return ONLY the JSON array, no other text."#,
        max = requirement.max_results,
        city = requirement.target_city,
    );
    prompt
}
