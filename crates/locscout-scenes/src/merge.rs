use std::collections::HashMap;

use locscout_core::UniqueLocation;

/// One surviving location after a grouping merge.
pub(crate) struct MergedGroup {
    pub location: UniqueLocation,
    pub key: Option<String>,
    pub members: usize,
}

/// Groups locations by `key` and absorbs each group into its first member.
///
/// `key` is called exactly once per location, in input order. Locations for
/// which it returns `None` pass through untouched. Output
/// keeps the first-seen order of groups, so the count never increases and
/// every input page survives in exactly one output location.
pub(crate) fn merge_by<F>(locations: Vec<UniqueLocation>, mut key: F) -> Vec<MergedGroup>
where
    F: FnMut(&UniqueLocation) -> Option<String>,
{
    let mut groups: Vec<MergedGroup> = Vec::with_capacity(locations.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for location in locations {
        let Some(k) = key(&location) else {
            groups.push(MergedGroup {
                location,
                key: None,
                members: 1,
            });
            continue;
        };
        match index.get(&k) {
            Some(&slot) => {
                let group = &mut groups[slot];
                group.location.absorb(location);
                group.members += 1;
            }
            None => {
                index.insert(k.clone(), groups.len());
                groups.push(MergedGroup {
                    location,
                    key: Some(k),
                    members: 1,
                });
            }
        }
    }
    groups
}

/// Stable sort by earliest page; equal pages keep their relative order.
pub(crate) fn sort_by_earliest_page(locations: &mut [UniqueLocation]) {
    locations.sort_by_key(UniqueLocation::earliest_page);
}

/// Case- and whitespace-insensitive header lookup key.
pub(crate) fn lookup_key(header: &str) -> String {
    header.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

#[cfg(test)]
mod tests {
    use locscout_core::{InteriorExterior, TimeOfDay};

    use super::*;

    fn loc(header: &str, page: u32) -> UniqueLocation {
        UniqueLocation::single(header, InteriorExterior::Interior, TimeOfDay::Day, page, "")
    }

    #[test]
    fn unkeyed_locations_pass_through() {
        let groups = merge_by(vec![loc("A", 1), loc("B", 2)], |_| None);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.members == 1 && g.key.is_none()));
    }

    #[test]
    fn keyed_locations_fold_into_first_member() {
        let groups = merge_by(vec![loc("A", 5), loc("B", 2), loc("A2", 9)], |l| {
            Some(l.header()[..1].to_string())
        });
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, 2);
        assert_eq!(groups[0].location.page_numbers(), &[5, 9]);
        assert_eq!(groups[1].location.header(), "B");
    }

    #[test]
    fn sort_is_stable_on_equal_pages() {
        let mut locations = vec![loc("C", 4), loc("A", 1), loc("B", 1)];
        sort_by_earliest_page(&mut locations);
        let headers: Vec<_> = locations.iter().map(UniqueLocation::header).collect();
        assert_eq!(headers, ["A", "B", "C"]);
    }

    #[test]
    fn lookup_key_ignores_case_and_spacing() {
        assert_eq!(lookup_key("  int.  Kitchen "), "INT. KITCHEN");
    }
}
