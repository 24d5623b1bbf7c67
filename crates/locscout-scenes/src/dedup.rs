//! Four-pass location deduplication.
//!
//! 1. pre-merge by normalization key (no network)
//! 2. name pass: one completion proposes merges and flags generic headers
//! 3. context pass: one completion decides same/different for flagged groups
//! 4. type pass: coarse merge by canonical room type
//!
//! Every pass preserves or reduces the location count. A failed or
//! unparseable completion skips its pass and hands the set on unchanged.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use locscout_core::UniqueLocation;
use locscout_llm::{extract_json_object, CompletionRequest, TextCompletion};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ScenesError;
use crate::merge::{lookup_key, merge_by, sort_by_earliest_page};
use crate::normalize::{normalization_key, pre_merge};
use crate::prompts;
use crate::type_merge::merge_by_type;

#[derive(Debug, Clone)]
pub struct DedupOptions {
    /// Keep locations the context pass judged "different" out of the type pass.
    pub respect_context_decisions: bool,
    pub snippet_chars: usize,
    pub max_snippets: usize,
    /// Overrides the completion client's default model.
    pub model: Option<String>,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            respect_context_decisions: true,
            snippet_chars: 300,
            max_snippets: 3,
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassStatus {
    Applied,
    /// Nothing for the pass to decide, so no call was made.
    NotNeeded,
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupReport {
    pub input_count: usize,
    pub after_pre_merge: usize,
    pub after_name_pass: usize,
    pub after_context_pass: usize,
    pub after_type_pass: usize,
    pub name_pass: PassStatus,
    pub context_pass: PassStatus,
    pub flagged: Vec<String>,
    pub kept_distinct: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupOutcome {
    /// Sorted by earliest page.
    pub locations: Vec<UniqueLocation>,
    pub report: DedupReport,
}

#[derive(Debug, Default, Deserialize)]
struct NamePlan {
    #[serde(default)]
    merge: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    needs_context: Option<Vec<String>>,
}

impl NamePlan {
    /// Header lookup key to canonical header. A header listed under two
    /// canonicals stays with the one that sorts first.
    fn mapping(&self) -> HashMap<String, String> {
        let mut mapping = HashMap::new();
        for (canonical, duplicates) in self.merge.iter().flatten() {
            let canonical_key = lookup_key(canonical);
            mapping
                .entry(canonical_key.clone())
                .or_insert_with(|| canonical_key.clone());
            for duplicate in duplicates {
                mapping
                    .entry(lookup_key(duplicate))
                    .or_insert_with(|| canonical_key.clone());
            }
        }
        mapping
    }
}

struct ContextOutcome {
    locations: Vec<UniqueLocation>,
    status: PassStatus,
    protected: HashSet<String>,
    kept_distinct: Vec<String>,
}

/// `key` equals `flagged` or contains it as whole words.
fn covers(key: &str, flagged: &str) -> bool {
    key == flagged || format!(" {key} ").contains(&format!(" {flagged} "))
}

pub struct DedupEngine {
    llm: Arc<dyn TextCompletion>,
    options: DedupOptions,
}

impl DedupEngine {
    #[must_use]
    pub fn new(llm: Arc<dyn TextCompletion>) -> Self {
        Self {
            llm,
            options: DedupOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: DedupOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs all four passes. Never fails: completion errors skip their pass.
    pub async fn run(&self, locations: Vec<UniqueLocation>) -> DedupOutcome {
        let input_count = locations.len();

        let locations = pre_merge(locations);
        let after_pre_merge = locations.len();

        let (locations, name_pass, flagged) = self.name_pass(locations).await;
        let after_name_pass = locations.len();

        let context = self.context_pass(locations, &flagged).await;
        let after_context_pass = context.locations.len();

        let protected = if self.options.respect_context_decisions {
            context.protected
        } else {
            HashSet::new()
        };
        let mut locations = merge_by_type(context.locations, &protected);
        sort_by_earliest_page(&mut locations);

        tracing::info!(
            input_count,
            after_pre_merge,
            after_name_pass,
            after_context_pass,
            final_count = locations.len(),
            "location deduplication complete"
        );

        DedupOutcome {
            report: DedupReport {
                input_count,
                after_pre_merge,
                after_name_pass,
                after_context_pass,
                after_type_pass: locations.len(),
                name_pass,
                context_pass: context.status,
                flagged,
                kept_distinct: context.kept_distinct,
            },
            locations,
        }
    }

    async fn complete_json<T: DeserializeOwned>(
        &self,
        prompt: String,
        context: &'static str,
    ) -> Result<T, ScenesError> {
        let mut request = CompletionRequest::new(prompt).json();
        if let Some(model) = &self.options.model {
            request = request.with_model(model.clone());
        }
        let text = self.llm.complete(request).await?;
        let value = extract_json_object(&text)?;
        serde_json::from_value(value).map_err(|source| ScenesError::InvalidResponse { context, source })
    }

    async fn name_pass(
        &self,
        locations: Vec<UniqueLocation>,
    ) -> (Vec<UniqueLocation>, PassStatus, Vec<String>) {
        if locations.len() < 2 {
            return (locations, PassStatus::NotNeeded, Vec::new());
        }

        let plan: NamePlan = match self
            .complete_json(prompts::name_pass(&locations), "dedup name pass")
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(error = %e, "name pass failed, skipping");
                return (
                    locations,
                    PassStatus::Skipped {
                        reason: e.to_string(),
                    },
                    Vec::new(),
                );
            }
        };

        let mapping = plan.mapping();
        let before = locations.len();
        let merged: Vec<UniqueLocation> =
            merge_by(locations, |loc| mapping.get(&lookup_key(loc.header())).cloned())
                .into_iter()
                .map(|group| group.location)
                .collect();
        let flagged: Vec<String> = plan
            .needs_context
            .unwrap_or_default()
            .into_iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        tracing::info!(
            before,
            after = merged.len(),
            flagged = flagged.len(),
            "name pass applied"
        );
        (merged, PassStatus::Applied, flagged)
    }

    async fn context_pass(
        &self,
        locations: Vec<UniqueLocation>,
        flagged: &[String],
    ) -> ContextOutcome {
        let keys: Vec<String> = locations
            .iter()
            .map(|loc| normalization_key(loc.header()))
            .collect();
        let mut claimed = vec![false; locations.len()];
        let mut seen = HashSet::new();
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();

        for header in flagged {
            let flagged_key = normalization_key(header);
            if flagged_key.is_empty() || !seen.insert(flagged_key.clone()) {
                continue;
            }
            let members: Vec<usize> = (0..locations.len())
                .filter(|&i| !claimed[i] && covers(&keys[i], &flagged_key))
                .collect();
            if members.len() < 2 {
                continue;
            }
            for &i in &members {
                claimed[i] = true;
            }
            groups.push((header.clone(), members));
        }

        if groups.is_empty() {
            return ContextOutcome {
                locations,
                status: PassStatus::NotNeeded,
                protected: HashSet::new(),
                kept_distinct: Vec::new(),
            };
        }

        let bundle: Vec<(String, Vec<&UniqueLocation>)> = groups
            .iter()
            .map(|(header, members)| {
                (
                    header.clone(),
                    members.iter().map(|&i| &locations[i]).collect(),
                )
            })
            .collect();
        let prompt = prompts::context_pass(&bundle, self.options.snippet_chars, self.options.max_snippets);

        let decisions: HashMap<String, String> =
            match self.complete_json(prompt, "dedup context pass").await {
                Ok(decisions) => decisions,
                Err(e) => {
                    tracing::warn!(error = %e, "context pass failed, skipping");
                    return ContextOutcome {
                        locations,
                        status: PassStatus::Skipped {
                            reason: e.to_string(),
                        },
                        protected: HashSet::new(),
                        kept_distinct: Vec::new(),
                    };
                }
            };

        let mut by_key: HashMap<String, String> = HashMap::new();
        for (header, decision) in decisions {
            let decision = decision.trim().to_lowercase();
            by_key.entry(lookup_key(&header)).or_insert_with(|| decision.clone());
            by_key.entry(normalization_key(&header)).or_insert(decision);
        }

        let mut merge_into: Vec<Option<String>> = vec![None; locations.len()];
        let mut protected = HashSet::new();
        let mut kept_distinct = Vec::new();
        for (header, members) in &groups {
            let decision = by_key
                .get(&lookup_key(header))
                .or_else(|| by_key.get(&normalization_key(header)));
            match decision.map(String::as_str) {
                Some("same") => {
                    for &i in members {
                        merge_into[i] = Some(lookup_key(header));
                    }
                }
                Some("different") => {
                    protected.extend(members.iter().map(|&i| keys[i].clone()));
                    kept_distinct.push(header.clone());
                }
                other => {
                    tracing::debug!(header = %header, decision = ?other, "no usable context decision");
                }
            }
        }

        let before = locations.len();
        // merge_by asks for each key once, in input order.
        let mut assigned = merge_into.into_iter();
        let merged: Vec<UniqueLocation> = merge_by(locations, |_| assigned.next().flatten())
            .into_iter()
            .map(|group| group.location)
            .collect();

        tracing::info!(
            before,
            after = merged.len(),
            kept_distinct = kept_distinct.len(),
            "context pass applied"
        );
        ContextOutcome {
            locations: merged,
            status: PassStatus::Applied,
            protected,
            kept_distinct,
        }
    }
}
