//! Scene-level processing: collapsing duplicate screenplay locations and
//! turning the survivors into search requirements.

pub mod analysis;
pub mod dedup;
mod error;
mod merge;
pub mod normalize;
mod prompts;
pub mod type_merge;

pub use analysis::{AnalysisBatch, AnalysisFailure, AnalysisOptions, RequirementAnalyzer};
pub use dedup::{DedupEngine, DedupOptions, DedupOutcome, DedupReport, PassStatus};
pub use error::ScenesError;
pub use normalize::{normalization_key, pre_merge};
pub use type_merge::{classify, merge_by_type};
