use crate::api::{AnalysisResult, HistoryEntry, StatsSummary};

/// Cross-cutting client state, owned by `AppContext`
///
/// Mutated only through `AppContext` transitions; everything here besides
/// `current_result` and `is_processing` is server-authoritative and only
/// ever replaced wholesale by a fresh fetch.
#[derive(Debug, Clone, Default)]
pub struct SessionAggregateState {
    /// True exactly while a submission, training, or clear call is in
    /// flight; doubles as the single-slot in-flight guard
    pub is_processing: bool,

    /// Latest analysis verdict; replaced by each successful submission,
    /// cleared when a new capture or upload begins
    pub current_result: Option<AnalysisResult>,

    /// Server-side analysis history
    pub history: Vec<HistoryEntry>,

    /// Server-side counters; `None` until the first successful stats fetch
    pub stats: Option<StatsSummary>,
}
