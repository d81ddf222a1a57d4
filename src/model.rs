use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Normalized search result, persisted verbatim as the result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub ranking_signals: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotatePaths {
    pub cache_root: String,
    pub queries_path: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotateCounts {
    pub queries_seen: usize,
    pub queries_rejected: usize,
    pub queries_pending: usize,
    pub queries_annotated: usize,
    pub queries_skipped: usize,
    pub candidates_fetched: usize,
    pub candidates_labeled: usize,
    pub judge_calls: usize,
    pub judge_failures: usize,
    pub undecided_outcomes: usize,
    pub queries_remaining: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotateRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub strategy: String,
    pub started_at: String,
    pub finished_at: String,
    pub paths: AnnotatePaths,
    pub counts: AnnotateCounts,
    pub remaining_queries: Vec<String>,
}
