use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;
use crate::model::CandidateRecord;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Seam over the external search collaborator so the pipeline can be
/// driven by a scripted source in tests.
pub trait CandidateSource {
    fn fetch(
        &self,
        query: &str,
        count: usize,
        overrides: Option<&RankingOverrides>,
    ) -> Result<Vec<CandidateRecord>, FetchError>;
}

/// Optional per-request ranking adjustments forwarded to the search API.
#[derive(Debug, Clone, Default)]
pub struct RankingOverrides {
    pub signal_coefficients: Option<BTreeMap<String, f64>>,
    pub optic: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    page: u32,
    num_results: usize,
    return_ranking_signals: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    signal_coefficients: Option<&'a BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optic: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    webpages: Vec<RawWebpage>,
}

/// Raw result shape. Snippets and ranking signals vary across API
/// versions, so both are taken as untyped values and normalized below.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWebpage {
    url: String,
    title: String,
    #[serde(default)]
    snippet: Option<Value>,
    #[serde(default)]
    ranking_signals: Option<Value>,
}

/// Fetches candidates from the search API and normalizes them into
/// [`CandidateRecord`]s. Candidates without a usable snippet are dropped.
pub struct CandidateFetcher {
    client: Client,
    endpoint: String,
}

impl CandidateFetcher {
    pub fn new(endpoint: &str) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(SEARCH_TIMEOUT).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl CandidateSource for CandidateFetcher {
    fn fetch(
        &self,
        query: &str,
        count: usize,
        overrides: Option<&RankingOverrides>,
    ) -> Result<Vec<CandidateRecord>, FetchError> {
        let request = SearchRequest {
            query,
            page: 0,
            num_results: count,
            return_ranking_signals: true,
            signal_coefficients: overrides.and_then(|o| o.signal_coefficients.as_ref()),
            optic: overrides.and_then(|o| o.optic.as_deref()),
        };

        let response: SearchResponse = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()?
            .error_for_status()?
            .json()?;

        let mut candidates: Vec<CandidateRecord> = response
            .webpages
            .into_iter()
            .filter_map(normalize_webpage)
            .collect();
        candidates.truncate(count);

        debug!(query = %query, candidates = candidates.len(), "fetched search results");
        Ok(candidates)
    }
}

fn normalize_webpage(raw: RawWebpage) -> Option<CandidateRecord> {
    let snippet = normalize_snippet(raw.snippet.as_ref()?)?;
    let ranking_signals = raw
        .ranking_signals
        .as_ref()
        .map(normalize_signals)
        .unwrap_or_default();

    Some(CandidateRecord {
        url: raw.url,
        title: raw.title,
        snippet,
        ranking_signals,
    })
}

/// Accepts the snippet shapes the API has returned over time: a plain
/// string, or an object whose `text` field is either a string or a
/// fragment list. Anything else is unusable.
fn normalize_snippet(snippet: &Value) -> Option<String> {
    match snippet {
        Value::String(text) => Some(text.clone()),
        Value::Object(fields) => match fields.get("text")? {
            Value::String(text) => Some(text.clone()),
            Value::Object(inner) => {
                let fragments = inner.get("fragments")?.as_array()?;
                let joined: String = fragments
                    .iter()
                    .filter_map(|fragment| fragment.get("text")?.as_str())
                    .collect();
                Some(joined)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Signal values arrive either as bare numbers or as `{"value": n}`
/// objects. Entries that are neither are skipped.
fn normalize_signals(signals: &Value) -> BTreeMap<String, f64> {
    let Some(fields) = signals.as_object() else {
        return BTreeMap::new();
    };

    fields
        .iter()
        .filter_map(|(name, value)| {
            let number = match value {
                Value::Object(inner) => inner.get("value")?.as_f64()?,
                other => other.as_f64()?,
            };
            Some((name.clone(), number))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn normalize_snippet_handles_fragment_lists() {
        let snippet = json!({
            "text": {
                "fragments": [
                    { "text": "first part" },
                    { "text": ", second part" }
                ]
            }
        });

        assert_eq!(
            normalize_snippet(&snippet).as_deref(),
            Some("first part, second part")
        );
    }

    #[test]
    fn normalize_snippet_handles_plain_text_shapes() {
        assert_eq!(
            normalize_snippet(&json!("plain snippet")).as_deref(),
            Some("plain snippet")
        );
        assert_eq!(
            normalize_snippet(&json!({ "text": "nested plain" })).as_deref(),
            Some("nested plain")
        );
    }

    #[test]
    fn normalize_snippet_rejects_unusable_shapes() {
        assert_eq!(normalize_snippet(&json!(42)), None);
        assert_eq!(normalize_snippet(&json!({ "html": "<b>x</b>" })), None);
        assert_eq!(normalize_snippet(&json!({ "text": { "html": "x" } })), None);
    }

    #[test]
    fn normalize_signals_accepts_bare_and_wrapped_numbers() {
        let signals = json!({
            "bm25": 1.25,
            "host_centrality": { "value": 0.5 },
            "broken": "not a number"
        });

        let normalized = normalize_signals(&signals);
        assert_eq!(normalized.get("bm25"), Some(&1.25));
        assert_eq!(normalized.get("host_centrality"), Some(&0.5));
        assert!(!normalized.contains_key("broken"));
    }

    #[test]
    fn candidates_without_snippets_are_dropped() {
        let raw = RawWebpage {
            url: "https://a.example".to_string(),
            title: "a".to_string(),
            snippet: None,
            ranking_signals: None,
        };

        assert!(normalize_webpage(raw).is_none());
    }
}
