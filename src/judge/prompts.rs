//! Prompt templates. Placeholders are substituted literally; the marker
//! lines must match the grammar in `parse`.

use crate::model::CandidateRecord;

pub const POINTWISE_PROMPT: &str = r#"You are an expert data annotator employed at a search engine company. Your task is to evaluate a search result on an integer scale of 0-4, where a higher score means the result is more relevant. A relevant result should come from a trust-worthy source or niche blog and answer the user's query.
First briefly provide the reasoning for the evaluation and then give the relevancy on the form "Relevancy: {}" on a new line.

Query: "{query}"
URL: "{url}"
Title: "{title}"
Snippet: "{snippet}"
Explanation:"#;

pub const PAIRWISE_PROMPT: &str = r#"You are an expert data annotator employed at a search engine company. Your task is to decide which of two search results answers the user's query better. A good result comes from a trust-worthy source or niche blog and answers the user's query.
First briefly provide the reasoning for the decision and then state it on the form "Preferred: A" or "Preferred: B" on a new line.

Query: "{query}"

Result A:
URL: "{url_a}"
Title: "{title_a}"
Snippet: "{snippet_a}"

Result B:
URL: "{url_b}"
Title: "{title_b}"
Snippet: "{snippet_b}"

Reasoning:"#;

pub fn pointwise_prompt(query: &str, candidate: &CandidateRecord) -> String {
    POINTWISE_PROMPT
        .replace("{query}", query)
        .replace("{url}", &candidate.url)
        .replace("{title}", &candidate.title)
        .replace("{snippet}", &candidate.snippet)
}

/// Slot order is fixed: the first candidate always fills slot A.
pub fn pairwise_prompt(query: &str, a: &CandidateRecord, b: &CandidateRecord) -> String {
    PAIRWISE_PROMPT
        .replace("{query}", query)
        .replace("{url_a}", &a.url)
        .replace("{title_a}", &a.title)
        .replace("{snippet_a}", &a.snippet)
        .replace("{url_b}", &b.url)
        .replace("{title_b}", &b.title)
        .replace("{snippet_b}", &b.snippet)
}
