//! Relevance judges over the external LLM collaborator.
//!
//! Two interchangeable strategies: pointwise scoring of a single candidate
//! and pairwise preference between two candidates. The judge owns prompt
//! rendering and completion parsing; the model itself is a black box.

mod llm;
mod parse;
mod prompts;

pub use llm::{JudgeConfig, LlmJudge};
pub use parse::{PairOutcome, ScoreOutcome, parse_preference, parse_score};

use crate::error::JudgeError;
use crate::model::CandidateRecord;

pub trait PointwiseJudge {
    fn score(
        &mut self,
        query: &str,
        candidate: &CandidateRecord,
    ) -> Result<ScoreOutcome, JudgeError>;
}

pub trait PairwiseJudge {
    fn compare(
        &mut self,
        query: &str,
        a: &CandidateRecord,
        b: &CandidateRecord,
    ) -> Result<PairOutcome, JudgeError>;
}
