use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::JudgeError;
use crate::model::CandidateRecord;

use super::parse::{PairOutcome, ScoreOutcome, parse_preference, parse_score};
use super::prompts;
use super::{PairwiseJudge, PointwiseJudge};

const JUDGE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Base URL of an OpenAI-style chat-completions API.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    /// Independent pointwise calls averaged per candidate.
    pub ensemble_size: usize,
    pub max_label: u8,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4-1106-preview".to_string(),
            api_key: None,
            temperature: 0.0,
            ensemble_size: 1,
            max_label: 4,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Judge backed by a chat-completions API.
pub struct LlmJudge {
    client: Client,
    config: JudgeConfig,
}

impl LlmJudge {
    pub fn new(config: JudgeConfig) -> Result<Self, JudgeError> {
        let client = Client::builder().timeout(JUDGE_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn complete(&self, prompt: &str) -> Result<String, JudgeError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response: ChatResponse = builder.send()?.error_for_status()?.json()?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(JudgeError::EmptyCompletion)
    }
}

impl PointwiseJudge for LlmJudge {
    fn score(
        &mut self,
        query: &str,
        candidate: &CandidateRecord,
    ) -> Result<ScoreOutcome, JudgeError> {
        let prompt = prompts::pointwise_prompt(query, candidate);
        let calls = self.config.ensemble_size.max(1);

        let mut scores = Vec::with_capacity(calls);
        for _ in 0..calls {
            let completion = self.complete(&prompt)?;
            match parse_score(&completion, self.config.max_label) {
                ScoreOutcome::Score(value) => scores.push(value),
                ScoreOutcome::NoAnswer => {
                    debug!(url = %candidate.url, "completion without parseable score")
                }
            }
        }

        Ok(ensemble_score(&scores, self.config.max_label))
    }
}

impl PairwiseJudge for LlmJudge {
    fn compare(
        &mut self,
        query: &str,
        a: &CandidateRecord,
        b: &CandidateRecord,
    ) -> Result<PairOutcome, JudgeError> {
        let prompt = prompts::pairwise_prompt(query, a, b);
        let completion = self.complete(&prompt)?;
        Ok(parse_preference(&completion))
    }
}

/// Combines ensemble scores with a rounded arithmetic mean. Ties at .5
/// round half away from zero; the result is clamped to `[0, max_label]`.
fn ensemble_score(scores: &[u8], max_label: u8) -> ScoreOutcome {
    if scores.is_empty() {
        return ScoreOutcome::NoAnswer;
    }

    let mean = scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64;
    let rounded = mean.round() as u8;
    ScoreOutcome::Score(rounded.min(max_label))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensemble_score_of_nothing_is_no_answer() {
        assert_eq!(ensemble_score(&[], 4), ScoreOutcome::NoAnswer);
    }

    #[test]
    fn ensemble_score_averages_and_rounds_half_away_from_zero() {
        assert_eq!(ensemble_score(&[3], 4), ScoreOutcome::Score(3));
        assert_eq!(ensemble_score(&[2, 3], 4), ScoreOutcome::Score(3));
        assert_eq!(ensemble_score(&[1, 2], 4), ScoreOutcome::Score(2));
        assert_eq!(ensemble_score(&[0, 1, 1], 4), ScoreOutcome::Score(1));
    }

    #[test]
    fn ensemble_score_stays_within_bounds() {
        assert_eq!(ensemble_score(&[4, 4, 4], 4), ScoreOutcome::Score(4));
        assert_eq!(ensemble_score(&[0, 0], 4), ScoreOutcome::Score(0));
    }
}
