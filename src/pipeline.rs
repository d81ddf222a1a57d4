//! Orchestrates a full annotation run: query intake and filtering,
//! candidate fetch, judging, and label persistence. The store is the
//! single source of truth, so a run interrupted at any point resumes
//! without repeating already-judged work.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, info, warn};

use crate::cli::JudgeStrategy;
use crate::error::JudgeError;
use crate::fetch::{CandidateSource, RankingOverrides};
use crate::judge::{PairOutcome, PairwiseJudge, PointwiseJudge, ScoreOutcome};
use crate::model::CandidateRecord;
use crate::store::AnnotationStore;
use crate::tournament::run_tournament;

pub const MAX_QUERY_CHARS: usize = 100;
pub const MAX_SYMBOL_FRACTION: f64 = 0.5;
const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub strategy: JudgeStrategy,
    pub num_results_per_query: usize,
    pub elo_rounds_mult: usize,
    pub num_labels: u8,
    /// Hard floor for the pause between external calls.
    pub min_delay: Duration,
    /// Mean pause between external calls; zero disables pacing.
    pub mean_delay: Duration,
    pub overrides: Option<RankingOverrides>,
    pub max_queries: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: JudgeStrategy::Pairwise,
            num_results_per_query: 10,
            elo_rounds_mult: 5,
            num_labels: 4,
            min_delay: Duration::from_secs(2),
            mean_delay: Duration::from_secs(4),
            overrides: None,
            max_queries: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
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
    /// Queries still lacking at least one label at the end of the run.
    pub remaining_queries: Vec<String>,
}

/// Reason a raw query never enters the store.
pub fn query_reject_reason(text: &str, strategy: JudgeStrategy) -> Option<&'static str> {
    let trimmed = text.trim();

    if trimmed.chars().count() < MIN_QUERY_CHARS {
        return Some("near-empty");
    }
    if trimmed.chars().count() > MAX_QUERY_CHARS {
        return Some("too long");
    }

    let total = trimmed.chars().filter(|c| !c.is_whitespace()).count();
    let symbols = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_alphanumeric())
        .count();
    if symbols as f64 / total as f64 > MAX_SYMBOL_FRACTION {
        return Some("mostly symbols");
    }

    // Pairwise comparisons on one-word queries give the judge too little
    // context to separate candidates.
    if strategy == JudgeStrategy::Pairwise && trimmed.split_whitespace().count() < 2 {
        return Some("single word");
    }

    None
}

/// Randomized pause between external calls, floored at a minimum.
/// Jitter has its own rng so it never perturbs tournament sampling.
struct Pacer {
    min: Duration,
    mean: Duration,
    rng: StdRng,
}

impl Pacer {
    fn new(min: Duration, mean: Duration, rng: StdRng) -> Self {
        Self { min, mean, rng }
    }

    fn pause(&mut self) {
        if self.mean.is_zero() {
            return;
        }

        let jitter = self.rng.random_range(0.5..1.5);
        let secs = (self.mean.as_secs_f64() * jitter).max(self.min.as_secs_f64());
        thread::sleep(Duration::from_secs_f64(secs));
    }
}

/// Pairwise judge wrapper that paces every comparison call.
struct PacedPairwise<'a, J: ?Sized> {
    inner: &'a mut J,
    pacer: &'a mut Pacer,
}

impl<J: PairwiseJudge + ?Sized> PairwiseJudge for PacedPairwise<'_, J> {
    fn compare(
        &mut self,
        query: &str,
        a: &CandidateRecord,
        b: &CandidateRecord,
    ) -> Result<PairOutcome, JudgeError> {
        self.pacer.pause();
        self.inner.compare(query, a, b)
    }
}

enum QueryStatus {
    Annotated,
    Skipped(&'static str),
}

pub fn run_pipeline<S, J, R>(
    store: &mut AnnotationStore,
    source: &S,
    judge: &mut J,
    rng: &mut R,
    config: &PipelineConfig,
    raw_queries: &[String],
) -> Result<RunSummary>
where
    S: CandidateSource + ?Sized,
    J: PointwiseJudge + PairwiseJudge + ?Sized,
    R: Rng,
{
    let mut summary = RunSummary::default();
    let mut pacer = Pacer::new(
        config.min_delay,
        config.mean_delay,
        StdRng::seed_from_u64(rng.next_u64()),
    );

    for raw in raw_queries {
        summary.queries_seen += 1;
        let trimmed = raw.trim();

        if let Some(reason) = query_reject_reason(trimmed, config.strategy) {
            debug!(query = %trimmed, reason, "query rejected");
            summary.queries_rejected += 1;
            continue;
        }

        store
            .add_query(trimmed)
            .with_context(|| format!("failed to store query: {trimmed}"))?;
    }

    let mut pending = store
        .unannotated_queries()
        .context("failed to list unannotated queries")?;
    if let Some(max) = config.max_queries {
        pending.truncate(max);
    }
    summary.queries_pending = pending.len();

    info!(
        pending = pending.len(),
        strategy = config.strategy.as_str(),
        "starting annotation run"
    );

    for (query_id, text) in pending {
        let status = process_query(
            store,
            source,
            judge,
            rng,
            &mut pacer,
            config,
            &mut summary,
            query_id,
            &text,
        )
        .with_context(|| format!("failed while annotating query: {text}"))?;

        match status {
            QueryStatus::Annotated => summary.queries_annotated += 1,
            QueryStatus::Skipped(reason) => {
                warn!(query = %text, reason, "query left unannotated");
                summary.queries_skipped += 1;
                summary.remaining_queries.push(text);
            }
        }
    }

    info!(
        annotated = summary.queries_annotated,
        skipped = summary.queries_skipped,
        labeled = summary.candidates_labeled,
        judge_calls = summary.judge_calls,
        remaining = summary.remaining_queries.len(),
        "annotation run finished"
    );

    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn process_query<S, J, R>(
    store: &mut AnnotationStore,
    source: &S,
    judge: &mut J,
    rng: &mut R,
    pacer: &mut Pacer,
    config: &PipelineConfig,
    summary: &mut RunSummary,
    query_id: i64,
    text: &str,
) -> Result<QueryStatus>
where
    S: CandidateSource + ?Sized,
    J: PointwiseJudge + PairwiseJudge + ?Sized,
    R: Rng,
{
    if !store.has_results(query_id)? {
        pacer.pause();
        let candidates = match source.fetch(
            text,
            config.num_results_per_query,
            config.overrides.as_ref(),
        ) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(query = %text, error = %err, "candidate fetch failed");
                return Ok(QueryStatus::Skipped("fetch failed"));
            }
        };

        summary.candidates_fetched += candidates.len();
        store.insert_results(query_id, &candidates)?;
    }

    let unjudged = store.unannotated_results(query_id)?;
    if unjudged.is_empty() {
        // A fetch that yielded zero usable candidates leaves nothing to
        // judge; the query stays pending and is refetched next run.
        return if store.has_results(query_id)? {
            Ok(QueryStatus::Annotated)
        } else {
            Ok(QueryStatus::Skipped("no usable candidates"))
        };
    }

    match config.strategy {
        JudgeStrategy::Pairwise => {
            let outcome = {
                let mut paced = PacedPairwise { inner: judge, pacer };
                run_tournament(
                    &mut paced,
                    rng,
                    text,
                    &unjudged,
                    config.elo_rounds_mult,
                    config.num_labels,
                )
            };

            summary.judge_calls += outcome.rounds;
            summary.judge_failures += outcome.failed_rounds;
            summary.undecided_outcomes += outcome.undecided_rounds;

            for ranked in &outcome.ranked {
                store.annotate(query_id, &ranked.url, ranked.label)?;
                summary.candidates_labeled += 1;
            }

            Ok(QueryStatus::Annotated)
        }
        JudgeStrategy::Pointwise => {
            let mut unanswered = 0_usize;
            for candidate in &unjudged {
                pacer.pause();
                summary.judge_calls += 1;

                match judge.score(text, &candidate.record) {
                    Ok(ScoreOutcome::Score(label)) => {
                        store.annotate(query_id, &candidate.record.url, label)?;
                        summary.candidates_labeled += 1;
                    }
                    Ok(ScoreOutcome::NoAnswer) => {
                        debug!(url = %candidate.record.url, "no answer from judge");
                        summary.undecided_outcomes += 1;
                        unanswered += 1;
                    }
                    Err(err) => {
                        warn!(url = %candidate.record.url, error = %err, "judge call failed");
                        summary.judge_failures += 1;
                        unanswered += 1;
                    }
                }
            }

            if unanswered == 0 {
                Ok(QueryStatus::Annotated)
            } else {
                Ok(QueryStatus::Skipped("candidates without scores"))
            }
        }
    }
}
