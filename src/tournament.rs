//! Pairwise judgment tournament: repeated Elo-rated comparisons over a
//! query's candidates, aggregated into a deterministic ranking and
//! discrete relevance labels.

use rand::Rng;
use tracing::{debug, warn};

use crate::judge::{PairOutcome, PairwiseJudge};
use crate::store::StoredCandidate;

pub const ELO_SCALE: f64 = 400.0;
pub const ELO_K: f64 = 32.0;
const BASELINE_RATING: f64 = ELO_SCALE / 2.0;

#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub url: String,
    /// Final position after sorting, 0 = best.
    pub rank: usize,
    pub rating: f64,
    pub label: u8,
}

#[derive(Debug, Clone, Default)]
pub struct TournamentOutcome {
    pub ranked: Vec<RankedCandidate>,
    pub rounds: usize,
    pub decided_rounds: usize,
    pub undecided_rounds: usize,
    pub failed_rounds: usize,
}

/// Runs `rounds_mult × N` comparison rounds over the candidates and
/// labels every one of them.
///
/// Rating updates are sequential: round `i + 1` sees round `i`'s result.
/// Undecided rounds and transient judge failures skip the round without
/// touching ratings. A single candidate is labeled `num_labels` with zero
/// rounds played.
pub fn run_tournament<J, R>(
    judge: &mut J,
    rng: &mut R,
    query: &str,
    candidates: &[StoredCandidate],
    rounds_mult: usize,
    num_labels: u8,
) -> TournamentOutcome
where
    J: PairwiseJudge + ?Sized,
    R: Rng,
{
    let n = candidates.len();
    let mut outcome = TournamentOutcome::default();
    if n == 0 {
        return outcome;
    }

    let mut ratings = vec![BASELINE_RATING; n];

    if n >= 2 {
        for _ in 0..rounds_mult * n {
            outcome.rounds += 1;

            let first = rng.random_range(0..n);
            let mut second = rng.random_range(0..n);
            while second == first {
                second = rng.random_range(0..n);
            }

            match judge.compare(
                query,
                &candidates[first].record,
                &candidates[second].record,
            ) {
                Ok(PairOutcome::PreferA) => {
                    apply_decision(&mut ratings, first, second);
                    outcome.decided_rounds += 1;
                }
                Ok(PairOutcome::PreferB) => {
                    apply_decision(&mut ratings, second, first);
                    outcome.decided_rounds += 1;
                }
                Ok(PairOutcome::NoDecision) => outcome.undecided_rounds += 1,
                Err(err) => {
                    warn!(query = %query, error = %err, "judge comparison failed, skipping round");
                    outcome.failed_rounds += 1;
                }
            }
        }
    }

    // Rating descending, ties broken by original search rank ascending so
    // repeated runs produce identical orderings.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        ratings[b]
            .total_cmp(&ratings[a])
            .then(candidates[a].orig_rank.cmp(&candidates[b].orig_rank))
    });

    outcome.ranked = order
        .into_iter()
        .enumerate()
        .map(|(rank, idx)| RankedCandidate {
            url: candidates[idx].record.url.clone(),
            rank,
            rating: ratings[idx],
            label: label_for_rank(rank, num_labels),
        })
        .collect();

    debug!(
        query = %query,
        candidates = n,
        rounds = outcome.rounds,
        decided = outcome.decided_rounds,
        "tournament finished"
    );

    outcome
}

fn apply_decision(ratings: &mut [f64], winner: usize, loser: usize) {
    let delta = elo_delta(ratings[winner], ratings[loser]);
    ratings[winner] += delta;
    ratings[loser] -= delta;
}

/// Rating gain for the winner under the logistic Elo rule. The loser
/// loses exactly this amount, so every decided round is zero-sum.
fn elo_delta(winner_rating: f64, loser_rating: f64) -> f64 {
    let expected = 1.0 / (1.0 + 10_f64.powf((loser_rating - winner_rating) / ELO_SCALE));
    ELO_K * (1.0 - expected)
}

/// `label = clamp(num_labels − floor(log2(rank + 1)), 0, num_labels)`.
///
/// Top positions stay maximally separated while lower ranks collapse into
/// a long tail of coarse labels, where pairwise judgments are noisiest.
fn label_for_rank(rank: usize, num_labels: u8) -> u8 {
    let tier = (rank as u64 + 1).ilog2();
    u32::from(num_labels).saturating_sub(tier).min(u32::from(num_labels)) as u8
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::error::JudgeError;
    use crate::model::CandidateRecord;

    fn candidates(urls: &[&str]) -> Vec<StoredCandidate> {
        urls.iter()
            .enumerate()
            .map(|(rank, url)| StoredCandidate {
                orig_rank: rank as u32,
                record: CandidateRecord {
                    url: url.to_string(),
                    title: format!("title {rank}"),
                    snippet: format!("snippet {rank}"),
                    ranking_signals: BTreeMap::new(),
                },
            })
            .collect()
    }

    /// Prefers whichever candidate appears earlier in the fixed order.
    struct PreferEarlier {
        order: Vec<String>,
        calls: usize,
    }

    impl PreferEarlier {
        fn new(urls: &[&str]) -> Self {
            Self {
                order: urls.iter().map(|u| u.to_string()).collect(),
                calls: 0,
            }
        }

        fn position(&self, url: &str) -> usize {
            self.order.iter().position(|u| u == url).unwrap()
        }
    }

    impl PairwiseJudge for PreferEarlier {
        fn compare(
            &mut self,
            _query: &str,
            a: &CandidateRecord,
            b: &CandidateRecord,
        ) -> Result<PairOutcome, JudgeError> {
            self.calls += 1;
            if self.position(&a.url) < self.position(&b.url) {
                Ok(PairOutcome::PreferA)
            } else {
                Ok(PairOutcome::PreferB)
            }
        }
    }

    /// Never reaches a decision; ratings stay at the baseline.
    struct Undecided;

    impl PairwiseJudge for Undecided {
        fn compare(
            &mut self,
            _query: &str,
            _a: &CandidateRecord,
            _b: &CandidateRecord,
        ) -> Result<PairOutcome, JudgeError> {
            Ok(PairOutcome::NoDecision)
        }
    }

    #[test]
    fn label_mapping_matches_floor_log2_scheme() {
        // rank 0 → 4, ranks 1-2 → 3, ranks 3-6 → 2, ranks 7-14 → 1.
        assert_eq!(label_for_rank(0, 4), 4);
        assert_eq!(label_for_rank(1, 4), 3);
        assert_eq!(label_for_rank(2, 4), 3);
        assert_eq!(label_for_rank(3, 4), 2);
        assert_eq!(label_for_rank(6, 4), 2);
        assert_eq!(label_for_rank(7, 4), 1);
        assert_eq!(label_for_rank(14, 4), 1);
        assert_eq!(label_for_rank(15, 4), 0);
        // The tail never goes below zero.
        assert_eq!(label_for_rank(1000, 4), 0);
    }

    #[test]
    fn empty_field_is_a_no_op() {
        let mut judge = PreferEarlier::new(&[]);
        let mut rng = StdRng::seed_from_u64(7);

        let outcome = run_tournament(&mut judge, &mut rng, "q", &[], 5, 4);
        assert!(outcome.ranked.is_empty());
        assert_eq!(outcome.rounds, 0);
        assert_eq!(judge.calls, 0);
    }

    #[test]
    fn single_candidate_gets_top_label_without_judging() {
        let field = candidates(&["https://only.example"]);
        let mut judge = PreferEarlier::new(&["https://only.example"]);
        let mut rng = StdRng::seed_from_u64(7);

        let outcome = run_tournament(&mut judge, &mut rng, "q", &field, 5, 4);
        assert_eq!(outcome.rounds, 0);
        assert_eq!(judge.calls, 0);
        assert_eq!(outcome.ranked.len(), 1);
        assert_eq!(outcome.ranked[0].label, 4);
        assert_eq!(outcome.ranked[0].rank, 0);
    }

    #[test]
    fn undecided_rounds_fall_back_to_original_rank_order() {
        let urls = ["https://c1", "https://c2", "https://c3", "https://c4"];
        let field = candidates(&urls);
        let mut rng = StdRng::seed_from_u64(7);

        let outcome = run_tournament(&mut Undecided, &mut rng, "q", &field, 5, 4);

        assert_eq!(outcome.rounds, 20);
        assert_eq!(outcome.undecided_rounds, 20);
        assert_eq!(outcome.decided_rounds, 0);

        let ordered: Vec<&str> = outcome.ranked.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(ordered, urls);

        let labels: Vec<u8> = outcome.ranked.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![4, 3, 3, 2]);
    }

    #[test]
    fn decided_rounds_are_zero_sum() {
        let urls = ["https://c1", "https://c2", "https://c3", "https://c4"];
        let field = candidates(&urls);
        let mut judge = PreferEarlier::new(&urls);
        let mut rng = StdRng::seed_from_u64(99);

        let outcome = run_tournament(&mut judge, &mut rng, "q", &field, 5, 4);
        assert_eq!(outcome.decided_rounds, 20);

        let total: f64 = outcome.ranked.iter().map(|r| r.rating).sum();
        let baseline_total = BASELINE_RATING * field.len() as f64;
        assert!((total - baseline_total).abs() < 1e-6);
    }

    #[test]
    fn consistent_judge_separates_extremes_and_keeps_labels_monotone() {
        let urls = ["https://c1", "https://c2", "https://c3", "https://c4"];
        let field = candidates(&urls);
        let mut judge = PreferEarlier::new(&urls);
        let mut rng = StdRng::seed_from_u64(1234);

        let outcome = run_tournament(&mut judge, &mut rng, "q", &field, 5, 4);

        // c1 never loses and c4 never wins, so their ratings bracket the
        // baseline and c1 must sort strictly ahead of c4.
        let rank_of = |url: &str| outcome.ranked.iter().find(|r| r.url == url).unwrap().rank;
        assert!(rank_of("https://c1") < rank_of("https://c4"));

        // A numerically better rank never yields a smaller label.
        for pair in outcome.ranked.windows(2) {
            assert!(pair[0].label >= pair[1].label);
            assert!(pair[0].rank < pair[1].rank);
        }
    }

    #[test]
    fn fixed_judge_script_is_deterministic_across_runs() {
        let urls = ["https://c1", "https://c2", "https://c3", "https://c4"];
        let field = candidates(&urls);

        let run = |seed: u64| {
            let mut judge = PreferEarlier::new(&urls);
            let mut rng = StdRng::seed_from_u64(seed);
            run_tournament(&mut judge, &mut rng, "q", &field, 5, 4)
        };

        let first = run(42);
        let second = run(42);

        let snapshot = |outcome: &TournamentOutcome| {
            outcome
                .ranked
                .iter()
                .map(|r| (r.url.clone(), r.rank, r.label))
                .collect::<Vec<_>>()
        };
        assert_eq!(snapshot(&first), snapshot(&second));
    }

    #[test]
    fn judge_errors_skip_rounds_without_rating_changes() {
        struct AlwaysFails;

        impl PairwiseJudge for AlwaysFails {
            fn compare(
                &mut self,
                _query: &str,
                _a: &CandidateRecord,
                _b: &CandidateRecord,
            ) -> Result<PairOutcome, JudgeError> {
                Err(JudgeError::EmptyCompletion)
            }
        }

        let urls = ["https://c1", "https://c2"];
        let field = candidates(&urls);
        let mut rng = StdRng::seed_from_u64(7);

        let outcome = run_tournament(&mut AlwaysFails, &mut rng, "q", &field, 5, 4);

        assert_eq!(outcome.failed_rounds, 10);
        assert_eq!(outcome.decided_rounds, 0);
        // All ratings untouched, so the original order decides.
        let ordered: Vec<&str> = outcome.ranked.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(ordered, urls);
    }
}
