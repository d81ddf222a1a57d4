use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::cli::AnnotateArgs;
use crate::fetch::{CandidateFetcher, RankingOverrides};
use crate::judge::{JudgeConfig, LlmJudge};
use crate::model::{AnnotateCounts, AnnotatePaths, AnnotateRunManifest};
use crate::pipeline::{PipelineConfig, run_pipeline};
use crate::store::AnnotationStore;
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: AnnotateArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("annotate_run_{}.json", utc_compact_string(started_ts)))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("annotations.sqlite"));

    info!(
        cache_root = %args.cache_root.display(),
        run_id = %run_id,
        strategy = args.strategy.as_str(),
        "starting annotation run"
    );

    let raw_queries = fs::read_to_string(&args.queries_path)
        .with_context(|| format!("failed to read {}", args.queries_path.display()))?;
    let queries: Vec<String> = raw_queries.lines().map(str::to_string).collect();

    let api_key = std::env::var(&args.api_key_env).ok();
    if api_key.is_none() {
        warn!(var = %args.api_key_env, "judge api key not set, requests may be rejected");
    }

    let overrides = match &args.optic_path {
        Some(path) => {
            let optic = fs::read_to_string(path)
                .with_context(|| format!("failed to read optic: {}", path.display()))?;
            Some(RankingOverrides {
                signal_coefficients: None,
                optic: Some(optic),
            })
        }
        None => None,
    };

    let mut store = AnnotationStore::open(&db_path, args.num_labels)
        .with_context(|| format!("failed to open store: {}", db_path.display()))?;
    let fetcher =
        CandidateFetcher::new(&args.search_endpoint).context("failed to build search client")?;
    let mut judge = LlmJudge::new(JudgeConfig {
        endpoint: args.judge_endpoint.clone(),
        model: args.judge_model.clone(),
        api_key,
        temperature: 0.0,
        ensemble_size: args.ensemble_size,
        max_label: args.num_labels,
    })
    .context("failed to build judge client")?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let config = PipelineConfig {
        strategy: args.strategy,
        num_results_per_query: args.num_results,
        elo_rounds_mult: args.elo_rounds_mult,
        num_labels: args.num_labels,
        min_delay: Duration::from_secs_f64(args.min_delay_secs.max(0.0)),
        mean_delay: Duration::from_secs_f64(args.mean_delay_secs.max(0.0)),
        overrides,
        max_queries: args.max_queries,
    };

    let summary = run_pipeline(&mut store, &fetcher, &mut judge, &mut rng, &config, &queries)?;

    for query in &summary.remaining_queries {
        warn!(query = %query, "query remains unannotated");
    }

    let status = if summary.remaining_queries.is_empty() {
        "complete"
    } else {
        "partial"
    };

    let manifest = AnnotateRunManifest {
        manifest_version: 1,
        run_id,
        status: status.to_string(),
        strategy: args.strategy.as_str().to_string(),
        started_at,
        finished_at: now_utc_string(),
        paths: AnnotatePaths {
            cache_root: args.cache_root.display().to_string(),
            queries_path: args.queries_path.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        counts: AnnotateCounts {
            queries_seen: summary.queries_seen,
            queries_rejected: summary.queries_rejected,
            queries_pending: summary.queries_pending,
            queries_annotated: summary.queries_annotated,
            queries_skipped: summary.queries_skipped,
            candidates_fetched: summary.candidates_fetched,
            candidates_labeled: summary.candidates_labeled,
            judge_calls: summary.judge_calls,
            judge_failures: summary.judge_failures,
            undecided_outcomes: summary.undecided_outcomes,
            queries_remaining: summary.remaining_queries.len(),
        },
        remaining_queries: summary.remaining_queries,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        manifest = %manifest_path.display(),
        status,
        "annotation run recorded"
    );

    Ok(())
}
