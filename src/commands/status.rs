use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::store::AnnotationStore;

const PENDING_PREVIEW: usize = 10;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args
        .db_path
        .unwrap_or_else(|| args.cache_root.join("annotations.sqlite"));

    if !db_path.exists() {
        warn!(path = %db_path.display(), "annotation database missing");
        return Ok(());
    }

    let store = AnnotationStore::open(&db_path, 4)
        .with_context(|| format!("failed to open store: {}", db_path.display()))?;

    let counters = store.counters()?;
    let pending = store.unannotated_queries()?;

    info!(
        path = %db_path.display(),
        queries = counters.queries,
        results = counters.results,
        labeled_results = counters.labeled_results,
        fully_annotated_queries = counters.fully_annotated_queries,
        pending_queries = pending.len(),
        "annotation store status"
    );

    for (_, text) in pending.iter().take(PENDING_PREVIEW) {
        info!(query = %text, "awaiting annotation");
    }
    if pending.len() > PENDING_PREVIEW {
        info!(more = pending.len() - PENDING_PREVIEW, "additional queries awaiting annotation");
    }

    Ok(())
}
