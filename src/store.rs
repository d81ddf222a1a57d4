use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StoreError;
use crate::model::CandidateRecord;
use crate::util::now_utc_string;

/// A stored search result that still awaits a relevance label.
#[derive(Debug, Clone)]
pub struct StoredCandidate {
    pub orig_rank: u32,
    pub record: CandidateRecord,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreCounters {
    pub queries: i64,
    pub results: i64,
    pub labeled_results: i64,
    pub fully_annotated_queries: i64,
}

/// Durable owner of queries, candidate results, and labels.
///
/// Every write is idempotent: creation uses insert-or-ignore semantics and
/// annotation is a keyed update, so the pipeline can replay any call after
/// an interruption without losing or duplicating state.
pub struct AnnotationStore {
    conn: Connection,
    max_label: u8,
}

impl AnnotationStore {
    pub fn open(path: &Path, max_label: u8) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        configure_connection(&conn)?;
        ensure_schema(&conn, max_label)?;
        Ok(Self { conn, max_label })
    }

    /// In-memory store, used by tests and ephemeral runs.
    pub fn open_in_memory(max_label: u8) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn, max_label)?;
        Ok(Self { conn, max_label })
    }

    pub fn max_label(&self) -> u8 {
        self.max_label
    }

    /// Creates the query if absent and returns its id either way.
    pub fn add_query(&self, text: &str) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO queries(text, created_at) VALUES(?1, ?2)",
            params![text, now_utc_string()],
        )?;

        let id = self
            .conn
            .query_row("SELECT id FROM queries WHERE text = ?1", [text], |row| {
                row.get(0)
            })?;

        Ok(id)
    }

    /// Queries that are not yet fully annotated: zero stored results, or at
    /// least one result without a label. Ordered by creation so resumed
    /// runs process queries in the same order as the original run.
    pub fn unannotated_queries(&self) -> Result<Vec<(i64, String)>, StoreError> {
        let mut statement = self.conn.prepare(
            "
            SELECT id, text
            FROM queries q
            WHERE NOT EXISTS (
                SELECT 1 FROM results r WHERE r.query_id = q.id
            )
            OR EXISTS (
                SELECT 1 FROM results r WHERE r.query_id = q.id AND r.label IS NULL
            )
            ORDER BY id ASC
            ",
        )?;

        let mut rows = statement.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push((row.get(0)?, row.get(1)?));
        }

        Ok(out)
    }

    pub fn has_results(&self, query_id: i64) -> Result<bool, StoreError> {
        let row: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM results WHERE query_id = ?1 LIMIT 1",
                [query_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(row.is_some())
    }

    /// Bulk insert preserving each candidate's position as `orig_rank`.
    /// Existing `(query_id, url)` rows are left untouched, labels included.
    pub fn insert_results(
        &mut self,
        query_id: i64,
        candidates: &[CandidateRecord],
    ) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;

        {
            let mut statement = tx.prepare(
                "
                INSERT OR IGNORE INTO results(query_id, url, orig_rank, payload)
                VALUES(?1, ?2, ?3, ?4)
                ",
            )?;

            for (rank, candidate) in candidates.iter().enumerate() {
                let payload = serde_json::to_string(candidate).map_err(|source| {
                    StoreError::Payload {
                        url: candidate.url.clone(),
                        source,
                    }
                })?;
                inserted +=
                    statement.execute(params![query_id, candidate.url, rank as i64, payload])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Unlabeled results for a query, ordered by `orig_rank` ascending.
    /// Downstream sampling and tie-breaks depend on this ordering.
    pub fn unannotated_results(&self, query_id: i64) -> Result<Vec<StoredCandidate>, StoreError> {
        let mut statement = self.conn.prepare(
            "
            SELECT url, orig_rank, payload
            FROM results
            WHERE query_id = ?1 AND label IS NULL
            ORDER BY orig_rank ASC
            ",
        )?;

        let mut rows = statement.query([query_id])?;
        let mut out = Vec::new();

        while let Some(row) = rows.next()? {
            let url: String = row.get(0)?;
            let orig_rank: i64 = row.get(1)?;
            let payload: String = row.get(2)?;

            let record: CandidateRecord =
                serde_json::from_str(&payload).map_err(|source| StoreError::Payload {
                    url: url.clone(),
                    source,
                })?;

            out.push(StoredCandidate {
                orig_rank: orig_rank as u32,
                record,
            });
        }

        Ok(out)
    }

    /// Labeled results for a query, ordered by `orig_rank` ascending.
    pub fn labeled_results(&self, query_id: i64) -> Result<Vec<(String, u8)>, StoreError> {
        let mut statement = self.conn.prepare(
            "
            SELECT url, label
            FROM results
            WHERE query_id = ?1 AND label IS NOT NULL
            ORDER BY orig_rank ASC
            ",
        )?;

        let mut rows = statement.query([query_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let url: String = row.get(0)?;
            let label: i64 = row.get(1)?;
            out.push((url, label as u8));
        }

        Ok(out)
    }

    /// Sets or overwrites the label for an existing result. Calling this
    /// for a pair that was never inserted is a programmer error.
    pub fn annotate(&self, query_id: i64, url: &str, label: u8) -> Result<(), StoreError> {
        if label > self.max_label {
            return Err(StoreError::LabelOutOfRange {
                label,
                max_label: self.max_label,
            });
        }

        let changed = self.conn.execute(
            "UPDATE results SET label = ?3 WHERE query_id = ?1 AND url = ?2",
            params![query_id, url, label as i64],
        )?;

        if changed == 0 {
            return Err(StoreError::ResultNotFound {
                query_id,
                url: url.to_string(),
            });
        }

        Ok(())
    }

    pub fn counters(&self) -> Result<StoreCounters, StoreError> {
        Ok(StoreCounters {
            queries: self.query_count("SELECT COUNT(*) FROM queries")?,
            results: self.query_count("SELECT COUNT(*) FROM results")?,
            labeled_results: self
                .query_count("SELECT COUNT(*) FROM results WHERE label IS NOT NULL")?,
            fully_annotated_queries: self.query_count(
                "
                SELECT COUNT(*)
                FROM queries q
                WHERE EXISTS (SELECT 1 FROM results r WHERE r.query_id = q.id)
                AND NOT EXISTS (
                    SELECT 1 FROM results r WHERE r.query_id = q.id AND r.label IS NULL
                )
                ",
            )?,
        })
    }

    fn query_count(&self, sql: &str) -> Result<i64, StoreError> {
        let count = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count)
    }
}

fn configure_connection(conn: &Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

fn ensure_schema(conn: &Connection, max_label: u8) -> Result<(), StoreError> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS queries (
          id INTEGER PRIMARY KEY,
          text TEXT NOT NULL UNIQUE,
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS results (
          query_id INTEGER NOT NULL,
          url TEXT NOT NULL,
          orig_rank INTEGER NOT NULL,
          payload TEXT NOT NULL,
          label INTEGER CHECK (label IS NULL OR (label >= 0 AND label <= {max_label})),
          PRIMARY KEY (query_id, url),
          FOREIGN KEY (query_id) REFERENCES queries(id)
        );

        CREATE INDEX IF NOT EXISTS idx_results_query_rank ON results(query_id, orig_rank);
        "
    ))?;

    Ok(())
}
