use std::collections::HashSet;

use tracing::{info, warn};

use crate::enrich::EnrichedRecord;
use crate::store::{LoadMode, StoreError, Warehouse};

/// Read-only snapshot of the remote table, taken once per run before the
/// merge decision.
#[derive(Debug, Clone)]
pub struct RemoteTableState {
    pub table_exists: bool,
    pub row_count: u64,
    pub existing_links: HashSet<String>,
}

impl RemoteTableState {
    /// State used for a missing (or unreadable) table.
    pub fn absent() -> Self {
        RemoteTableState {
            table_exists: false,
            row_count: 0,
            existing_links: HashSet::new(),
        }
    }
}

/// What the run will write, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    FullLoad(Vec<EnrichedRecord>),
    Append(Vec<EnrichedRecord>),
    NoOp,
}

impl SyncDecision {
    pub fn label(&self) -> &'static str {
        match self {
            SyncDecision::FullLoad(_) => "full load",
            SyncDecision::Append(_) => "append",
            SyncDecision::NoOp => "no-op",
        }
    }
}

/// Take the remote snapshot. Any read failure degrades to the missing-table
/// state — the run stays alive and falls back to a full load.
pub fn snapshot(store: &impl Warehouse, table: &str) -> RemoteTableState {
    match read_state(store, table) {
        Ok(state) => state,
        Err(e) => {
            warn!("could not read remote state for {table}: {e}; treating table as missing");
            RemoteTableState::absent()
        }
    }
}

fn read_state(store: &impl Warehouse, table: &str) -> Result<RemoteTableState, StoreError> {
    let Some(meta) = store.table_meta(table)? else {
        return Ok(RemoteTableState::absent());
    };
    if meta.row_count == 0 {
        return Ok(RemoteTableState {
            table_exists: true,
            row_count: 0,
            existing_links: HashSet::new(),
        });
    }
    let existing_links = store.query_links(table)?.into_iter().collect();
    Ok(RemoteTableState {
        table_exists: true,
        row_count: meta.row_count,
        existing_links,
    })
}

/// The merge state machine. Identity is `link` alone; the first occurrence of
/// a link wins, both inside the batch and against the remote copy. An empty
/// batch always plans a no-op so a degraded render can never truncate data.
pub fn plan(batch: Vec<EnrichedRecord>, state: &RemoteTableState) -> SyncDecision {
    let batch = dedup_by_link(batch);
    if batch.is_empty() {
        info!("nothing extracted; nothing to sync");
        return SyncDecision::NoOp;
    }

    if !state.table_exists || state.row_count == 0 {
        info!("target table missing or empty; planning full load of {} rows", batch.len());
        return SyncDecision::FullLoad(batch);
    }

    let total = batch.len();
    let fresh: Vec<EnrichedRecord> = batch
        .into_iter()
        .filter(|r| !state.existing_links.contains(r.link()))
        .collect();
    let duplicates = total - fresh.len();

    if fresh.is_empty() {
        info!("all {total} extracted articles already stored; nothing to upload");
        SyncDecision::NoOp
    } else {
        info!(
            "{} new articles to append ({duplicates} already stored)",
            fresh.len()
        );
        SyncDecision::Append(fresh)
    }
}

fn dedup_by_link(batch: Vec<EnrichedRecord>) -> Vec<EnrichedRecord> {
    let mut seen = HashSet::new();
    batch
        .into_iter()
        .filter(|r| seen.insert(r.link().to_string()))
        .collect()
}

/// Result of applying a decision.
#[derive(Debug, Clone, Copy)]
pub struct LoadReport {
    pub rows_written: usize,
}

/// Persist the decision through the bulk-load capability. The only stage that
/// writes; a load failure here is fatal to the run.
pub fn apply(
    store: &mut impl Warehouse,
    table: &str,
    decision: SyncDecision,
) -> Result<LoadReport, StoreError> {
    let (rows, mode) = match decision {
        SyncDecision::FullLoad(rows) => (rows, LoadMode::Truncate),
        SyncDecision::Append(rows) => (rows, LoadMode::Append),
        SyncDecision::NoOp => return Ok(LoadReport { rows_written: 0 }),
    };

    match store.bulk_load(table, &rows, mode) {
        Ok(rows_written) => {
            info!("bulk load complete: {rows_written} rows ({mode:?})");
            Ok(LoadReport { rows_written })
        }
        Err(e) => {
            warn!("bulk load into {table} failed: {e}");
            Err(e)
        }
    }
}

// ── Tests ──
