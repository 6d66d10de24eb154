use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::config::Config;
use crate::enrich;
use crate::extract;
use crate::nlp::EntityAnalyzer;
use crate::render::{self, PageSession, RenderError};
use crate::store::Warehouse;
use crate::sync;

/// What one end-to-end run did.
pub struct RunSummary {
    pub started: DateTime<Local>,
    pub extracted: usize,
    pub decision: &'static str,
    pub rows_written: usize,
}

/// Run the whole pipeline: render, extract, enrich, sync, load.
///
/// Failure policy: a generic readiness timeout degrades to an empty batch; a
/// per-container extraction failure skips that container; an unreadable
/// remote state degrades to a full load. Everything else — session startup,
/// navigation, invalid selectors, the bulk load itself — aborts the run.
pub fn run<S, A, W>(
    cfg: &Config,
    session: S,
    analyzer: &A,
    store: &mut W,
) -> Result<RunSummary>
where
    S: PageSession,
    A: EntityAnalyzer + Sync,
    W: Warehouse,
{
    let started = Local::now();
    info!(
        "pipeline run started {} (target {})",
        started.format("%Y-%m-%d %H:%M:%S"),
        cfg.target_url
    );

    // Stage 1: render. The session is released inside `render` on all paths.
    let page = match render::render(session, &cfg.render_request()) {
        Ok(page) => Some(page),
        Err(e @ RenderError::Timeout { .. }) => {
            warn!("{e}; continuing with an empty batch");
            None
        }
        Err(e) => return Err(e).context("rendering failed"),
    };

    // Stage 2: extract, isolating per-container failures.
    let records = match &page {
        Some(page) => {
            extract::extract(page, &cfg.selectors, cfg.limit).context("extraction failed")?
        }
        None => Vec::new(),
    };
    let extracted = records.len();
    if extracted == 0 {
        warn!("no articles extracted from {}", cfg.target_url);
    }

    // Stage 3: enrich (pure, parallel across records).
    let enriched = enrich::enrich(records, analyzer);

    // Stage 4: sync & load.
    if !store.dataset_exists().context("checking dataset")? {
        info!("dataset {} missing; creating it", cfg.dataset);
        store.create_dataset().context("creating dataset")?;
    }
    let state = sync::snapshot(store, &cfg.table);
    let decision = sync::plan(enriched, &state);
    let decision_label = decision.label();
    let report = sync::apply(store, &cfg.table, decision).context("bulk load failed")?;

    info!(
        "pipeline finished: {extracted} extracted, decision {decision_label}, {} rows written",
        report.rows_written
    );

    Ok(RunSummary {
        started,
        extracted,
        decision: decision_label,
        rows_written: report.rows_written,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::LexiconAnalyzer;
    use crate::render::RenderedPage;
    use crate::store::SqliteWarehouse;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    /// Session serving the fixture without any waiting.
    struct FixtureSession {
        html: Option<String>,
        quits: Rc<Cell<u32>>,
    }

    impl FixtureSession {
        fn new(quits: Rc<Cell<u32>>) -> Self {
            let html = std::fs::read_to_string("tests/fixtures/portal.html").unwrap();
            FixtureSession {
                html: Some(html),
                quits,
            }
        }
    }

    impl PageSession for FixtureSession {
        fn navigate(&mut self, _url: &str) -> Result<(), RenderError> {
            Ok(())
        }
        fn has_element(&mut self, _selector: &str) -> bool {
            true
        }
        fn content(&mut self) -> Result<String, RenderError> {
            Ok(self.html.clone().unwrap_or_default())
        }
        fn quit(&mut self) {
            self.quits.set(self.quits.get() + 1);
            self.html = None;
        }
    }

    /// Session whose readiness probe never succeeds.
    struct NeverReady {
        quits: Rc<Cell<u32>>,
    }

    impl PageSession for NeverReady {
        fn navigate(&mut self, _url: &str) -> Result<(), RenderError> {
            Ok(())
        }
        fn has_element(&mut self, _selector: &str) -> bool {
            false
        }
        fn content(&mut self) -> Result<String, RenderError> {
            Ok(String::new())
        }
        fn quit(&mut self) {
            self.quits.set(self.quits.get() + 1);
        }
    }

    fn test_config(dir: &std::path::Path) -> Config {
        let mut cfg = Config::from_env();
        cfg.data_dir = dir.to_path_buf();
        cfg.waits.ready_timeout = Duration::from_millis(50);
        cfg.waits.article_timeout = Duration::from_millis(50);
        cfg.waits.settle_delay = Duration::from_millis(0);
        cfg.waits.poll_interval = Duration::from_millis(5);
        cfg
    }

    #[test]
    fn first_run_full_loads_then_second_run_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        let analyzer = LexiconAnalyzer::new();
        let mut store = SqliteWarehouse::new(cfg.db_path());

        let quits = Rc::new(Cell::new(0));
        let summary = run(
            &cfg,
            FixtureSession::new(quits.clone()),
            &analyzer,
            &mut store,
        )
        .unwrap();

        // Fixture has three containers; one lacks its image element.
        assert_eq!(summary.extracted, 2);
        assert_eq!(summary.decision, "full load");
        assert_eq!(summary.rows_written, 2);
        assert_eq!(quits.get(), 1);

        // Same page again: everything is already stored.
        let summary = run(
            &cfg,
            FixtureSession::new(quits.clone()),
            &analyzer,
            &mut store,
        )
        .unwrap();
        assert_eq!(summary.decision, "no-op");
        assert_eq!(summary.rows_written, 0);
        assert_eq!(quits.get(), 2);
    }

    #[test]
    fn ready_timeout_degrades_to_empty_run() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        let analyzer = LexiconAnalyzer::new();
        let mut store = SqliteWarehouse::new(cfg.db_path());

        let quits = Rc::new(Cell::new(0));
        let summary = run(&cfg, NeverReady { quits: quits.clone() }, &analyzer, &mut store).unwrap();

        assert_eq!(summary.extracted, 0);
        assert_eq!(summary.decision, "no-op");
        assert_eq!(quits.get(), 1);
    }

    #[test]
    fn partial_page_appends_only_new_articles() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        let analyzer = LexiconAnalyzer::new();
        let mut store = SqliteWarehouse::new(cfg.db_path());

        // Seed with only the first article by capping the batch.
        let mut seeded = test_config(dir.path());
        seeded.limit = Some(1);
        let quits = Rc::new(Cell::new(0));
        run(
            &seeded,
            FixtureSession::new(quits.clone()),
            &analyzer,
            &mut store,
        )
        .unwrap();

        // Full page now: one stored article, one fresh one.
        let summary = run(
            &cfg,
            FixtureSession::new(quits.clone()),
            &analyzer,
            &mut store,
        )
        .unwrap();
        assert_eq!(summary.decision, "append");
        assert_eq!(summary.rows_written, 1);
    }
}
