//! Pipeline – renders one template against every row of a data set,
//! producing one PDF per row in row order.
//!
//! The default contract is all-or-nothing: the first failing row aborts the
//! batch and nothing is returned but the error. [`BatchRenderer`] can also
//! report failures per row, stop early on a cancel token or a row/time
//! budget, and spread rows over a rayon pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::error::{Error, RenderError};
use crate::render::{render_row, RenderedDocument, UnmappablePolicy};
use crate::source::Row;
use crate::template::Template;

/// What a failing row does to the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// The whole batch fails and no document is returned (default).
    #[default]
    AbortBatch,
    /// The row is recorded in [`BatchOutcome::failures`] and the batch goes on.
    ReportPerRow,
}

/// Configuration for a batch render.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Document title embedded in each PDF's metadata (default: "rowforge output").
    pub title: String,
    pub failure_policy: FailurePolicy,
    pub unmappable: UnmappablePolicy,
    /// Stop after this many rows.
    pub max_rows: Option<usize>,
    /// Stop starting new rows once this much wall-clock time has passed.
    pub time_budget: Option<Duration>,
    /// Render rows on the rayon thread pool.
    pub parallel: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: "rowforge output".to_string(),
            failure_policy: FailurePolicy::AbortBatch,
            unmappable: UnmappablePolicy::Replace,
            max_rows: None,
            time_budget: None,
            parallel: false,
        }
    }
}

/// Shared flag for stopping a batch between rows. A row that has started
/// always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a batch ended before its last row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    RowBudget,
    TimeBudget,
}

/// A row that failed under [`FailurePolicy::ReportPerRow`].
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub row_index: usize,
    pub error: RenderError,
}

/// Result of a batch that did not abort.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Successful documents in row order.
    pub documents: Vec<RenderedDocument>,
    pub failures: Vec<RowFailure>,
    /// Set when the batch stopped early; the documents then cover a prefix
    /// of the rows.
    pub stopped: Option<StopReason>,
    pub total_rows: usize,
}

impl BatchOutcome {
    /// Every row rendered.
    pub fn is_complete(&self) -> bool {
        self.stopped.is_none() && self.failures.is_empty()
    }

    pub fn into_documents(self) -> Vec<RenderedDocument> {
        self.documents
    }
}

/// Receives progress while a batch runs.
pub trait BatchObserver {
    /// Called once, with the first document produced.
    fn on_preview(&mut self, _document: &RenderedDocument) {}

    /// Called after each row, successful or not.
    fn on_progress(&mut self, _done: usize, _total: usize) {}
}

impl BatchObserver for () {}

/// Render every row with the default configuration.
///
/// Returns one document per row, in row order, or the first row failure.
pub fn render(template: &Template, rows: &[Row]) -> Result<Vec<RenderedDocument>, Error> {
    BatchRenderer::new(RenderConfig::default())
        .run(template, rows, &mut ())
        .map(BatchOutcome::into_documents)
}

/// Per-row state after the parallel pass.
enum Slot {
    Rendered(Result<RenderedDocument, RenderError>),
    Skipped(StopReason),
}

/// Batch driver.
#[derive(Debug, Clone, Default)]
pub struct BatchRenderer {
    config: RenderConfig,
    cancel: CancelToken,
}

impl BatchRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally held token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle for cancelling this renderer's batches.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `rows` against `template`.
    ///
    /// The template is validated once before any row. Under
    /// [`FailurePolicy::AbortBatch`] the first failing row (by index) is
    /// returned as [`Error::Render`].
    pub fn run(
        &self,
        template: &Template,
        rows: &[Row],
        observer: &mut dyn BatchObserver,
    ) -> Result<BatchOutcome, Error> {
        template.validate()?;

        let start = Instant::now();
        let outcome = if self.config.parallel {
            self.run_parallel(template, rows, start, observer)?
        } else {
            self.run_sequential(template, rows, start, observer)?
        };

        log::info!(
            "Rendered {} of {} row(s) in {:.1}ms ({} failed{})",
            outcome.documents.len(),
            outcome.total_rows,
            start.elapsed().as_secs_f64() * 1000.0,
            outcome.failures.len(),
            match outcome.stopped {
                Some(reason) => format!(", stopped: {reason:?}"),
                None => String::new(),
            }
        );
        Ok(outcome)
    }

    fn stop_reason(&self, row_index: usize, start: Instant) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if self.config.max_rows.is_some_and(|max| row_index >= max) {
            return Some(StopReason::RowBudget);
        }
        if self
            .config
            .time_budget
            .is_some_and(|budget| start.elapsed() >= budget)
        {
            return Some(StopReason::TimeBudget);
        }
        None
    }

    fn run_sequential(
        &self,
        template: &Template,
        rows: &[Row],
        start: Instant,
        observer: &mut dyn BatchObserver,
    ) -> Result<BatchOutcome, Error> {
        let mut outcome = BatchOutcome {
            total_rows: rows.len(),
            ..BatchOutcome::default()
        };

        for (i, row) in rows.iter().enumerate() {
            if let Some(reason) = self.stop_reason(i, start) {
                outcome.stopped = Some(reason);
                break;
            }
            log::debug!("Rendering row {i}");
            let result = render_row(template, row, i, &self.config);
            self.record(&mut outcome, i, result, observer)?;
        }
        Ok(outcome)
    }

    /// Rows render out of order on the pool; results are replayed in row
    /// order, so callbacks fire after the pool is done and a stop keeps only
    /// the prefix before the first skipped row.
    fn run_parallel(
        &self,
        template: &Template,
        rows: &[Row],
        start: Instant,
        observer: &mut dyn BatchObserver,
    ) -> Result<BatchOutcome, Error> {
        let slots: Vec<Slot> = rows
            .par_iter()
            .enumerate()
            .map(|(i, row)| match self.stop_reason(i, start) {
                Some(reason) => Slot::Skipped(reason),
                None => Slot::Rendered(render_row(template, row, i, &self.config)),
            })
            .collect();

        let mut outcome = BatchOutcome {
            total_rows: rows.len(),
            ..BatchOutcome::default()
        };
        for (i, slot) in slots.into_iter().enumerate() {
            match slot {
                Slot::Rendered(result) => self.record(&mut outcome, i, result, observer)?,
                Slot::Skipped(reason) => {
                    outcome.stopped = Some(reason);
                    break;
                }
            }
        }
        Ok(outcome)
    }

    fn record(
        &self,
        outcome: &mut BatchOutcome,
        row_index: usize,
        result: Result<RenderedDocument, RenderError>,
        observer: &mut dyn BatchObserver,
    ) -> Result<(), Error> {
        match result {
            Ok(doc) => {
                if outcome.documents.is_empty() {
                    observer.on_preview(&doc);
                }
                outcome.documents.push(doc);
            }
            Err(error) => match self.config.failure_policy {
                FailurePolicy::AbortBatch => {
                    log::error!("Row {row_index} failed, aborting batch: {error}");
                    return Err(Error::Render {
                        row: row_index,
                        source: error,
                    });
                }
                FailurePolicy::ReportPerRow => {
                    log::warn!("Row {row_index} failed: {error}");
                    outcome.failures.push(RowFailure { row_index, error });
                }
            },
        }
        observer.on_progress(row_index + 1, outcome.total_rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{ElementKind, ElementStyle, TemplateElement};

    fn field_template(column: &str) -> Template {
        let mut t = Template::default();
        t.elements.push(TemplateElement {
            id: "f".into(),
            kind: ElementKind::Field,
            content: column.into(),
            style: ElementStyle::default(),
        });
        t
    }

    fn rows(names: &[&str]) -> Vec<Row> {
        names.iter().map(|n| Row::new().with("Name", *n)).collect()
    }

    #[derive(Default)]
    struct Recorder {
        previews: Vec<usize>,
        progress: Vec<(usize, usize)>,
    }

    impl BatchObserver for Recorder {
        fn on_preview(&mut self, document: &RenderedDocument) {
            self.previews.push(document.row_index);
        }

        fn on_progress(&mut self, done: usize, total: usize) {
            self.progress.push((done, total));
        }
    }

    fn strict(policy: FailurePolicy) -> RenderConfig {
        RenderConfig {
            unmappable: UnmappablePolicy::Error,
            failure_policy: policy,
            ..RenderConfig::default()
        }
    }

    #[test]
    fn one_document_per_row_in_order() {
        let docs = render(&field_template("Name"), &rows(&["a", "b", "c"])).unwrap();
        let indices: Vec<usize> = docs.iter().map(|d| d.row_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(docs.iter().all(|d| d.bytes.starts_with(b"%PDF-")));
    }

    #[test]
    fn preview_fires_once_with_first_document() {
        let mut rec = Recorder::default();
        BatchRenderer::default()
            .run(&field_template("Name"), &rows(&["a", "b"]), &mut rec)
            .unwrap();
        assert_eq!(rec.previews, vec![0]);
        assert_eq!(rec.progress, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn failing_row_aborts_batch() {
        let renderer = BatchRenderer::new(strict(FailurePolicy::AbortBatch));
        let err = renderer
            .run(&field_template("Name"), &rows(&["ok", "日本", "ok"]), &mut ())
            .unwrap_err();
        assert!(matches!(err, Error::Render { row: 1, .. }));
    }

    #[test]
    fn per_row_reporting_keeps_going() {
        let renderer = BatchRenderer::new(strict(FailurePolicy::ReportPerRow));
        let outcome = renderer
            .run(&field_template("Name"), &rows(&["日本", "ok", "ok"]), &mut ())
            .unwrap();
        assert!(!outcome.is_complete());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].row_index, 0);
        let indices: Vec<usize> = outcome.documents.iter().map(|d| d.row_index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn invalid_template_fails_before_rows() {
        let mut t = field_template("Name");
        t.elements[0].style.font_size = 0;
        let mut rec = Recorder::default();
        let err = BatchRenderer::default().run(&t, &rows(&["a"]), &mut rec).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
        assert!(rec.progress.is_empty());
    }

    #[test]
    fn cancelled_batch_is_partial() {
        let renderer = BatchRenderer::default();
        renderer.cancel_token().cancel();
        let outcome = renderer
            .run(&field_template("Name"), &rows(&["a", "b"]), &mut ())
            .unwrap();
        assert_eq!(outcome.stopped, Some(StopReason::Cancelled));
        assert!(outcome.documents.is_empty());
    }

    struct CancelAfterFirst(CancelToken);

    impl BatchObserver for CancelAfterFirst {
        fn on_progress(&mut self, _done: usize, _total: usize) {
            self.0.cancel();
        }
    }

    #[test]
    fn cancel_between_rows_keeps_prefix() {
        let renderer = BatchRenderer::default();
        let mut observer = CancelAfterFirst(renderer.cancel_token());
        let outcome = renderer
            .run(&field_template("Name"), &rows(&["a", "b", "c"]), &mut observer)
            .unwrap();
        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.stopped, Some(StopReason::Cancelled));
    }

    #[test]
    fn row_budget_limits_output() {
        let renderer = BatchRenderer::new(RenderConfig {
            max_rows: Some(2),
            ..RenderConfig::default()
        });
        let outcome = renderer
            .run(&field_template("Name"), &rows(&["a", "b", "c"]), &mut ())
            .unwrap();
        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.stopped, Some(StopReason::RowBudget));
        assert_eq!(outcome.total_rows, 3);
    }

    #[test]
    fn zero_time_budget_stops_immediately() {
        let renderer = BatchRenderer::new(RenderConfig {
            time_budget: Some(Duration::ZERO),
            ..RenderConfig::default()
        });
        let outcome = renderer
            .run(&field_template("Name"), &rows(&["a"]), &mut ())
            .unwrap();
        assert_eq!(outcome.stopped, Some(StopReason::TimeBudget));
    }

    #[test]
    fn parallel_preserves_row_order() {
        let names: Vec<String> = (0..32).map(|i| format!("row {i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let renderer = BatchRenderer::new(RenderConfig {
            parallel: true,
            ..RenderConfig::default()
        });
        let mut rec = Recorder::default();
        let outcome = renderer
            .run(&field_template("Name"), &rows(&names), &mut rec)
            .unwrap();
        let indices: Vec<usize> = outcome.documents.iter().map(|d| d.row_index).collect();
        assert_eq!(indices, (0..32).collect::<Vec<_>>());
        assert_eq!(rec.previews, vec![0]);
    }

    #[test]
    fn parallel_abort_reports_lowest_failing_row() {
        let renderer = BatchRenderer::new(RenderConfig {
            parallel: true,
            ..strict(FailurePolicy::AbortBatch)
        });
        let err = renderer
            .run(&field_template("Name"), &rows(&["a", "б", "c", "日"]), &mut ())
            .unwrap_err();
        assert!(matches!(err, Error::Render { row: 1, .. }));
    }
}
