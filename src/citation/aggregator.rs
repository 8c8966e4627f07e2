//! Citation aggregation over all collected tasks.
//!
//! Walks `task_data/`, reconciles every citation into the store and
//! writes one summary row per task-citation pair.

use super::extract::process_task_dir;
use super::merge::Reconciler;
use super::store::{CitationStore, DirectoryStore};
use crate::models::CitationSummaryRow;
use crate::report;
use crate::scanner::TaskScanner;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

/// Directory holding one subdirectory per task.
pub const TASK_DATA_DIR: &str = "task_data";

/// Directory holding one subdirectory per reconciled citation.
pub const CITATION_DATA_DIR: &str = "citation_data";

/// Flat citation table written at the data root.
pub const CITATION_SUMMARY_FILE: &str = "citation_summary.tsv";

/// Result of a citation summarization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryOutcome {
    pub success: bool,
    /// Tasks that contributed at least one row.
    pub task_count: usize,
    /// Rows written, one per task-citation pair.
    pub citation_count: usize,
    /// Citations whose stored content disagreed with a later task.
    pub conflicts: usize,
}

impl SummaryOutcome {
    fn failed() -> Self {
        Self::default()
    }
}

/// Summarize citations under `root`, persisting entities to
/// `root/citation_data`.
pub fn summarize_citations(root: &Path) -> SummaryOutcome {
    if !has_task_layout(root) {
        return SummaryOutcome::failed();
    }

    let store = match DirectoryStore::open(root.join(CITATION_DATA_DIR)) {
        Ok(store) => store,
        Err(e) => {
            error!("Cannot open citation store: {}", e);
            return SummaryOutcome::failed();
        }
    };

    summarize_with_store(root, store)
}

/// Summarize citations under `root` against an arbitrary store.
pub fn summarize_with_store<S: CitationStore>(root: &Path, store: S) -> SummaryOutcome {
    if !has_task_layout(root) {
        return SummaryOutcome::failed();
    }

    let scanner = TaskScanner::new(root.join(TASK_DATA_DIR));
    let tasks = match scanner.discover() {
        Ok(tasks) => tasks,
        Err(e) => {
            error!("Failed to discover tasks: {:#}", e);
            return SummaryOutcome::failed();
        }
    };
    info!("Found {} task directories to process", tasks.len());

    let mut reconciler = Reconciler::new(store);
    let mut rows: Vec<CitationSummaryRow> = Vec::new();
    let mut task_count = 0;

    for task in &tasks {
        match process_task_dir(&task.path, &mut reconciler) {
            Ok(task_rows) => {
                if !task_rows.is_empty() {
                    task_count += 1;
                }
                rows.extend(task_rows);
            }
            Err(e) => {
                warn!(task_id = %task.id, "Skipping task: {}", e);
            }
        }
    }

    let stats = reconciler.stats();
    info!(
        "Reconciled citations: {} new, {} already stored",
        stats.created, stats.matched
    );
    let conflicts = stats.conflicts;
    if conflicts > 0 {
        warn!("{} citation conflicts kept their first-seen content", conflicts);
    }

    if rows.is_empty() {
        warn!("No citations found to process");
        return SummaryOutcome::failed();
    }

    let output = root.join(CITATION_SUMMARY_FILE);
    if let Err(e) = report::write_tsv(&output, &rows) {
        error!("Error saving citation summary to {}: {:#}", output.display(), e);
        return SummaryOutcome {
            success: false,
            task_count,
            citation_count: rows.len(),
            conflicts,
        };
    }

    info!("Created citation summary: {}", output.display());
    info!(
        "Summary contains {} citation records from {} tasks",
        rows.len(),
        task_count
    );

    SummaryOutcome {
        success: true,
        task_count,
        citation_count: rows.len(),
        conflicts,
    }
}

fn has_task_layout(root: &Path) -> bool {
    if !root.is_dir() {
        error!("Data directory does not exist: {}", root.display());
        return false;
    }

    let task_data = root.join(TASK_DATA_DIR);
    if !task_data.is_dir() {
        error!("Task data directory does not exist: {}", task_data.display());
        return false;
    }

    true
}
