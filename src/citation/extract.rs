//! Per-task citation extraction.

use super::merge::Reconciler;
use super::store::CitationStore;
use crate::models::{non_empty, CitationReference, CitationSummaryRow, TaskDetails};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task directory has no usable name: {}", .0.display())]
    InvalidDirectory(PathBuf),

    #[error("details file not found: {}", .0.display())]
    MissingDetails(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed task details {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Path of the details file for `task_id` inside `task_dir`.
pub fn details_path(task_dir: &Path, task_id: &str) -> PathBuf {
    task_dir.join(format!("{}_details.json", task_id))
}

/// Load `{task_dir}/{task_id}_details.json`, where the task id is the
/// directory name.
pub fn load_task_details(task_dir: &Path) -> Result<(String, TaskDetails), TaskError> {
    let task_id = task_dir
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| TaskError::InvalidDirectory(task_dir.to_path_buf()))?
        .to_string();

    let path = details_path(task_dir, &task_id);
    if !path.is_file() {
        return Err(TaskError::MissingDetails(path));
    }

    let content = fs::read_to_string(&path).map_err(|source| TaskError::Read {
        path: path.clone(),
        source,
    })?;
    let details: TaskDetails =
        serde_json::from_str(&content).map_err(|source| TaskError::Malformed { path, source })?;

    if let Some(record_id) = non_empty(&details.id).filter(|id| *id != task_id) {
        warn!(task_id = %task_id, record_id, "Details record id differs from its directory name");
    }

    Ok((task_id, details))
}

/// Reconcile every citation of a task and return one row per citation.
///
/// A citation that fails to persist is logged and left out; the rest of
/// the task is still processed.
pub fn extract_task_citations<S: CitationStore>(
    task_id: &str,
    details: &TaskDetails,
    reconciler: &mut Reconciler<S>,
) -> Vec<CitationSummaryRow> {
    if details.citation.is_empty() {
        info!(task_id, "No citations found for task");
        return Vec::new();
    }

    let mut rows = Vec::with_capacity(details.citation.len());
    for (index, raw) in details.citation.iter().enumerate() {
        let Some(reference) = parse_reference(raw) else {
            error!(task_id, index, "Skipping malformed citation entry: {}", raw);
            continue;
        };

        match reconciler.reconcile(task_id, &reference) {
            Ok(reconciled) => {
                debug!(
                    citation_id = %reconciled.entity.id,
                    task_id,
                    outcome = ?reconciled.outcome,
                    "Processed citation"
                );
                rows.push(CitationSummaryRow::new(task_id, &reconciled.entity));
            }
            Err(e) => {
                error!(task_id, "Error processing citation: {}", e);
            }
        }
    }

    rows
}

/// Citation entries must be JSON objects.
fn parse_reference(raw: &Value) -> Option<CitationReference> {
    if !raw.is_object() {
        return None;
    }
    CitationReference::deserialize(raw).ok()
}

/// Load one task directory and extract its citation rows.
pub fn process_task_dir<S: CitationStore>(
    task_dir: &Path,
    reconciler: &mut Reconciler<S>,
) -> Result<Vec<CitationSummaryRow>, TaskError> {
    let (task_id, details) = load_task_details(task_dir)?;
    let span = info_span!(
        "task",
        task_id = %task_id,
        name = details.name.as_deref().unwrap_or_default()
    );
    let _enter = span.enter();
    Ok(extract_task_citations(&task_id, &details, reconciler))
}
