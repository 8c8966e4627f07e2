//! Task collection onto disk.
//!
//! Produces `task_summary.tsv`, `task_summary.json` and one
//! `{id}/{id}_details.json` per task under the task data directory.
//! Requests are made one at a time with a fixed pause between them.

use super::client::AtlasClient;
use crate::citation::extract::details_path;
use crate::citation::store::validate_key;
use crate::models::{TaskSummary, TaskSummaryRow};
use crate::report;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Summary table written next to the task directories.
pub const TASK_SUMMARY_FILE: &str = "task_summary.tsv";

/// JSON copy of the summary table.
pub const TASK_SUMMARY_JSON: &str = "task_summary.json";

/// Counts from one collection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Tasks considered (after any id filter).
    pub total: usize,
    /// Tasks whose details were saved.
    pub succeeded: usize,
    /// Tasks skipped or whose fetch/save failed.
    pub failed: usize,
}

/// Collects Cognitive Atlas tasks into a task data directory.
pub struct TaskCollector {
    client: AtlasClient,
    task_data_dir: PathBuf,
    delay: Duration,
    show_progress: bool,
}

impl TaskCollector {
    pub fn new(client: AtlasClient, task_data_dir: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            client,
            task_data_dir: task_data_dir.into(),
            delay,
            show_progress: false,
        }
    }

    /// Show a progress bar while collecting.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Collect every task the API lists.
    pub async fn collect_all(&self) -> Result<CollectionReport> {
        info!("Fetching task list from Cognitive Atlas");
        let tasks = self
            .client
            .list_tasks()
            .await
            .context("Failed to fetch task list")?;
        info!("Found {} tasks", tasks.len());

        self.collect(tasks).await
    }

    /// Collect only the listed task ids.
    pub async fn collect_specific(&self, task_ids: &[String]) -> Result<CollectionReport> {
        info!("Collecting data for {} specific tasks", task_ids.len());
        let tasks: Vec<TaskSummary> = self
            .client
            .list_tasks()
            .await
            .context("Failed to fetch task list")?
            .into_iter()
            .filter(|t| t.id.as_ref().is_some_and(|id| task_ids.contains(id)))
            .collect();

        if tasks.is_empty() {
            warn!("No matching tasks found");
            return Ok(CollectionReport::default());
        }
        info!("Found {} matching tasks", tasks.len());

        self.collect(tasks).await
    }

    async fn collect(&self, tasks: Vec<TaskSummary>) -> Result<CollectionReport> {
        fs::create_dir_all(&self.task_data_dir).with_context(|| {
            format!("Failed to create {}", self.task_data_dir.display())
        })?;

        let mut report = CollectionReport {
            total: tasks.len(),
            ..Default::default()
        };
        let mut summary_rows = Vec::with_capacity(tasks.len());
        let progress = self.progress_bar(tasks.len() as u64);

        for (index, task) in tasks.iter().enumerate() {
            progress.inc(1);

            let Some(task_id) = task.id.as_deref().filter(|id| !id.is_empty()) else {
                warn!(
                    "Skipping task with no ID: {}",
                    task.name.as_deref().unwrap_or("<unnamed>")
                );
                report.failed += 1;
                continue;
            };

            if let Err(e) = validate_key(task_id) {
                warn!(task_id, "Skipping task with unusable ID: {}", e);
                report.failed += 1;
                continue;
            }

            progress.set_message(task_id.to_string());
            let saved = self.fetch_and_save(task_id).await;
            if saved {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }

            summary_rows.push(TaskSummaryRow {
                id: task_id.to_string(),
                name: task.name.clone().unwrap_or_default(),
                definition_text: task.definition_text.clone().unwrap_or_default(),
                has_detailed_info: saved,
            });

            if index + 1 < tasks.len() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        progress.finish_and_clear();

        if !summary_rows.is_empty() {
            self.save_summary(&summary_rows)?;
        }

        info!(
            "Collection complete: {} succeeded, {} failed",
            report.succeeded, report.failed
        );
        Ok(report)
    }

    /// Fetch one task and write its details file. Failures are logged.
    async fn fetch_and_save(&self, task_id: &str) -> bool {
        let details = match self.client.get_task(task_id).await {
            Ok(Some(details)) => details,
            Ok(None) => {
                warn!(task_id, "No details found for task");
                return false;
            }
            Err(e) => {
                warn!(task_id, "Error fetching task: {}", e);
                return false;
            }
        };

        match save_task_details(&self.task_data_dir, task_id, &details) {
            Ok(path) => {
                info!(task_id, "Saved details to {}", path.display());
                true
            }
            Err(e) => {
                warn!(task_id, "Error saving task details: {:#}", e);
                false
            }
        }
    }

    fn save_summary(&self, rows: &[TaskSummaryRow]) -> Result<()> {
        let tsv = self.task_data_dir.join(TASK_SUMMARY_FILE);
        report::write_tsv(&tsv, rows)?;
        let json = self.task_data_dir.join(TASK_SUMMARY_JSON);
        report::write_json_pretty(&json, rows)?;
        info!("Saved task summary to {}", tsv.display());
        Ok(())
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    }
}

/// Write `{task_data_dir}/{task_id}/{task_id}_details.json`.
pub fn save_task_details(task_data_dir: &Path, task_id: &str, details: &Value) -> Result<PathBuf> {
    let dir = task_data_dir.join(task_id);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = details_path(&dir, task_id);
    report::write_json_pretty(&path, details)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskDetails;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn mock_atlas(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/task").query_param_missing("id");
                then.status(200).json_body(json!([
                    {"id": "trm_a", "name": "Task A", "definition_text": "First"},
                    {"id": "trm_b", "name": "Task B"},
                    {"id": "", "name": "Blank"}
                ]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/task").query_param("id", "trm_a");
                then.status(200).json_body(json!({
                    "id": "trm_a",
                    "name": "Task A",
                    "citation": [{"citation_pmid": "12345", "citation_desc": "Paper"}]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/task").query_param("id", "trm_b");
                then.status(404).body("not found");
            })
            .await;
    }

    #[tokio::test]
    async fn test_collect_all_writes_layout() {
        let server = MockServer::start_async().await;
        mock_atlas(&server).await;
        let temp = TempDir::new().unwrap();
        let task_data = temp.path().join("task_data");

        let client = AtlasClient::new(&server.base_url(), 5).unwrap();
        let collector = TaskCollector::new(client, &task_data, Duration::ZERO);
        let report = collector.collect_all().await.unwrap();

        assert_eq!(
            report,
            CollectionReport {
                total: 3,
                succeeded: 1,
                failed: 2
            }
        );

        let details_file = task_data.join("trm_a").join("trm_a_details.json");
        let details: TaskDetails =
            serde_json::from_str(&fs::read_to_string(details_file).unwrap()).unwrap();
        assert_eq!(details.citation.len(), 1);
        assert!(!task_data.join("trm_b").join("trm_b_details.json").exists());

        let summary = fs::read_to_string(task_data.join(TASK_SUMMARY_FILE)).unwrap();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "id\tname\tdefinition_text\thas_detailed_info");
        assert_eq!(lines[1], "trm_a\tTask A\tFirst\ttrue");
        assert_eq!(lines[2], "trm_b\tTask B\t\tfalse");
        assert!(task_data.join(TASK_SUMMARY_JSON).is_file());
    }

    #[tokio::test]
    async fn test_collect_specific_filters() {
        let server = MockServer::start_async().await;
        mock_atlas(&server).await;
        let temp = TempDir::new().unwrap();

        let client = AtlasClient::new(&server.base_url(), 5).unwrap();
        let collector = TaskCollector::new(client, temp.path(), Duration::ZERO);

        let report = collector
            .collect_specific(&["trm_a".to_string()])
            .await
            .unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.succeeded, 1);

        let none = collector
            .collect_specific(&["trm_zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(none, CollectionReport::default());
    }

    #[tokio::test]
    async fn test_list_failure_is_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/task");
                then.status(503);
            })
            .await;
        let temp = TempDir::new().unwrap();

        let client = AtlasClient::new(&server.base_url(), 5).unwrap();
        let collector = TaskCollector::new(client, temp.path(), Duration::ZERO);
        assert!(collector.collect_all().await.is_err());
    }
}
