//! Task directory discovery.
//!
//! Tasks live under `task_data/` as one directory per task, named by
//! the task identifier. Only directories whose names carry a known
//! identifier prefix are treated as tasks.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;
use walkdir::WalkDir;

/// Identifier prefixes used by Cognitive Atlas task records.
pub const TASK_PREFIXES: &[&str] = &["trm_", "tsk_"];

/// A task directory found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTask {
    /// Task identifier (the directory name).
    pub id: String,
    /// Absolute or root-relative directory path.
    pub path: PathBuf,
}

/// Scanner for task directories.
pub struct TaskScanner {
    task_data_dir: PathBuf,
    prefixes: Vec<String>,
}

impl TaskScanner {
    /// Create a scanner with the default task prefixes.
    pub fn new(task_data_dir: impl Into<PathBuf>) -> Self {
        Self {
            task_data_dir: task_data_dir.into(),
            prefixes: TASK_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Check whether a directory name denotes a task.
    pub fn is_task_name(&self, name: &str) -> bool {
        self.prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// Discover task directories, sorted by name.
    pub fn discover(&self) -> Result<Vec<DiscoveredTask>> {
        let mut tasks = Vec::new();

        let walker = WalkDir::new(&self.task_data_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.with_context(|| {
                format!("Failed to list {}", self.task_data_dir.display())
            })?;

            if !entry.file_type().is_dir() {
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                debug!("Skipping non UTF-8 entry {}", entry.path().display());
                continue;
            };

            if self.is_task_name(name) {
                tasks.push(DiscoveredTask {
                    id: name.to_string(),
                    path: entry.path().to_path_buf(),
                });
            }
        }

        Ok(tasks)
    }
}
