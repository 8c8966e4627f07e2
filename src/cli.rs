//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hedtask - Cognitive Atlas task and citation collector
///
/// Downloads task records from the Cognitive Atlas, reconciles the
/// literature citations they reference, and fetches PubMed abstracts.
///
/// Examples:
///   hedtask collect-tasks --data-dir ./cogat_data
///   hedtask collect-tasks --task-id trm_4a3fd79d0b5e7,trm_4a3fd79d0a33b
///   hedtask generate-citations
///   hedtask download-pubmed --email me@example.org --limit 20
///   hedtask full-workflow --email me@example.org
///   hedtask init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .hedtask.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress bars)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write log output to a file instead of stdout
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download task records from the Cognitive Atlas API
    CollectTasks(CollectArgs),

    /// Reconcile citations across collected tasks and write citation_summary.tsv
    GenerateCitations(GenerateArgs),

    /// Fetch PubMed records for citations with a PMID
    DownloadPubmed(PubmedArgs),

    /// Collect tasks, generate citations, then download PubMed records
    /// when an email is configured
    FullWorkflow(WorkflowArgs),

    /// Generate a default .hedtask.toml configuration file
    InitConfig,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct CollectArgs {
    /// Root data directory
    #[arg(long, value_name = "DIR", env = "HEDTASK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Only collect these task ids (comma-separated)
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub task_id: Option<Vec<String>>,

    /// Seconds to wait between API requests
    #[arg(long, value_name = "SECS")]
    pub delay: Option<f64>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Root data directory
    #[arg(long, value_name = "DIR", env = "HEDTASK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct PubmedArgs {
    /// Root data directory
    #[arg(long, value_name = "DIR", env = "HEDTASK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Contact email sent to NCBI with every request
    #[arg(long, value_name = "EMAIL", env = "NCBI_EMAIL")]
    pub email: Option<String>,

    /// Process only the first N citation rows
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Seconds to wait after each NCBI request
    #[arg(long, value_name = "SECS")]
    pub request_rate: Option<f64>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct WorkflowArgs {
    /// Root data directory
    #[arg(long, value_name = "DIR", env = "HEDTASK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Only collect these task ids (comma-separated)
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub task_id: Option<Vec<String>>,

    /// Seconds to wait between Cognitive Atlas requests
    #[arg(long, value_name = "SECS")]
    pub delay: Option<f64>,

    /// Contact email for NCBI; PubMed download is skipped without one
    #[arg(long, value_name = "EMAIL", env = "NCBI_EMAIL")]
    pub email: Option<String>,

    /// Process only the first N citation rows when downloading
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Seconds to wait after each NCBI request
    #[arg(long, value_name = "SECS")]
    pub request_rate: Option<f64>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::CollectTasks(cmd) => {
                validate_seconds("--delay", cmd.delay)?;
                validate_task_ids(cmd.task_id.as_deref())?;
            }
            Command::DownloadPubmed(cmd) => {
                validate_seconds("--request-rate", cmd.request_rate)?;
                validate_limit(cmd.limit)?;
                validate_email(cmd.email.as_deref())?;
            }
            Command::FullWorkflow(cmd) => {
                validate_seconds("--delay", cmd.delay)?;
                validate_seconds("--request-rate", cmd.request_rate)?;
                validate_task_ids(cmd.task_id.as_deref())?;
                validate_limit(cmd.limit)?;
                validate_email(cmd.email.as_deref())?;
            }
            Command::GenerateCitations(_) | Command::InitConfig => {}
        }

        Ok(())
    }

    /// Task ids requested on the command line, if any.
    pub fn task_ids(&self) -> Option<&[String]> {
        match &self.command {
            Command::CollectTasks(cmd) => cmd.task_id.as_deref(),
            Command::FullWorkflow(cmd) => cmd.task_id.as_deref(),
            _ => None,
        }
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the `general.verbose` setting; `--quiet` wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn validate_seconds(flag: &str, value: Option<f64>) -> Result<(), String> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => {
            Err(format!("{} must be a non-negative number of seconds", flag))
        }
        _ => Ok(()),
    }
}

fn validate_task_ids(ids: Option<&[String]>) -> Result<(), String> {
    if let Some(ids) = ids {
        if ids.is_empty() || ids.iter().any(|id| id.trim().is_empty()) {
            return Err("--task-id must not contain empty ids".to_string());
        }
    }
    Ok(())
}

fn validate_limit(limit: Option<usize>) -> Result<(), String> {
    if limit == Some(0) {
        return Err("Limit must be at least 1".to_string());
    }
    Ok(())
}

fn validate_email(email: Option<&str>) -> Result<(), String> {
    if let Some(email) = email {
        if !email.contains('@') {
            return Err(format!("Not an email address: {}", email));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            command,
            config: None,
            verbose: false,
            quiet: false,
            log_file: None,
        }
    }

    #[test]
    fn test_parse_subcommands() {
        let args = Args::try_parse_from([
            "hedtask",
            "collect-tasks",
            "--task-id",
            "trm_a,tsk_b",
            "--delay",
            "0",
            "-v",
        ])
        .unwrap();
        assert!(args.verbose);
        assert_eq!(
            args.task_ids(),
            Some(&["trm_a".to_string(), "tsk_b".to_string()][..])
        );

        let args = Args::try_parse_from(["hedtask", "init-config"]).unwrap();
        assert!(matches!(args.command, Command::InitConfig));
        assert_eq!(args.task_ids(), None);
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Args::try_parse_from(["hedtask"]).is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Command::InitConfig);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_values() {
        let args = make_args(Command::CollectTasks(CollectArgs {
            delay: Some(-1.0),
            ..Default::default()
        }));
        assert!(args.validate().is_err());

        let args = make_args(Command::DownloadPubmed(PubmedArgs {
            limit: Some(0),
            ..Default::default()
        }));
        assert!(args.validate().is_err());

        let args = make_args(Command::DownloadPubmed(PubmedArgs {
            email: Some("nobody".to_string()),
            ..Default::default()
        }));
        assert!(args.validate().is_err());

        let args = make_args(Command::FullWorkflow(WorkflowArgs {
            task_id: Some(vec!["trm_a".to_string(), " ".to_string()]),
            ..Default::default()
        }));
        assert!(args.validate().is_err());

        let args = make_args(Command::FullWorkflow(WorkflowArgs {
            email: Some("me@example.org".to_string()),
            limit: Some(5),
            ..Default::default()
        }));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::InitConfig);
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
