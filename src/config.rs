//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.hedtask.toml` files.

use crate::cli::{Args, Command};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".hedtask.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Cognitive Atlas API settings.
    #[serde(default)]
    pub atlas: AtlasConfig,

    /// NCBI E-utilities settings.
    #[serde(default)]
    pub pubmed: PubmedConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Root of the on-disk data layout.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            verbose: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("cogat_data")
}

/// Cognitive Atlas API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// API root, without trailing slash.
    #[serde(default = "default_atlas_url")]
    pub base_url: String,

    /// Pause between task detail requests.
    #[serde(default = "default_delay")]
    pub delay_seconds: f64,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            base_url: default_atlas_url(),
            delay_seconds: default_delay(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_atlas_url() -> String {
    "https://www.cognitiveatlas.org/api/v-alpha".to_string()
}

fn default_delay() -> f64 {
    5.0
}

fn default_timeout() -> u64 {
    60
}

/// NCBI E-utilities settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubmedConfig {
    #[serde(default = "default_eutils_url")]
    pub base_url: String,

    /// Contact address sent with every request. Required to download.
    #[serde(default)]
    pub email: Option<String>,

    /// Pause after each request, in seconds.
    #[serde(default = "default_request_rate")]
    pub request_rate: f64,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Process only the first N citation rows.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Default for PubmedConfig {
    fn default() -> Self {
        Self {
            base_url: default_eutils_url(),
            email: None,
            request_rate: default_request_rate(),
            timeout_seconds: default_timeout(),
            limit: None,
        }
    }
}

fn default_eutils_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}

fn default_request_rate() -> f64 {
    1.0
}

/// Negative or non-finite values mean no pause.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &Args) {
        if args.verbose {
            self.general.verbose = true;
        }

        match &args.command {
            Command::CollectTasks(cmd) => {
                self.apply_data_dir(cmd.data_dir.as_ref());
                self.apply_delay(cmd.delay);
            }
            Command::GenerateCitations(cmd) => {
                self.apply_data_dir(cmd.data_dir.as_ref());
            }
            Command::DownloadPubmed(cmd) => {
                self.apply_data_dir(cmd.data_dir.as_ref());
                self.apply_pubmed(cmd.email.as_ref(), cmd.limit, cmd.request_rate);
            }
            Command::FullWorkflow(cmd) => {
                self.apply_data_dir(cmd.data_dir.as_ref());
                self.apply_delay(cmd.delay);
                self.apply_pubmed(cmd.email.as_ref(), cmd.limit, cmd.request_rate);
            }
            Command::InitConfig => {}
        }
    }

    fn apply_data_dir(&mut self, data_dir: Option<&PathBuf>) {
        if let Some(dir) = data_dir {
            self.general.data_dir = dir.clone();
        }
    }

    fn apply_delay(&mut self, delay: Option<f64>) {
        if let Some(delay) = delay {
            self.atlas.delay_seconds = delay;
        }
    }

    fn apply_pubmed(&mut self, email: Option<&String>, limit: Option<usize>, rate: Option<f64>) {
        if let Some(email) = email {
            self.pubmed.email = Some(email.clone());
        }
        if limit.is_some() {
            self.pubmed.limit = limit;
        }
        if let Some(rate) = rate {
            self.pubmed.request_rate = rate;
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.general.data_dir
    }

    pub fn atlas_delay(&self) -> Duration {
        seconds(self.atlas.delay_seconds)
    }

    pub fn pubmed_request_rate(&self) -> Duration {
        seconds(self.pubmed.request_rate)
    }

    /// The configured contact email, if it is non-blank.
    pub fn pubmed_email(&self) -> Option<&str> {
        self.pubmed
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{CollectArgs, PubmedArgs};

    fn args(command: Command) -> Args {
        Args {
            command,
            config: None,
            verbose: false,
            quiet: false,
            log_file: None,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data_dir(), Path::new("cogat_data"));
        assert_eq!(config.atlas.delay_seconds, 5.0);
        assert_eq!(config.atlas.timeout_seconds, 60);
        assert_eq!(config.pubmed.request_rate, 1.0);
        assert!(config.pubmed.email.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
data_dir = "/tmp/atlas"
verbose = true

[atlas]
delay_seconds = 0.5

[pubmed]
email = "someone@example.org"
limit = 10
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.data_dir(), Path::new("/tmp/atlas"));
        assert!(config.general.verbose);
        assert_eq!(config.atlas_delay(), Duration::from_millis(500));
        assert_eq!(config.atlas.base_url, default_atlas_url());
        assert_eq!(config.pubmed_email(), Some("someone@example.org"));
        assert_eq!(config.pubmed.limit, Some(10));
        assert_eq!(config.pubmed.timeout_seconds, 60);
    }

    #[test]
    fn test_merge_only_explicit_values() {
        let mut config = Config::default();
        config.pubmed.email = Some("file@example.org".to_string());

        let mut cmd_args = args(Command::DownloadPubmed(PubmedArgs {
            data_dir: None,
            email: None,
            limit: Some(3),
            request_rate: None,
        }));
        cmd_args.verbose = true;
        config.merge_with_args(&cmd_args);

        assert_eq!(config.pubmed_email(), Some("file@example.org"));
        assert_eq!(config.pubmed.limit, Some(3));
        assert_eq!(config.pubmed.request_rate, 1.0);
        assert_eq!(config.data_dir(), Path::new("cogat_data"));
        assert!(config.general.verbose);

        config.merge_with_args(&args(Command::CollectTasks(CollectArgs {
            data_dir: Some(PathBuf::from("elsewhere")),
            task_id: None,
            delay: Some(0.0),
        })));
        assert_eq!(config.data_dir(), Path::new("elsewhere"));
        assert_eq!(config.atlas_delay(), Duration::ZERO);
    }

    #[test]
    fn test_blank_email_is_none() {
        let mut config = Config::default();
        config.pubmed.email = Some("  ".to_string());
        assert_eq!(config.pubmed_email(), None);
    }

    #[test]
    fn test_negative_delay_is_zero() {
        let mut config = Config::default();
        config.atlas.delay_seconds = -1.0;
        assert_eq!(config.atlas_delay(), Duration::ZERO);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[atlas]"));
        assert!(toml_str.contains("[pubmed]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.atlas.base_url, default_atlas_url());
    }
}
