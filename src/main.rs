//! hedtask - Cognitive Atlas task and citation collector
//!
//! A CLI tool that mirrors Cognitive Atlas task records onto disk,
//! reconciles the citations they reference into one record per
//! citation, and downloads PubMed abstracts for them.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Failure (bad arguments, config, network, or nothing produced)

mod atlas;
mod citation;
mod cli;
mod config;
mod models;
mod pubmed;
mod report;
mod scanner;

use anyhow::{bail, Context, Result};
use atlas::{AtlasClient, TaskCollector};
use citation::aggregator::TASK_DATA_DIR;
use cli::{Args, Command};
use config::{Config, CONFIG_FILE};
use pubmed::{PubmedClient, PubmedDownloader, PUBMED_SUMMARY_FILE};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    if let Err(e) = init_logging(&args, &config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    info!("hedtask v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    let start_time = Instant::now();
    let result = match &args.command {
        Command::CollectTasks(_) => run_collect(&config, &args).await,
        Command::GenerateCitations(_) => run_generate(&config),
        Command::DownloadPubmed(_) => run_pubmed(&config, &args).await,
        Command::FullWorkflow(_) => run_full_workflow(&config, &args).await,
        Command::InitConfig => Ok(0),
    };

    match result {
        Ok(exit_code) => {
            debug!("Finished in {:.1}s", start_time.elapsed().as_secs_f64());
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .hedtask.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Set [pubmed] email to enable PubMed downloads.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) -> Result<()> {
    let level = args.log_level(config.general.verbose);

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    match &args.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;
        }
        None => {
            tracing::subscriber::set_global_default(builder.finish())
                .context("Failed to set tracing subscriber")?;
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}

/// Collect tasks from the Cognitive Atlas. Returns exit code.
async fn run_collect(config: &Config, args: &Args) -> Result<i32> {
    let task_data_dir = config.data_dir().join(TASK_DATA_DIR);

    println!("📥 Collecting tasks from {}", config.atlas.base_url);
    println!("   Data directory: {}", config.data_dir().display());
    println!("   Delay: {:.1}s", config.atlas_delay().as_secs_f64());

    let client = AtlasClient::new(&config.atlas.base_url, config.atlas.timeout_seconds)?;
    let collector = TaskCollector::new(client, &task_data_dir, config.atlas_delay())
        .with_progress(!args.quiet);

    let report = match args.task_ids() {
        Some(ids) => collector.collect_specific(ids).await?,
        None => collector.collect_all().await?,
    };

    println!("\n📊 Collection Summary:");
    println!("   Tasks: {}", report.total);
    println!("   ✅ Saved: {} | ⚠️  Failed: {}", report.succeeded, report.failed);

    if report.succeeded == 0 {
        eprintln!("\n❌ No task details were collected.");
        return Ok(1);
    }

    println!("\n✅ Task data saved to: {}", task_data_dir.display());
    Ok(0)
}

/// Reconcile citations across collected tasks. Returns exit code.
fn run_generate(config: &Config) -> Result<i32> {
    println!("📚 Generating citation summary...");
    let outcome = citation::summarize_citations(config.data_dir());

    println!("\n📊 Citation Summary:");
    println!("   Tasks with citations: {}", outcome.task_count);
    println!("   Task-citation rows: {}", outcome.citation_count);
    if outcome.conflicts > 0 {
        println!("   ⚠️  Conflicts (first version kept): {}", outcome.conflicts);
    }

    if !outcome.success {
        eprintln!("\n❌ Citation summary was not generated.");
        return Ok(1);
    }

    println!(
        "\n✅ Citation summary saved to: {}",
        config
            .data_dir()
            .join(citation::aggregator::CITATION_SUMMARY_FILE)
            .display()
    );
    Ok(0)
}

/// Download PubMed records for summarized citations. Returns exit code.
async fn run_pubmed(config: &Config, args: &Args) -> Result<i32> {
    let Some(email) = config.pubmed_email() else {
        bail!("An email address is required for NCBI requests (--email or [pubmed] email)");
    };

    println!("🔬 Downloading PubMed records...");
    println!("   NCBI: {}", config.pubmed.base_url);
    if let Some(limit) = config.pubmed.limit {
        println!("   Limit: {} rows", limit);
    }

    let client = PubmedClient::new(&config.pubmed.base_url, email, config.pubmed.timeout_seconds)?;
    let downloader = PubmedDownloader::new(client, config.data_dir(), config.pubmed_request_rate())
        .with_limit(config.pubmed.limit)
        .with_progress(!args.quiet);

    let rows = downloader.run().await?;
    let resolved = rows.iter().filter(|r| !r.pmid.is_empty()).count();

    println!("\n📊 PubMed Summary:");
    println!("   Citations: {}", rows.len());
    println!("   With PubMed record: {}", resolved);

    if rows.is_empty() {
        eprintln!("\n❌ No citation rows to process.");
        return Ok(1);
    }

    println!(
        "\n✅ PubMed summary saved to: {}",
        config.data_dir().join(PUBMED_SUMMARY_FILE).display()
    );
    Ok(0)
}

/// Run collection, citation generation and (with an email) PubMed download.
async fn run_full_workflow(config: &Config, args: &Args) -> Result<i32> {
    println!("🚀 Running full workflow\n");

    let code = run_collect(config, args).await?;
    if code != 0 {
        return Ok(code);
    }

    println!();
    let code = run_generate(config)?;
    if code != 0 {
        return Ok(code);
    }

    println!();
    if config.pubmed_email().is_none() {
        println!("⏭️  Skipping PubMed download (no email configured)");
        return Ok(0);
    }
    run_pubmed(config, args).await
}
