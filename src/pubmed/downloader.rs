//! PubMed download over the citation summary.

use super::article_ids::parse_article_ids;
use super::client::PubmedClient;
use crate::citation::aggregator::{CITATION_DATA_DIR, CITATION_SUMMARY_FILE};
use crate::citation::store::DirectoryStore;
use crate::models::{CitationSummaryRow, PubmedRecord, PubmedSummaryRow};
use crate::report;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identifier table written at the data root.
pub const PUBMED_SUMMARY_FILE: &str = "pubmed_summary.tsv";

/// Downloads PubMed records for every citation with a PMID.
pub struct PubmedDownloader {
    client: PubmedClient,
    root: PathBuf,
    request_rate: Duration,
    limit: Option<usize>,
    show_progress: bool,
}

impl PubmedDownloader {
    pub fn new(client: PubmedClient, root: impl Into<PathBuf>, request_rate: Duration) -> Self {
        Self {
            client,
            root: root.into(),
            request_rate,
            limit: None,
            show_progress: false,
        }
    }

    /// Only process the first `limit` summary rows.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Fetch records, write per-citation files and `pubmed_summary.tsv`.
    pub async fn run(&self) -> Result<Vec<PubmedSummaryRow>> {
        let summary_path = self.root.join(CITATION_SUMMARY_FILE);
        if !summary_path.is_file() {
            bail!("Citation summary not found: {}", summary_path.display());
        }

        let mut rows: Vec<CitationSummaryRow> = report::read_tsv(&summary_path)?;
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        info!("Processing {} citation rows", rows.len());

        let store = DirectoryStore::open(self.root.join(CITATION_DATA_DIR))
            .context("Cannot open citation data directory")?;
        let mut fetched: HashMap<String, Option<PubmedRecord>> = HashMap::new();
        let mut summary = Vec::with_capacity(rows.len());
        let progress = self.progress_bar(rows.len() as u64);

        for row in &rows {
            progress.inc(1);

            let cit_id = row.cit_id.trim();
            if cit_id.is_empty() {
                warn!(task_id = %row.task_id, "Skipping citation row with no ID");
                continue;
            }

            progress.set_message(cit_id.to_string());

            let pmid = row.citation_pmid.trim();
            let mut out = PubmedSummaryRow {
                citation_id: cit_id.to_string(),
                citation_pmid: pmid.to_string(),
                doi: row.doi.trim().to_string(),
                ..Default::default()
            };

            if pmid.is_empty() {
                debug!(citation_id = cit_id, "No PMID, nothing to fetch");
                summary.push(out);
                continue;
            }

            if !fetched.contains_key(pmid) {
                let record = self.fetch(pmid).await;
                fetched.insert(pmid.to_string(), record);
            }

            if let Some(record) = fetched.get(pmid).and_then(Option::as_ref) {
                if let Err(e) = self.save_record(&store, cit_id, record) {
                    warn!(citation_id = cit_id, pmid, "Error saving PubMed record: {:#}", e);
                }

                let ids = parse_article_ids(&record.article_ids);
                out.pmid = ids.pmid;
                out.pmcid = ids.pmcid;
                if out.doi.is_empty() {
                    out.doi = ids.doi;
                }
                out.other = ids.other.join("; ");
            }

            summary.push(out);
        }

        progress.finish_and_clear();

        if summary.is_empty() {
            warn!("No citation rows to summarize");
        } else {
            self.save_summary(&summary)?;
        }

        Ok(summary)
    }

    async fn fetch(&self, pmid: &str) -> Option<PubmedRecord> {
        let result = self.client.fetch(pmid).await;

        if !self.request_rate.is_zero() {
            tokio::time::sleep(self.request_rate).await;
        }

        match result {
            Ok(record) => {
                debug!(pmid, "Fetched {} article ids", record.article_ids.len());
                Some(record)
            }
            Err(e) => {
                warn!(pmid, "Error fetching PubMed record: {}", e);
                None
            }
        }
    }

    /// Write `{cit_id}_pubmed.json` and, when there is an abstract,
    /// `{cit_id}_abstract.md`.
    fn save_record(&self, store: &DirectoryStore, cit_id: &str, record: &PubmedRecord) -> Result<()> {
        let dir = store.entity_dir(cit_id)?;
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        report::write_json_pretty(&dir.join(format!("{}_pubmed.json", cit_id)), record)?;

        if let Some(text) = record.abstract_text.as_deref() {
            let markdown = report::generate_abstract_markdown(record.title.as_deref(), text);
            let path = dir.join(format!("{}_abstract.md", cit_id));
            fs::write(&path, markdown)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        Ok(())
    }

    fn save_summary(&self, rows: &[PubmedSummaryRow]) -> Result<()> {
        let path = self.root.join(PUBMED_SUMMARY_FILE);
        report::write_tsv(&path, rows)?;
        info!("Saved PubMed summary to {}", path.display());
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
