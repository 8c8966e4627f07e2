//! PubMed record download for reconciled citations.
//!
//! This module provides the NCBI E-utilities client, `ArticleIdList`
//! classification, and the downloader driven by `citation_summary.tsv`.

pub mod article_ids;
pub mod client;
pub mod downloader;

pub use client::PubmedClient;
pub use downloader::{PubmedDownloader, PUBMED_SUMMARY_FILE};
