//! Citation reconciliation and aggregation.
//!
//! Identity resolution, first-write-wins merging against a citation
//! store, per-task extraction, and the run over all tasks that produces
//! `citation_summary.tsv`.

pub mod aggregator;
pub mod extract;
pub mod identity;
pub mod merge;
pub mod store;

pub use aggregator::summarize_citations;
