//! TSV, JSON and Markdown writers.
//!
//! Tables are tab separated with a header row taken from the row type's
//! field names, `\n` line endings, and minimal quoting.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Write `rows` as a TSV table with a header row.
///
/// An empty slice still produces a file; callers that must not emit empty
/// tables check before calling.
pub fn write_tsv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

/// Read a TSV table written by [`write_tsv`] (or any tool using the same
/// header names).
pub fn read_tsv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize().enumerate() {
        let row = record
            .with_context(|| format!("Malformed row {} in {}", index + 1, path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write `value` as pretty-printed JSON.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to encode {}", path.display()))?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Render an abstract as a small Markdown document.
pub fn generate_abstract_markdown(title: Option<&str>, abstract_text: &str) -> String {
    let title = title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("No title available");
    format!("# {}\n\n## Abstract\n\n{}\n", title, abstract_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CitationSummaryRow;
    use tempfile::TempDir;

    fn row(cit_id: &str, task_id: &str, desc: &str) -> CitationSummaryRow {
        CitationSummaryRow {
            cit_id: cit_id.to_string(),
            task_id: task_id.to_string(),
            doi: String::new(),
            citation_pmid: "12345".to_string(),
            citation_url: String::new(),
            citation_desc: desc.to_string(),
        }
    }

    #[test]
    fn test_write_tsv_header_and_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("citation_summary.tsv");
        write_tsv(
            &path,
            &[row("pmid_12345", "trm_b", "B"), row("pmid_12345", "trm_a", "A")],
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "cit_id\ttask_id\tdoi\tcitation_pmid\tcitation_url\tcitation_desc"
        );
        assert_eq!(lines[1], "pmid_12345\ttrm_b\t\t12345\t\tB");
        assert_eq!(lines[2], "pmid_12345\ttrm_a\t\t12345\t\tA");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_tsv_quotes_embedded_tabs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.tsv");
        let rows = vec![row("x", "trm_a", "has\ttab and \"quotes\"")];
        write_tsv(&path, &rows).unwrap();

        let back: Vec<CitationSummaryRow> = read_tsv(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_abstract_markdown() {
        let md = generate_abstract_markdown(Some("Title"), "Body text.");
        assert_eq!(md, "# Title\n\n## Abstract\n\nBody text.\n");

        let md = generate_abstract_markdown(None, "Body");
        assert!(md.starts_with("# No title available\n"));
    }
}
