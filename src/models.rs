//! Data models for tasks and citations.
//!
//! This module contains the records read from the Cognitive Atlas API,
//! the reconciled citation entities persisted under `citation_data/`,
//! and the flat rows written to the TSV summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Deserialize an optional string field that the API may send as `null`,
/// a number, or a string.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Like `lenient_string`, with `null` and missing values read as empty.
fn lenient_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

/// Deserialize a list that may be `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Returns the value when it is present and not empty.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// One entry of the task list endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSummary {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub definition_text: Option<String>,
}

/// The fields of a persisted task details record that citation
/// processing reads. Everything else in the file is ignored.
///
/// Citation entries stay raw so that one malformed entry does not reject
/// the whole record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub citation: Vec<Value>,
}

/// A citation as embedded in a task record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationReference {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(rename = "citation_pmid", default, deserialize_with = "lenient_string")]
    pub pmid: Option<String>,
    #[serde(rename = "citation_url", default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
    #[serde(rename = "citation_desc", default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub doi: Option<String>,
    #[serde(rename = "citation_pubname", default, deserialize_with = "lenient_string")]
    pub pubname: Option<String>,
    #[serde(rename = "citation_authors", default, deserialize_with = "lenient_string")]
    pub authors: Option<String>,
    #[serde(rename = "citation_pubdate", default, deserialize_with = "lenient_string")]
    pub pubdate: Option<String>,
    #[serde(rename = "citation_type", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(rename = "citation_source", default, deserialize_with = "lenient_string")]
    pub source: Option<String>,
    #[serde(rename = "citation_comment", default, deserialize_with = "lenient_string")]
    pub comment: Option<String>,
}

/// A reconciled citation, stored once per derived identifier.
///
/// Absent reference fields are persisted as empty strings so that the
/// on-disk layout has a fixed set of keys. Records written with `null`
/// or numeric values still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEntity {
    #[serde(default, deserialize_with = "lenient_or_empty")]
    pub id: String,
    #[serde(rename = "citation_pmid", default, deserialize_with = "lenient_or_empty")]
    pub pmid: String,
    #[serde(rename = "citation_url", default, deserialize_with = "lenient_or_empty")]
    pub url: String,
    #[serde(rename = "citation_desc", default, deserialize_with = "lenient_or_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_or_empty")]
    pub doi: String,
    #[serde(rename = "citation_pubname", default, deserialize_with = "lenient_or_empty")]
    pub pubname: String,
    #[serde(rename = "citation_authors", default, deserialize_with = "lenient_or_empty")]
    pub authors: String,
    #[serde(rename = "citation_pubdate", default, deserialize_with = "lenient_or_empty")]
    pub pubdate: String,
    #[serde(rename = "citation_type", default, deserialize_with = "lenient_or_empty")]
    pub kind: String,
    #[serde(rename = "citation_source", default, deserialize_with = "lenient_or_empty")]
    pub source: String,
    #[serde(rename = "citation_comment", default, deserialize_with = "lenient_or_empty")]
    pub comment: String,
    /// Tasks referencing this citation, in first-seen order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub related_tasks: Vec<String>,
}

impl CitationEntity {
    /// Build a fresh entity for `reference` as first seen from `task_id`.
    pub fn from_reference(id: String, reference: &CitationReference, task_id: &str) -> Self {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        Self {
            id,
            pmid: field(&reference.pmid),
            url: field(&reference.url),
            description: field(&reference.description),
            doi: field(&reference.doi),
            pubname: field(&reference.pubname),
            authors: field(&reference.authors),
            pubdate: field(&reference.pubdate),
            kind: field(&reference.kind),
            source: field(&reference.source),
            comment: field(&reference.comment),
            related_tasks: vec![task_id.to_string()],
        }
    }

    /// Compare the identifying fields only: id, pmid, url, description, doi.
    pub fn same_citation(&self, other: &CitationEntity) -> bool {
        self.id == other.id
            && self.pmid == other.pmid
            && self.url == other.url
            && self.description == other.description
            && self.doi == other.doi
    }

    /// Append `task_id` unless it is already listed. Returns whether it was added.
    pub fn add_related_task(&mut self, task_id: &str) -> bool {
        if self.related_tasks.iter().any(|t| t == task_id) {
            return false;
        }
        self.related_tasks.push(task_id.to_string());
        true
    }
}

/// One row of `citation_summary.tsv`. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationSummaryRow {
    pub cit_id: String,
    pub task_id: String,
    #[serde(default)]
    pub doi: String,
    #[serde(default)]
    pub citation_pmid: String,
    #[serde(default)]
    pub citation_url: String,
    #[serde(default)]
    pub citation_desc: String,
}

impl CitationSummaryRow {
    pub fn new(task_id: &str, entity: &CitationEntity) -> Self {
        Self {
            cit_id: entity.id.clone(),
            task_id: task_id.to_string(),
            doi: entity.doi.clone(),
            citation_pmid: entity.pmid.clone(),
            citation_url: entity.url.clone(),
            citation_desc: entity.description.clone(),
        }
    }
}

/// One row of `task_data/task_summary.tsv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummaryRow {
    pub id: String,
    pub name: String,
    pub definition_text: String,
    pub has_detailed_info: bool,
}

/// One row of `pubmed_summary.tsv`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubmedSummaryRow {
    pub citation_id: String,
    pub citation_pmid: String,
    pub pmid: String,
    pub pmcid: String,
    pub doi: String,
    pub other: String,
}

/// The bibliographic parts of a PubMed record kept on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubmedRecord {
    /// PMID the record was requested for.
    pub pmid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    /// Journal issue date as printed, e.g. `2005 Feb 15`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    /// `LastName ForeName`, or the collective name, in author order.
    #[serde(default)]
    pub authors: Vec<String>,
    /// MeSH descriptor names.
    #[serde(default)]
    pub mesh_terms: Vec<String>,
    /// Raw `PubmedData/ArticleIdList` entries, in document order.
    pub article_ids: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}
