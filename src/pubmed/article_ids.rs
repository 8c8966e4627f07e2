//! `ArticleIdList` classification.

/// Identifiers pulled out of a PubMed `ArticleIdList`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleIds {
    pub pmid: String,
    pub pmcid: String,
    pub doi: String,
    pub other: Vec<String>,
}

/// Classify article ids by shape: `10.` prefix is a DOI, `PMC` prefix a
/// PMC id, all digits a PMID, anything else goes to `other`. When an id
/// kind repeats, the last one wins.
pub fn parse_article_ids<S: AsRef<str>>(ids: &[S]) -> ArticleIds {
    let mut parsed = ArticleIds::default();

    for id in ids {
        let id = id.as_ref();
        if id.starts_with("10.") {
            parsed.doi = id.to_string();
        } else if id.starts_with("PMC") {
            parsed.pmcid = id.to_string();
        } else if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
            parsed.pmid = id.to_string();
        } else {
            parsed.other.push(id.to_string());
        }
    }

    parsed
}
