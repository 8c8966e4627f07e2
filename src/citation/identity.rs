//! Derived citation identifiers.
//!
//! Cognitive Atlas citations rarely carry a canonical key, so one is
//! derived from the reference fields. Resolution order, first match wins:
//! explicit `id`, PubMed id, last URL path segment, description hash.

use crate::models::{non_empty, CitationReference};
use sha2::{Digest, Sha256};

/// Modulus applied to the description hash.
const DESC_HASH_MODULUS: u64 = 1_000_000;

/// Description hashed when a reference has none at all.
const MISSING_DESCRIPTION: &str = "unknown";

/// Derive the deduplication key for a citation reference.
pub fn resolve_citation_id(reference: &CitationReference) -> String {
    if let Some(id) = non_empty(&reference.id) {
        return id.to_string();
    }

    if let Some(pmid) = non_empty(&reference.pmid) {
        return format!("pmid_{}", pmid);
    }

    if let Some(segment) = non_empty(&reference.url).and_then(url_segment) {
        return format!("url_{}", segment);
    }

    let description = reference
        .description
        .as_deref()
        .unwrap_or(MISSING_DESCRIPTION);
    format!("desc_{}", description_hash(description))
}

/// Last non-empty `/`-separated segment that is not a scheme like `http:`.
fn url_segment(url: &str) -> Option<&str> {
    url.split('/')
        .rev()
        .find(|part| !part.is_empty() && !part.starts_with("http"))
}

/// SHA-256 of the text, first 8 bytes big-endian, reduced modulo 1,000,000.
///
/// Collisions between equal or empty descriptions are expected.
pub fn description_hash(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % DESC_HASH_MODULUS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> CitationReference {
        CitationReference::default()
    }

    #[test]
    fn test_explicit_id_wins() {
        let r = CitationReference {
            id: Some("cit_abc".to_string()),
            pmid: Some("123".to_string()),
            url: Some("http://example.org/x".to_string()),
            ..reference()
        };
        assert_eq!(resolve_citation_id(&r), "cit_abc");
    }

    #[test]
    fn test_empty_id_falls_through_to_pmid() {
        let r = CitationReference {
            id: Some(String::new()),
            pmid: Some("12345".to_string()),
            ..reference()
        };
        assert_eq!(resolve_citation_id(&r), "pmid_12345");
    }

    #[test]
    fn test_url_last_segment() {
        let r = CitationReference {
            url: Some("https://www.ncbi.nlm.nih.gov/pubmed/9876/".to_string()),
            ..reference()
        };
        assert_eq!(resolve_citation_id(&r), "url_9876");

        let r = CitationReference {
            url: Some("http://doi.org/10.1016/j.cortex.2010".to_string()),
            ..reference()
        };
        assert_eq!(resolve_citation_id(&r), "url_j.cortex.2010");
    }

    #[test]
    fn test_url_without_usable_segment_uses_description() {
        let r = CitationReference {
            url: Some("http://".to_string()),
            description: Some("Foo".to_string()),
            ..reference()
        };
        assert_eq!(resolve_citation_id(&r), "desc_431698");
    }

    #[test]
    fn test_description_hash_is_pinned() {
        assert_eq!(description_hash("Foo"), 431698);
        assert_eq!(description_hash(""), 261652);

        let r = CitationReference {
            description: Some("Foo".to_string()),
            ..reference()
        };
        assert_eq!(resolve_citation_id(&r), "desc_431698");
    }

    #[test]
    fn test_missing_description_hashes_unknown() {
        assert_eq!(resolve_citation_id(&reference()), "desc_559013");
    }

    #[test]
    fn test_identical_descriptions_collide() {
        let a = CitationReference {
            description: Some("Same text".to_string()),
            authors: Some("A".to_string()),
            ..reference()
        };
        let b = CitationReference {
            description: Some("Same text".to_string()),
            authors: Some("B".to_string()),
            ..reference()
        };
        assert_eq!(resolve_citation_id(&a), resolve_citation_id(&b));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let r = CitationReference {
            description: Some("Stroop interference".to_string()),
            ..reference()
        };
        let first = resolve_citation_id(&r);
        for _ in 0..10 {
            assert_eq!(resolve_citation_id(&r), first);
        }
    }
}
