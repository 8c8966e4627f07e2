//! NCBI E-utilities client for PubMed records.
//!
//! Records are fetched with `efetch` as XML and reduced to the title,
//! abstract and `PubmedData/ArticleIdList` of the first article.

use crate::models::PubmedRecord;
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Value of the E-utilities `tool` parameter.
const TOOL_NAME: &str = "hedtask";

#[derive(Debug, Error)]
pub enum PubmedError {
    #[error("request for PMID {pmid} timed out after {seconds}s")]
    Timeout { pmid: String, seconds: u64 },

    #[error("cannot connect to NCBI at {0}")]
    Connect(String),

    #[error("failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("NCBI API error {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed PubMed XML: {0}")]
    Xml(String),

    #[error("no PubMed article returned for PMID {0}")]
    NotFound(String),
}

/// Client for PubMed `efetch`.
pub struct PubmedClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    timeout_seconds: u64,
}

impl PubmedClient {
    /// Create a client. NCBI asks callers to identify themselves by email.
    pub fn new(base_url: &str, email: &str, timeout_seconds: u64) -> Result<Self, PubmedError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("hedtask/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            timeout_seconds,
        })
    }

    /// Fetch and parse the record for `pmid`.
    pub async fn fetch(&self, pmid: &str) -> Result<PubmedRecord, PubmedError> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        debug!(pmid, "Fetching PubMed record");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("db", "pubmed"),
                ("id", pmid),
                ("rettype", "abstract"),
                ("retmode", "xml"),
                ("tool", TOOL_NAME),
                ("email", self.email.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PubmedError::Timeout {
                        pmid: pmid.to_string(),
                        seconds: self.timeout_seconds,
                    }
                } else if e.is_connect() {
                    PubmedError::Connect(self.base_url.clone())
                } else {
                    PubmedError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PubmedError::Status { status, body });
        }

        let xml = response.text().await?;
        parse_pubmed_xml(pmid, &xml)
    }
}

const PUBMED_ARTICLE: &[u8] = b"PubmedArticle";
const ARTICLE_TITLE: &[u8] = b"ArticleTitle";
const ABSTRACT: &[u8] = b"Abstract";
const ABSTRACT_TEXT: &[u8] = b"AbstractText";
const ARTICLE_ID: &[u8] = b"ArticleId";
const AUTHOR: &[u8] = b"Author";
const DESCRIPTOR_NAME: &[u8] = b"DescriptorName";
const PUB_DATE: &[u8] = b"PubDate";
const ARTICLE_ID_PATH: &[&[u8]] = &[b"PubmedData", b"ArticleIdList", b"ArticleId"];
const AUTHOR_PATH: &[&[u8]] = &[b"AuthorList", b"Author"];
const JOURNAL_TITLE_PATH: &[&[u8]] = &[b"Journal", b"Title"];
const MESH_PATH: &[&[u8]] = &[b"MeshHeading", b"DescriptorName"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthorField {
    LastName,
    ForeName,
    Initials,
    CollectiveName,
}

impl AuthorField {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"LastName" => Some(Self::LastName),
            b"ForeName" => Some(Self::ForeName),
            b"Initials" => Some(Self::Initials),
            b"CollectiveName" => Some(Self::CollectiveName),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    ArticleId,
    Abstract,
    Author(AuthorField),
    MeshTerm,
    PubDate,
    Journal,
    Title,
}

#[derive(Default)]
struct AuthorParts {
    last_name: String,
    fore_name: String,
    initials: String,
    collective_name: String,
}

impl AuthorParts {
    /// `LastName ForeName`, falling back to initials, or the collective name.
    fn display_name(&self) -> Option<String> {
        let last = self.last_name.trim();
        if last.is_empty() {
            let collective = self.collective_name.trim();
            return (!collective.is_empty()).then(|| collective.to_string());
        }

        let given = match self.fore_name.trim() {
            "" => self.initials.trim(),
            fore => fore,
        };
        if given.is_empty() {
            Some(last.to_string())
        } else {
            Some(format!("{} {}", last, given))
        }
    }
}

/// Streaming state for the first `PubmedArticle` of an efetch response.
#[derive(Default)]
struct ArticleParser {
    stack: Vec<Vec<u8>>,
    in_article: bool,
    found_article: bool,
    title: String,
    journal: String,
    pub_date: String,
    abstract_parts: Vec<String>,
    current_abstract: String,
    authors: Vec<String>,
    current_author: AuthorParts,
    mesh_terms: Vec<String>,
    current_mesh: String,
    article_ids: Vec<String>,
    current_id: String,
}

impl ArticleParser {
    fn names(&self) -> Vec<&[u8]> {
        self.stack.iter().map(|n| n.as_slice()).collect()
    }

    fn target(&self) -> Option<TextTarget> {
        if !self.in_article {
            return None;
        }

        let names = self.names();
        let parent = names.len().checked_sub(1).map(|i| &names[..i]);

        if names.ends_with(ARTICLE_ID_PATH) {
            Some(TextTarget::ArticleId)
        } else if names
            .windows(2)
            .any(|w| w[0] == ABSTRACT && w[1] == ABSTRACT_TEXT)
        {
            Some(TextTarget::Abstract)
        } else if let Some(field) = parent
            .filter(|p| p.ends_with(AUTHOR_PATH))
            .and_then(|_| names.last())
            .and_then(|last| AuthorField::from_name(last))
        {
            Some(TextTarget::Author(field))
        } else if names.ends_with(MESH_PATH) {
            Some(TextTarget::MeshTerm)
        } else if parent.is_some_and(|p| p.last() == Some(&PUB_DATE)) {
            Some(TextTarget::PubDate)
        } else if names.ends_with(JOURNAL_TITLE_PATH) {
            Some(TextTarget::Journal)
        } else if names.iter().any(|n| *n == ARTICLE_TITLE) {
            Some(TextTarget::Title)
        } else {
            None
        }
    }

    fn push_text(&mut self, text: &str) {
        match self.target() {
            Some(TextTarget::ArticleId) => self.current_id.push_str(text),
            Some(TextTarget::Abstract) => self.current_abstract.push_str(text),
            Some(TextTarget::Author(field)) => {
                let parts = &mut self.current_author;
                let slot = match field {
                    AuthorField::LastName => &mut parts.last_name,
                    AuthorField::ForeName => &mut parts.fore_name,
                    AuthorField::Initials => &mut parts.initials,
                    AuthorField::CollectiveName => &mut parts.collective_name,
                };
                slot.push_str(text);
            }
            Some(TextTarget::MeshTerm) => self.current_mesh.push_str(text),
            Some(TextTarget::PubDate) => self.pub_date.push_str(text),
            Some(TextTarget::Journal) => self.journal.push_str(text),
            Some(TextTarget::Title) => self.title.push_str(text),
            None => {}
        }
    }

    fn start(&mut self, name: &[u8]) {
        if name == PUBMED_ARTICLE && !self.found_article {
            self.in_article = true;
            self.found_article = true;
        }
        self.stack.push(name.to_vec());
    }

    /// Returns `true` once the first article is complete.
    fn end(&mut self, name: &[u8]) -> bool {
        if self.in_article {
            match self.target() {
                Some(TextTarget::ArticleId) if name == ARTICLE_ID => {
                    let id = std::mem::take(&mut self.current_id);
                    self.article_ids.push(id.trim().to_string());
                }
                Some(TextTarget::Abstract) if name == ABSTRACT_TEXT => {
                    let part = std::mem::take(&mut self.current_abstract);
                    let part = part.trim();
                    if !part.is_empty() {
                        self.abstract_parts.push(part.to_string());
                    }
                }
                Some(TextTarget::MeshTerm) if name == DESCRIPTOR_NAME => {
                    let term = std::mem::take(&mut self.current_mesh);
                    let term = term.trim();
                    if !term.is_empty() {
                        self.mesh_terms.push(term.to_string());
                    }
                }
                // Year, Month and Day arrive as separate elements.
                Some(TextTarget::PubDate) => self.pub_date.push(' '),
                _ => {}
            }

            if name == AUTHOR && self.names().ends_with(AUTHOR_PATH) {
                let parts = std::mem::take(&mut self.current_author);
                if let Some(author) = parts.display_name() {
                    self.authors.push(author);
                }
            }
        }

        self.stack.pop();

        if name == PUBMED_ARTICLE && self.in_article {
            self.in_article = false;
            return true;
        }
        false
    }
}

/// Trimmed text with inner whitespace runs collapsed, `None` when blank.
fn collapsed(text: &str) -> Option<String> {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

/// Resolve an entity reference such as `amp` or `#x3B1;`.
fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// Parse an efetch XML document into a [`PubmedRecord`].
pub fn parse_pubmed_xml(pmid: &str, xml: &str) -> Result<PubmedRecord, PubmedError> {
    let mut reader = Reader::from_str(xml);
    let mut parser = ArticleParser::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => parser.start(e.name().as_ref()),
            Ok(Event::End(ref e)) => {
                if parser.end(e.name().as_ref()) {
                    break;
                }
            }
            Ok(Event::Text(ref e)) => {
                parser.push_text(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::CData(ref e)) => {
                parser.push_text(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::GeneralRef(ref e)) => {
                let name = String::from_utf8_lossy(e.as_ref());
                match resolve_entity(&name) {
                    Some(ch) => parser.push_text(ch.encode_utf8(&mut [0u8; 4])),
                    None => parser.push_text(&format!("&{};", name)),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PubmedError::Xml(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    if !parser.found_article {
        return Err(PubmedError::NotFound(pmid.to_string()));
    }

    let abstract_text = parser.abstract_parts.join(" ");

    Ok(PubmedRecord {
        pmid: pmid.to_string(),
        title: collapsed(&parser.title),
        abstract_text: (!abstract_text.is_empty()).then_some(abstract_text),
        journal: collapsed(&parser.journal),
        pub_date: collapsed(&parser.pub_date),
        authors: parser.authors,
        mesh_terms: parser.mesh_terms,
        article_ids: parser.article_ids,
        fetched_at: Utc::now(),
    })
}
