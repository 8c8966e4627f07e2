//! Citation persistence.
//!
//! Citations are stored as a map from derived identifier to entity.
//! [`CitationStore::upsert_with`] loads the current entity, hands it to a
//! merge callback together with the incoming one, and writes back the
//! result, so the merge policy stays independent of the storage layout.

use crate::models::CitationEntity;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error};

/// File holding one persisted citation inside its directory.
pub const CITATION_DETAILS_FILE: &str = "citation_details.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid citation key `{0}`")]
    InvalidKey(String),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable citation record {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode citation `{id}`: {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Key-value storage for reconciled citations.
pub trait CitationStore {
    /// Load the entity stored under `id`, if any.
    fn load(&self, id: &str) -> Result<Option<CitationEntity>, StoreError>;

    /// Persist `entity` under its own id, replacing any previous value.
    fn save(&mut self, entity: &CitationEntity) -> Result<(), StoreError>;

    /// Merge `incoming` with whatever is stored under its id and persist the result.
    ///
    /// A stored record that cannot be parsed is logged and treated as absent.
    fn upsert_with<F>(
        &mut self,
        incoming: CitationEntity,
        merge: F,
    ) -> Result<CitationEntity, StoreError>
    where
        Self: Sized,
        F: FnOnce(Option<CitationEntity>, CitationEntity) -> CitationEntity,
    {
        let existing = match self.load(&incoming.id) {
            Ok(existing) => existing,
            Err(StoreError::Corrupt { path, source }) => {
                error!(
                    citation_id = %incoming.id,
                    "Replacing unreadable citation record {}: {}",
                    path.display(),
                    source
                );
                None
            }
            Err(e) => return Err(e),
        };

        let merged = merge(existing, incoming);
        self.save(&merged)?;
        Ok(merged)
    }
}

/// Reject keys that would not map onto exactly one directory entry.
pub fn validate_key(id: &str) -> Result<(), StoreError> {
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains('/')
        || id.contains('\\')
        || id.contains('\0');

    if invalid {
        Err(StoreError::InvalidKey(id.to_string()))
    } else {
        Ok(())
    }
}

/// One directory per citation: `{root}/{id}/citation_details.json`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Write {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Directory holding everything stored for `id`.
    pub fn entity_dir(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_key(id)?;
        Ok(self.root.join(id))
    }

    fn details_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.entity_dir(id)?.join(CITATION_DETAILS_FILE))
    }
}

impl CitationStore for DirectoryStore {
    fn load(&self, id: &str) -> Result<Option<CitationEntity>, StoreError> {
        let path = self.details_path(id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        let mut entity: CitationEntity = serde_json::from_str(&content)
            .map_err(|source| StoreError::Corrupt { path, source })?;
        if entity.id.is_empty() {
            entity.id = id.to_string();
        }
        Ok(Some(entity))
    }

    fn save(&mut self, entity: &CitationEntity) -> Result<(), StoreError> {
        let dir = self.entity_dir(&entity.id)?;
        fs::create_dir_all(&dir).map_err(|source| StoreError::Write {
            path: dir.clone(),
            source,
        })?;

        let path = dir.join(CITATION_DETAILS_FILE);
        let content =
            serde_json::to_string_pretty(entity).map_err(|source| StoreError::Encode {
                id: entity.id.clone(),
                source,
            })?;
        fs::write(&path, content).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;

        debug!(citation_id = %entity.id, "Wrote {}", path.display());
        Ok(())
    }
}

/// In-memory store for exercising merge logic without a filesystem.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: std::collections::BTreeMap<String, CitationEntity>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&CitationEntity> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }
}

#[cfg(test)]
impl CitationStore for MemoryStore {
    fn load(&self, id: &str) -> Result<Option<CitationEntity>, StoreError> {
        validate_key(id)?;
        Ok(self.entities.get(id).cloned())
    }

    fn save(&mut self, entity: &CitationEntity) -> Result<(), StoreError> {
        validate_key(&entity.id)?;
        self.entities.insert(entity.id.clone(), entity.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entity(id: &str, task: &str) -> CitationEntity {
        CitationEntity {
            id: id.to_string(),
            pmid: "12345".to_string(),
            description: "Ünïcode désc".to_string(),
            related_tasks: vec![task.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("pmid_1").is_ok());
        assert!(validate_key("url_j.cortex.2010").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("..").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
    }

    #[test]
    fn test_directory_store_roundtrip_layout() {
        let temp = TempDir::new().unwrap();
        let mut store = DirectoryStore::open(temp.path().join("citation_data")).unwrap();

        assert_eq!(store.load("pmid_12345").unwrap(), None);
        store.save(&entity("pmid_12345", "trm_a")).unwrap();

        let path = temp
            .path()
            .join("citation_data")
            .join("pmid_12345")
            .join(CITATION_DETAILS_FILE);
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Ünïcode désc"), "non-ASCII must be kept as-is");
        assert!(raw.contains("\"related_tasks\""));

        let loaded = store.load("pmid_12345").unwrap().unwrap();
        assert_eq!(loaded, entity("pmid_12345", "trm_a"));
    }

    #[test]
    fn test_directory_store_rejects_bad_key() {
        let temp = TempDir::new().unwrap();
        let mut store = DirectoryStore::open(temp.path()).unwrap();
        let err = store.save(&entity("../escape", "trm_a")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[test]
    fn test_corrupt_record_is_replaced() {
        let temp = TempDir::new().unwrap();
        let mut store = DirectoryStore::open(temp.path()).unwrap();
        let dir = temp.path().join("pmid_12345");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CITATION_DETAILS_FILE), "{ not json").unwrap();

        assert!(matches!(
            store.load("pmid_12345"),
            Err(StoreError::Corrupt { .. })
        ));

        let merged = store
            .upsert_with(entity("pmid_12345", "trm_b"), |existing, incoming| {
                assert!(existing.is_none());
                incoming
            })
            .unwrap();
        assert_eq!(merged.related_tasks, vec!["trm_b"]);
        assert_eq!(store.load("pmid_12345").unwrap().unwrap(), merged);
    }

    #[test]
    fn test_null_fields_in_stored_record_load() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryStore::open(temp.path()).unwrap();
        let dir = temp.path().join("pmid_7");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(CITATION_DETAILS_FILE),
            r#"{"id": null, "citation_pmid": "7", "doi": null, "related_tasks": ["trm_a"]}"#,
        )
        .unwrap();

        let loaded = store.load("pmid_7").unwrap().unwrap();
        assert_eq!(loaded.id, "pmid_7");
        assert_eq!(loaded.doi, "");
        assert_eq!(loaded.related_tasks, vec!["trm_a"]);
    }

    #[test]
    fn test_upsert_passes_existing_to_callback() {
        let mut store = MemoryStore::new();
        store.save(&entity("pmid_12345", "trm_a")).unwrap();

        let merged = store
            .upsert_with(entity("pmid_12345", "trm_b"), |existing, incoming| {
                let mut existing = existing.unwrap();
                existing.add_related_task(&incoming.related_tasks[0]);
                existing
            })
            .unwrap();

        assert_eq!(merged.related_tasks, vec!["trm_a", "trm_b"]);
        assert_eq!(store.get("pmid_12345"), Some(&merged));
        assert_eq!(store.len(), 1);
    }
}
