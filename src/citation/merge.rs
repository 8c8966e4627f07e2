//! Citation reconciliation.
//!
//! First write wins: once a citation id is stored, later encounters only
//! extend `related_tasks`. A later encounter whose identifying fields
//! differ is reported as a conflict and its content is dropped.

use super::identity::resolve_citation_id;
use super::store::{CitationStore, StoreError};
use crate::models::{CitationEntity, CitationReference};
use tracing::{debug, warn};

/// What happened to a citation during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First time this id was seen.
    Created,
    /// Stored entity matched the incoming one.
    Matched,
    /// Stored entity differs; stored content kept.
    Conflict,
}

/// Merge `incoming` (fresh from `task_id`) into `existing`.
pub fn merge_citation(
    existing: Option<CitationEntity>,
    incoming: CitationEntity,
    task_id: &str,
) -> (CitationEntity, MergeOutcome) {
    let Some(mut existing) = existing else {
        let mut created = incoming;
        created.related_tasks = vec![task_id.to_string()];
        return (created, MergeOutcome::Created);
    };

    let outcome = if existing.same_citation(&incoming) {
        MergeOutcome::Matched
    } else {
        MergeOutcome::Conflict
    };

    existing.add_related_task(task_id);
    (existing, outcome)
}

/// Running totals for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub matched: usize,
    pub conflicts: usize,
}

impl ReconcileStats {
    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Created => self.created += 1,
            MergeOutcome::Matched => self.matched += 1,
            MergeOutcome::Conflict => self.conflicts += 1,
        }
    }
}

/// Result of reconciling one citation reference.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub entity: CitationEntity,
    pub outcome: MergeOutcome,
}

/// Resolves, merges and persists citations against a store.
pub struct Reconciler<S: CitationStore> {
    store: S,
    stats: ReconcileStats,
}

impl<S: CitationStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            stats: ReconcileStats::default(),
        }
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reconcile one reference seen in `task_id` and persist the result.
    pub fn reconcile(
        &mut self,
        task_id: &str,
        reference: &CitationReference,
    ) -> Result<Reconciled, StoreError> {
        let id = resolve_citation_id(reference);
        let incoming = CitationEntity::from_reference(id, reference, task_id);

        let mut outcome = MergeOutcome::Created;
        let entity = self.store.upsert_with(incoming, |existing, incoming| {
            let (merged, result) = merge_citation(existing, incoming, task_id);
            outcome = result;
            merged
        })?;

        match outcome {
            MergeOutcome::Conflict => warn!(
                citation_id = %entity.id,
                task_id,
                "Citation conflict: stored and new citation data differ, keeping stored"
            ),
            MergeOutcome::Matched => debug!(
                citation_id = %entity.id,
                task_id,
                "Citation already stored, linked task"
            ),
            MergeOutcome::Created => debug!(citation_id = %entity.id, task_id, "New citation"),
        }

        self.stats.record(outcome);
        Ok(Reconciled { entity, outcome })
    }
}
