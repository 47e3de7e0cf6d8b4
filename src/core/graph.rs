// record graph: every record produced in one run, keyed by local id
use indexmap::IndexMap;
use thiserror::Error;
use tracing::warn;

use crate::core::record::{PidRecord, WireRecord};
use crate::core::types::RecordId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),
    #[error("backlink receiver {0} is not a record of this run")]
    UnresolvedBacklinkTarget(RecordId),
    #[error(
        "conflicting inference rules for ({forward_link_type}, {target}): \
         already injects {existing}, refusing {incoming}"
    )]
    RuleConflict {
        forward_link_type: String,
        target: RecordId,
        existing: String,
        incoming: String,
    },
}

/// Insertion ordered, so iteration follows the order inputs were processed.
#[derive(Debug, Clone, Default)]
pub struct RecordGraph {
    pub(crate) records: IndexMap<RecordId, PidRecord>,
}

impl RecordGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` under its id and returns the record it replaced.
    ///
    /// A replaced record keeps its position in the iteration order.
    pub fn insert(&mut self, record: PidRecord) -> Option<PidRecord> {
        let id = record.id().to_string();
        let old = self.records.insert(id.clone(), record);
        if old.is_some() {
            warn!(id = %id, "record id produced twice, keeping the latest record");
        }
        old
    }

    pub fn get(&self, id: &str) -> Result<&PidRecord, GraphError> {
        self.records
            .get(id)
            .ok_or_else(|| GraphError::RecordNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut PidRecord, GraphError> {
        self.records
            .get_mut(id)
            .ok_or_else(|| GraphError::RecordNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &PidRecord> + '_ {
        self.records.values()
    }

    /// The batch handed to the registration boundary, in graph order.
    pub fn to_wire(&self) -> Vec<WireRecord> {
        self.records.values().map(PidRecord::serialize).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_record(id: &str, key: &str, value: &str) -> PidRecord {
        let mut r = PidRecord::new();
        r.set_id(id).add_attribute(key, value);
        r
    }

    #[test]
    fn insert_and_lookup_and_missing_is_error() {
        let mut g = RecordGraph::new();
        assert!(g.insert(mk_record("R1", "type", "A")).is_none());
        assert!(g.insert(mk_record("R2", "type", "B")).is_none());

        assert_eq!(g.len(), 2);
        assert_eq!(g.get("R1").unwrap().id(), "R1");

        let err = g.get("R3").unwrap_err();
        assert_eq!(err, GraphError::RecordNotFound("R3".to_string()));
    }

    #[test]
    fn duplicate_id_replaces_in_place() {
        let mut g = RecordGraph::new();
        g.insert(mk_record("R1", "type", "A"));
        g.insert(mk_record("R2", "type", "B"));
        let old = g.insert(mk_record("R1", "type", "C")).unwrap();

        assert!(old.contains("type", &"A".into()));
        assert_eq!(g.ids().collect::<Vec<_>>(), vec!["R1", "R2"]);
        assert!(g.get("R1").unwrap().contains("type", &"C".into()));
    }

    #[test]
    fn wire_batch_follows_graph_order() {
        let mut g = RecordGraph::new();
        g.insert(mk_record("b", "k", "v"));
        g.insert(mk_record("a", "k", "v"));

        let pids: Vec<String> = g.to_wire().into_iter().map(|w| w.pid).collect();
        assert_eq!(pids, vec!["b", "a"]);
    }
}
