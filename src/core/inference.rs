// backlink inference: whole-graph join of record attributes against rule conditions
/*
For every record S (the sender), in graph order:
    every condition (fwd, target) of the index that S literally carries as an attribute
    tuple fires its reactions: (bwd, S.id) is injected into the receiver.

Matching looks each string attribute of S up in the ordered index, so one sender fires
its matches ordered by (forward link type, target). Injections are visible to senders
visited later in the same pass.
*/
use tracing::{debug, info};

use crate::core::graph::{GraphError, RecordGraph};
use crate::core::rules::{InferenceIndex, Reaction};
use crate::core::types::RecordId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceStats {
    /// Records that matched at least one condition.
    pub senders_matched: usize,
    /// Backlink tuples handed to receivers (duplicates included).
    pub injections: usize,
}

impl RecordGraph {
    /// Reactions fired by the record `sender_id`, in firing order.
    pub fn matched_reactions(
        &self,
        sender_id: &str,
        index: &InferenceIndex,
    ) -> Result<Vec<Reaction>, GraphError> {
        let sender = self.get(sender_id)?;
        let mut fired = Vec::new();

        //only string values can equal a record id
        for (key, value) in sender.attributes() {
            let Some(target) = value.as_str() else {
                continue;
            };
            fired.extend(index.reactions(key, target).iter().cloned());
        }
        Ok(fired)
    }

    /// Injects `(reaction.backward_link_type, sender_id)` into the receiver.
    pub fn inject_backlink(&mut self, sender_id: &str, reaction: &Reaction) -> Result<(), GraphError> {
        let receiver = self
            .records
            .get_mut(&reaction.receiver)
            .ok_or_else(|| GraphError::UnresolvedBacklinkTarget(reaction.receiver.clone()))?;

        receiver.add_attribute(&reaction.backward_link_type, sender_id);
        Ok(())
    }

    /// Runs the inference pass over the complete graph.
    ///
    /// Fails on the first reaction whose receiver is not part of the graph. Injections
    /// made before that point stay in place, callers treat the error as fatal for the run.
    pub fn run_inference(&mut self, index: &InferenceIndex) -> Result<InferenceStats, GraphError> {
        let mut stats = InferenceStats::default();
        if index.is_empty() {
            return Ok(stats);
        }

        let sender_ids: Vec<RecordId> = self.records.keys().cloned().collect();
        for sender_id in sender_ids {
            let fired = self.matched_reactions(&sender_id, index)?;
            if fired.is_empty() {
                continue;
            }
            stats.senders_matched += 1;

            for reaction in &fired {
                self.inject_backlink(&sender_id, reaction)?;
                stats.injections += 1;
                debug!(
                    sender = %sender_id,
                    receiver = %reaction.receiver,
                    attribute = %reaction.backward_link_type,
                    "injected backlink"
                );
            }
        }

        info!(
            senders = stats.senders_matched,
            injections = stats.injections,
            "backlink inference done"
        );
        Ok(stats)
    }
}
