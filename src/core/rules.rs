/*
Backlink inference rules.

A rule reads: if some record carries the tuple (forward_link_type, target), inject
(backward_link_type, <that record's id>) into the record `receiver`.

Rules are emitted per record by `RecordDesign::apply` and merged into one index for the
whole run. Condition keys collide when two records (or two declarations of one design)
share forward link type and target; the merge policy decides what happens then.
*/
use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::graph::GraphError;
use crate::core::types::{LinkType, RecordId};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub forward_link_type: LinkType,
    pub target: RecordId,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reaction {
    pub receiver: RecordId,
    pub backward_link_type: LinkType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InferenceRule {
    pub condition: Condition,
    pub reaction: Reaction,
}

impl InferenceRule {
    /// The rule a design declaration `(forward, backward)` yields for the record `record_id`.
    ///
    /// The record is both the target the forward link must point at and the receiver of
    /// the injected backward link.
    pub fn backlink(forward: &str, backward: &str, record_id: &str) -> Self {
        Self {
            condition: Condition {
                forward_link_type: forward.to_string(),
                target: record_id.to_string(),
            },
            reaction: Reaction {
                receiver: record_id.to_string(),
                backward_link_type: backward.to_string(),
            },
        }
    }
}

/// What to do when a rule arrives for a condition that is already indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Replace the earlier reaction.
    #[default]
    LastWriteWins,
    /// Fail unless the incoming reaction is identical.
    RejectOnConflict,
    /// Keep every distinct reaction.
    MultiValued,
}

impl FromStr for MergePolicy {
    type Err = String;

    //same spelling as the config file
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-write-wins" => Ok(MergePolicy::LastWriteWins),
            "reject-on-conflict" => Ok(MergePolicy::RejectOnConflict),
            "multi-valued" => Ok(MergePolicy::MultiValued),
            other => Err(format!(
                "unknown merge policy '{other}', expected last-write-wins, reject-on-conflict or multi-valued"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InferenceIndex {
    policy: MergePolicy,
    rules: BTreeMap<Condition, Vec<Reaction>>,
}

impl InferenceIndex {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            rules: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Merges one rule according to the index policy.
    pub fn insert(&mut self, rule: InferenceRule) -> Result<(), GraphError> {
        match self.policy {
            MergePolicy::LastWriteWins => {
                if let Some(old) = self.set_rule_overwrite(rule.clone()) {
                    debug!(
                        forward = %rule.condition.forward_link_type,
                        target = %rule.condition.target,
                        replaced = old.len(),
                        "inference rule overwritten"
                    );
                }
                Ok(())
            }
            MergePolicy::RejectOnConflict => self.set_rule(rule),
            MergePolicy::MultiValued => {
                self.add_rule(rule);
                Ok(())
            }
        }
    }

    pub fn merge<I>(&mut self, rules: I) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = InferenceRule>,
    {
        for rule in rules {
            self.insert(rule)?;
        }
        Ok(())
    }

    //store a rule, no overwrites. identical rule is a no-op
    pub fn set_rule(&mut self, rule: InferenceRule) -> Result<(), GraphError> {
        match self.rules.get(&rule.condition) {
            None => {
                self.rules.insert(rule.condition, vec![rule.reaction]);
                Ok(())
            }
            Some(existing) if existing.len() == 1 && existing[0] == rule.reaction => Ok(()),
            Some(existing) => Err(GraphError::RuleConflict {
                forward_link_type: rule.condition.forward_link_type.clone(),
                target: rule.condition.target.clone(),
                existing: existing[0].backward_link_type.clone(),
                incoming: rule.reaction.backward_link_type,
            }),
        }
    }

    //returns the reactions that were replaced, if any
    pub fn set_rule_overwrite(&mut self, rule: InferenceRule) -> Option<Vec<Reaction>> {
        self.rules.insert(rule.condition, vec![rule.reaction])
    }

    pub fn add_rule(&mut self, rule: InferenceRule) {
        let reactions = self.rules.entry(rule.condition).or_default();
        if !reactions.contains(&rule.reaction) {
            reactions.push(rule.reaction);
        }
    }

    pub fn reactions(&self, forward_link_type: &str, target: &str) -> &[Reaction] {
        let key = Condition {
            forward_link_type: forward_link_type.to_string(),
            target: target.to_string(),
        };
        self.rules.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_forward_link_type(&self, forward_link_type: &str) -> bool {
        self.rules
            .keys()
            .any(|c| c.forward_link_type == forward_link_type)
    }

    /// Number of distinct conditions.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    //ordered by (forward link type, target)
    pub fn iter(&self) -> impl Iterator<Item = (&Condition, &Reaction)> + '_ {
        self.rules
            .iter()
            .flat_map(|(c, reactions)| reactions.iter().map(move |r| (c, r)))
    }
}
