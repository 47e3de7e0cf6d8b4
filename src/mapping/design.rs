//! Record designs: how to turn one JSON document into one record plus backlink rules.
//!
//! A design is built once and applied to every input document. Every extractor gets the
//! document it runs against as an argument, there is no ambient "current document".

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

use crate::core::classify::is_truthy;
use crate::core::record::PidRecord;
use crate::core::rules::InferenceRule;
use crate::core::types::{AttributeKey, ExtractError, LinkType};
use crate::mapping::json_path::{resolve_path, resolve_pointer, value_to_text};

/// Reads something from a document. Extractors are evaluated lazily, in declaration order.
pub type Extractor = Box<dyn Fn(&Value) -> Result<Value, ExtractError>>;

/// Marks an attribute key as the backward link type for `0`, the forward link type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackwardLinkFor(pub LinkType);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DesignError {
    #[error("design '{design}' stopped: {message}")]
    Aborted { design: String, message: String },
    #[error("design '{design}' could not evaluate {part}: {source}")]
    Extract {
        design: String,
        part: String,
        #[source]
        source: ExtractError,
    },
}

impl DesignError {
    pub fn is_abort(&self) -> bool {
        matches!(self, DesignError::Aborted { .. })
    }
}

/// A record and the backlink rules its design contributes for it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedDesign {
    pub record: PidRecord,
    pub rules: Vec<InferenceRule>,
}

pub fn constant(value: impl Into<Value>) -> Extractor {
    let value = value.into();
    Box::new(move |_| Ok(value.clone()))
}

pub fn read_pointer(pointer: &str) -> Extractor {
    let pointer = pointer.to_string();
    Box::new(move |doc| resolve_pointer(doc, &pointer).cloned())
}

pub fn read_path(path: &str) -> Extractor {
    let path = path.to_string();
    Box::new(move |doc| resolve_path(doc, &path).cloned())
}

pub struct RecordDesign {
    name: String,
    id: Extractor,
    pid: Extractor,
    skip: Option<Extractor>,
    attributes: IndexMap<AttributeKey, Vec<Extractor>>,
    // (forward_link_type, backward_link_type)
    backlinks: BTreeSet<(LinkType, LinkType)>,
}

impl Default for RecordDesign {
    fn default() -> Self {
        Self {
            name: "design".to_string(),
            id: constant(""),
            pid: constant(""),
            skip: None,
            attributes: IndexMap::new(),
            backlinks: BTreeSet::new(),
        }
    }
}

impl fmt::Debug for RecordDesign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordDesign")
            .field("name", &self.name)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("backlinks", &self.backlinks)
            .field("has_skip_condition", &self.skip.is_some())
            .finish()
    }
}

impl RecordDesign {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_id<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ExtractError> + 'static,
    {
        self.id = Box::new(extractor);
        self
    }

    pub fn set_persistent_id<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ExtractError> + 'static,
    {
        self.pid = Box::new(extractor);
        self
    }

    /// Documents for which `condition` is truthy produce no record.
    pub fn set_skip_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ExtractError> + 'static,
    {
        self.skip = Some(Box::new(condition));
        self
    }

    /// Appends an extractor for `key`. Repeated keys accumulate.
    pub fn add_attribute<F>(mut self, key: &str, extractor: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ExtractError> + 'static,
    {
        self.attributes
            .entry(key.to_string())
            .or_default()
            .push(Box::new(extractor));
        self
    }

    /// `key` becomes the backward link type injected for `marker`'s forward link type.
    pub fn add_backlink_for(self, key: &str, marker: BackwardLinkFor) -> Self {
        self.declare_backlink(&marker.0, key)
    }

    pub fn declare_backlink(mut self, forward_link_type: &str, backward_link_type: &str) -> Self {
        self.backlinks
            .insert((forward_link_type.to_string(), backward_link_type.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.attributes.keys().map(String::as_str)
    }

    pub fn extractor_count(&self, key: &str) -> usize {
        self.attributes.get(key).map_or(0, Vec::len)
    }

    pub fn backlinks(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.backlinks.iter().map(|(f, b)| (f.as_str(), b.as_str()))
    }

    fn error(&self, part: impl Into<String>, source: ExtractError) -> DesignError {
        match source {
            ExtractError::Aborted(message) => DesignError::Aborted {
                design: self.name.clone(),
                message,
            },
            source => DesignError::Extract {
                design: self.name.clone(),
                part: part.into(),
                source,
            },
        }
    }

    /// Evaluates the design against `document`.
    ///
    /// Returns `Ok(None)` when the skip condition holds. Any extractor error is returned
    /// as is, an extractor that wants a fallback has to say so with `otherwise_with`.
    pub fn apply(&self, document: &Value) -> Result<Option<AppliedDesign>, DesignError> {
        if let Some(skip) = &self.skip {
            let verdict = skip(document).map_err(|e| self.error("skip condition", e))?;
            if is_truthy(&verdict) {
                debug!(design = %self.name, "skip condition met, no record");
                return Ok(None);
            }
        }

        let mut record = PidRecord::new();
        let id = (self.id)(document).map_err(|e| self.error("id", e))?;
        let pid = (self.pid)(document).map_err(|e| self.error("persistent id", e))?;
        record
            .set_id(value_to_text(&id))
            .set_persistent_id(value_to_text(&pid));

        for (key, extractors) in &self.attributes {
            debug!(key = %key, candidates = extractors.len(), "evaluating attribute");
            for extract in extractors {
                let part = || format!("attribute '{key}'");
                let value = extract(document).map_err(|e| self.error(part(), e))?;
                trace!(key = %key, value = %value, "set value");
                record
                    .add_json_attribute(key, &value)
                    .map_err(|e| self.error(part(), e.into()))?;
            }
        }

        let rules = self
            .backlinks
            .iter()
            .map(|(fwd, bwd)| InferenceRule::backlink(fwd, bwd, record.id()))
            .collect();

        Ok(Some(AppliedDesign { record, rules }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use crate::core::classify::{otherwise_with, stop_with_fail};
    use crate::core::graph::RecordGraph;
    use crate::core::rules::InferenceIndex;
    use crate::core::types::Primitive;

    fn p(s: &str) -> Primitive {
        Primitive::from(s)
    }

    fn experiment() -> Value {
        json!({
            "experiment_id": "exp-1",
            "title": "Heat",
            "description": "Heat flow",
            "data_access": {"mime_type": "text/csv"},
            "researcher": {"name": "Ada", "institution": "KIT"},
            "size": 12
        })
    }

    #[test]
    fn apply_builds_record_from_document() {
        let design = RecordDesign::new()
            .set_id(read_pointer("/experiment_id"))
            .add_attribute("type", read_pointer("/data_access/mime_type"))
            .add_attribute("topic", |doc: &Value| {
                Ok(json!([doc["title"].clone(), doc["description"].clone()]))
            })
            .add_attribute("size", read_path("$.size"))
            .add_attribute("license", constant("Apache 2.0"));

        let applied = design.apply(&experiment()).unwrap().unwrap();
        let r = &applied.record;

        assert_eq!(r.id(), "exp-1");
        assert_eq!(r.persistent_id(), None);
        assert!(r.contains("type", &p("text/csv")));
        assert!(r.contains("topic", &p("Heat")));
        assert!(r.contains("topic", &p("Heat flow")));
        assert!(r.contains("size", &Primitive::Int(12)));
        assert!(r.contains("license", &p("Apache 2.0")));
        assert_eq!(r.len(), 5);
        assert!(applied.rules.is_empty());
    }

    #[test]
    fn apply_twice_yields_identical_records() {
        let design = RecordDesign::new()
            .set_id(read_pointer("/experiment_id"))
            .set_persistent_id(constant("21.T11148/x"))
            .add_attribute("contact", read_pointer("/researcher/name"))
            .declare_backlink("isPartOf", "hasPart");

        let doc = experiment();
        let first = design.apply(&doc).unwrap().unwrap();
        let second = design.apply(&doc).unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn extractors_run_in_declaration_order_and_accumulate() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = |tag: &'static str| {
            let seen = Rc::clone(&seen);
            move |_: &Value| {
                seen.borrow_mut().push(tag);
                Ok::<Value, ExtractError>(json!(tag))
            }
        };

        let design = RecordDesign::new()
            .set_id(constant("r"))
            .add_attribute("b", log("b1"))
            .add_attribute("a", log("a1"))
            .add_attribute("b", log("b2"));

        assert_eq!(design.attribute_keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(design.extractor_count("b"), 2);

        let applied = design.apply(&json!({"x": 1})).unwrap().unwrap();
        assert_eq!(*seen.borrow(), vec!["b1", "b2", "a1"]);
        assert!(applied.record.contains("b", &p("b1")));
        assert!(applied.record.contains("b", &p("b2")));
    }

    #[test]
    fn null_and_empty_results_add_nothing() {
        let design = RecordDesign::new()
            .set_id(constant("r"))
            .add_attribute("a", constant(Value::Null))
            .add_attribute("b", constant(json!([])));

        let applied = design.apply(&json!({"x": 1})).unwrap().unwrap();
        assert!(applied.record.is_empty());
    }

    #[test]
    fn backlink_marker_registers_declaration_not_attribute() {
        let design = RecordDesign::new()
            .set_id(constant("R1"))
            .add_backlink_for("refBy", BackwardLinkFor("linksTo".into()))
            .declare_backlink("linksTo", "refBy");

        assert_eq!(design.backlinks().collect::<Vec<_>>(), vec![("linksTo", "refBy")]);
        assert_eq!(design.attribute_keys().count(), 0);

        let applied = design.apply(&json!({"x": 1})).unwrap().unwrap();
        assert_eq!(applied.rules, vec![InferenceRule::backlink("linksTo", "refBy", "R1")]);
    }

    #[test]
    fn two_designs_link_up_after_inference() {
        let r1 = RecordDesign::new()
            .set_id(constant("R1"))
            .add_attribute("type", constant("A"))
            .declare_backlink("linksTo", "refBy");
        let r2 = RecordDesign::new()
            .set_id(constant("R2"))
            .add_attribute("linksTo", constant("R1"));

        let doc = json!({"x": 1});
        let mut graph = RecordGraph::new();
        let mut index = InferenceIndex::default();
        for design in [&r1, &r2] {
            let applied = design.apply(&doc).unwrap().unwrap();
            graph.insert(applied.record);
            index.merge(applied.rules).unwrap();
        }

        graph.run_inference(&index).unwrap();

        let r1 = graph.get("R1").unwrap();
        assert!(r1.contains("type", &p("A")));
        assert!(r1.contains("refBy", &p("R2")));
        assert_eq!(r1.len(), 2);
        let r2 = graph.get("R2").unwrap();
        assert!(r2.contains("linksTo", &p("R1")));
        assert_eq!(r2.len(), 1);
    }

    #[test]
    fn stop_with_fail_aborts_apply() {
        let design = RecordDesign::new()
            .named("experiment")
            .set_id(constant("r"))
            .add_attribute("x", |_: &Value| stop_with_fail(Some("bad")));

        let err = design.apply(&json!({"x": 1})).unwrap_err();
        assert!(err.is_abort());
        assert_eq!(
            err,
            DesignError::Aborted {
                design: "experiment".into(),
                message: "bad".into()
            }
        );
    }

    #[test]
    fn missing_value_is_fatal_unless_wrapped_in_otherwise() {
        let strict = RecordDesign::new()
            .set_id(constant("r"))
            .add_attribute("date", read_pointer("/date"));

        match strict.apply(&experiment()).unwrap_err() {
            DesignError::Extract { part, source, .. } => {
                assert_eq!(part, "attribute 'date'");
                assert_eq!(source, ExtractError::Unresolved { query: "/date".into() });
            }
            other => panic!("unexpected error: {}", other),
        }

        let date = read_pointer("/date");
        let lenient = RecordDesign::new()
            .set_id(constant("r"))
            .add_attribute("date", move |doc: &Value| {
                otherwise_with(|| date(doc), || Ok(json!("unknown")))
            });

        let applied = lenient.apply(&experiment()).unwrap().unwrap();
        assert!(applied.record.contains("date", &p("unknown")));
    }

    #[test]
    fn unsupported_value_shape_is_reported() {
        let design = RecordDesign::new()
            .set_id(constant("r"))
            .add_attribute("researcher", read_pointer("/researcher"));

        let err = design.apply(&experiment()).unwrap_err();
        assert!(matches!(
            err,
            DesignError::Extract {
                source: ExtractError::Shape(_),
                ..
            }
        ));
    }

    #[test]
    fn skip_condition_suppresses_record() {
        let design = RecordDesign::new()
            .set_id(read_pointer("/experiment_id"))
            .set_skip_condition(|doc: &Value| Ok(json!(doc.get("draft").is_some())));

        assert!(design.apply(&json!({"experiment_id": "a", "draft": true})).unwrap().is_none());
        assert!(design.apply(&json!({"experiment_id": "a"})).unwrap().is_some());
    }

    #[test]
    fn numeric_id_is_rendered_as_text() {
        let design = RecordDesign::new().set_id(read_pointer("/n"));
        let applied = design.apply(&json!({"n": 7})).unwrap().unwrap();
        assert_eq!(applied.record.id(), "7");
    }
}
