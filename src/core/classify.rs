// emptiness classification + the conditional helpers used inside extractors
use serde_json::Value;
use tracing::warn;

use crate::core::types::ExtractError;

const DEFAULT_FAIL_MESSAGE: &str = "No error message provided";

//compared after trim + lowercase
const EMPTYISH_STRINGS: [&str; 5] = ["null", "", "()", "[]", "{}"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emptiness {
    Null,
    EmptySequence,
    EmptyString,
    NonEmpty,
}

impl Emptiness {
    pub fn is_empty(self) -> bool {
        self != Emptiness::NonEmpty
    }
}

/// Classifies a value for [`otherwise`].
///
/// Only `null`, `[]` and strings that spell out nothing (`""`, `"null"`, `"()"`, `"[]"`,
/// `"{}"`, any case, surrounding whitespace ignored) count as empty. Objects, `0` and
/// `false` are values.
pub fn classify_emptiness(value: &Value) -> Emptiness {
    match value {
        Value::Null => Emptiness::Null,
        Value::Array(items) if items.is_empty() => Emptiness::EmptySequence,
        Value::String(s) if EMPTYISH_STRINGS.contains(&s.trim().to_lowercase().as_str()) => {
            Emptiness::EmptyString
        }
        _ => Emptiness::NonEmpty,
    }
}

/// Returns `candidate` unless it is empty, otherwise the result of `fallback`.
pub fn otherwise<F>(candidate: Value, fallback: F) -> Value
where
    F: FnOnce() -> Value,
{
    if classify_emptiness(&candidate).is_empty() {
        fallback()
    } else {
        candidate
    }
}

/// Deferred form of [`otherwise`]: the candidate is computed here.
///
/// A failing candidate falls through to `fallback` and is only logged, unless it was
/// stopped with [`stop_with_fail`], which is passed on untouched.
pub fn otherwise_with<C, F>(candidate: C, fallback: F) -> Result<Value, ExtractError>
where
    C: FnOnce() -> Result<Value, ExtractError>,
    F: FnOnce() -> Result<Value, ExtractError>,
{
    match candidate() {
        Ok(value) if !classify_emptiness(&value).is_empty() => Ok(value),
        Ok(_) => fallback(),
        Err(e) if e.is_abort() => Err(e),
        Err(e) => {
            warn!(error = %e, "first value of otherwise failed, using fallback");
            fallback()
        }
    }
}

/// Stops building the current record, and with it the whole run.
pub fn stop_with_fail<T>(message: Option<&str>) -> Result<T, ExtractError> {
    let message = match message {
        Some(m) if !m.is_empty() => m,
        _ => DEFAULT_FAIL_MESSAGE,
    };
    Err(ExtractError::Aborted(message.to_string()))
}

/// Truthiness used for skip conditions: everything except `null`, `false`, `0`, `""`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
