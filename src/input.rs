//! Input documents for the executor.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("expected a JSON file, got: {0}")]
    NotJson(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{origin} is not valid JSON: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("JSON document {0} is empty or not valid")]
    Empty(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputDocument {
    /// Where the document came from, for logs and errors.
    pub origin: String,
    pub content: Value,
}

pub trait InputProvider {
    /// The next document, `Ok(None)` once exhausted.
    fn next_document(&mut self) -> Result<Option<InputDocument>, InputError>;
}

/// Parses `text` and checks that it holds a non-empty object, array or string.
pub fn parse_document(origin: &str, text: &str) -> Result<Value, InputError> {
    let content: Value = serde_json::from_str(text).map_err(|source| InputError::Parse {
        origin: origin.to_string(),
        source,
    })?;

    let non_empty = match &content {
        Value::Object(m) => !m.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::String(s) => !s.is_empty(),
        //scalars and null have no length
        _ => false,
    };
    if !non_empty {
        return Err(InputError::Empty(origin.to_string()));
    }
    Ok(content)
}

/// Reads JSON files in the order given.
#[derive(Debug, Clone, Default)]
pub struct FileInputProvider {
    paths: VecDeque<PathBuf>,
}

impl FileInputProvider {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl InputProvider for FileInputProvider {
    fn next_document(&mut self) -> Result<Option<InputDocument>, InputError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            return Err(InputError::NotJson(path));
        }

        info!(path = %path.display(), "processing input file");
        let text = fs::read_to_string(&path).map_err(|source| InputError::Io {
            path: path.clone(),
            source,
        })?;
        let origin = path.display().to_string();
        let content = parse_document(&origin, &text)?;
        Ok(Some(InputDocument { origin, content }))
    }
}

/// Serves JSON texts held in memory, named `input[0]`, `input[1]`, ...
#[derive(Debug, Clone, Default)]
pub struct MemoryInputProvider {
    texts: VecDeque<String>,
    served: usize,
}

impl MemoryInputProvider {
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            texts: texts.into_iter().map(Into::into).collect(),
            served: 0,
        }
    }
}

impl InputProvider for MemoryInputProvider {
    fn next_document(&mut self) -> Result<Option<InputDocument>, InputError> {
        let Some(text) = self.texts.pop_front() else {
            return Ok(None);
        };
        let origin = format!("input[{}]", self.served);
        self.served += 1;

        let content = parse_document(&origin, &text)?;
        Ok(Some(InputDocument { origin, content }))
    }
}
