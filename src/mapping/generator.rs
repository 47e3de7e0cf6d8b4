/*
Inputs:

    designs.json or designs.toon (declarative record designs)

Outputs:

    Vec<RecordDesign>, ready for the executor

Responsibilities:

    Parse design files (JSON or TOON)

    Validate attribute declarations (value xor backlink marker)

    Compile value specs into extractors, keeping declaration order
*/
// design files -> RecordDesign
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::core::classify::{otherwise_with, stop_with_fail};
use crate::mapping::design::{
    BackwardLinkFor, Extractor, RecordDesign, constant, read_path, read_pointer,
};
use crate::mapping::json_path::value_to_text;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("failed to read design file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON design file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid TOON design file {path}: {message}")]
    Toon { path: PathBuf, message: String },
    #[error("unsupported design file {0}, expected .json or .toon")]
    UnsupportedExtension(PathBuf),
    #[error("design '{design}', attribute '{key}': {reason}")]
    InvalidAttribute {
        design: String,
        key: String,
        reason: &'static str,
    },
}

/// How a value is obtained from the input document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSpec {
    Const(Value),
    Pointer(String),
    Path(String),
    List(Vec<ValueSpec>),
    Concat(Vec<ValueSpec>),
    Otherwise {
        value: Box<ValueSpec>,
        fallback: Box<ValueSpec>,
    },
    Fail(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlink_for: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklinkSpec {
    pub forward: String,
    pub backward: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub id: ValueSpec,
    #[serde(default)]
    pub pid: Option<ValueSpec>,
    #[serde(default)]
    pub skip_if: Option<ValueSpec>,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub backlinks: Vec<BacklinkSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DesignFile {
    Wrapped { designs: Vec<DesignSpec> },
    List(Vec<DesignSpec>),
}

impl DesignFile {
    pub fn into_specs(self) -> Vec<DesignSpec> {
        match self {
            DesignFile::Wrapped { designs } | DesignFile::List(designs) => designs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignFormat {
    Json,
    Toon,
}

impl DesignFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(DesignFormat::Json),
            Some("toon") => Some(DesignFormat::Toon),
            _ => None,
        }
    }
}

impl ValueSpec {
    pub fn compile(self) -> Extractor {
        match self {
            ValueSpec::Const(v) => constant(v),
            ValueSpec::Pointer(p) => read_pointer(&p),
            ValueSpec::Path(p) => read_path(&p),
            ValueSpec::List(items) => {
                let parts = compile_all(items);
                Box::new(move |doc| {
                    let values = parts
                        .iter()
                        .map(|part| part(doc))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::Array(values))
                })
            }
            ValueSpec::Concat(items) => {
                let parts = compile_all(items);
                Box::new(move |doc| {
                    let mut text = String::new();
                    for part in &parts {
                        text.push_str(&value_to_text(&part(doc)?));
                    }
                    Ok(Value::String(text))
                })
            }
            ValueSpec::Otherwise { value, fallback } => {
                let value = value.compile();
                let fallback = fallback.compile();
                Box::new(move |doc| otherwise_with(|| value(doc), || fallback(doc)))
            }
            ValueSpec::Fail(message) => {
                Box::new(move |_| stop_with_fail::<Value>(message.as_deref()))
            }
        }
    }
}

fn compile_all(items: Vec<ValueSpec>) -> Vec<Extractor> {
    items.into_iter().map(ValueSpec::compile).collect()
}

impl DesignSpec {
    /// Builds the design. Attributes keep file order, a key given several times
    /// accumulates extractors.
    pub fn compile(self, fallback_name: &str) -> Result<RecordDesign, GeneratorError> {
        let name = self.name.unwrap_or_else(|| fallback_name.to_string());
        let mut design = RecordDesign::new()
            .named(name.clone())
            .set_id(self.id.compile());

        if let Some(pid) = self.pid {
            design = design.set_persistent_id(pid.compile());
        }
        if let Some(skip) = self.skip_if {
            design = design.set_skip_condition(skip.compile());
        }

        for attr in self.attributes {
            design = match (attr.value, attr.backlink_for) {
                (Some(value), None) => design.add_attribute(&attr.key, value.compile()),
                (None, Some(forward)) => design.add_backlink_for(&attr.key, BackwardLinkFor(forward)),
                (Some(_), Some(_)) => {
                    return Err(GeneratorError::InvalidAttribute {
                        design: name,
                        key: attr.key,
                        reason: "has both a value and a backlink_for marker",
                    });
                }
                (None, None) => {
                    return Err(GeneratorError::InvalidAttribute {
                        design: name,
                        key: attr.key,
                        reason: "needs a value or a backlink_for marker",
                    });
                }
            };
        }

        for link in self.backlinks {
            design = design.declare_backlink(&link.forward, &link.backward);
        }
        Ok(design)
    }
}

pub fn parse_design_file(text: &str, format: DesignFormat, path: &Path) -> Result<DesignFile, GeneratorError> {
    match format {
        DesignFormat::Json => serde_json::from_str(text).map_err(|source| GeneratorError::Json {
            path: path.to_path_buf(),
            source,
        }),
        DesignFormat::Toon => {
            let value: Value =
                toon_format::decode_default(text).map_err(|e| GeneratorError::Toon {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
            serde_json::from_value(value).map_err(|e| GeneratorError::Toon {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    }
}

/// Compiles every design of `specs`; unnamed designs are called `<stem>#<n>`.
pub fn compile_designs(specs: Vec<DesignSpec>, stem: &str) -> Result<Vec<RecordDesign>, GeneratorError> {
    specs
        .into_iter()
        .enumerate()
        .map(|(i, spec)| spec.compile(&format!("{stem}#{}", i + 1)))
        .collect()
}

pub fn load_designs(path: &Path) -> Result<Vec<RecordDesign>, GeneratorError> {
    let format = DesignFormat::from_path(path)
        .ok_or_else(|| GeneratorError::UnsupportedExtension(path.to_path_buf()))?;
    let text = fs::read_to_string(path).map_err(|source| GeneratorError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let specs = parse_design_file(&text, format, path)?.into_specs();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("design");
    let designs = compile_designs(specs, stem)?;
    debug!(path = %path.display(), designs = designs.len(), "loaded design file");
    Ok(designs)
}
