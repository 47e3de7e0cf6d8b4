//! Drives a run: applies designs to inputs, builds the record graph and the inference
//! index, runs backlink inference, and exports the graph to the registration boundary.
//!
//! Everything up to and including inference is all-or-nothing: a fatal error returns
//! before anything is written or sent.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, info_span, warn};

use crate::config::{Config, InputDistribution};
use crate::core::graph::RecordGraph;
use crate::core::inference::InferenceStats;
use crate::core::rules::InferenceIndex;
use crate::error::{PipelineError, Result};
use crate::input::{InputDocument, InputProvider};
use crate::mapping::design::RecordDesign;
use crate::registration::Registrar;

pub const RECORDS_FILE: &str = "records.json";
pub const MAPPINGS_FILE: &str = "mappings.json";
pub const RESPONSE_FILE: &str = "api_response.json";

/// The outcome of the input loop and the inference pass.
#[derive(Debug, Clone, Default)]
pub struct ProcessedGraph {
    pub graph: RecordGraph,
    pub index: InferenceIndex,
    pub stats: InferenceStats,
    /// Design applications, one per (design, document) pair that was evaluated.
    pub applications: usize,
    /// Applications whose skip condition held.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered { mapped: usize },
    NoMapping,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub records: usize,
    pub batch_path: PathBuf,
    pub mapping_path: Option<PathBuf>,
    pub response_path: Option<PathBuf>,
    pub outcome: RegistrationOutcome,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Executor {
    config: Config,
    designs: Vec<RecordDesign>,
}

impl Executor {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            designs: Vec::new(),
        }
    }

    pub fn add_design(&mut self, design: RecordDesign) -> &mut Self {
        self.designs.push(design);
        self
    }

    pub fn add_designs<I>(&mut self, designs: I) -> &mut Self
    where
        I: IntoIterator<Item = RecordDesign>,
    {
        self.designs.extend(designs);
        self
    }

    pub fn designs(&self) -> &[RecordDesign] {
        &self.designs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Applies the designs to the inputs and runs inference over the resulting graph.
    pub fn process<P>(&self, input: &mut P) -> Result<ProcessedGraph>
    where
        P: InputProvider + ?Sized,
    {
        info!(designs = self.designs.len(), "amount of designs");
        let mut out = ProcessedGraph {
            index: InferenceIndex::new(self.config.merge_policy),
            ..ProcessedGraph::default()
        };

        match self.config.input_distribution {
            InputDistribution::Drain => {
                for design in &self.designs {
                    while let Some(doc) = input.next_document()? {
                        apply_design(design, &doc, &mut out)?;
                    }
                    info!(design = %design.name(), "no more input files");
                }
            }
            InputDistribution::Broadcast => {
                let mut docs = Vec::new();
                while let Some(doc) = input.next_document()? {
                    docs.push(doc);
                }
                for design in &self.designs {
                    for doc in &docs {
                        apply_design(design, doc, &mut out)?;
                    }
                }
            }
        }

        out.stats = out.graph.run_inference(&out.index)?;
        Ok(out)
    }

    /// Writes the wire batch, registers it and stores what the boundary returned.
    ///
    /// A failing registrar is logged and reported in the outcome. Only local I/O
    /// failures make this return an error.
    pub fn export<R>(&self, processed: &ProcessedGraph, registrar: &R) -> Result<ExportReport>
    where
        R: Registrar + ?Sized,
    {
        let dir = &self.config.output_dir;
        fs::create_dir_all(dir).map_err(|source| PipelineError::Artifact {
            path: dir.clone(),
            source,
        })?;

        let batch = processed.graph.to_wire();
        let batch_path = dir.join(RECORDS_FILE);
        write_json(&batch_path, &batch)?;

        let mut report = ExportReport {
            records: batch.len(),
            batch_path,
            mapping_path: None,
            response_path: None,
            outcome: RegistrationOutcome::NoMapping,
            warnings: Vec::new(),
        };

        let response = match registrar.register(&batch) {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "registration failed");
                report.outcome = RegistrationOutcome::Failed(e.to_string());
                return Ok(report);
            }
        };
        info!("successful response from registration service");

        match &response.mapping {
            Some(mapping) => {
                if mapping.len() != batch.len() {
                    let msg = format!(
                        "the number of records ({}) does not match the number of mappings ({})",
                        batch.len(),
                        mapping.len()
                    );
                    warn!("{msg}");
                    report.warnings.push(msg);
                }
                let path = dir.join(MAPPINGS_FILE);
                write_json(&path, mapping)?;
                info!(path = %path.display(), "saved mappings");
                report.mapping_path = Some(path);
                report.outcome = RegistrationOutcome::Registered {
                    mapped: mapping.len(),
                };
            }
            None => {
                let msg = "no mapping received from registration service".to_string();
                warn!("{msg}");
                report.warnings.push(msg);
            }
        }

        let path = dir.join(RESPONSE_FILE);
        write_json(&path, &response.raw)?;
        info!(path = %path.display(), "saved registration response");
        report.response_path = Some(path);

        Ok(report)
    }

    /// `process` followed by `export`. Nothing is exported if processing fails.
    pub fn execute<P, R>(&self, input: &mut P, registrar: &R) -> Result<ExportReport>
    where
        P: InputProvider + ?Sized,
        R: Registrar + ?Sized,
    {
        let processed = self.process(input)?;
        self.export(&processed, registrar)
    }
}

fn apply_design(design: &RecordDesign, doc: &InputDocument, out: &mut ProcessedGraph) -> Result<()> {
    let span = info_span!("apply", design = %design.name(), input = %doc.origin);
    let _enter = span.enter();

    out.applications += 1;
    match design.apply(&doc.content)? {
        None => out.skipped += 1,
        Some(applied) => {
            info!(id = %applied.record.id(), "created record");
            out.graph.insert(applied.record);
            out.index.merge(applied.rules)?;
        }
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|source| PipelineError::Artifact {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| PipelineError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|source| PipelineError::Artifact {
        path: path.to_path_buf(),
        source,
    })
}
