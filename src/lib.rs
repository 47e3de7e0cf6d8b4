//! Builds PID records from JSON documents with declarative record designs, infers the
//! backward links between them and hands the finished graph to a registration service.

pub mod config;
pub mod core;
pub mod error;
pub mod executor;
pub mod input;
pub mod mapping;
pub mod registration;
pub mod telemetry;

pub use crate::config::{Config, InputDistribution, RegistrationConfig};
pub use crate::core::graph::{GraphError, RecordGraph};
pub use crate::core::record::{PidRecord, WireRecord};
pub use crate::core::rules::{InferenceIndex, InferenceRule, MergePolicy};
pub use crate::core::types::{AttributeValue, ExtractError, Primitive};
pub use crate::error::PipelineError;
pub use crate::executor::{ExportReport, Executor, ProcessedGraph, RegistrationOutcome};
pub use crate::input::{FileInputProvider, InputProvider, MemoryInputProvider};
pub use crate::mapping::design::{BackwardLinkFor, RecordDesign};
pub use crate::registration::{HttpRegistrar, OfflineRegistrar, Registrar};
