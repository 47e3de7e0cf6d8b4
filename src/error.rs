use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::graph::GraphError;
use crate::input::InputError;
use crate::mapping::design::DesignError;
use crate::mapping::generator::GeneratorError;

/// Everything that stops a run. Registration failures are not in here, they are reported
/// and the run goes on.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Design(#[from] DesignError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to write {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
