use thiserror::Error;

use super::config::ConfigError;
use super::model::MolecularModel;
use crate::core::graph::graph::GraphError;
use crate::core::io::sdf::SdfError;
use crate::core::io::tinker::TinkerFileError;
use crate::core::library::LibraryError;
use crate::core::models::ids::VertexId;
use crate::core::zmatrix::ZMatrixError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Non-finite coordinates while placing vertex {vertex} ({stage})")]
    NonFinite {
        vertex: VertexId,
        stage: &'static str,
    },
    #[error("Attachment point {index} of vertex {vertex} has no source atom")]
    MissingSourceAtom { vertex: VertexId, index: usize },
    #[error("Ring-closing attractor at atom {atom} must hang from exactly one atom, found {found}")]
    MalformedAttractor { atom: usize, found: usize },
    #[error("Ring placeholder vertex {vertex} does not resolve to a single parent atom")]
    UnresolvedRingPlaceholder { vertex: VertexId },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Building-block library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Internal coordinate error: {0}")]
    InternalCoordinates(#[from] ZMatrixError),

    #[error("External tool '{tool}' failed: {message}{}", format_stderr(.stderr))]
    ExternalTool {
        tool: String,
        message: String,
        stderr: String,
    },

    #[error("I/O error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Tinker file error: {0}")]
    TinkerFile(#[from] TinkerFileError),

    #[error("SDF error: {0}")]
    Sdf(#[from] SdfError),

    /// Every ring-closure combination failed. `partial` is the assembled tree,
    /// attractors still in place, so callers can keep what was built.
    #[error("No viable ring-closure candidate for graph {graph_id}: {reason}")]
    NoViableCandidate {
        graph_id: u64,
        reason: String,
        partial: Box<MolecularModel>,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{}", trimmed)
    }
}

impl EngineError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
