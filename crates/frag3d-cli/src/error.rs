use frag3d::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported configuration key for --set: '{0}'")]
    UnsupportedKey(String),

    #[error("Ring closure needs a complete [tinker] section: {0}")]
    TinkerSetup(String),

    #[error(
        "No ring-closure candidate for graph {graph_id} ({reason}); the open tree was written to '{path}'",
        path = partial.display()
    )]
    RingClosureFailed {
        graph_id: u64,
        reason: String,
        partial: PathBuf,
    },

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
