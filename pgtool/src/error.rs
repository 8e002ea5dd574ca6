use std::path::PathBuf;

use pgcore::PgError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Core(#[from] PgError),

    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("peak references sample {0}, which is not listed in `samples`")]
    UnknownSample(u32),
}

pub type Result<T> = std::result::Result<T, ToolError>;
