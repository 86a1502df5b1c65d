//! Packaging error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for packaging operations.
pub type Result<T, E = PackError> = std::result::Result<T, E>;

/// Errors raised while declaring, building or compressing packages.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("duplicate filename [{basename}] during {kind} compression")]
    DuplicateBasename { basename: String, kind: &'static str },

    #[error("adding {kind} to package with no output path for it")]
    MissingCompressor { kind: &'static str },

    #[error("unable to find renderer [{0}] for packed templates in package")]
    MissingRenderer(String),

    #[error("unable to compile template at [{path}] with reference [{reference}]: {message}")]
    TemplateCompile {
        path: PathBuf,
        reference: String,
        message: String,
    },

    #[error("template packer file processor returned no reference for [{0}]")]
    InvalidFileProcessorResult(PathBuf),

    #[error("template packer reference must be provided when adding [{0}]")]
    MissingReference(PathBuf),

    #[error("failed to parse {kind} fragment [{basename}]: {message}")]
    Parse {
        kind: &'static str,
        basename: String,
        message: String,
    },

    #[error("failed to build source map: {0}")]
    SourceMap(String),

    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("{0} compressor already compiled, fragments can no longer be added")]
    Sealed(&'static str),

    #[error("invalid module [{module}]: {message}")]
    InvalidModule { module: String, message: String },

    #[error("package routes registered before compression")]
    NotCompressed,
}

impl PackError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(path.into(), err)
    }
}
