//! Error types for matrix storage and I/O.

use lb_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("Dimension mismatch: {0}")]
    Dimension(#[from] CoreError),

    #[error("Invalid NPY file {path}: {what}")]
    Format { path: PathBuf, what: String },

    #[error("Column {column} out of range for {path} ({columns} columns)")]
    ColumnOob {
        path: PathBuf,
        column: usize,
        columns: usize,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type MatrixResult<T> = Result<T, MatrixError>;

impl MatrixError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        MatrixError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn format(path: &std::path::Path, what: impl Into<String>) -> Self {
        MatrixError::Format {
            path: path.to_path_buf(),
            what: what.into(),
        }
    }
}
