use std::path::PathBuf;

use lb_core::LibraryId;
use lb_matrix::MatrixError;
use lb_solver::SolverError;

pub type LibraryResult<T> = Result<T, LibraryError>;

#[derive(thiserror::Error, Debug)]
pub enum LibraryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Binary index error in {path}: {source}")]
    Bincode {
        path: PathBuf,
        source: bincode::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("Library not found: {id}")]
    MissingLibrary { id: LibraryId },

    #[error("Library {library}: {index} entry `{ref_id}` cannot be resolved")]
    UnresolvedIndex {
        library: LibraryId,
        index: &'static str,
        ref_id: String,
    },

    #[error("Library {library}: {what} is {actual}, expected {expected}")]
    DimensionMismatch {
        library: LibraryId,
        what: String,
        expected: String,
        actual: String,
    },

    #[error("Dependency cycle between libraries: {}", join(libraries))]
    DependencyCycle { libraries: Vec<LibraryId> },
}

fn join(ids: &[LibraryId]) -> String {
    ids.iter().map(LibraryId::as_str).collect::<Vec<_>>().join(" -> ")
}

impl LibraryError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        LibraryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn shape(
        library: &LibraryId,
        what: impl Into<String>,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        LibraryError::DimensionMismatch {
            library: library.clone(),
            what: what.into(),
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        }
    }
}
