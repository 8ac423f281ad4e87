//! Error types of the calculation layer.

use lb_core::{CoreError, LibraryId};
use lb_index::IndexError;
use lb_library::LibraryError;
use lb_matrix::MatrixError;
use lb_solver::SolverError;

/// Wraps the errors of the lower layers; every variant aborts the
/// calculation.
#[derive(Debug, thiserror::Error)]
pub enum CalcError {
    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Product position {position} is not in the technology index (size {size})")]
    UnknownProduct { position: usize, size: usize },

    #[error(
        "Product `{product}` is not provided by library {}",
        library.as_ref().map_or("<none>", LibraryId::as_str)
    )]
    UnlinkedProduct {
        library: Option<LibraryId>,
        product: String,
    },

    #[error("Library {library} has no {what}")]
    MissingLibraryData {
        library: LibraryId,
        what: &'static str,
    },

    #[error("Libraries are referenced but no library directory is configured")]
    NoLibraryDir,
}

pub type CalcResult<T> = Result<T, CalcError>;
