//! Index-specific error types.

use lb_core::{CoreError, LibraryId};

pub type IndexResult<T> = Result<T, IndexError>;

/// Index lookup and partitioning errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Key not found in an index.
    KeyNotFound { what: &'static str },

    /// Position outside of `0..len`.
    PositionOob { position: usize, len: usize },

    /// The keys of a library are spread over more than one run.
    NonContiguousLibrary { library: LibraryId },

    /// A library-owned key sits in front of a foreground key.
    ForegroundAfterLibrary { position: usize },
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::KeyNotFound { what } => write!(f, "{} not found in index", what),
            IndexError::PositionOob { position, len } => {
                write!(f, "Position {} out of bounds (len={})", position, len)
            }
            IndexError::NonContiguousLibrary { library } => {
                write!(f, "Keys of library {} are not contiguous", library)
            }
            IndexError::ForegroundAfterLibrary { position } => {
                write!(
                    f,
                    "Foreground key at position {} follows a library key",
                    position
                )
            }
        }
    }
}

impl std::error::Error for IndexError {}

impl From<IndexError> for CoreError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::PositionOob { position, len } => CoreError::IndexOob {
                what: "index position",
                index: position,
                len,
            },
            _ => CoreError::InvalidArg {
                what: "index key",
            },
        }
    }
}
