//! lb-matrix: matrix storage, the matrix bundle of a calculation and the
//! binary matrix codec used by libraries.

pub mod builder;
pub mod bundle;
pub mod error;
pub mod matrix;
pub mod npy;

pub use builder::MatrixBuilder;
pub use bundle::{Demand, MatrixBundle};
pub use error::{MatrixError, MatrixResult};
pub use matrix::Matrix;
