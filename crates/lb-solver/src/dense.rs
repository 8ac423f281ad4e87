//! Dense direct solver (LU with partial pivoting).

use lb_core::Real;
use lb_matrix::Matrix;
use nalgebra::{DMatrix, DVector};

use crate::error::{SolverError, SolverResult};
use crate::solver::{MatrixSolver, check_square};

/// Dense LU solver for small to medium systems.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseSolver;

impl MatrixSolver for DenseSolver {
    fn name(&self) -> &'static str {
        "dense"
    }

    fn solve_vec(&self, a: &Matrix, rhs: &[Real]) -> SolverResult<Vec<Real>> {
        check_square(a, rhs.len())?;
        let b = DVector::from_column_slice(rhs);
        let x = a
            .to_dense()
            .lu()
            .solve(&b)
            .ok_or_else(|| SolverError::Singular {
                what: "LU solve failed".to_string(),
            })?;
        Ok(x.as_slice().to_vec())
    }

    fn invert(&self, a: &Matrix) -> SolverResult<DMatrix<Real>> {
        check_square(a, a.rows())?;
        a.to_dense()
            .lu()
            .try_inverse()
            .ok_or_else(|| SolverError::Singular {
                what: "LU inversion failed".to_string(),
            })
    }
}
