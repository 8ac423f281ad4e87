//! Incremental matrix assembly.

use std::collections::HashMap;

use lb_core::Real;
use nalgebra::DMatrix;

use crate::matrix::Matrix;

/// Builder for assembling a matrix entry by entry.
///
/// `set` overwrites, `add` accumulates. The sparse variant only stores
/// non-zero cells and is frozen into CSC storage by `build()`.
#[derive(Debug, Clone)]
pub enum MatrixBuilder {
    Dense(DMatrix<Real>),
    Sparse {
        rows: usize,
        cols: usize,
        cells: HashMap<(usize, usize), Real>,
    },
}

impl MatrixBuilder {
    pub fn dense(rows: usize, cols: usize) -> Self {
        MatrixBuilder::Dense(DMatrix::zeros(rows, cols))
    }

    pub fn sparse(rows: usize, cols: usize) -> Self {
        MatrixBuilder::Sparse {
            rows,
            cols,
            cells: HashMap::new(),
        }
    }

    /// Pick the storage by the expected number of non-zeros.
    pub fn for_density(rows: usize, cols: usize, sparse: bool) -> Self {
        if sparse {
            Self::sparse(rows, cols)
        } else {
            Self::dense(rows, cols)
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        match self {
            MatrixBuilder::Dense(m) => (m.nrows(), m.ncols()),
            MatrixBuilder::Sparse { rows, cols, .. } => (*rows, *cols),
        }
    }

    pub fn set(&mut self, row: usize, col: usize, value: Real) {
        match self {
            MatrixBuilder::Dense(m) => m[(row, col)] = value,
            MatrixBuilder::Sparse { cells, .. } => {
                if value == 0.0 {
                    cells.remove(&(row, col));
                } else {
                    cells.insert((row, col), value);
                }
            }
        }
    }

    pub fn add(&mut self, row: usize, col: usize, value: Real) {
        if value == 0.0 {
            return;
        }
        match self {
            MatrixBuilder::Dense(m) => m[(row, col)] += value,
            MatrixBuilder::Sparse { cells, .. } => *cells.entry((row, col)).or_insert(0.0) += value,
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Real {
        match self {
            MatrixBuilder::Dense(m) => m[(row, col)],
            MatrixBuilder::Sparse { cells, .. } => cells.get(&(row, col)).copied().unwrap_or(0.0),
        }
    }

    pub fn build(self) -> Matrix {
        match self {
            MatrixBuilder::Dense(m) => Matrix::Dense(m),
            MatrixBuilder::Sparse { rows, cols, cells } => {
                let entries: Vec<(usize, usize, Real)> =
                    cells.into_iter().map(|((r, c), v)| (r, c, v)).collect();
                Matrix::from_triplets(rows, cols, &entries)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_add_accumulates() {
        for mut b in [MatrixBuilder::dense(2, 2), MatrixBuilder::sparse(2, 2)] {
            b.set(0, 1, 3.0);
            b.set(0, 1, 4.0);
            b.add(1, 0, 1.0);
            b.add(1, 0, 1.5);
            assert_eq!(b.get(0, 1), 4.0);
            assert_eq!(b.get(1, 0), 2.5);
            let m = b.build();
            assert_eq!(m.get(0, 1), 4.0);
            assert_eq!(m.get(1, 0), 2.5);
            assert_eq!(m.nnz(), 2);
        }
    }

    #[test]
    fn sparse_builder_builds_sparse() {
        let mut b = MatrixBuilder::sparse(3, 3);
        b.set(1, 1, 2.0);
        b.add(2, 1, -1.0);
        b.set(2, 2, 0.0);
        let m = b.build();
        assert!(m.is_sparse());
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.column(1), vec![0.0, 2.0, -1.0]);
    }
}
