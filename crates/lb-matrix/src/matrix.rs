//! Dense and sparse matrix storage behind one closed type.

use lb_core::Real;
use nalgebra::DMatrix;
use sprs::{CsMat, TriMat};

/// Matrices of a calculation.
///
/// Sparse matrices are always kept in CSC layout so that column reads are
/// cheap; technology and intervention matrices are consumed column-wise.
#[derive(Debug, Clone)]
pub enum Matrix {
    Dense(DMatrix<Real>),
    Sparse(CsMat<Real>),
}

impl Matrix {
    /// A dense `rows x cols` matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix::Dense(DMatrix::zeros(rows, cols))
    }

    /// Dense matrix from row-major values.
    pub fn from_rows(rows: &[&[Real]]) -> Self {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, |r| r.len());
        let mut m = DMatrix::zeros(nrows, ncols);
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                m[(i, j)] = v;
            }
        }
        Matrix::Dense(m)
    }

    /// Sparse matrix from `(row, col, value)` triplets; duplicates are summed.
    pub fn from_triplets(rows: usize, cols: usize, entries: &[(usize, usize, Real)]) -> Self {
        let mut tri = TriMat::new((rows, cols));
        for &(r, c, v) in entries {
            if v != 0.0 {
                tri.add_triplet(r, c, v);
            }
        }
        let csc: CsMat<Real> = tri.to_csc();
        Matrix::Sparse(csc)
    }

    pub fn rows(&self) -> usize {
        match self {
            Matrix::Dense(m) => m.nrows(),
            Matrix::Sparse(m) => m.rows(),
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            Matrix::Dense(m) => m.ncols(),
            Matrix::Sparse(m) => m.cols(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub fn is_square(&self) -> bool {
        self.rows() == self.cols()
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, Matrix::Sparse(_))
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        match self {
            Matrix::Dense(m) => m.iter().filter(|v| **v != 0.0).count(),
            Matrix::Sparse(m) => m.nnz(),
        }
    }

    /// Fraction of non-zero entries.
    pub fn density(&self) -> Real {
        let cells = self.rows() * self.cols();
        if cells == 0 {
            return 0.0;
        }
        self.nnz() as Real / cells as Real
    }

    pub fn get(&self, row: usize, col: usize) -> Real {
        match self {
            Matrix::Dense(m) => m[(row, col)],
            Matrix::Sparse(m) => m.get(row, col).copied().unwrap_or(0.0),
        }
    }

    /// Copy of column `col`.
    pub fn column(&self, col: usize) -> Vec<Real> {
        match self {
            Matrix::Dense(m) => m.column(col).iter().copied().collect(),
            Matrix::Sparse(m) => {
                let mut column = vec![0.0; m.rows()];
                if let Some(vec) = m.outer_view(col) {
                    for (row, &v) in vec.iter() {
                        column[row] = v;
                    }
                }
                column
            }
        }
    }

    pub fn diagonal(&self) -> Vec<Real> {
        let n = self.rows().min(self.cols());
        (0..n).map(|i| self.get(i, i)).collect()
    }

    /// Visit all non-zero entries column by column.
    pub fn for_each_nonzero(&self, mut f: impl FnMut(usize, usize, Real)) {
        match self {
            Matrix::Dense(m) => {
                for col in 0..m.ncols() {
                    for row in 0..m.nrows() {
                        let v = m[(row, col)];
                        if v != 0.0 {
                            f(row, col, v);
                        }
                    }
                }
            }
            Matrix::Sparse(m) => {
                for (col, vec) in m.outer_iterator().enumerate() {
                    for (row, &v) in vec.iter() {
                        if v != 0.0 {
                            f(row, col, v);
                        }
                    }
                }
            }
        }
    }

    /// Dense copy of the matrix.
    pub fn to_dense(&self) -> DMatrix<Real> {
        match self {
            Matrix::Dense(m) => m.clone(),
            Matrix::Sparse(m) => {
                let mut dense = DMatrix::zeros(m.rows(), m.cols());
                self.for_each_nonzero(|r, c, v| dense[(r, c)] = v);
                dense
            }
        }
    }

    /// Sparse copy of the matrix.
    pub fn to_sparse(&self) -> Matrix {
        match self {
            Matrix::Sparse(_) => self.clone(),
            Matrix::Dense(_) => {
                let mut entries = Vec::new();
                self.for_each_nonzero(|r, c, v| entries.push((r, c, v)));
                Matrix::from_triplets(self.rows(), self.cols(), &entries)
            }
        }
    }

    /// Switch to sparse storage when the density is at or below `threshold`.
    pub fn compress(self, threshold: Real) -> Matrix {
        if !self.is_sparse() && self.density() <= threshold {
            tracing::debug!(
                rows = self.rows(),
                cols = self.cols(),
                "compressing matrix to sparse storage"
            );
            return self.to_sparse();
        }
        self
    }

    /// `self * x`.
    pub fn mul_vec(&self, x: &[Real]) -> Vec<Real> {
        let mut y = vec![0.0; self.rows()];
        match self {
            Matrix::Dense(m) => {
                for (col, &xj) in x.iter().enumerate().take(m.ncols()) {
                    if xj == 0.0 {
                        continue;
                    }
                    for row in 0..m.nrows() {
                        y[row] += m[(row, col)] * xj;
                    }
                }
            }
            Matrix::Sparse(_) => self.for_each_nonzero(|r, c, v| y[r] += v * x[c]),
        }
        y
    }

    /// `self * other`; the result is sparse only when both sides are.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        match (self, other) {
            (Matrix::Dense(a), Matrix::Dense(b)) => Matrix::Dense(a * b),
            (Matrix::Sparse(_), Matrix::Sparse(_)) => {
                let mut entries = Vec::new();
                other.for_each_nonzero(|k, j, b| {
                    if let Matrix::Sparse(a) = self
                        && let Some(col) = a.outer_view(k)
                    {
                        for (i, &v) in col.iter() {
                            entries.push((i, j, v * b));
                        }
                    }
                });
                Matrix::from_triplets(self.rows(), other.cols(), &entries)
            }
            (Matrix::Sparse(_), Matrix::Dense(b)) => {
                let mut out = DMatrix::zeros(self.rows(), b.ncols());
                self.for_each_nonzero(|i, k, v| {
                    for j in 0..b.ncols() {
                        out[(i, j)] += v * b[(k, j)];
                    }
                });
                Matrix::Dense(out)
            }
            (Matrix::Dense(a), Matrix::Sparse(_)) => {
                let mut out = DMatrix::zeros(a.nrows(), other.cols());
                other.for_each_nonzero(|k, j, v| {
                    for i in 0..a.nrows() {
                        out[(i, j)] += a[(i, k)] * v;
                    }
                });
                Matrix::Dense(out)
            }
        }
    }
}

impl From<DMatrix<Real>> for Matrix {
    fn from(m: DMatrix<Real>) -> Self {
        Matrix::Dense(m)
    }
}

/// Column `j` of a dense column-major matrix as a slice.
pub fn dense_column(m: &DMatrix<Real>, j: usize) -> &[Real] {
    let n = m.nrows();
    &m.as_slice()[j * n..(j + 1) * n]
}
