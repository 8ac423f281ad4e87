//! Dense storage, sparse storage and matrix files answer the same questions
//! the same way.

use lb_matrix::{npy, Matrix, MatrixBuilder};
use proptest::prelude::*;

/// `rows x cols` matrix from `values` (column-major), every other entry zero.
fn half_filled(rows: usize, cols: usize, values: &[f64]) -> Matrix {
    let mut b = MatrixBuilder::dense(rows, cols);
    for (k, v) in values.iter().enumerate().step_by(2) {
        b.set(k % rows, k / rows, *v);
    }
    b.build()
}

fn close(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= 1e-12 * x.abs().max(1.0))
}

fn shapes() -> impl Strategy<Value = (usize, usize, Vec<f64>, Vec<f64>)> {
    (1usize..6, 1usize..6).prop_flat_map(|(r, c)| {
        (
            Just(r),
            Just(c),
            prop::collection::vec(-10.0f64..10.0, r * c),
            prop::collection::vec(-1.0f64..1.0, c * c),
        )
    })
}

proptest! {
    #[test]
    fn sparse_matches_dense((rows, cols, values, other) in shapes()) {
        let dense = half_filled(rows, cols, &values);
        let sparse = dense.to_sparse();
        prop_assert!(sparse.is_sparse());
        prop_assert_eq!(dense.nnz(), sparse.nnz());

        let x: Vec<f64> = other[..cols].to_vec();
        prop_assert!(close(&dense.mul_vec(&x), &sparse.mul_vec(&x)));
        for j in 0..cols {
            prop_assert!(close(&dense.column(j), &sparse.column(j)));
        }

        let square = half_filled(cols, cols, &other);
        let expected = dense.multiply(&square).to_dense();
        for product in [
            sparse.multiply(&square.to_sparse()),
            sparse.multiply(&square),
            dense.multiply(&square.to_sparse()),
        ] {
            prop_assert!(close(expected.as_slice(), product.to_dense().as_slice()));
        }
    }

    #[test]
    fn file_reads_match_memory((rows, cols, values, _other) in shapes()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.npy");
        let m = half_filled(rows, cols, &values);
        npy::write_matrix(&path, &m).unwrap();

        prop_assert_eq!(npy::read_shape(&path).unwrap(), (rows, cols));
        for j in 0..cols {
            prop_assert_eq!(npy::read_column(&path, j).unwrap(), m.column(j));
        }
        prop_assert_eq!(npy::read_diagonal(&path).unwrap(), m.diagonal());
        prop_assert_eq!(npy::read_matrix(&path).unwrap().to_dense(), m.to_dense());
    }
}

#[test]
fn compress_picks_storage_by_density() {
    let identity = Matrix::from_rows(&[
        &[1.0, 0.0, 0.0, 0.0],
        &[0.0, 1.0, 0.0, 0.0],
        &[0.0, 0.0, 1.0, 0.0],
        &[0.0, 0.0, 0.0, 1.0],
    ]);
    assert_eq!(identity.density(), 0.25);
    assert!(!identity.clone().compress(0.2).is_sparse());
    assert!(identity.compress(0.25).is_sparse());
}

#[test]
fn column_out_of_range_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v.npy");
    npy::write_vector(&path, &[1.0, 2.0]).unwrap();
    assert_eq!(npy::read_vector(&path).unwrap(), vec![1.0, 2.0]);
    assert!(npy::read_column(&path, 1).is_err());
}
