//! Dense and sparse backends agree on diagonally dominant systems.

use lb_matrix::Matrix;
use lb_solver::{DenseSolver, MatrixSolver, SolverConfig, SparseSolver};
use proptest::prelude::*;

/// Technology matrix with unit outputs on the diagonal and small inputs
/// elsewhere; column sums of the inputs stay below one.
fn tech_matrix(n: usize, inputs: &[(usize, usize, f64)]) -> Matrix {
    let mut entries: Vec<(usize, usize, f64)> = (0..n).map(|i| (i, i, 1.0)).collect();
    for &(r, c, v) in inputs {
        let (r, c) = (r % n, c % n);
        if r != c {
            entries.push((r, c, -v / n as f64));
        }
    }
    Matrix::from_triplets(n, n, &entries)
}

fn close(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= 1e-8 * x.abs().max(1.0))
}

#[test]
fn inverse_times_matrix_is_identity() {
    let a = tech_matrix(4, &[(1, 0, 1.0), (2, 1, 2.0), (3, 2, 0.5), (0, 3, 0.3)]);
    let inv = SparseSolver::new(SolverConfig::default()).invert(&a).unwrap();
    let product = a.to_dense() * &inv;
    for i in 0..4 {
        for j in 0..4 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((product[(i, j)] - expected).abs() < 1e-12);
        }
    }
}

#[test]
fn singular_system_is_reported() {
    let a = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 4.0]]);
    assert!(DenseSolver.invert(&a).is_err());
    assert!(SparseSolver::new(SolverConfig::default()).solve(&a, 0, 1.0).is_err());
}

proptest! {
    #[test]
    fn sparse_matches_dense(
        n in 2_usize..25,
        inputs in prop::collection::vec((0_usize..25, 0_usize..25, 0.0_f64..0.9), 0..60),
        column in 0_usize..25,
        demand in 0.1_f64..100.0,
    ) {
        let a = tech_matrix(n, &inputs);
        let column = column % n;
        let dense = DenseSolver.solve(&a, column, demand).unwrap();
        let sparse = SparseSolver::new(SolverConfig::default()).solve(&a, column, demand).unwrap();
        prop_assert!(close(&dense, &sparse), "{dense:?} vs {sparse:?}");
    }
}
