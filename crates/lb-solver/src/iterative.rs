//! Iterative solver for large sparse technology matrices.
//!
//! Jacobi-preconditioned BiCGSTAB. Technology matrices are usually
//! diagonally dominant (each process produces more of its product than the
//! supply chain consumes of it), which keeps the iteration short. When it
//! does not converge the system is handed to the dense LU solver.

use lb_core::{Real, dot};
use lb_matrix::Matrix;
use nalgebra::DMatrix;

use crate::config::SolverConfig;
use crate::dense::DenseSolver;
use crate::error::{SolverError, SolverResult};
use crate::solver::{MatrixSolver, check_square};

/// Sparse iterative solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SparseSolver {
    config: SolverConfig,
}

/// Outcome of one BiCGSTAB run.
struct Iteration {
    x: Vec<Real>,
    residual: Real,
    iterations: usize,
    converged: bool,
}

impl SparseSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    fn bicgstab(&self, a: &Matrix, b: &[Real]) -> Iteration {
        let n = b.len();
        let b_norm = norm(b);
        if b_norm == 0.0 {
            return Iteration {
                x: vec![0.0; n],
                residual: 0.0,
                iterations: 0,
                converged: true,
            };
        }
        let tol = self.config.tolerance * b_norm;

        let precond: Vec<Real> = a
            .diagonal()
            .into_iter()
            .map(|d| if d.abs() > Real::EPSILON { 1.0 / d } else { 1.0 })
            .collect();
        let apply = |v: &[Real]| -> Vec<Real> { v.iter().zip(&precond).map(|(x, m)| x * m).collect() };

        let mut x = vec![0.0; n];
        let mut r = b.to_vec();
        let r_hat = r.clone();
        let mut p = vec![0.0; n];
        let mut v = vec![0.0; n];
        let (mut rho, mut alpha, mut omega) = (1.0, 1.0, 1.0);

        for iter in 0..self.config.max_iterations {
            let rho_next = dot(&r_hat, &r);
            if rho_next.abs() < Real::MIN_POSITIVE || omega == 0.0 {
                return Iteration {
                    residual: norm(&r),
                    x,
                    iterations: iter,
                    converged: false,
                };
            }
            let beta = (rho_next / rho) * (alpha / omega);
            for i in 0..n {
                p[i] = r[i] + beta * (p[i] - omega * v[i]);
            }
            let y = apply(&p);
            v = a.mul_vec(&y);
            alpha = rho_next / dot(&r_hat, &v);
            let s: Vec<Real> = r.iter().zip(&v).map(|(ri, vi)| ri - alpha * vi).collect();
            if norm(&s) <= tol {
                for i in 0..n {
                    x[i] += alpha * y[i];
                }
                return Iteration {
                    residual: norm(&s),
                    x,
                    iterations: iter + 1,
                    converged: true,
                };
            }
            let z = apply(&s);
            let t = a.mul_vec(&z);
            let tt = dot(&t, &t);
            omega = if tt == 0.0 { 0.0 } else { dot(&t, &s) / tt };
            for i in 0..n {
                x[i] += alpha * y[i] + omega * z[i];
                r[i] = s[i] - omega * t[i];
            }
            let r_norm = norm(&r);
            if r_norm <= tol {
                return Iteration {
                    x,
                    residual: r_norm,
                    iterations: iter + 1,
                    converged: true,
                };
            }
            rho = rho_next;
        }

        Iteration {
            residual: norm(&r),
            x,
            iterations: self.config.max_iterations,
            converged: false,
        }
    }
}

impl MatrixSolver for SparseSolver {
    fn name(&self) -> &'static str {
        "sparse"
    }

    fn solve_vec(&self, a: &Matrix, rhs: &[Real]) -> SolverResult<Vec<Real>> {
        check_square(a, rhs.len())?;
        let it = self.bicgstab(a, rhs);
        if it.converged {
            tracing::debug!(iterations = it.iterations, residual = it.residual, "BiCGSTAB converged");
            return Ok(it.x);
        }
        if !self.config.lu_fallback {
            return Err(SolverError::NotConverged {
                iterations: it.iterations,
                residual: it.residual,
            });
        }
        tracing::warn!(
            iterations = it.iterations,
            residual = it.residual,
            "BiCGSTAB did not converge, falling back to LU"
        );
        DenseSolver.solve_vec(a, rhs)
    }

    fn invert(&self, a: &Matrix) -> SolverResult<DMatrix<Real>> {
        tracing::debug!(size = a.rows(), "inverting sparse matrix densely");
        DenseSolver.invert(a)
    }
}

fn norm(v: &[Real]) -> Real {
    dot(v, v).sqrt()
}
