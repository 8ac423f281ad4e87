//! Block inversion of a linked system.
//!
//! The combined technology matrix is partitioned into the foreground block
//! and one block per library. Ordered consumer before supplier (foreground,
//! then libraries against dependency order) the matrix is block lower
//! triangular, so its inverse follows from the diagonal block inverses:
//!
//! ```text
//! X_cc = inv_c
//! X_rc = -inv_r * sum(A_rk * X_kc, c <= k < r)      for r > c
//! ```
//!
//! Only the foreground block is inverted. A library's diagonal inverse is
//! the own x own part of its stored INV, which is exact because foreign
//! columns of a library's A are identity placeholders.

use lb_core::Real;
use lb_library::LibMatrix;
use lb_matrix::{Matrix, MatrixBundle};
use lb_solver::{SolverConfig, solver_for};
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::dense::DenseProvider;
use crate::error::CalcResult;
use crate::link::LinkedSystem;

/// One diagonal block: combined positions and where its inverse comes from.
#[derive(Debug)]
struct Block {
    positions: Vec<usize>,
    /// Linked library index; `None` for the foreground block.
    link: Option<usize>,
    inverse: DMatrix<Real>,
}

/// The combined system of a [`LinkedSystem`] with its inverse computed
/// block by block.
#[derive(Debug)]
pub struct BlockInversion {
    pub bundle: MatrixBundle,
    pub inverse: DMatrix<Real>,
    pub intensities: Option<DMatrix<Real>>,
}

impl BlockInversion {
    pub fn into_provider(self) -> CalcResult<DenseProvider> {
        let provider = DenseProvider::from_inverse(self.bundle, self.inverse)?;
        match self.intensities {
            Some(m) => provider.with_intensities(m),
            None => Ok(provider),
        }
    }
}

fn gather(m: &DMatrix<Real>, rows: &[usize], cols: &[usize]) -> DMatrix<Real> {
    DMatrix::from_fn(rows.len(), cols.len(), |i, j| m[(rows[i], cols[j])])
}

fn scatter_block(target: &mut DMatrix<Real>, rows: &[usize], cols: &[usize], block: &DMatrix<Real>) {
    for (j, &col) in cols.iter().enumerate() {
        for (i, &row) in rows.iter().enumerate() {
            target[(row, col)] = block[(i, j)];
        }
    }
}

/// Invert the combined technology matrix of `system`.
pub fn invert(system: &LinkedSystem, config: &SolverConfig) -> CalcResult<BlockInversion> {
    if system.tech_index.front_size() == 0 && system.links.len() == 1 {
        tracing::info!(
            library = %system.links[0].id,
            "reference product is provided by one library, using its blocks directly"
        );
        return library_blocks(system, config);
    }
    let n = system.tech_index.size();

    for link in &system.links {
        link.matrix(LibMatrix::A, "technology matrix")?;
    }
    let mut a = DMatrix::zeros(n, n);
    for p in 0..n {
        a.set_column(p, &nalgebra::DVector::from_vec(system.column_of_a(p)?));
    }

    let mut blocks = diagonal_blocks(system, &a, config)?;
    // consumers first
    blocks[1..].reverse();
    blocks.retain(|b| !b.positions.is_empty());

    let b = match &system.envi_index {
        Some(envi) => {
            for link in &system.links {
                link.library.matrix(LibMatrix::B)?;
            }
            let mut b = DMatrix::zeros(envi.size(), n);
            for p in 0..n {
                if let Some(column) = system.column_of_b(p)? {
                    b.set_column(p, &nalgebra::DVector::from_vec(column));
                }
            }
            Some(b)
        }
        None => None,
    };
    let stored_m = stored_intensities(system, &blocks)?;

    let columns: Vec<(Vec<DMatrix<Real>>, Option<DMatrix<Real>>)> = (0..blocks.len())
        .into_par_iter()
        .map(|c| {
            let x = substitute(&a, &blocks, c);
            let m = b.as_ref().map(|b| intensities_of(b, &blocks, c, &x, &stored_m[c]));
            (x, m)
        })
        .collect();

    let mut inverse = DMatrix::zeros(n, n);
    let mut intensities = b.as_ref().map(|b| DMatrix::zeros(b.nrows(), n));
    for (c, (x, m)) in columns.into_iter().enumerate() {
        let cols = &blocks[c].positions;
        for (offset, x_rc) in x.iter().enumerate() {
            scatter_block(&mut inverse, &blocks[c + offset].positions, cols, x_rc);
        }
        if let (Some(target), Some(m)) = (intensities.as_mut(), m) {
            let rows: Vec<usize> = (0..m.nrows()).collect();
            scatter_block(target, &rows, cols, &m);
        }
    }
    tracing::info!(size = n, blocks = blocks.len(), "block inversion done");

    Ok(BlockInversion {
        bundle: combined_bundle(system, a, b)?,
        inverse,
        intensities,
    })
}

fn combined_bundle(
    system: &LinkedSystem,
    a: DMatrix<Real>,
    b: Option<DMatrix<Real>>,
) -> CalcResult<MatrixBundle> {
    let mut bundle = MatrixBundle::new(system.tech_index.clone(), Matrix::Dense(a))?;
    if let (Some(envi), Some(b)) = (&system.envi_index, b) {
        bundle = bundle.with_interventions(envi.clone(), Matrix::Dense(b))?;
    }
    if let (Some(index), Some(c)) = (&system.impact_index, &system.impact_matrix) {
        bundle = bundle.with_impacts(index.clone(), c.clone())?;
    }
    if let Some(costs) = &system.costs {
        bundle = bundle.with_costs(costs.clone())?;
    }
    Ok(bundle)
}

/// Copy of `m` with rows moved by `rows` (dropped on `None`) and columns by
/// `cols`; entries landing on the same cell add up.
fn remap(
    m: &Matrix,
    shape: (usize, usize),
    rows: impl Fn(usize) -> Option<usize>,
    cols: &[usize],
) -> DMatrix<Real> {
    let mut out = DMatrix::zeros(shape.0, shape.1);
    m.for_each_nonzero(|i, j, v| {
        if let Some(row) = rows(i) {
            out[(row, cols[j])] += v;
        }
    });
    out
}

/// The whole system is one library: its stored A, INV, B and M are the
/// combined matrices, only moved into the combined positions.
fn library_blocks(system: &LinkedSystem, config: &SolverConfig) -> CalcResult<BlockInversion> {
    let link = &system.links[0];
    let n = system.tech_index.size();
    let cols = &link.tech_map;
    let tech_rows = |i: usize| Some(cols[i]);

    let stored_a = link.matrix(LibMatrix::A, "technology matrix")?;
    let a = remap(&stored_a, (n, n), tech_rows, cols);
    let inverse = match link.library.matrix(LibMatrix::INV)? {
        Some(inv) => remap(&inv, (n, n), tech_rows, cols),
        None => {
            tracing::warn!(library = %link.id, "library has no inverse, inverting it");
            let inv = Matrix::Dense(solver_for(&stored_a, config).invert(&stored_a)?);
            remap(&inv, (n, n), tech_rows, cols)
        }
    };

    let (b, intensities) = match &system.envi_index {
        Some(envi) => {
            let shape = (envi.size(), n);
            let mut b = DMatrix::zeros(shape.0, shape.1);
            let mut m = None;
            if let Some(map) = &link.envi_map {
                let envi_rows = |i: usize| map[i];
                if let Some(stored) = link.library.matrix(LibMatrix::B)? {
                    b = remap(&stored, shape, envi_rows, cols);
                }
                if let Some(stored) = link.library.matrix(LibMatrix::M)? {
                    m = Some(remap(&stored, shape, envi_rows, cols));
                }
            }
            let m = m.unwrap_or_else(|| &b * &inverse);
            (Some(b), Some(m))
        }
        None => (None, None),
    };

    Ok(BlockInversion {
        bundle: combined_bundle(system, a, b)?,
        inverse,
        intensities,
    })
}

/// Foreground block first, then the libraries in dependency order.
fn diagonal_blocks(
    system: &LinkedSystem,
    a: &DMatrix<Real>,
    config: &SolverConfig,
) -> CalcResult<Vec<Block>> {
    let front: Vec<usize> = (0..system.tech_index.front_size()).collect();
    let mut blocks = Vec::with_capacity(system.links.len() + 1);
    let front_inverse = if front.is_empty() {
        DMatrix::zeros(0, 0)
    } else {
        let slice = Matrix::Dense(gather(a, &front, &front));
        solver_for(&slice, config).invert(&slice)?
    };
    blocks.push(Block {
        positions: front,
        link: None,
        inverse: front_inverse,
    });

    for (l, link) in system.links.iter().enumerate() {
        let inverse = match link.library.matrix(LibMatrix::INV)? {
            Some(inv) => {
                let inv = inv.to_dense();
                gather(&inv, &link.own_local, &link.own_local)
            }
            None => {
                tracing::warn!(library = %link.id, "library has no inverse, inverting its block");
                let slice = Matrix::Dense(gather(a, &link.own, &link.own));
                solver_for(&slice, config).invert(&slice)?
            }
        };
        tracing::debug!(library = %link.id, size = link.own.len(), "library block");
        blocks.push(Block {
            positions: link.own.clone(),
            link: Some(l),
            inverse,
        });
    }
    Ok(blocks)
}

/// Stored M columns of each library block, rows in the combined
/// intervention index.
fn stored_intensities(
    system: &LinkedSystem,
    blocks: &[Block],
) -> CalcResult<Vec<Option<DMatrix<Real>>>> {
    let Some(envi) = &system.envi_index else {
        return Ok(blocks.iter().map(|_| None).collect());
    };
    let mut stored = Vec::with_capacity(blocks.len());
    for block in blocks {
        let Some(link) = block.link.map(|l| &system.links[l]) else {
            stored.push(None);
            continue;
        };
        let (Some(m), Some(map)) = (link.library.matrix(LibMatrix::M)?, &link.envi_map) else {
            stored.push(None);
            continue;
        };
        let mut remapped = DMatrix::zeros(envi.size(), block.positions.len());
        for (j, &local) in link.own_local.iter().enumerate() {
            for (i, v) in m.column(local).into_iter().enumerate() {
                if let Some(row) = map[i] {
                    remapped[(row, j)] += v;
                }
            }
        }
        stored.push(Some(remapped));
    }
    Ok(stored)
}

/// Blocks `X_rc` for `r >= c`, indexed by `r - c`.
fn substitute(a: &DMatrix<Real>, blocks: &[Block], c: usize) -> Vec<DMatrix<Real>> {
    let cols = &blocks[c].positions;
    let mut solved: Vec<DMatrix<Real>> = Vec::with_capacity(blocks.len() - c);
    solved.push(blocks[c].inverse.clone());
    for r in c + 1..blocks.len() {
        let rows = &blocks[r].positions;
        let mut acc = DMatrix::zeros(rows.len(), cols.len());
        for k in c..r {
            let a_rk = gather(a, rows, &blocks[k].positions);
            if a_rk.iter().all(|v| *v == 0.0) {
                continue;
            }
            acc += a_rk * &solved[k - c];
        }
        solved.push(-(&blocks[r].inverse * acc));
    }
    solved
}

/// `M_c = sum(B_r * X_rc)`; a library's own diagonal term comes from its
/// stored M when present.
fn intensities_of(
    b: &DMatrix<Real>,
    blocks: &[Block],
    c: usize,
    x: &[DMatrix<Real>],
    stored: &Option<DMatrix<Real>>,
) -> DMatrix<Real> {
    let all_rows: Vec<usize> = (0..b.nrows()).collect();
    let mut m = DMatrix::zeros(b.nrows(), blocks[c].positions.len());
    for (offset, x_rc) in x.iter().enumerate() {
        match stored {
            Some(stored) if offset == 0 => m += stored,
            _ => {
                let b_r = gather(b, &all_rows, &blocks[c + offset].positions);
                m += b_r * x_rc;
            }
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_on_two_blocks() {
        // [[1, 0], [3, 2]]: front block [1], library block [2]
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 3.0, 2.0]);
        let blocks = vec![
            Block {
                positions: vec![0],
                link: None,
                inverse: DMatrix::from_element(1, 1, 1.0),
            },
            Block {
                positions: vec![1],
                link: Some(0),
                inverse: DMatrix::from_element(1, 1, 0.5),
            },
        ];
        let x = substitute(&a, &blocks, 0);
        assert_eq!(x.len(), 2);
        assert!((x[1][(0, 0)] + 1.5).abs() < 1e-12);

        let b = DMatrix::from_row_slice(1, 2, &[1.0, 4.0]);
        let m = intensities_of(&b, &blocks, 0, &x, &None);
        assert!((m[(0, 0)] - (1.0 - 6.0)).abs() < 1e-12);
    }

    #[test]
    fn gather_and_scatter_positions() {
        let m = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let g = gather(&m, &[2, 0], &[1]);
        assert_eq!(g.as_slice(), &[8.0, 2.0]);

        let mut target = DMatrix::zeros(3, 3);
        scatter_block(&mut target, &[2, 0], &[1], &g);
        assert_eq!(target[(2, 1)], 8.0);
        assert_eq!(target[(0, 1)], 2.0);
    }
}
