//! Foreground-only calculations.

mod common;

use std::sync::Arc;

use common::{World, assert_all_close, assert_close, tech_bundle, with_flows};
use lb_calc::{
    CalcError, CalculationConfig, DenseProvider, LazyProvider, LcaCalculator, SolutionProvider,
};
use lb_core::{CoreError, Id, Real};
use lb_index::{EnviFlow, EnviIndex, FlowDescriptor, ProcessDescriptor, TechFlow, TechIndex};
use lb_matrix::{Matrix, MatrixBundle};
use lb_solver::{DenseSolver, MatrixSolver, SolverConfig, SolverResult, SparseSolver};
use nalgebra::DMatrix;
use proptest::prelude::*;

#[test]
fn single_process_scales_by_demand() {
    let mut world = World::new();
    let p = world.product("p", None);
    let co2 = world.emission("co2");
    let ch4 = world.emission("ch4");
    let mut bundle = with_flows(tech_bundle(&[p], &[&[1.0]]), &[co2, ch4], &[&[2.0], &[3.0]]);
    bundle.tech_index.set_demand(10.0);

    let result = LcaCalculator::default().calculate_simple(bundle).unwrap();
    assert_all_close(&result.scaling_vector, &[10.0]);
    assert_all_close(result.total_flows.as_deref().unwrap(), &[20.0, 30.0]);
    assert_all_close(&result.total_requirements, &[10.0]);
    assert_eq!(result.loop_factor, 1.0);
    assert!(result.total_impacts.is_none());
    assert!(result.total_costs.is_none());
}

#[test]
fn contributions_split_totals_by_process() {
    let mut world = World::new();
    let a = world.product("a", None);
    let b = world.product("b", None);
    let co2 = world.emission("co2");
    let bundle = with_flows(
        tech_bundle(&[a, b], &[&[1.0, 0.0], &[-4.0, 2.0]]),
        &[co2],
        &[&[1.0, 0.5]],
    )
    .with_costs(vec![3.0, 1.0])
    .unwrap();

    let result = LcaCalculator::default()
        .calculate_contributions(bundle)
        .unwrap();
    // b produces 2 per unit of activity, so 2 units of activity cover 4
    assert_all_close(&result.totals.scaling_vector, &[1.0, 2.0]);
    let direct = result.direct_flows.unwrap();
    assert_all_close(&direct[0], &[1.0]);
    assert_all_close(&direct[1], &[1.0]);
    assert_all_close(result.totals.total_flows.as_deref().unwrap(), &[2.0]);
    assert_all_close(&result.direct_costs.unwrap(), &[3.0, 2.0]);
    assert_close(result.totals.total_costs.unwrap(), 5.0);
    assert!(result.direct_impacts.is_none());
    // total requirements are outputs, not activities
    assert_all_close(&result.totals.total_requirements, &[1.0, 4.0]);
}

#[test]
fn disabled_costs_and_impacts_are_dropped() {
    let mut world = World::new();
    let a = world.product("a", None);
    let bundle = tech_bundle(&[a], &[&[1.0]]).with_costs(vec![3.0]).unwrap();
    let calc = LcaCalculator::new(CalculationConfig {
        with_costs: false,
        ..CalculationConfig::default()
    });
    let result = calc.calculate_simple(bundle).unwrap();
    assert!(result.total_costs.is_none());
}

#[test]
fn loop_factor_of_a_self_loop() {
    let mut world = World::new();
    let a = world.product("a", None);
    // a consumes 0.2 of its own output
    let bundle = tech_bundle(&[a], &[&[0.8]]);
    let provider = LcaCalculator::default().calculate_full(bundle).unwrap();
    assert_eq!(provider.name(), "dense");
    assert_close(provider.scaling_vector()[0], 1.25);
    assert_close(provider.loop_factor_of(0).unwrap(), 1.0);

    let result = LcaCalculator::default()
        .calculate_simple(tech_bundle(&[world.product("b", None)], &[&[0.8]]))
        .unwrap();
    assert_all_close(&result.real_demands(), &[1.0]);
}

#[test]
fn unknown_product_is_reported() {
    let mut world = World::new();
    let a = world.product("a", None);
    let provider = LcaCalculator::default()
        .calculate_full(tech_bundle(&[a], &[&[1.0]]))
        .unwrap();
    assert!(matches!(
        provider.solution_of_one(3),
        Err(CalcError::UnknownProduct { position: 3, size: 1 })
    ));
    assert!(provider.total_flows().unwrap().is_none());
    assert!(!provider.has_impacts());
}

#[test]
fn large_sparse_system_uses_lazy_provider() {
    let n = 150;
    let keys: Vec<TechFlow> = (0..n).map(|i| key(i as u32)).collect();
    let mut entries = Vec::new();
    for j in 0..n {
        entries.push((j, j, 1.0));
        if j + 1 < n {
            entries.push((j + 1, j, -0.5));
        }
    }
    let bundle = MatrixBundle::new(
        TechIndex::from_keys(keys).unwrap(),
        Matrix::from_triplets(n, n, &entries),
    )
    .unwrap();
    let provider = LcaCalculator::default().calculate_full(bundle).unwrap();
    assert_eq!(provider.name(), "lazy");
    assert_close(provider.scaling_vector()[3], 0.125);
    let column = provider.solution_of_one(n - 2).unwrap().to_vec();
    assert_close(column[n - 1], 0.5);
    // served from the cache the second time
    assert_eq!(provider.solution_of_one(n - 2).unwrap(), column.as_slice());
}

/// A solver that never produces a usable number.
struct BrokenSolver;

impl MatrixSolver for BrokenSolver {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn solve_vec(&self, _a: &Matrix, rhs: &[Real]) -> SolverResult<Vec<Real>> {
        Ok(vec![Real::NAN; rhs.len()])
    }

    fn invert(&self, a: &Matrix) -> SolverResult<DMatrix<Real>> {
        Ok(DMatrix::from_element(a.rows(), a.cols(), Real::NAN))
    }
}

#[test]
fn non_finite_scaling_is_an_error() {
    let mut world = World::new();
    let a = world.product("a", None);
    let bundle = tech_bundle(&[a], &[&[1.0]]);

    let lazy = LazyProvider::solve(bundle.clone(), Arc::new(BrokenSolver));
    assert!(matches!(
        lazy,
        Err(CalcError::Core(CoreError::NonFinite { .. }))
    ));
    let dense = DenseProvider::solve(bundle, &BrokenSolver);
    assert!(matches!(
        dense,
        Err(CalcError::Core(CoreError::NonFinite { .. }))
    ));
}

fn key(i: u32) -> TechFlow {
    TechFlow::of(
        ProcessDescriptor::new(Id::from_index(i), format!("p{i}"), "p"),
        FlowDescriptor::new(Id::from_index(i), format!("f{i}"), "f"),
    )
}

fn random_bundle(n: usize, off: &[Real], b: &[Real]) -> MatrixBundle {
    let mut a = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            a.push((i, j, if i == j { 1.0 } else { off[i * n + j] }));
        }
    }
    let mut envi = EnviIndex::create();
    for k in 0..2 {
        let flow = FlowDescriptor::new(Id::from_index(1000 + k), format!("e{k}"), "e");
        envi.add(EnviFlow::output_of(flow, None));
    }
    let b_entries: Vec<_> = (0..2)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .map(|(i, j)| (i, j, b[i * n + j]))
        .collect();
    let tech = TechIndex::from_keys((0..n).map(|i| key(i as u32))).unwrap();
    let a = Matrix::Dense(Matrix::from_triplets(n, n, &a).to_dense());
    let mut bundle = MatrixBundle::new(tech, a)
        .unwrap()
        .with_interventions(envi, Matrix::from_triplets(2, n, &b_entries))
        .unwrap();
    bundle.tech_index.set_demand(3.0);
    bundle
}

proptest! {
    #[test]
    fn dense_and_lazy_agree(
        (n, off, b) in (2usize..6).prop_flat_map(|n| (
            Just(n),
            prop::collection::vec(-0.2f64..0.0, n * n),
            prop::collection::vec(0.0f64..5.0, 2 * n),
        ))
    ) {
        let bundle = random_bundle(n, &off, &b);
        let dense: SolutionProvider = DenseProvider::solve(bundle.clone(), &DenseSolver).unwrap().into();
        let solver = Arc::new(SparseSolver::new(SolverConfig::default()));
        let lazy: SolutionProvider = LazyProvider::solve(bundle, solver).unwrap().into();

        for (d, l) in dense.scaling_vector().iter().zip(lazy.scaling_vector()) {
            prop_assert!((d - l).abs() <= 1e-9 * d.abs().max(1.0));
        }
        let gd = dense.total_flows().unwrap().unwrap().to_vec();
        let gl = lazy.total_flows().unwrap().unwrap().to_vec();
        for (d, l) in gd.iter().zip(&gl) {
            prop_assert!((d - l).abs() <= 1e-9 * d.abs().max(1.0));
        }
        for j in 0..n {
            let d = dense.total_flows_of_one(j).unwrap().unwrap().to_vec();
            let l = lazy.total_flows_of_one(j).unwrap().unwrap().to_vec();
            for (x, y) in d.iter().zip(&l) {
                prop_assert!((x - y).abs() <= 1e-9 * x.abs().max(1.0));
            }
        }
    }
}
