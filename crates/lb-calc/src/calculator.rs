//! Calculation entry points.

use std::sync::Arc;
use std::time::Instant;

use lb_core::{Real, real_demands};
use lb_index::{EnviIndex, ImpactIndex, TechIndex};
use lb_library::{EntityStore, LibraryDir};
use lb_matrix::MatrixBundle;
use lb_solver::{SolverConfig, is_sparse_system, solver_for};

use crate::blocks;
use crate::dense::DenseProvider;
use crate::error::{CalcError, CalcResult};
use crate::lazy::LazyProvider;
use crate::library::LibraryProvider;
use crate::link::LinkedSystem;
use crate::provider::SolutionProvider;

/// Settings of a calculation.
#[derive(Debug, Clone, Copy)]
pub struct CalculationConfig {
    pub solver: SolverConfig,
    /// Keep the cost vector of the bundle.
    pub with_costs: bool,
    /// Keep the impact matrix of the bundle.
    pub with_impacts: bool,
}

impl Default for CalculationConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            with_costs: true,
            with_impacts: true,
        }
    }
}

/// Totals of one calculation.
#[derive(Debug, Clone)]
pub struct SimpleResult {
    pub tech_index: TechIndex,
    pub envi_index: Option<EnviIndex>,
    pub impact_index: Option<ImpactIndex>,
    pub scaling_vector: Vec<Real>,
    pub total_requirements: Vec<Real>,
    /// Loop factor of the reference product.
    pub loop_factor: Real,
    pub total_flows: Option<Vec<Real>>,
    pub total_impacts: Option<Vec<Real>>,
    pub total_costs: Option<Real>,
}

impl SimpleResult {
    fn collect(provider: &SolutionProvider) -> CalcResult<Self> {
        let reference = provider.tech_index().ref_position();
        Ok(Self {
            tech_index: provider.tech_index().clone(),
            envi_index: provider.envi_index().cloned(),
            impact_index: provider.impact_index().cloned(),
            scaling_vector: provider.scaling_vector().to_vec(),
            total_requirements: provider.total_requirements()?.to_vec(),
            loop_factor: provider.loop_factor_of(reference)?,
            total_flows: provider.total_flows()?.map(<[Real]>::to_vec),
            total_impacts: provider.total_impacts()?.map(<[Real]>::to_vec),
            total_costs: provider.total_costs()?,
        })
    }

    /// Total requirements corrected by the loop factor.
    pub fn real_demands(&self) -> Vec<Real> {
        real_demands(&self.total_requirements, self.loop_factor)
    }
}

/// Totals plus the direct contribution of every product's process.
#[derive(Debug, Clone)]
pub struct ContributionResult {
    pub totals: SimpleResult,
    /// Direct flows per product, in tech index order.
    pub direct_flows: Option<Vec<Vec<Real>>>,
    pub direct_impacts: Option<Vec<Vec<Real>>>,
    pub direct_costs: Option<Vec<Real>>,
}

/// Runs calculations on matrix bundles, optionally against a library
/// directory.
pub struct LcaCalculator {
    config: CalculationConfig,
    libraries: Option<(Arc<LibraryDir>, Arc<dyn EntityStore>)>,
}

impl LcaCalculator {
    pub fn new(config: CalculationConfig) -> Self {
        Self {
            config,
            libraries: None,
        }
    }

    /// Resolve library products in `dir`, syncing indices against `store`.
    pub fn with_libraries(mut self, dir: Arc<LibraryDir>, store: Arc<dyn EntityStore>) -> Self {
        self.libraries = Some((dir, store));
        self
    }

    pub fn config(&self) -> &CalculationConfig {
        &self.config
    }

    fn prepare(&self, mut bundle: MatrixBundle) -> CalcResult<MatrixBundle> {
        bundle.validate()?;
        if !self.config.with_impacts {
            bundle.impact_index = None;
            bundle.impact_matrix = None;
        }
        if !self.config.with_costs {
            bundle.costs = None;
        }
        Ok(bundle)
    }

    pub fn calculate_simple(&self, bundle: MatrixBundle) -> CalcResult<SimpleResult> {
        let provider = self.calculate_full(bundle)?;
        SimpleResult::collect(&provider)
    }

    pub fn calculate_contributions(&self, bundle: MatrixBundle) -> CalcResult<ContributionResult> {
        let provider = self.calculate_full(bundle)?;
        let totals = SimpleResult::collect(&provider)?;
        let n = totals.tech_index.size();

        let mut direct_flows = provider.has_flows().then(|| Vec::with_capacity(n));
        let mut direct_impacts = provider.has_impacts().then(|| Vec::with_capacity(n));
        let mut direct_costs = provider.has_costs().then(|| Vec::with_capacity(n));
        for j in 0..n {
            if let (Some(target), Some(v)) = (direct_flows.as_mut(), provider.direct_flows_of(j)?) {
                target.push(v);
            }
            if let (Some(target), Some(v)) =
                (direct_impacts.as_mut(), provider.direct_impacts_of(j)?)
            {
                target.push(v);
            }
            if let (Some(target), Some(v)) = (direct_costs.as_mut(), provider.direct_costs_of(j)?) {
                target.push(v);
            }
        }
        Ok(ContributionResult {
            totals,
            direct_flows,
            direct_impacts,
            direct_costs,
        })
    }

    /// A provider over `bundle`: library composition when it references
    /// library products, otherwise dense or lazy by sparsity.
    pub fn calculate_full(&self, bundle: MatrixBundle) -> CalcResult<SolutionProvider> {
        if bundle.tech_index.has_library_links() {
            return self.calculate_with_libraries(bundle);
        }
        let bundle = self.prepare(bundle)?;
        self.solve_plain(bundle)
    }

    fn solve_plain(&self, bundle: MatrixBundle) -> CalcResult<SolutionProvider> {
        let start = Instant::now();
        let config = &self.config.solver;
        let solver = solver_for(&bundle.tech_matrix, config);
        let provider: SolutionProvider = if is_sparse_system(&bundle.tech_matrix, config) {
            LazyProvider::solve(bundle, solver)?.into()
        } else {
            DenseProvider::solve(bundle, solver.as_ref())?.into()
        };
        tracing::info!(
            provider = provider.name(),
            size = provider.tech_index().size(),
            elapsed_s = start.elapsed().as_secs_f64(),
            "calculation done"
        );
        Ok(provider)
    }

    fn link(&self, bundle: MatrixBundle) -> CalcResult<LinkedSystem> {
        let (dir, store) = self.libraries.as_ref().ok_or(CalcError::NoLibraryDir)?;
        let bundle = self.prepare(bundle)?;
        LinkedSystem::link(&bundle, dir, store.as_ref())
    }

    /// Compose foreground and library solutions column by column.
    pub fn calculate_with_libraries(&self, bundle: MatrixBundle) -> CalcResult<SolutionProvider> {
        let start = Instant::now();
        let system = self.link(bundle)?;
        let foreground = self.solve_plain(system.foreground().clone())?;
        let provider = LibraryProvider::new(system, foreground, self.config.solver)?;
        tracing::info!(
            libraries = provider.system().libraries().len(),
            elapsed_s = start.elapsed().as_secs_f64(),
            "library calculation done"
        );
        Ok(provider.into())
    }

    /// Invert the linked system block by block into a dense provider.
    pub fn calculate_with_blocks(&self, bundle: MatrixBundle) -> CalcResult<SolutionProvider> {
        let start = Instant::now();
        let system = self.link(bundle)?;
        let provider = blocks::invert(&system, &self.config.solver)?.into_provider()?;
        tracing::info!(
            size = system.tech_index().size(),
            elapsed_s = start.elapsed().as_secs_f64(),
            "block calculation done"
        );
        Ok(provider.into())
    }
}

impl Default for LcaCalculator {
    fn default() -> Self {
        Self::new(CalculationConfig::default())
    }
}
