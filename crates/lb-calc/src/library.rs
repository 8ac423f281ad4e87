//! Provider that composes foreground and library solutions on demand.

use lb_core::Real;
use lb_index::{EnviIndex, ImpactIndex, TechIndex};
use lb_library::LibMatrix;
use lb_matrix::Matrix;
use lb_solver::{SolverConfig, solver_for};

use crate::cache::{Memo, SlotCache};
use crate::error::CalcResult;
use crate::link::{LinkedSystem, Slot};
use crate::provider::{SolutionProvider, Solved};

/// Results over a foreground system linked with its libraries.
///
/// No combined matrix is ever built. A column of the combined inverse is
/// assembled from the foreground solution and the stored library inverse
/// columns; demand on a product of another library is queued and expanded
/// in turn, so nesting depth only grows the queue.
#[derive(Debug)]
pub struct LibraryProvider {
    system: LinkedSystem,
    foreground: Box<SolutionProvider>,
    config: SolverConfig,
    solutions: SlotCache<Vec<Real>>,
    /// Inverse columns read per linked library, by library position.
    library_columns: Vec<SlotCache<Vec<Real>>>,
    scaling: Vec<Real>,
    memo: Memo,
}

impl LibraryProvider {
    /// `foreground` must be a provider over `system.foreground()` alone.
    pub fn new(
        system: LinkedSystem,
        foreground: SolutionProvider,
        config: SolverConfig,
    ) -> CalcResult<Self> {
        let n = system.tech_index.size();
        let library_columns = system
            .links
            .iter()
            .map(|l| SlotCache::new(l.tech_index.size()))
            .collect();
        let mut provider = Self {
            system,
            foreground: Box::new(foreground),
            config,
            solutions: SlotCache::new(n),
            library_columns,
            scaling: Vec::new(),
            memo: Memo::new(n),
        };
        let reference = provider.system.tech_index.ref_position();
        let demand = provider.system.tech_index.demand();
        let scaling: Vec<Real> = provider
            .solution_of_one(reference)?
            .iter()
            .map(|v| v * demand)
            .collect();
        provider.scaling = scaling;
        Ok(provider)
    }

    pub fn system(&self) -> &LinkedSystem {
        &self.system
    }

    /// The provider over the foreground bundle alone.
    pub fn foreground(&self) -> &SolutionProvider {
        &self.foreground
    }

    /// Column `position` of a library's inverse. Without a stored inverse
    /// the column is solved from the library's technology matrix.
    fn library_solution(&self, link: usize, position: usize) -> CalcResult<&[Real]> {
        let linked = &self.system.links[link];
        let column = self.library_columns[link].get_or_try_init(position, || {
            if let Some(column) = linked.library.column(LibMatrix::INV, position)? {
                return Ok(column);
            }
            tracing::warn!(library = %linked.id, "library has no inverse, solving column");
            let a = linked.matrix(LibMatrix::A, "technology matrix")?;
            Ok(solver_for(&a, &self.config).solve(&a, position, 1.0)?)
        })?;
        Ok(column.as_slice())
    }

    /// Column `product` of the combined inverse.
    fn compose(&self, product: usize) -> CalcResult<Vec<Real>> {
        let system = &self.system;
        let mut result = vec![0.0; system.tech_index.size()];
        let mut queue: Vec<(usize, usize, Real)> = Vec::new();

        match system.slot(product)? {
            Slot::Front(j) => {
                let solution = self.foreground.solution_of_one(j)?;
                for (i, &v) in solution.iter().enumerate() {
                    if v == 0.0 {
                        continue;
                    }
                    let pos = system.front_map[i];
                    match system.slots[pos] {
                        Slot::Front(_) => result[pos] += v,
                        Slot::Library { link, position } => queue.push((link, position, v)),
                    }
                }
            }
            Slot::Library { link, position } => queue.push((link, position, 1.0)),
        }

        while let Some((link, position, factor)) = queue.pop() {
            let tech_map = &system.links[link].tech_map;
            for (i, &v) in self.library_solution(link, position)?.iter().enumerate() {
                if v == 0.0 {
                    continue;
                }
                let pos = tech_map[i];
                match system.slots[pos] {
                    Slot::Library { link: owner, position } if owner != link => {
                        queue.push((owner, position, factor * v));
                    }
                    _ => result[pos] += factor * v,
                }
            }
        }
        Ok(result)
    }
}

impl Solved for LibraryProvider {
    fn memo(&self) -> &Memo {
        &self.memo
    }

    fn tech_index(&self) -> &TechIndex {
        &self.system.tech_index
    }

    fn envi_index(&self) -> Option<&EnviIndex> {
        self.system.envi_index.as_ref()
    }

    fn impact_index(&self) -> Option<&ImpactIndex> {
        self.system.impact_index.as_ref()
    }

    fn impact_matrix(&self) -> Option<&Matrix> {
        self.system.impact_matrix.as_ref()
    }

    fn costs(&self) -> Option<&[Real]> {
        self.system.costs.as_deref()
    }

    fn scaling_vector(&self) -> &[Real] {
        &self.scaling
    }

    fn solution_of_one(&self, product: usize) -> CalcResult<&[Real]> {
        let column = self
            .solutions
            .get_or_try_init(product, || self.compose(product))?;
        Ok(column.as_slice())
    }

    fn column_of_a(&self, product: usize) -> CalcResult<Vec<Real>> {
        self.system.column_of_a(product)
    }

    fn diagonal_of_a(&self) -> CalcResult<Vec<Real>> {
        self.system.diagonal_of_a()
    }

    fn column_of_b(&self, product: usize) -> CalcResult<Option<Vec<Real>>> {
        self.system.column_of_b(product)
    }

    fn flows_of(&self, activity: &[Real]) -> CalcResult<Option<Vec<Real>>> {
        self.system.flows_of(activity)
    }
}
