//! Linking a foreground bundle with the libraries it reaches.
//!
//! The combined technology index holds the foreground-owned keys first, then
//! one run per library with that library's own keys, libraries in dependency
//! order. A key is owned by the library it is tagged with; untagged keys in
//! a library index belong to that library.

use std::collections::HashMap;
use std::sync::Arc;

use lb_core::{LibraryId, Real};
use lb_index::{EnviIndex, ImpactIndex, MatrixIndex, TechFlow, TechIndex};
use lb_library::{EntityStore, LibMatrix, Library, LibraryDir, dependency_order};
use lb_matrix::{Matrix, MatrixBuilder, MatrixBundle};

use crate::error::{CalcError, CalcResult};

/// Origin of a combined index position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// Position in the foreground bundle.
    Front(usize),
    /// Own position `position` of linked library `link`.
    Library { link: usize, position: usize },
}

/// One library as part of a linked system.
#[derive(Debug)]
pub(crate) struct LinkedLibrary {
    pub id: LibraryId,
    pub library: Arc<Library>,
    pub tech_index: TechIndex,
    /// Library tech position -> combined position.
    pub tech_map: Vec<usize>,
    /// Combined positions of the library's own products: its run.
    pub own: Vec<usize>,
    /// Library positions of the same products.
    pub own_local: Vec<usize>,
    pub envi_index: Option<EnviIndex>,
    /// Library envi position -> combined envi position.
    pub envi_map: Option<Vec<Option<usize>>>,
}

impl LinkedLibrary {
    pub fn matrix(&self, kind: LibMatrix, what: &'static str) -> CalcResult<Arc<Matrix>> {
        self.library
            .matrix(kind)?
            .ok_or_else(|| CalcError::MissingLibraryData {
                library: self.id.clone(),
                what,
            })
    }
}

/// A foreground bundle together with every library reachable from it.
#[derive(Debug)]
pub struct LinkedSystem {
    pub(crate) foreground: MatrixBundle,
    pub(crate) links: Vec<LinkedLibrary>,
    pub(crate) tech_index: TechIndex,
    pub(crate) slots: Vec<Slot>,
    /// Foreground tech position -> combined position.
    pub(crate) front_map: Vec<usize>,
    pub(crate) envi_index: Option<EnviIndex>,
    pub(crate) front_envi_map: Option<Vec<Option<usize>>>,
    pub(crate) impact_index: Option<ImpactIndex>,
    pub(crate) impact_matrix: Option<Matrix>,
    pub(crate) costs: Option<Vec<Real>>,
}

fn product_name(key: &TechFlow) -> String {
    format!("{}/{}", key.provider.ref_id, key.flow.ref_id)
}

fn unlinked(key: &TechFlow, library: Option<&LibraryId>) -> CalcError {
    CalcError::UnlinkedProduct {
        library: key.library().or(library).cloned(),
        product: product_name(key),
    }
}

fn owner_of<'a>(key: &'a TechFlow, library: &'a LibraryId) -> &'a LibraryId {
    key.library().unwrap_or(library)
}

impl LinkedSystem {
    /// Discover the libraries reached by `foreground`, sync their indices
    /// against `store` and lay out the combined indices.
    pub fn link(
        foreground: &MatrixBundle,
        dir: &LibraryDir,
        store: &dyn EntityStore,
    ) -> CalcResult<Self> {
        let mut found: HashMap<LibraryId, (Arc<Library>, Option<TechIndex>)> = HashMap::new();
        let roots = foreground.tech_index.libraries();
        let order = dependency_order(&roots, |id| {
            let library = dir.require(id)?;
            let tech = library.sync_tech_index(store)?;
            let foreign = tech
                .as_ref()
                .map(|t| {
                    t.libraries()
                        .into_iter()
                        .filter(|lib| lib != id)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            found.insert(id.clone(), (library, tech));
            Ok(foreign)
        })?;
        tracing::debug!(libraries = order.len(), "resolved library order");

        // combined technology index: foreground-owned keys, then one run per
        // library, libraries in dependency order; the first placement wins
        let fg = &foreground.tech_index;
        let mut keys: MatrixIndex<TechFlow> = MatrixIndex::new();
        let mut slots: Vec<Slot> = Vec::new();
        let mut place = |key: TechFlow, slot: Slot| {
            if keys.add(key) == slots.len() {
                slots.push(slot);
            }
        };
        for (pos, key) in fg.iter() {
            if !key.is_from_library() {
                place(key.clone(), Slot::Front(pos));
            }
        }

        let mut pending = Vec::with_capacity(order.len());
        for (link, id) in order.iter().enumerate() {
            let Some((library, tech)) = found.remove(id) else {
                return Err(CalcError::MissingLibraryData {
                    library: id.clone(),
                    what: "library folder",
                });
            };
            let tech = tech.ok_or_else(|| CalcError::MissingLibraryData {
                library: id.clone(),
                what: "technology index",
            })?;
            for (position, key) in tech.iter() {
                if owner_of(key, id) == id {
                    let mut key = key.clone();
                    key.provider.library = Some(id.clone());
                    place(key, Slot::Library { link, position });
                }
            }
            pending.push((id.clone(), library, tech));
        }

        let reference = fg.ref_flow();
        let mut tech_index = TechIndex::from_keys(keys.keys().iter().cloned())
            .ok_or_else(|| unlinked(reference, None))?;
        tech_index
            .set_reference(reference)
            .map_err(|_| unlinked(reference, None))?;
        tech_index.set_demand(fg.demand());
        let runs = tech_index.library_runs()?;
        tracing::debug!(
            front = tech_index.front_size(),
            runs = runs.len(),
            reference = tech_index.ref_position(),
            "combined technology index"
        );

        let front_map = complete_map(fg, &tech_index, None)?;

        // combined intervention index
        let regionalized = match &foreground.envi_index {
            Some(envi) => envi.is_regionalized(),
            None => pending.iter().any(|(_, lib, _)| lib.is_regionalized()),
        };
        let mut envi_index = if regionalized {
            EnviIndex::create_regionalized()
        } else {
            EnviIndex::create()
        };
        if let Some(envi) = &foreground.envi_index {
            envi_index.add_all(envi);
        }

        let mut links = Vec::with_capacity(pending.len());
        for (id, library, tech) in pending {
            let tech_map = complete_map(&tech, &tech_index, Some(&id))?;
            let envi = library.sync_envi_index(store)?;
            if let Some(envi) = &envi {
                envi_index.add_all(envi);
            }
            let own: Vec<usize> = runs
                .iter()
                .find(|run| run.library == id)
                .map(|run| run.range().collect())
                .unwrap_or_default();
            let own_local = own
                .iter()
                .filter_map(|&pos| match slots[pos] {
                    Slot::Library { position, .. } => Some(position),
                    Slot::Front(_) => None,
                })
                .collect();
            links.push(LinkedLibrary {
                id,
                library,
                tech_index: tech,
                tech_map,
                own,
                own_local,
                envi_index: envi,
                envi_map: None,
            });
        }

        let envi_index = (!envi_index.is_empty()).then_some(envi_index);
        let mut front_envi_map = None;
        if let Some(combined) = &envi_index {
            front_envi_map = foreground.envi_index.as_ref().map(|e| e.map_to(combined));
            for link in &mut links {
                link.envi_map = link.envi_index.as_ref().map(|e| e.map_to(combined));
            }
        }

        let mut system = Self {
            foreground: foreground.clone(),
            links,
            tech_index,
            slots,
            front_map,
            envi_index,
            front_envi_map,
            impact_index: None,
            impact_matrix: None,
            costs: None,
        };
        system.link_impacts(store)?;
        system.link_costs()?;
        tracing::info!(
            products = system.tech_index.size(),
            flows = system.envi_index.as_ref().map_or(0, |e| e.size()),
            libraries = system.links.len(),
            "linked system"
        );
        Ok(system)
    }

    fn link_impacts(&mut self, store: &dyn EntityStore) -> CalcResult<()> {
        let Some(envi) = &self.envi_index else {
            return Ok(());
        };
        let mut impacts = self.foreground.impact_index.clone().unwrap_or_default();
        let mut library_impacts = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let index = link.library.sync_impact_index(store)?;
            if let Some(index) = &index {
                impacts.add_all(index);
            }
            library_impacts.push(index);
        }
        if impacts.is_empty() {
            return Ok(());
        }

        let mut c = MatrixBuilder::dense(impacts.size(), envi.size());
        if let (Some(index), Some(matrix), Some(envi_map)) = (
            &self.foreground.impact_index,
            &self.foreground.impact_matrix,
            &self.front_envi_map,
        ) {
            let rows = index.map_to(&impacts);
            matrix.for_each_nonzero(|i, j, v| {
                if let (Some(row), Some(col)) = (rows[i], envi_map[j]) {
                    c.set(row, col, v);
                }
            });
        }
        for (link, index) in self.links.iter().zip(&library_impacts) {
            let (Some(index), Some(envi_map)) = (index, &link.envi_map) else {
                continue;
            };
            let Some(matrix) = link.library.matrix(LibMatrix::C)? else {
                continue;
            };
            let rows = index.map_to(&impacts);
            matrix.for_each_nonzero(|i, j, v| {
                if let (Some(row), Some(col)) = (rows[i], envi_map[j])
                    && c.get(row, col) == 0.0
                {
                    c.set(row, col, v);
                }
            });
        }
        self.impact_index = Some(impacts);
        self.impact_matrix = Some(c.build());
        Ok(())
    }

    fn link_costs(&mut self) -> CalcResult<()> {
        let mut costs: Option<Vec<Real>> = None;
        let n = self.tech_index.size();
        if let Some(fg) = &self.foreground.costs {
            let target = costs.get_or_insert_with(|| vec![0.0; n]);
            for (pos, slot) in self.slots.iter().enumerate() {
                if let Slot::Front(j) = *slot {
                    target[pos] = fg[j];
                }
            }
        }
        for (l, link) in self.links.iter().enumerate() {
            let Some(lib_costs) = link.library.costs()? else {
                continue;
            };
            let target = costs.get_or_insert_with(|| vec![0.0; n]);
            for (pos, slot) in self.slots.iter().enumerate() {
                if let Slot::Library { link: owner, position } = *slot
                    && owner == l
                {
                    target[pos] = lib_costs[position];
                }
            }
        }
        self.costs = costs;
        Ok(())
    }

    pub fn tech_index(&self) -> &TechIndex {
        &self.tech_index
    }

    pub fn envi_index(&self) -> Option<&EnviIndex> {
        self.envi_index.as_ref()
    }

    pub fn impact_index(&self) -> Option<&ImpactIndex> {
        self.impact_index.as_ref()
    }

    /// Linked library ids in dependency order.
    pub fn libraries(&self) -> Vec<LibraryId> {
        self.links.iter().map(|l| l.id.clone()).collect()
    }

    pub fn foreground(&self) -> &MatrixBundle {
        &self.foreground
    }

    pub(crate) fn slot(&self, product: usize) -> CalcResult<Slot> {
        self.slots
            .get(product)
            .copied()
            .ok_or(CalcError::UnknownProduct {
                position: product,
                size: self.slots.len(),
            })
    }

    /// Column `product` of the combined technology matrix.
    pub fn column_of_a(&self, product: usize) -> CalcResult<Vec<Real>> {
        let mut column = vec![0.0; self.tech_index.size()];
        match self.slot(product)? {
            Slot::Front(j) => {
                for (i, v) in self.foreground.tech_matrix.column(j).into_iter().enumerate() {
                    if v != 0.0 {
                        column[self.front_map[i]] += v;
                    }
                }
            }
            Slot::Library { link, position } => {
                let link = &self.links[link];
                let values = link.library.column(LibMatrix::A, position)?.ok_or_else(|| {
                    CalcError::MissingLibraryData {
                        library: link.id.clone(),
                        what: "technology matrix",
                    }
                })?;
                for (i, v) in values.into_iter().enumerate() {
                    if v != 0.0 {
                        column[link.tech_map[i]] += v;
                    }
                }
            }
        }
        Ok(column)
    }

    pub fn diagonal_of_a(&self) -> CalcResult<Vec<Real>> {
        let mut library_diagonals: Vec<Option<Vec<Real>>> = vec![None; self.links.len()];
        let mut diagonal = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let v = match *slot {
                Slot::Front(j) => self.foreground.tech_matrix.get(j, j),
                Slot::Library { link, position } => {
                    if library_diagonals[link].is_none() {
                        let lib = &self.links[link];
                        let d = lib.library.diagonal(LibMatrix::A)?.ok_or_else(|| {
                            CalcError::MissingLibraryData {
                                library: lib.id.clone(),
                                what: "technology matrix",
                            }
                        })?;
                        library_diagonals[link] = Some(d);
                    }
                    library_diagonals[link]
                        .as_ref()
                        .map_or(0.0, |d| d[position])
                }
            };
            diagonal.push(v);
        }
        Ok(diagonal)
    }

    /// Column `product` of the combined intervention matrix; zeros where the
    /// owning system has no interventions.
    pub fn column_of_b(&self, product: usize) -> CalcResult<Option<Vec<Real>>> {
        let Some(envi) = &self.envi_index else {
            return Ok(None);
        };
        let mut column = vec![0.0; envi.size()];
        match self.slot(product)? {
            Slot::Front(j) => {
                if let (Some(b), Some(map)) = (&self.foreground.envi_matrix, &self.front_envi_map) {
                    scatter(&mut column, &b.column(j), map);
                }
            }
            Slot::Library { link, position } => {
                let link = &self.links[link];
                if let Some(map) = &link.envi_map
                    && let Some(values) = link.library.column(LibMatrix::B, position)?
                {
                    scatter(&mut column, &values, map);
                }
            }
        }
        Ok(Some(column))
    }

    /// `B * activity` over the combined indices; each system contributes for
    /// the products it owns.
    pub fn flows_of(&self, activity: &[Real]) -> CalcResult<Option<Vec<Real>>> {
        let Some(envi) = &self.envi_index else {
            return Ok(None);
        };
        let mut flows = vec![0.0; envi.size()];
        if let (Some(b), Some(map)) = (&self.foreground.envi_matrix, &self.front_envi_map) {
            let mut x = vec![0.0; self.foreground.tech_index.size()];
            for (pos, slot) in self.slots.iter().enumerate() {
                if let Slot::Front(j) = *slot {
                    x[j] = activity[pos];
                }
            }
            scatter(&mut flows, &b.mul_vec(&x), map);
        }
        // only columns with activity are read; a loaded B answers from memory
        for link in &self.links {
            let Some(map) = &link.envi_map else {
                continue;
            };
            for (&pos, &local) in link.own.iter().zip(&link.own_local) {
                let x = activity[pos];
                if x == 0.0 {
                    continue;
                }
                let Some(column) = link.library.column(LibMatrix::B, local)? else {
                    tracing::debug!(library = %link.id, "library has no intervention matrix");
                    break;
                };
                let scaled: Vec<Real> = column.into_iter().map(|v| v * x).collect();
                scatter(&mut flows, &scaled, map);
            }
        }
        Ok(Some(flows))
    }
}

/// Add `values` into `target` through a row map.
fn scatter(target: &mut [Real], values: &[Real], map: &[Option<usize>]) {
    for (v, row) in values.iter().zip(map) {
        if let Some(row) = row
            && *v != 0.0
        {
            target[*row] += v;
        }
    }
}

/// Map every position of `index` into `combined`; a key that the combined
/// index does not hold was never provided by its owning library.
fn complete_map(
    index: &TechIndex,
    combined: &TechIndex,
    library: Option<&LibraryId>,
) -> CalcResult<Vec<usize>> {
    index
        .map_to(combined)
        .into_iter()
        .enumerate()
        .map(|(pos, mapped)| mapped.ok_or_else(|| unlinked(index.key_at(pos), library)))
        .collect()
}
