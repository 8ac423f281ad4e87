//! Technology and intervention indices.

use std::ops::Deref;

use lb_core::{LibraryId, Real};

use crate::error::{IndexError, IndexResult};
use crate::indexing::MatrixIndex;
use crate::keys::{EnviFlow, TechFlow};

/// Index of the technology matrix.
///
/// The reference product carries the demand of the calculation; it is the
/// first key unless moved with [`set_reference`](Self::set_reference). Keys
/// know the library that owns their provider, which partitions the index
/// into a foreground part and per-library runs.
#[derive(Debug, Clone)]
pub struct TechIndex {
    index: MatrixIndex<TechFlow>,
    reference: usize,
    demand: Real,
}

/// A contiguous run of positions owned by one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRun {
    pub library: LibraryId,
    pub offset: usize,
    pub len: usize,
}

impl LibraryRun {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

impl TechIndex {
    /// Create an index with the reference product at position 0 and a
    /// demand of 1.
    pub fn new(ref_flow: TechFlow) -> Self {
        let mut index = MatrixIndex::new();
        index.add(ref_flow);
        Self {
            index,
            reference: 0,
            demand: 1.0,
        }
    }

    /// Build an index from keys in order; the first key is the reference.
    pub fn from_keys(keys: impl IntoIterator<Item = TechFlow>) -> Option<Self> {
        let mut keys = keys.into_iter();
        let mut index = Self::new(keys.next()?);
        for key in keys {
            index.add(key);
        }
        Some(index)
    }

    pub fn add(&mut self, key: TechFlow) -> usize {
        self.index.add(key)
    }

    pub fn ref_flow(&self) -> &TechFlow {
        self.index.key_at(self.reference)
    }

    /// Position of the reference product.
    pub fn ref_position(&self) -> usize {
        self.reference
    }

    /// Make the existing key `key` the reference product.
    pub fn set_reference(&mut self, key: &TechFlow) -> IndexResult<usize> {
        let position = self.index.position(key).ok_or(IndexError::KeyNotFound {
            what: "reference product",
        })?;
        self.reference = position;
        Ok(position)
    }

    pub fn demand(&self) -> Real {
        self.demand
    }

    pub fn set_demand(&mut self, demand: Real) {
        self.demand = demand;
    }

    /// Library of the key at `position`; `None` for foreground keys and
    /// positions out of range.
    pub fn library(&self, position: usize) -> Option<&LibraryId> {
        self.index.get(position).ok().and_then(TechFlow::library)
    }

    pub fn is_from_library(&self, position: usize) -> bool {
        self.library(position).is_some()
    }

    /// True when at least one key belongs to a library.
    pub fn has_library_links(&self) -> bool {
        self.index.keys().iter().any(TechFlow::is_from_library)
    }

    /// Libraries referenced by this index, in order of first appearance.
    pub fn libraries(&self) -> Vec<LibraryId> {
        let mut libs: Vec<LibraryId> = Vec::new();
        for key in self.index.keys() {
            if let Some(lib) = key.library()
                && !libs.contains(lib)
            {
                libs.push(lib.clone());
            }
        }
        libs
    }

    /// Number of leading foreground keys.
    pub fn front_size(&self) -> usize {
        self.index
            .keys()
            .iter()
            .take_while(|key| !key.is_from_library())
            .count()
    }

    /// Partition the library part of the index into runs.
    ///
    /// Fails if a foreground key follows a library key or if the keys of one
    /// library are split over more than one run.
    pub fn library_runs(&self) -> IndexResult<Vec<LibraryRun>> {
        let mut runs: Vec<LibraryRun> = Vec::new();
        for (pos, key) in self.index.iter() {
            let Some(lib) = key.library() else {
                if !runs.is_empty() {
                    return Err(IndexError::ForegroundAfterLibrary { position: pos });
                }
                continue;
            };
            match runs.last_mut() {
                Some(run) if &run.library == lib => run.len += 1,
                _ => {
                    if runs.iter().any(|r| &r.library == lib) {
                        return Err(IndexError::NonContiguousLibrary {
                            library: lib.clone(),
                        });
                    }
                    runs.push(LibraryRun {
                        library: lib.clone(),
                        offset: pos,
                        len: 1,
                    });
                }
            }
        }
        Ok(runs)
    }

    /// Map positions of this index into `other`, see [`MatrixIndex::map_to`].
    pub fn map_to(&self, other: &TechIndex) -> Vec<Option<usize>> {
        self.index.map_to(&other.index)
    }

    pub fn as_matrix_index(&self) -> &MatrixIndex<TechFlow> {
        &self.index
    }
}

impl Deref for TechIndex {
    type Target = MatrixIndex<TechFlow>;

    fn deref(&self) -> &Self::Target {
        &self.index
    }
}

/// Index of the intervention matrix.
///
/// In a regionalized index flow-location pairs are keys; otherwise locations
/// are stripped when keys are added.
#[derive(Debug, Clone, Default)]
pub struct EnviIndex {
    index: MatrixIndex<EnviFlow>,
    regionalized: bool,
}

impl EnviIndex {
    pub fn create() -> Self {
        Self::default()
    }

    pub fn create_regionalized() -> Self {
        Self {
            index: MatrixIndex::new(),
            regionalized: true,
        }
    }

    pub fn is_regionalized(&self) -> bool {
        self.regionalized
    }

    pub fn add(&mut self, flow: EnviFlow) -> usize {
        if self.regionalized || flow.location.is_none() {
            self.index.add(flow)
        } else {
            self.index.add(flow.without_location())
        }
    }

    pub fn add_all(&mut self, other: &EnviIndex) {
        for key in other.keys() {
            self.add(key.clone());
        }
    }

    /// Position of a flow; locations are ignored in a non-regionalized index.
    pub fn position_of(&self, flow: &EnviFlow) -> Option<usize> {
        if self.regionalized || flow.location.is_none() {
            self.index.position(flow)
        } else {
            self.index.position(&flow.without_location())
        }
    }

    pub fn map_to(&self, other: &EnviIndex) -> Vec<Option<usize>> {
        self.index.keys().iter().map(|k| other.position_of(k)).collect()
    }

    pub fn as_matrix_index(&self) -> &MatrixIndex<EnviFlow> {
        &self.index
    }
}

impl Deref for EnviIndex {
    type Target = MatrixIndex<EnviFlow>;

    fn deref(&self) -> &Self::Target {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FlowDescriptor, LocationDescriptor, ProcessDescriptor};
    use lb_core::Id;

    fn product(i: u32, lib: Option<&str>) -> TechFlow {
        let mut p = ProcessDescriptor::new(Id::from_index(i), format!("p{i}"), format!("p{i}"));
        if let Some(lib) = lib {
            p = p.in_library(lib);
        }
        TechFlow::of(p, FlowDescriptor::new(Id::from_index(i), format!("f{i}"), "f"))
    }

    #[test]
    fn reference_is_first() {
        let mut idx = TechIndex::new(product(0, None));
        idx.add(product(1, None));
        assert_eq!(idx.ref_position(), 0);
        assert_eq!(idx.ref_flow(), &product(0, None));
        assert_eq!(idx.demand(), 1.0);
    }

    #[test]
    fn reference_can_move() {
        let mut idx =
            TechIndex::from_keys([product(0, Some("base")), product(1, Some("mid"))]).unwrap();
        assert_eq!(idx.set_reference(&product(1, Some("mid"))), Ok(1));
        assert_eq!(idx.ref_position(), 1);
        assert_eq!(idx.ref_flow(), &product(1, Some("mid")));
        assert!(idx.set_reference(&product(7, None)).is_err());
        assert_eq!(idx.ref_position(), 1);
    }

    #[test]
    fn library_runs_partition() {
        let idx = TechIndex::from_keys([
            product(0, None),
            product(1, None),
            product(2, Some("a")),
            product(3, Some("a")),
            product(4, Some("b")),
        ])
        .unwrap();

        assert_eq!(idx.front_size(), 2);
        assert_eq!(idx.library(1), None);
        assert_eq!(idx.library(2), Some(&LibraryId::from("a")));
        assert_eq!(idx.libraries(), vec![LibraryId::from("a"), LibraryId::from("b")]);

        let runs = idx.library_runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].range(), 2..4);
        assert_eq!(runs[1].range(), 4..5);
    }

    #[test]
    fn library_runs_reject_interleaving() {
        let idx = TechIndex::from_keys([
            product(0, None),
            product(1, Some("a")),
            product(2, Some("b")),
            product(3, Some("a")),
        ])
        .unwrap();
        assert_eq!(
            idx.library_runs().unwrap_err(),
            IndexError::NonContiguousLibrary {
                library: LibraryId::from("a")
            }
        );

        let idx = TechIndex::from_keys([product(0, Some("a")), product(1, None)]).unwrap();
        assert!(matches!(
            idx.library_runs(),
            Err(IndexError::ForegroundAfterLibrary { position: 1 })
        ));
    }

    #[test]
    fn envi_index_strips_locations() {
        let flow = FlowDescriptor::new(Id::from_index(1), "co2", "CO2");
        let de = LocationDescriptor::new(Id::from_index(1), "de", "DE");
        let located = EnviFlow::output_of(flow.clone(), Some(de));

        let mut plain = EnviIndex::create();
        assert_eq!(plain.add(located.clone()), 0);
        assert_eq!(plain.add(EnviFlow::output_of(flow.clone(), None)), 0);
        assert_eq!(plain.position_of(&located), Some(0));

        let mut regional = EnviIndex::create_regionalized();
        regional.add(located.clone());
        regional.add(EnviFlow::output_of(flow, None));
        assert_eq!(regional.size(), 2);
        assert_eq!(plain.map_to(&regional), vec![Some(1)]);
    }
}
