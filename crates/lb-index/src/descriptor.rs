//! Lightweight descriptors of domain entities.
//!
//! Descriptors are what an entity store hands out: a store-local [`Id`],
//! the stable reference id used in persisted library indices, and a name
//! for humans. Equality and hashing use the id only.

use std::hash::{Hash, Hasher};

use lb_core::{FlowId, ImpactId, LibraryId, LocationId, ProcessId};

/// A process; `library` is set when the process was mounted from a library.
#[derive(Debug, Clone)]
pub struct ProcessDescriptor {
    pub id: ProcessId,
    pub ref_id: String,
    pub name: String,
    pub library: Option<LibraryId>,
}

impl ProcessDescriptor {
    pub fn new(id: ProcessId, ref_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            ref_id: ref_id.into(),
            name: name.into(),
            library: None,
        }
    }

    /// Tag the process as owned by the given library.
    pub fn in_library(mut self, library: impl Into<LibraryId>) -> Self {
        self.library = Some(library.into());
        self
    }
}

/// A product, waste or elementary flow.
#[derive(Debug, Clone)]
pub struct FlowDescriptor {
    pub id: FlowId,
    pub ref_id: String,
    pub name: String,
}

impl FlowDescriptor {
    pub fn new(id: FlowId, ref_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            ref_id: ref_id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocationDescriptor {
    pub id: LocationId,
    pub ref_id: String,
    pub code: String,
}

impl LocationDescriptor {
    pub fn new(id: LocationId, ref_id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id,
            ref_id: ref_id.into(),
            code: code.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImpactDescriptor {
    pub id: ImpactId,
    pub ref_id: String,
    pub name: String,
}

impl ImpactDescriptor {
    pub fn new(id: ImpactId, ref_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            ref_id: ref_id.into(),
            name: name.into(),
        }
    }
}

macro_rules! id_identity {
    ($($ty:ty),*) => {
        $(
            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    self.id == other.id
                }
            }

            impl Eq for $ty {}

            impl Hash for $ty {
                fn hash<H: Hasher>(&self, state: &mut H) {
                    self.id.hash(state);
                }
            }
        )*
    };
}

id_identity!(
    ProcessDescriptor,
    FlowDescriptor,
    LocationDescriptor,
    ImpactDescriptor
);

#[cfg(test)]
mod tests {
    use super::*;
    use lb_core::Id;

    #[test]
    fn equality_ignores_names_and_tags() {
        let a = ProcessDescriptor::new(Id::from_index(3), "p", "Process A");
        let b = ProcessDescriptor::new(Id::from_index(3), "p", "renamed").in_library("lib");
        assert_eq!(a, b);
        assert_eq!(b.library, Some(LibraryId::from("lib")));
        assert_ne!(a, ProcessDescriptor::new(Id::from_index(4), "p", "Process A"));
    }
}
