//! Boundary to the domain entity store.
//!
//! Library indices only persist reference ids. Before a library can take
//! part in a calculation its indices are resolved against the entities of
//! the store the calculation runs on.

use std::collections::HashMap;

use lb_core::{Id, LibraryId};
use lb_index::{FlowDescriptor, ImpactDescriptor, LocationDescriptor, ProcessDescriptor};

/// Lookup of entity descriptors by reference id.
///
/// A process descriptor carries the library it was mounted from; that tag
/// decides which library owns a product when indices are linked.
pub trait EntityStore: Send + Sync {
    fn process(&self, ref_id: &str) -> Option<ProcessDescriptor>;
    fn flow(&self, ref_id: &str) -> Option<FlowDescriptor>;
    fn location(&self, ref_id: &str) -> Option<LocationDescriptor>;
    fn impact(&self, ref_id: &str) -> Option<ImpactDescriptor>;
}

/// In-memory store handing out sequential ids.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    processes: HashMap<String, ProcessDescriptor>,
    flows: HashMap<String, FlowDescriptor>,
    locations: HashMap<String, LocationDescriptor>,
    impacts: HashMap<String, ImpactDescriptor>,
    next_id: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> Id {
        let id = Id::from_index(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a process; an already known reference id keeps its entity.
    pub fn add_process(
        &mut self,
        ref_id: &str,
        name: &str,
        library: Option<&LibraryId>,
    ) -> ProcessDescriptor {
        if let Some(p) = self.processes.get(ref_id) {
            return p.clone();
        }
        let mut p = ProcessDescriptor::new(self.next(), ref_id, name);
        p.library = library.cloned();
        self.processes.insert(ref_id.to_string(), p.clone());
        p
    }

    pub fn add_flow(&mut self, ref_id: &str, name: &str) -> FlowDescriptor {
        if let Some(f) = self.flows.get(ref_id) {
            return f.clone();
        }
        let f = FlowDescriptor::new(self.next(), ref_id, name);
        self.flows.insert(ref_id.to_string(), f.clone());
        f
    }

    pub fn add_location(&mut self, ref_id: &str, code: &str) -> LocationDescriptor {
        if let Some(l) = self.locations.get(ref_id) {
            return l.clone();
        }
        let l = LocationDescriptor::new(self.next(), ref_id, code);
        self.locations.insert(ref_id.to_string(), l.clone());
        l
    }

    pub fn add_impact(&mut self, ref_id: &str, name: &str) -> ImpactDescriptor {
        if let Some(i) = self.impacts.get(ref_id) {
            return i.clone();
        }
        let i = ImpactDescriptor::new(self.next(), ref_id, name);
        self.impacts.insert(ref_id.to_string(), i.clone());
        i
    }

    /// Forget a process, e.g. to simulate a library whose products were
    /// removed from the database.
    pub fn remove_process(&mut self, ref_id: &str) -> Option<ProcessDescriptor> {
        self.processes.remove(ref_id)
    }
}

impl EntityStore for MemoryStore {
    fn process(&self, ref_id: &str) -> Option<ProcessDescriptor> {
        self.processes.get(ref_id).cloned()
    }

    fn flow(&self, ref_id: &str) -> Option<FlowDescriptor> {
        self.flows.get(ref_id).cloned()
    }

    fn location(&self, ref_id: &str) -> Option<LocationDescriptor> {
        self.locations.get(ref_id).cloned()
    }

    fn impact(&self, ref_id: &str) -> Option<ImpactDescriptor> {
        self.impacts.get(ref_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_per_ref_id() {
        let mut store = MemoryStore::new();
        let a = store.add_process("p1", "Process 1", None);
        let b = store.add_process("p1", "renamed", Some(&LibraryId::from("lib")));
        assert_eq!(a.id, b.id);
        assert!(b.library.is_none());

        let f = store.add_flow("f1", "Flow 1");
        assert_ne!(a.id, f.id);
        assert_eq!(store.flow("f1").map(|f| f.id), Some(f.id));
        assert!(store.impact("missing").is_none());
    }
}
