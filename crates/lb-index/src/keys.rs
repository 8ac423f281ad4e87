//! Index keys.

use std::hash::{Hash, Hasher};

use lb_core::LibraryId;

use crate::descriptor::{FlowDescriptor, LocationDescriptor, ProcessDescriptor};

/// A process-product pair: one row/column of the technology matrix.
///
/// Waste treatment is modelled the same way with the waste flow as `flow`.
#[derive(Debug, Clone)]
pub struct TechFlow {
    pub provider: ProcessDescriptor,
    pub flow: FlowDescriptor,
}

impl TechFlow {
    pub fn of(provider: ProcessDescriptor, flow: FlowDescriptor) -> Self {
        Self { provider, flow }
    }

    /// The library that owns the provider, if any.
    pub fn library(&self) -> Option<&LibraryId> {
        self.provider.library.as_ref()
    }

    pub fn is_from_library(&self) -> bool {
        self.provider.library.is_some()
    }
}

impl PartialEq for TechFlow {
    fn eq(&self, other: &Self) -> bool {
        self.provider.id == other.provider.id && self.flow.id == other.flow.id
    }
}

impl Eq for TechFlow {}

impl Hash for TechFlow {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider.id.hash(state);
        self.flow.id.hash(state);
    }
}

/// An elementary flow, optionally paired with a location: one row of the
/// intervention matrix.
#[derive(Debug, Clone)]
pub struct EnviFlow {
    pub flow: FlowDescriptor,
    pub location: Option<LocationDescriptor>,
    pub is_input: bool,
}

impl EnviFlow {
    pub fn output_of(flow: FlowDescriptor, location: Option<LocationDescriptor>) -> Self {
        Self {
            flow,
            location,
            is_input: false,
        }
    }

    pub fn input_of(flow: FlowDescriptor, location: Option<LocationDescriptor>) -> Self {
        Self {
            flow,
            location,
            is_input: true,
        }
    }

    /// The same flow without its location.
    pub fn without_location(&self) -> Self {
        Self {
            flow: self.flow.clone(),
            location: None,
            is_input: self.is_input,
        }
    }
}

impl PartialEq for EnviFlow {
    fn eq(&self, other: &Self) -> bool {
        self.flow.id == other.flow.id
            && self.location.as_ref().map(|l| l.id) == other.location.as_ref().map(|l| l.id)
    }
}

impl Eq for EnviFlow {}

impl Hash for EnviFlow {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.flow.id.hash(state);
        self.location.as_ref().map(|l| l.id).hash(state);
    }
}
