//! Per-provider memoization.
//!
//! Results keyed by a product position live in a fixed arena of fill-once
//! slots, one per position. Providers are used from one thread at a time, so
//! the cells are the unsynchronized kind.

use lb_core::Real;
use once_cell::unsync::OnceCell;

use crate::error::{CalcError, CalcResult};

/// Fill-once slots indexed by position.
#[derive(Debug)]
pub struct SlotCache<T> {
    slots: Vec<OnceCell<T>>,
}

impl<T> SlotCache<T> {
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| OnceCell::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_present(&self, position: usize) -> bool {
        self.slots.get(position).is_some_and(|s| s.get().is_some())
    }

    /// Value at `position`, computed by `init` on first access.
    pub fn get_or_try_init(
        &self,
        position: usize,
        init: impl FnOnce() -> CalcResult<T>,
    ) -> CalcResult<&T> {
        let slot = self.slots.get(position).ok_or(CalcError::UnknownProduct {
            position,
            size: self.slots.len(),
        })?;
        slot.get_or_try_init(init)
    }
}

/// Memoized aggregate results shared by all provider kinds.
#[derive(Debug)]
pub(crate) struct Memo {
    pub total_requirements: OnceCell<Vec<Real>>,
    pub total_flows: OnceCell<Option<Vec<Real>>>,
    pub total_impacts: OnceCell<Option<Vec<Real>>>,
    pub total_costs: OnceCell<Option<Real>>,
    pub flows_of_one: SlotCache<Option<Vec<Real>>>,
    pub impacts_of_one: SlotCache<Option<Vec<Real>>>,
    pub costs_of_one: SlotCache<Option<Real>>,
}

impl Memo {
    pub fn new(size: usize) -> Self {
        Self {
            total_requirements: OnceCell::new(),
            total_flows: OnceCell::new(),
            total_impacts: OnceCell::new(),
            total_costs: OnceCell::new(),
            flows_of_one: SlotCache::new(size),
            impacts_of_one: SlotCache::new(size),
            costs_of_one: SlotCache::new(size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn slot_is_filled_once() {
        let cache: SlotCache<Vec<Real>> = SlotCache::new(3);
        let calls = Cell::new(0);
        for _ in 0..2 {
            let v = cache
                .get_or_try_init(1, || {
                    calls.set(calls.get() + 1);
                    Ok(vec![1.0])
                })
                .unwrap();
            assert_eq!(v, &vec![1.0]);
        }
        assert_eq!(calls.get(), 1);
        assert!(cache.is_present(1));
        assert!(!cache.is_present(0));
    }

    #[test]
    fn out_of_range_position() {
        let cache: SlotCache<Real> = SlotCache::new(2);
        let err = cache.get_or_try_init(5, || Ok(0.0)).unwrap_err();
        assert!(matches!(err, CalcError::UnknownProduct { position: 5, size: 2 }));
    }
}
