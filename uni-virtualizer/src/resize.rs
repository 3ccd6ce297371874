use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use crate::{Size, SlotId};

/// Resize-observation capability, injected into the engine at construction.
///
/// Implementations report changes back through [`crate::Virtualizer::container_resized`] and
/// [`crate::Virtualizer::slots_resized`]. A freshly observed slot is expected to report its size
/// once right away.
pub trait ResizeObserver {
    fn observe_container(&mut self) {}

    fn observe_slot(&mut self, slot: SlotId);

    fn unobserve_slot(&mut self, slot: SlotId);

    /// Stops all observation. Called when the engine is dropped or cleared.
    fn disconnect(&mut self);
}

/// An observer for hosts without resize notifications.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoopResizeObserver;

impl ResizeObserver for NoopResizeObserver {
    fn observe_slot(&mut self, _slot: SlotId) {}

    fn unobserve_slot(&mut self, _slot: SlotId) {}

    fn disconnect(&mut self) {}
}

/// What a resize notification changed.
#[derive(Clone, Debug, PartialEq)]
pub enum ResizeTarget {
    Container(Size),
    /// Slots whose size changed and need a targeted remeasure.
    Slots(Vec<SlotId>),
}

/// Filters resize notifications down to the ones that need layout work.
///
/// Slots are compared against the last size seen for them, so a move without a size change is
/// ignored. The first report from slots observed during the last render is swallowed once, by the
/// next notification.
#[derive(Clone, Debug, Default)]
pub struct ResizeCoordinator {
    container: Option<Size>,
    sizes: BTreeMap<SlotId, Size>,
    fresh: BTreeSet<SlotId>,
}

impl ResizeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observed(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.sizes.keys().copied()
    }

    /// Starts a new render: slots tracked from now on get their first report swallowed.
    pub fn begin_render(&mut self) {
        self.fresh.clear();
    }

    pub fn is_observing(&self, slot: SlotId) -> bool {
        self.sizes.contains_key(&slot)
    }

    /// Records the just-measured size of `slot`. Returns `true` if the slot was not observed
    /// before.
    pub fn track(&mut self, slot: SlotId, size: Size) -> bool {
        let fresh = self.sizes.insert(slot, size).is_none();
        if fresh {
            self.fresh.insert(slot);
        }
        fresh
    }

    pub fn forget(&mut self, slot: SlotId) -> bool {
        self.fresh.remove(&slot);
        self.sizes.remove(&slot).is_some()
    }

    pub fn clear(&mut self) {
        self.container = None;
        self.sizes.clear();
        self.fresh.clear();
    }

    /// The last container size seen, if any.
    pub fn container(&self) -> Option<Size> {
        self.container
    }

    pub fn container_resized(&mut self, size: Size) -> Option<ResizeTarget> {
        if self.container == Some(size) {
            return None;
        }
        vtrace!(width = size.width, height = size.height, "container_resized");
        self.container = Some(size);
        Some(ResizeTarget::Container(size))
    }

    pub fn slots_resized(
        &mut self,
        entries: impl IntoIterator<Item = (SlotId, Size)>,
    ) -> Option<ResizeTarget> {
        let fresh = core::mem::take(&mut self.fresh);
        let mut changed = Vec::new();
        for (slot, size) in entries {
            let Some(prev) = self.sizes.get_mut(&slot) else {
                continue;
            };
            if *prev == size {
                continue;
            }
            *prev = size;
            if fresh.contains(&slot) {
                vtrace!(slot = slot.0, "slots_resized: initial report");
                continue;
            }
            changed.push(slot);
        }
        if changed.is_empty() {
            return None;
        }
        vdebug!(count = changed.len(), "slots_resized");
        Some(ResizeTarget::Slots(changed))
    }
}
