use alloc::collections::BTreeSet;

use uni_virtualizer::{ResizeObserver, SlotId};

/// A [`ResizeObserver`] that only remembers what it was asked to watch.
///
/// Hosts without change notifications poll: read the sizes of [`PollingObserver::observed`]
/// slots and report them through `Virtualizer::slots_resized`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PollingObserver {
    container: bool,
    slots: BTreeSet<SlotId>,
}

impl PollingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observes_container(&self) -> bool {
        self.container
    }

    pub fn observed(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.slots.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl ResizeObserver for PollingObserver {
    fn observe_container(&mut self) {
        self.container = true;
    }

    fn observe_slot(&mut self, slot: SlotId) {
        self.slots.insert(slot);
    }

    fn unobserve_slot(&mut self, slot: SlotId) {
        self.slots.remove(&slot);
    }

    fn disconnect(&mut self) {
        self.container = false;
        self.slots.clear();
    }
}
