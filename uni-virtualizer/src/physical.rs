use alloc::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PhysicalItem {
    pub(crate) pos: f64,
    pub(crate) size: f64,
}

/// Current + staging physical item maps held in a two-slot arena.
///
/// A reflow writes into the staging buffer. Committing a stable pass flips which buffer is
/// current and clears the new staging buffer; `generation` counts commits.
#[derive(Clone, Debug, Default)]
pub(crate) struct PhysicalItems {
    buffers: [BTreeMap<usize, PhysicalItem>; 2],
    current: usize,
    generation: u64,
}

impl PhysicalItems {
    fn staging_slot(&self) -> usize {
        self.current ^ 1
    }

    pub(crate) fn current(&self) -> &BTreeMap<usize, PhysicalItem> {
        &self.buffers[self.current]
    }

    pub(crate) fn staging(&self) -> &BTreeMap<usize, PhysicalItem> {
        &self.buffers[self.staging_slot()]
    }

    pub(crate) fn stage(&mut self, index: usize, item: PhysicalItem) {
        let slot = self.staging_slot();
        self.buffers[slot].insert(index, item);
    }

    pub(crate) fn staging_mut(&mut self) -> &mut BTreeMap<usize, PhysicalItem> {
        let slot = self.staging_slot();
        &mut self.buffers[slot]
    }

    /// Staging wins over current: it holds the most recent (possibly provisional) pass.
    pub(crate) fn get(&self, index: usize) -> Option<&PhysicalItem> {
        self.staging()
            .get(&index)
            .or_else(|| self.current().get(&index))
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut PhysicalItem> {
        let staging = self.staging_slot();
        if self.buffers[staging].contains_key(&index) {
            return self.buffers[staging].get_mut(&index);
        }
        self.buffers[self.current].get_mut(&index)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    /// Promotes staging to current.
    pub(crate) fn commit(&mut self) {
        self.current = self.staging_slot();
        let stale = self.staging_slot();
        self.buffers[stale].clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Drops everything in both buffers (used when the active range becomes empty).
    pub(crate) fn clear(&mut self) {
        self.buffers[0].clear();
        self.buffers[1].clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}
