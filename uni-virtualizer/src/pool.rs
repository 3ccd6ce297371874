use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::ToString;
use alloc::vec::Vec;

use crate::host::Host;
use crate::key::{KeySlotMap, SlotKey};
use crate::{Error, IndexRange, Result, SlotId};

/// Binds item indexes to reusable host slots.
///
/// Slots that leave the window are hidden and retained under their item key, so an item that
/// comes back (or moves to a new index) in the same batch gets its old slot back. When a batch
/// ends (a non-incremental render) retained slots are released into a bounded free list.
#[derive(Debug)]
pub struct RecyclePool<K> {
    total_items: usize,
    window: Option<IndexRange>,
    rendered: Option<IndexRange>,

    active: BTreeMap<SlotId, usize>,
    ordered: VecDeque<SlotId>,
    /// Key and last bound index of every active or retained slot.
    keys: BTreeMap<SlotId, (K, usize)>,
    key_to_slot: KeySlotMap<K>,
    retained: Vec<SlotId>,
    free: Vec<SlotId>,
    max_pooled_slots: usize,
    next_slot: u32,

    needs_reset: bool,
    incremental: bool,
    to_measure: Vec<(SlotId, usize)>,
}

impl<K: SlotKey> RecyclePool<K> {
    pub fn new(max_pooled_slots: usize) -> Self {
        Self {
            total_items: 0,
            window: None,
            rendered: None,
            active: BTreeMap::new(),
            ordered: VecDeque::new(),
            keys: BTreeMap::new(),
            key_to_slot: KeySlotMap::default(),
            retained: Vec::new(),
            free: Vec::new(),
            max_pooled_slots,
            next_slot: 0,
            needs_reset: false,
            incremental: false,
            to_measure: Vec::new(),
        }
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn set_total_items(&mut self, total_items: usize) {
        self.total_items = total_items;
        if let Some(window) = self.window {
            self.set_range(window.first, window.len());
        }
    }

    /// Records the window to render next. `first` is clamped so the window fits in
    /// `total_items`.
    pub fn set_range(&mut self, first: usize, num: usize) {
        let num = num.min(self.total_items);
        if num == 0 {
            self.window = None;
            return;
        }
        let first = first.min(self.total_items - num);
        self.window = Some(IndexRange::new(first, first + num - 1));
    }

    pub fn window(&self) -> Option<IndexRange> {
        self.window
    }

    /// The window as of the last successful render.
    pub fn rendered(&self) -> Option<IndexRange> {
        self.rendered
    }

    /// While incremental, released slots stay retained by key instead of returning to the free
    /// list. Cleared by the layout once a pass is stable.
    pub fn set_incremental(&mut self, incremental: bool) {
        self.incremental = incremental;
    }

    pub fn is_incremental(&self) -> bool {
        self.incremental
    }

    /// Forces the next render to re-walk the whole window.
    pub fn request_reset(&mut self) {
        self.needs_reset = true;
    }

    pub fn needs_reset(&self) -> bool {
        self.needs_reset
    }

    pub fn has_pending_render(&self) -> bool {
        self.needs_reset || self.window != self.rendered
    }

    /// Queues every active slot for measurement.
    pub fn remeasure_all(&mut self) {
        self.to_measure = self.iter().map(|(i, s)| (s, i)).collect();
    }

    /// Queues one slot for measurement. Returns `false` when the slot is not active.
    pub fn remeasure(&mut self, slot: SlotId) -> bool {
        let Some(&index) = self.active.get(&slot) else {
            return false;
        };
        if !self.to_measure.iter().any(|(s, _)| *s == slot) {
            self.to_measure.push((slot, index));
        }
        true
    }

    /// Slots that entered the window (or were queued by a remeasure) since the last call.
    pub fn take_to_measure(&mut self) -> Vec<(SlotId, usize)> {
        core::mem::take(&mut self.to_measure)
    }

    pub fn index_of(&self, slot: SlotId) -> Option<usize> {
        self.active.get(&slot).copied()
    }

    pub fn slot_for(&self, index: usize) -> Option<SlotId> {
        let first = self.rendered?.first;
        let offset = index.checked_sub(first)?;
        self.ordered.get(offset).copied()
    }

    /// Active `(index, slot)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, SlotId)> + '_ {
        self.ordered
            .iter()
            .filter_map(|slot| self.active.get(slot).map(|&index| (index, *slot)))
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Number of slots ever created by the host factory.
    pub fn created(&self) -> u32 {
        self.next_slot
    }

    /// Brings the host's slots in line with the window.
    ///
    /// On a factory failure the slots bound so far stay consistent, the error is returned and a
    /// reset is requested so the next render retries.
    pub fn render<H: Host>(&mut self, host: &mut H, key_of: &dyn Fn(usize) -> K) -> Result<()> {
        let result = match (self.rendered, self.window) {
            _ if self.needs_reset => self.reset(host, key_of),
            (Some(prev), Some(next)) if prev == next => Ok(()),
            (Some(prev), Some(next)) if prev.last >= next.first && next.last >= prev.first => {
                self.update(host, key_of, prev, next)
            }
            _ => self.reset(host, key_of),
        };

        match result {
            Ok(()) => {
                self.rendered = self.window;
                self.needs_reset = false;
                if !self.incremental {
                    self.flush_retained(host);
                }
            }
            Err(_) => {
                vwarn!("render failed; next render resets");
                self.needs_reset = true;
            }
        }
        result
    }

    /// Unbinds everything and destroys every slot.
    pub fn clear<H: Host>(&mut self, host: &mut H) {
        let slots: Vec<SlotId> = self
            .ordered
            .drain(..)
            .chain(self.retained.drain(..))
            .chain(self.free.drain(..))
            .collect();
        for slot in slots {
            host.remove_slot(slot);
        }
        self.active.clear();
        self.keys.clear();
        self.key_to_slot.clear();
        self.to_measure.clear();
        self.rendered = None;
        self.needs_reset = false;
    }

    fn update<H: Host>(
        &mut self,
        host: &mut H,
        key_of: &dyn Fn(usize) -> K,
        prev: IndexRange,
        next: IndexRange,
    ) -> Result<()> {
        vtrace!(
            prev_first = prev.first,
            prev_last = prev.last,
            first = next.first,
            last = next.last,
            "RecyclePool::update"
        );
        while let Some(&slot) = self.ordered.front() {
            match self.active.get(&slot) {
                Some(&index) if index < next.first => {
                    self.ordered.pop_front();
                    self.unassign(host, slot);
                }
                _ => break,
            }
        }
        while let Some(&slot) = self.ordered.back() {
            match self.active.get(&slot) {
                Some(&index) if index > next.last => {
                    self.ordered.pop_back();
                    self.unassign(host, slot);
                }
                _ => break,
            }
        }

        let head_end = prev.first.min(next.last + 1);
        for index in (next.first..head_end).rev() {
            let slot = self.assign(host, key_of, index, false)?;
            host.insert_before(slot, self.ordered.front().copied());
            self.ordered.push_front(slot);
        }

        let tail_start = (prev.last + 1).max(next.first);
        for index in tail_start..=next.last {
            let slot = self.assign(host, key_of, index, false)?;
            let before = self.ordered.back().and_then(|&last| host.next_sibling(last));
            host.insert_before(slot, before);
            self.ordered.push_back(slot);
        }
        Ok(())
    }

    fn reset<H: Host>(&mut self, host: &mut H, key_of: &dyn Fn(usize) -> K) -> Result<()> {
        vdebug!(
            first = self.window.map(|w| w.first),
            last = self.window.map(|w| w.last),
            "RecyclePool::reset"
        );
        let mut cursor = self.ordered.front().copied();
        let prev: Vec<SlotId> = self.ordered.drain(..).collect();
        for slot in &prev {
            self.active.remove(slot);
            self.retained.push(*slot);
        }

        let result = self.walk(host, key_of, &mut cursor);

        for slot in prev {
            if !self.active.contains_key(&slot) {
                host.hide(slot);
            }
        }
        result
    }

    fn walk<H: Host>(
        &mut self,
        host: &mut H,
        key_of: &dyn Fn(usize) -> K,
        cursor: &mut Option<SlotId>,
    ) -> Result<()> {
        let Some(window) = self.window else {
            return Ok(());
        };
        for index in window.iter() {
            let slot = self.assign(host, key_of, index, true)?;
            let first = self.ordered.is_empty();
            self.ordered.push_back(slot);
            match *cursor {
                Some(at) if at == slot => *cursor = host.next_sibling(slot),
                Some(at) => host.insert_before(slot, Some(at)),
                // A still-attached first slot anchors the walk where it is.
                None if first && host.is_attached(slot) => *cursor = host.next_sibling(slot),
                None => host.insert_before(slot, None),
            }
        }
        Ok(())
    }

    /// Binds a slot to `index`: same key first, then the free list, then the host factory.
    /// A slot found by key is only re-bound when its index changed, unless `refresh` is set.
    fn assign<H: Host>(
        &mut self,
        host: &mut H,
        key_of: &dyn Fn(usize) -> K,
        index: usize,
        refresh: bool,
    ) -> Result<SlotId> {
        let key = key_of(index);

        if let Some(&slot) = self.key_to_slot.get(&key) {
            if !self.active.contains_key(&slot) {
                self.retained.retain(|s| *s != slot);
                let rebind =
                    refresh || self.keys.get(&slot).is_none_or(|(_, i)| *i != index);
                self.bind(host, slot, index, rebind);
                self.keys.insert(slot, (key, index));
                return Ok(slot);
            }
            vwarn!(index, "duplicate item key in the active window");
        }

        let slot = match self.free.pop() {
            Some(slot) => {
                self.bind(host, slot, index, true);
                slot
            }
            None => {
                let slot = SlotId(self.next_slot);
                host.create_slot(slot, index)
                    .map_err(|err| Error::SlotFactory {
                        index,
                        message: err.to_string(),
                    })?;
                self.next_slot += 1;
                self.active.insert(slot, index);
                self.to_measure.push((slot, index));
                slot
            }
        };
        self.keys.insert(slot, (key.clone(), index));
        self.key_to_slot.insert(key, slot);
        Ok(slot)
    }

    fn bind<H: Host>(&mut self, host: &mut H, slot: SlotId, index: usize, rebind: bool) {
        self.active.insert(slot, index);
        if rebind {
            host.update_slot(slot, index);
        }
        host.show(slot);
        self.to_measure.push((slot, index));
    }

    fn unassign<H: Host>(&mut self, host: &mut H, slot: SlotId) {
        self.active.remove(&slot);
        self.to_measure.retain(|(s, _)| *s != slot);
        host.hide(slot);
        self.retained.push(slot);
    }

    fn flush_retained<H: Host>(&mut self, host: &mut H) {
        for slot in core::mem::take(&mut self.retained) {
            if let Some((key, _)) = self.keys.remove(&slot) {
                if self.key_to_slot.get(&key) == Some(&slot) {
                    self.key_to_slot.remove(&key);
                }
            }
            host.recycle_slot(slot);
            if self.free.len() < self.max_pooled_slots {
                self.free.push(slot);
            } else {
                host.remove_slot(slot);
            }
        }
    }
}
