use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::host::Host;
use crate::key::SlotKey;
use crate::layout::Layout1d;
use crate::pool::RecyclePool;
use crate::resize::{NoopResizeObserver, ResizeCoordinator, ResizeObserver, ResizeTarget};
use crate::scheduler::Scheduler;
use crate::{
    Direction, ItemBox, ItemKey, LayoutEvent, Position, RangeChange, Result, ScrollToIndex,
    ScrollToPosition, Size, SlotId, VirtualizerOptions, VisibleRange,
};

type RangeListener = Box<dyn FnMut(&VisibleRange)>;

/// Handle returned by [`Virtualizer::add_range_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Couples a [`Layout1d`] with a [`RecyclePool`] and drives a [`Host`].
///
/// Inputs (scrolls, resizes, data changes) are requests; nothing happens until the host calls
/// [`Virtualizer::tick`] (or [`Virtualizer::run_until_idle`]). Every request method returns `true`
/// when it made a tick pending, which is when a host should arrange a callback.
///
/// A tick runs, in order: viewport refresh, scroll-to, at most one reflow, container sizing and
/// scroll correction, one render of the recycled slots, slot positioning, and measurement of
/// newly bound slots. Measurements feed the next tick.
pub struct Virtualizer<H, R: ResizeObserver = NoopResizeObserver, K = ItemKey> {
    options: VirtualizerOptions<K>,
    host: H,
    observer: R,
    layout: Layout1d,
    pool: RecyclePool<K>,
    resize: ResizeCoordinator,
    scheduler: Scheduler,

    pending_positions: BTreeMap<usize, Position>,
    remeasure_after_render: bool,
    visible: Option<VisibleRange>,

    listeners: Vec<(ListenerId, RangeListener)>,
    next_listener: u64,
}

impl<H: Host, K: SlotKey> Virtualizer<H, NoopResizeObserver, K> {
    /// Creates a virtualizer for a host without resize notifications.
    pub fn new(host: H, options: VirtualizerOptions<K>) -> Self {
        Self::with_observer(host, NoopResizeObserver, options)
    }
}

impl<H: Host, R: ResizeObserver, K: SlotKey> Virtualizer<H, R, K> {
    pub fn with_observer(host: H, mut observer: R, options: VirtualizerOptions<K>) -> Self {
        vdebug!(
            total_items = options.layout.total_items,
            max_pooled_slots = options.max_pooled_slots,
            "Virtualizer::new"
        );
        let mut pool = RecyclePool::new(options.max_pooled_slots);
        pool.set_total_items(options.layout.total_items);
        observer.observe_container();

        let mut scheduler = Scheduler::new();
        scheduler.request_update_view();
        if let Some(request) = options.scroll_to_index {
            scheduler.request_scroll_to(request);
        }

        Self {
            layout: Layout1d::new(options.layout),
            options,
            host,
            observer,
            pool,
            resize: ResizeCoordinator::new(),
            scheduler,
            pending_positions: BTreeMap::new(),
            remeasure_after_render: false,
            visible: None,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn options(&self) -> &VirtualizerOptions<K> {
        &self.options
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn observer(&self) -> &R {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut R {
        &mut self.observer
    }

    pub fn layout(&self) -> &Layout1d {
        &self.layout
    }

    pub fn pool(&self) -> &RecyclePool<K> {
        &self.pool
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Whether a tick is pending.
    pub fn is_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// The last range reported to listeners.
    pub fn visible_range(&self) -> Option<VisibleRange> {
        self.visible
    }

    pub fn total_items(&self) -> usize {
        self.options.layout.total_items
    }

    pub fn set_total_items(&mut self, total_items: usize) -> bool {
        if total_items == self.options.layout.total_items {
            return false;
        }
        self.options.layout.total_items = total_items;
        self.layout.set_total_items(total_items);
        self.pool.set_total_items(total_items);
        self.scheduler.schedule()
    }

    pub fn set_item_size(&mut self, item_size: Size) -> bool {
        self.options.layout.item_size = item_size;
        self.layout.set_item_size(item_size);
        self.schedule_if_needed()
    }

    pub fn set_spacing(&mut self, spacing: f64) -> bool {
        self.options.layout.spacing = spacing;
        self.layout.set_spacing(spacing);
        self.schedule_if_needed()
    }

    pub fn set_overhang(&mut self, overhang: f64) -> bool {
        self.options.layout.overhang = overhang;
        self.layout.set_overhang(overhang);
        self.schedule_if_needed()
    }

    /// Switches the scroll axis; everything is re-measured.
    pub fn set_direction(&mut self, direction: Direction) -> bool {
        if direction == self.options.layout.direction {
            return false;
        }
        self.options.layout.direction = direction;
        self.layout.set_direction(direction);
        self.scheduler.request_reset()
    }

    /// Replaces the key mapping, e.g. after the host's data was reordered.
    ///
    /// Slots stay bound to the keys they were rendered for, so items that kept their key keep
    /// their slot on the next (reset) render.
    pub fn set_get_item_key(
        &mut self,
        get_item_key: impl Fn(usize) -> K + Send + Sync + 'static,
    ) -> bool {
        self.options.get_item_key = alloc::sync::Arc::new(get_item_key);
        self.scheduler.request_reset()
    }

    /// The host's scroll offset or viewport changed.
    pub fn request_update_view(&mut self) -> bool {
        self.scheduler.request_update_view()
    }

    /// Re-walks every slot on the next tick.
    pub fn request_reset(&mut self) -> bool {
        self.scheduler.request_reset()
    }

    /// Re-measures every rendered slot on the next tick.
    pub fn request_remeasure(&mut self) -> bool {
        self.scheduler.request_remeasure()
    }

    pub fn request_scroll_to_index(&mut self, request: ScrollToIndex) -> bool {
        self.scheduler.request_scroll_to(request)
    }

    /// Like [`Self::request_scroll_to_index`], with the position given by name.
    pub fn request_scroll_to_index_str(&mut self, index: usize, position: &str) -> Result<bool> {
        let position: ScrollToPosition = position.parse()?;
        Ok(self.request_scroll_to_index(ScrollToIndex::new(index, position)))
    }

    /// Reports a new content-box size of the scroll container.
    pub fn container_resized(&mut self, size: Size) -> bool {
        match self.resize.container_resized(size) {
            Some(_) => self.scheduler.request_update_view(),
            None => false,
        }
    }

    /// Reports new sizes of rendered slots. Only slots whose size changed are re-measured.
    pub fn slots_resized(&mut self, entries: impl IntoIterator<Item = (SlotId, Size)>) -> bool {
        let Some(ResizeTarget::Slots(slots)) = self.resize.slots_resized(entries) else {
            return false;
        };
        let mut any = false;
        for slot in slots {
            if let Some(index) = self.pool.index_of(slot) {
                self.layout.invalidate_item(index);
                any |= self.pool.remeasure(slot);
            }
        }
        any && self.scheduler.schedule()
    }

    /// Registers a callback for range changes. It runs during [`Self::tick`] and never sees the
    /// engine itself.
    pub fn add_range_listener(
        &mut self,
        listener: impl FnMut(&VisibleRange) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_range_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(i, _)| *i != id);
        self.listeners.len() != before
    }

    /// Runs one tick. Returns whether another tick is pending.
    ///
    /// A host factory failure is returned after the rest of the tick ran; the failed index is
    /// retried by the next tick.
    pub fn tick(&mut self) -> Result<bool> {
        let work = self.scheduler.begin_tick();
        vtrace!(
            update_view = work.update_view,
            reset = work.reset,
            remeasure = work.remeasure,
            "Virtualizer::tick"
        );

        if work.reset {
            self.pool.request_reset();
            self.layout.forget_emitted_positions();
            self.pending_positions.clear();
        }
        if work.update_view {
            self.update_view();
        }
        if let Some(request) = work.scroll_to {
            self.layout.scroll_to_index(request);
        } else {
            self.layout.reflow_if_needed();
        }
        if work.remeasure {
            self.remeasure_after_render = true;
        }
        self.apply_layout_events();

        let rendered = self
            .pool
            .render(&mut self.host, &*self.options.get_item_key);
        if let Err(_err) = &rendered {
            vwarn!(error = %_err, "render failed");
        }
        if self.pool.needs_reset() {
            self.layout.forget_emitted_positions();
        }

        self.position_slots();
        self.resize.begin_render();
        self.measure_slots();
        self.sync_observed();

        if self.layout.pending_reflow() || self.pool.has_pending_render() {
            self.scheduler.schedule();
        }
        rendered.map(|()| self.scheduler.is_pending())
    }

    /// Ticks until nothing is pending or `max_ticks` ran. Returns the number of ticks.
    pub fn run_until_idle(&mut self, max_ticks: usize) -> Result<usize> {
        let mut ticks = 0;
        while ticks < max_ticks && self.scheduler.is_pending() {
            self.tick()?;
            ticks += 1;
        }
        Ok(ticks)
    }

    /// Destroys every slot and forgets all layout state.
    pub fn clear(&mut self) {
        vdebug!("Virtualizer::clear");
        self.pool.clear(&mut self.host);
        self.observer.disconnect();
        self.observer.observe_container();
        self.resize.clear();
        self.layout.reset();
        self.pending_positions.clear();
        self.visible = None;
        self.host.size_container(None);
        self.scheduler.request_update_view();
    }

    fn schedule_if_needed(&mut self) -> bool {
        self.layout.pending_reflow() && self.scheduler.schedule()
    }

    fn update_view(&mut self) {
        let (size, scroll) = self.host.viewport();
        self.layout.set_viewport_size(size);
        self.layout.set_viewport_scroll(scroll);
    }

    fn apply_layout_events(&mut self) {
        for event in self.layout.take_events() {
            match event {
                LayoutEvent::RangeChange(change) => self.adjust_range(change),
                LayoutEvent::ScrollSizeChange(size) => self.host.size_container(Some(size)),
                LayoutEvent::ScrollErrorChange(error) => {
                    vtrace!(top = error.top, left = error.left, "correct_scroll_error");
                    self.host.correct_scroll_error(error);
                }
                LayoutEvent::ItemPositionChange(positions) => {
                    self.pending_positions.extend(positions);
                }
            }
        }
        match self.layout.range() {
            Some(range) => self.pending_positions.retain(|i, _| range.contains(*i)),
            None => self.pending_positions.clear(),
        }
    }

    fn adjust_range(&mut self, change: RangeChange) {
        match change.range {
            Some(range) => self.pool.set_range(range.first, range.len()),
            None => self.pool.set_range(0, 0),
        }
        self.pool.set_incremental(!change.stable);

        if change.remeasure {
            self.remeasure_after_render = true;
            return;
        }
        let next = change.range.map(|range| VisibleRange {
            first: range.first,
            last: range.last,
            first_visible: change.first_visible,
            last_visible: change.last_visible,
        });
        let visible_changed = next.map(|n| (n.first_visible, n.last_visible))
            != self.visible.map(|v| (v.first_visible, v.last_visible));
        if change.stable || visible_changed {
            self.notify_range(next);
        }
    }

    fn notify_range(&mut self, range: Option<VisibleRange>) {
        self.visible = range;
        let Some(range) = range else {
            return;
        };
        for (_, listener) in &mut self.listeners {
            listener(&range);
        }
    }

    fn position_slots(&mut self) {
        let pending = core::mem::take(&mut self.pending_positions);
        for (index, position) in pending {
            match self.pool.slot_for(index) {
                Some(slot) => self.host.position_slot(slot, position),
                None => {
                    self.pending_positions.insert(index, position);
                }
            }
        }
    }

    fn measure_slots(&mut self) {
        if core::mem::take(&mut self.remeasure_after_render) {
            self.pool.remeasure_all();
        }
        let to_measure = self.pool.take_to_measure();
        if to_measure.is_empty() {
            return;
        }

        let mut measured: Vec<(usize, ItemBox)> = Vec::with_capacity(to_measure.len());
        for (slot, index) in to_measure {
            // A rebound slot keeps whatever position its previous index had.
            self.host
                .position_slot(slot, self.layout.item_position(index));
            let item_box = self.host.measure(slot);
            if self.resize.track(slot, Size::new(item_box.width, item_box.height)) {
                self.observer.observe_slot(slot);
            }
            measured.push((index, item_box));
        }
        vtrace!(count = measured.len(), "measure_slots");
        self.layout
            .update_item_sizes(measured.iter().map(|(index, item_box)| (*index, item_box)));
    }

    /// Stops observing slots that are no longer active.
    fn sync_observed(&mut self) {
        let stale: Vec<SlotId> = self
            .resize
            .observed()
            .filter(|slot| self.pool.index_of(*slot).is_none())
            .collect();
        for slot in stale {
            self.resize.forget(slot);
            self.observer.unobserve_slot(slot);
        }
    }
}

impl<H, R: ResizeObserver, K> Drop for Virtualizer<H, R, K> {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

impl<H, R: ResizeObserver, K> core::fmt::Debug for Virtualizer<H, R, K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Virtualizer")
            .field("layout", &self.layout)
            .field("visible", &self.visible)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
