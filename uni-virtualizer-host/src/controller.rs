use alloc::sync::Arc;
use alloc::vec::Vec;

use uni_virtualizer::{
    Direction, ItemKey, ListenerId, Position, ScrollToIndex, ScrollToPosition, Size, SlotId,
    Virtualizer, VirtualizerOptions, VisibleRange,
};

use crate::{PollingObserver, RenderedItem, Result, TreeHost};

type KeyFn<I> = Arc<dyn Fn(&I) -> ItemKey + Send + Sync>;

/// Binds a list of items to a [`Virtualizer`] over a [`TreeHost`].
///
/// The controller owns the items (through the host) and keeps the engine's item count in sync:
/// the count is the number of items, optionally capped by [`ListController::set_total_items`].
/// Replacing the items re-renders every slot.
pub struct ListController<I, N> {
    virtualizer: Virtualizer<TreeHost<I, N>, PollingObserver>,
    total_items: Option<usize>,
    item_key: Option<KeyFn<I>>,
}

impl<I, N> ListController<I, N> {
    /// Takes over `host`. The item count and key mapping in `options` are replaced by the
    /// controller's.
    pub fn new(mut host: TreeHost<I, N>, options: VirtualizerOptions) -> Self {
        vdebug!(
            items = host.items().len(),
            insertion = ?host.insertion(),
            "ListController::new"
        );
        host.set_direction(options.layout.direction);
        let mut options = options.with_get_item_key(|i| i as ItemKey);
        options.layout.total_items = host.items().len();
        Self {
            virtualizer: Virtualizer::with_observer(host, PollingObserver::new(), options),
            total_items: None,
            item_key: None,
        }
    }

    pub fn virtualizer(&self) -> &Virtualizer<TreeHost<I, N>, PollingObserver> {
        &self.virtualizer
    }

    pub fn host(&self) -> &TreeHost<I, N> {
        self.virtualizer.host()
    }

    /// Direct access to the host. Changes made here are invisible to the engine until reported.
    pub fn host_mut(&mut self) -> &mut TreeHost<I, N> {
        self.virtualizer.host_mut()
    }

    pub fn items(&self) -> &[I] {
        self.host().items()
    }

    pub fn set_items(&mut self, items: Vec<I>) -> bool {
        vdebug!(count = items.len(), "set_items");
        self.virtualizer.host_mut().set_items(items);
        self.refresh_keys();
        self.sync_total_items();
        self.virtualizer.request_reset()
    }

    /// The number of items the engine lays out.
    pub fn total_items(&self) -> usize {
        self.virtualizer.total_items()
    }

    /// Caps the item count; `None` lays out every item.
    pub fn set_total_items(&mut self, total_items: Option<usize>) -> bool {
        self.total_items = total_items;
        self.sync_total_items()
    }

    /// Keys items by identity instead of index, so a reordered item keeps its slot.
    pub fn set_item_key(&mut self, item_key: impl Fn(&I) -> ItemKey + Send + Sync + 'static) {
        self.item_key = Some(Arc::new(item_key));
        self.refresh_keys();
    }

    pub fn set_direction(&mut self, direction: Direction) -> bool {
        self.virtualizer.host_mut().set_direction(direction);
        self.virtualizer.set_direction(direction)
    }

    pub fn scroll_to_index(&mut self, index: usize, position: ScrollToPosition) -> bool {
        self.virtualizer
            .request_scroll_to_index(ScrollToIndex::new(index, position))
    }

    /// Like [`Self::scroll_to_index`], with the position given by name.
    pub fn scroll_to_index_str(&mut self, index: usize, position: &str) -> Result<bool> {
        Ok(self.virtualizer.request_scroll_to_index_str(index, position)?)
    }

    /// The user scrolled to `offset`.
    pub fn scroll_to(&mut self, offset: Position) -> bool {
        self.virtualizer
            .host_mut()
            .scroll_target_mut()
            .set_scroll(offset);
        self.virtualizer.request_update_view()
    }

    /// The user scrolled by `delta` on the scroll axis.
    pub fn scroll_by(&mut self, delta: f64) -> bool {
        let target = self.virtualizer.host().scroll_target();
        let scroll = target.scroll();
        let offset = match self.virtualizer.host().direction() {
            Direction::Vertical => Position::new(scroll.top + delta, scroll.left),
            Direction::Horizontal => Position::new(scroll.top, scroll.left + delta),
        };
        self.scroll_to(offset)
    }

    /// The scrolling box changed size.
    pub fn on_viewport_resize(&mut self, size: Size) -> bool {
        self.virtualizer
            .host_mut()
            .scroll_target_mut()
            .set_size(size);
        self.virtualizer.container_resized(size)
    }

    /// Reads the current size of every observed slot and reports it to the engine.
    pub fn poll_resizes(&mut self) -> bool {
        let host = self.virtualizer.host();
        let entries: Vec<(SlotId, Size)> = self
            .virtualizer
            .observer()
            .observed()
            .filter_map(|slot| host.slot_size(slot).map(|size| (slot, size)))
            .collect();
        self.virtualizer.slots_resized(entries)
    }

    pub fn add_range_listener(
        &mut self,
        listener: impl FnMut(&VisibleRange) + 'static,
    ) -> ListenerId {
        self.virtualizer.add_range_listener(listener)
    }

    pub fn remove_range_listener(&mut self, id: ListenerId) -> bool {
        self.virtualizer.remove_range_listener(id)
    }

    pub fn visible_range(&self) -> Option<VisibleRange> {
        self.virtualizer.visible_range()
    }

    pub fn is_pending(&self) -> bool {
        self.virtualizer.is_pending()
    }

    pub fn tick(&mut self) -> Result<bool> {
        Ok(self.virtualizer.tick()?)
    }

    pub fn run_until_idle(&mut self, max_ticks: usize) -> Result<usize> {
        Ok(self.virtualizer.run_until_idle(max_ticks)?)
    }

    /// Visible items in document order.
    pub fn rendered(&self) -> Vec<RenderedItem<'_, N>> {
        self.host().rendered()
    }

    /// Destroys every rendered node and starts over.
    pub fn clear(&mut self) {
        self.virtualizer.clear();
    }

    fn sync_total_items(&mut self) -> bool {
        let len = self.items().len();
        let total = self.total_items.map_or(len, |cap| cap.min(len));
        self.virtualizer.set_total_items(total)
    }

    fn refresh_keys(&mut self) {
        let Some(item_key) = self.item_key.clone() else {
            return;
        };
        let keys: Arc<[ItemKey]> = self.items().iter().map(|item| item_key(item)).collect();
        vtrace!(count = keys.len(), "refresh_keys");
        self.virtualizer
            .set_get_item_key(move |i| keys.get(i).copied().unwrap_or(i as ItemKey));
    }
}

impl<I, N> core::fmt::Debug for ListController<I, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListController")
            .field("virtualizer", &self.virtualizer)
            .field("total_items", &self.total_items)
            .finish_non_exhaustive()
    }
}
