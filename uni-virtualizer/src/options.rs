use alloc::sync::Arc;

use crate::{Direction, ItemKey, ScrollToIndex, Size};

/// Configuration for [`crate::Layout1d`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LayoutOptions {
    pub total_items: usize,
    /// Size used for items that have not been measured yet, until the running estimate exists.
    pub item_size: Size,
    /// Space between adjacent items.
    pub spacing: f64,
    pub direction: Direction,
    /// Extra pixels rendered beyond each edge of the viewport.
    pub overhang: f64,
    /// How close (in px) the physical window must come to either end of the scroll extent before
    /// the start/end error correction applies.
    pub edge_slack: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            total_items: 0,
            item_size: Size::new(100.0, 100.0),
            spacing: 0.0,
            direction: Direction::Vertical,
            overhang: 150.0,
            edge_slack: 0.0,
        }
    }
}

impl LayoutOptions {
    pub fn new(total_items: usize) -> Self {
        Self {
            total_items,
            ..Self::default()
        }
    }

    pub fn with_item_size(mut self, item_size: Size) -> Self {
        self.item_size = item_size;
        self
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_overhang(mut self, overhang: f64) -> Self {
        self.overhang = overhang;
        self
    }

    pub fn with_edge_slack(mut self, edge_slack: f64) -> Self {
        self.edge_slack = edge_slack;
        self
    }
}

/// Configuration for [`crate::Virtualizer`].
///
/// Cheap to clone: the key function lives in an `Arc`.
pub struct VirtualizerOptions<K = ItemKey> {
    pub layout: LayoutOptions,
    /// Stable identity for the item at an index. Slots follow keys, so a reordered item keeps
    /// its rendered slot.
    pub get_item_key: Arc<dyn Fn(usize) -> K + Send + Sync>,
    /// Upper bound on released slots kept for reuse; extra slots are destroyed.
    pub max_pooled_slots: usize,
    /// Initial scroll-to request, consumed by the first reflow.
    pub scroll_to_index: Option<ScrollToIndex>,
}

impl<K> Clone for VirtualizerOptions<K> {
    fn clone(&self) -> Self {
        Self {
            layout: self.layout,
            get_item_key: Arc::clone(&self.get_item_key),
            max_pooled_slots: self.max_pooled_slots,
            scroll_to_index: self.scroll_to_index,
        }
    }
}

impl VirtualizerOptions<ItemKey> {
    /// Creates options for a list keyed by index (`ItemKey = u64`).
    pub fn new(total_items: usize) -> Self {
        Self::new_with_key(total_items, |i| i as u64)
    }
}

impl<K> VirtualizerOptions<K> {
    /// Creates options with a custom key mapping.
    pub fn new_with_key(
        total_items: usize,
        get_item_key: impl Fn(usize) -> K + Send + Sync + 'static,
    ) -> Self {
        Self {
            layout: LayoutOptions::new(total_items),
            get_item_key: Arc::new(get_item_key),
            max_pooled_slots: 64,
            scroll_to_index: None,
        }
    }

    pub fn with_layout(mut self, layout: LayoutOptions) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_get_item_key(
        mut self,
        get_item_key: impl Fn(usize) -> K + Send + Sync + 'static,
    ) -> Self {
        self.get_item_key = Arc::new(get_item_key);
        self
    }

    pub fn with_item_size(mut self, item_size: Size) -> Self {
        self.layout.item_size = item_size;
        self
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.layout.spacing = spacing;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.layout.direction = direction;
        self
    }

    pub fn with_overhang(mut self, overhang: f64) -> Self {
        self.layout.overhang = overhang;
        self
    }

    pub fn with_max_pooled_slots(mut self, max_pooled_slots: usize) -> Self {
        self.max_pooled_slots = max_pooled_slots;
        self
    }

    pub fn with_scroll_to_index(mut self, scroll_to_index: Option<ScrollToIndex>) -> Self {
        self.scroll_to_index = scroll_to_index;
        self
    }
}

impl<K> core::fmt::Debug for VirtualizerOptions<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VirtualizerOptions")
            .field("layout", &self.layout)
            .field("max_pooled_slots", &self.max_pooled_slots)
            .field("scroll_to_index", &self.scroll_to_index)
            .finish_non_exhaustive()
    }
}
