use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::mem;

use crate::metrics::MetricsStore;
use crate::physical::{PhysicalItem, PhysicalItems};
use crate::px;
use crate::{
    Direction, IndexRange, ItemBox, LayoutEvent, LayoutOptions, Position, RangeChange,
    ScrollToIndex, ScrollToPosition, Size,
};

/// The index whose position is trusted for a reflow; everything else is placed relative to it.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Anchor {
    pub index: usize,
    pub pos: f64,
}

/// A 1-D layout that positions a window of items around an anchor, estimating the sizes of items
/// it has not measured yet.
///
/// The layout is a deterministic state machine. Inputs arrive through setters which only
/// schedule work; [`Layout1d::reflow_if_needed`] runs a pass and queues [`LayoutEvent`]s that
/// callers drain with [`Layout1d::take_events`].
///
/// Coordinates are in the scroll axis of [`LayoutOptions::direction`]. A pass may move the
/// coordinate origin (see error correction); the amount is reported through
/// [`LayoutEvent::ScrollErrorChange`] so the real scroll container can follow.
#[derive(Clone, Debug)]
pub struct Layout1d {
    options: LayoutOptions,
    item_extent: f64,

    viewport: Size,
    scroll: Position,
    scroll_position: f64,
    scroll_size: f64,
    scroll_error: f64,

    physical: PhysicalItems,
    metrics: MetricsStore,
    physical_min: f64,
    physical_max: f64,

    anchor: Option<Anchor>,
    stable: bool,
    needs_remeasure: bool,
    pending_reflow: bool,
    scroll_to: Option<(usize, f64)>,

    range: Option<IndexRange>,
    first_visible: usize,
    last_visible: usize,
    emitted_positions: BTreeMap<usize, f64>,
    events: Vec<LayoutEvent>,
}

impl Layout1d {
    pub fn new(options: LayoutOptions) -> Self {
        vdebug!(
            total_items = options.total_items,
            overhang = options.overhang,
            "Layout1d::new"
        );
        Self {
            item_extent: options.direction.main(options.item_size),
            options,
            viewport: Size::default(),
            scroll: Position::default(),
            scroll_position: 0.0,
            scroll_size: 1.0,
            scroll_error: 0.0,
            physical: PhysicalItems::default(),
            metrics: MetricsStore::new(),
            physical_min: 0.0,
            physical_max: 0.0,
            anchor: None,
            stable: true,
            needs_remeasure: false,
            pending_reflow: true,
            scroll_to: None,
            range: None,
            first_visible: 0,
            last_visible: 0,
            emitted_positions: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn total_items(&self) -> usize {
        self.options.total_items
    }

    /// Updates the item count. Shrinking below the active window discards physical items and
    /// measurements, since the indexes no longer refer to the same items, and asks for the
    /// rendered items to be measured again.
    pub fn set_total_items(&mut self, total_items: usize) {
        if total_items == self.options.total_items {
            return;
        }
        let discontinuous = self.range.is_some_and(|r| r.last >= total_items);
        self.options.total_items = total_items;
        if discontinuous {
            vdebug!(total_items, "set_total_items: discarding physical items");
            self.clear_physical();
            self.metrics.clear();
            self.needs_remeasure = true;
        }
        self.schedule_reflow();
    }

    pub fn direction(&self) -> Direction {
        self.options.direction
    }

    /// Switches the scroll axis. Measurements along the old axis are dropped.
    pub fn set_direction(&mut self, direction: Direction) {
        if direction == self.options.direction {
            return;
        }
        self.options.direction = direction;
        self.reset();
    }

    pub fn item_size(&self) -> Size {
        self.options.item_size
    }

    /// Sets the default item size used before any item has been measured.
    pub fn set_item_size(&mut self, item_size: Size) {
        if item_size == self.options.item_size {
            return;
        }
        self.options.item_size = item_size;
        if self.metrics.measured_count() == 0 {
            self.item_extent = self.options.direction.main(item_size);
        }
        self.schedule_reflow();
    }

    pub fn spacing(&self) -> f64 {
        self.options.spacing
    }

    pub fn set_spacing(&mut self, spacing: f64) {
        if spacing == self.options.spacing {
            return;
        }
        self.options.spacing = spacing;
        self.schedule_reflow();
    }

    pub fn set_overhang(&mut self, overhang: f64) {
        if overhang == self.options.overhang {
            return;
        }
        self.options.overhang = overhang;
        self.schedule_reflow();
    }

    pub fn viewport_size(&self) -> Size {
        self.viewport
    }

    /// Updates the viewport. A cross-axis change invalidates measurements (items may reflow to
    /// new heights); a main-axis change only reflows when the rendered window no longer covers
    /// the viewport plus overhang.
    pub fn set_viewport_size(&mut self, viewport: Size) {
        let prev = self.viewport;
        self.viewport = viewport;
        let direction = self.options.direction;
        if direction.cross(prev) != direction.cross(viewport) {
            if direction.cross(prev) != 0.0 {
                self.needs_remeasure = true;
            }
            self.schedule_reflow();
        } else if direction.main(prev) != direction.main(viewport) {
            self.check_thresholds();
        }
    }

    pub fn viewport_scroll(&self) -> Position {
        self.scroll
    }

    /// Reports the real scroll offset of the container.
    ///
    /// A user scroll releases a previously pinned anchor: the next pass picks a new one inside
    /// the viewport.
    pub fn set_viewport_scroll(&mut self, scroll: Position) {
        self.scroll = scroll;
        let prev = self.scroll_position;
        self.scroll_position = self.options.direction.offset(scroll);
        if prev != self.scroll_position {
            vtrace!(
                from = prev,
                to = self.scroll_position,
                "set_viewport_scroll"
            );
            self.anchor = None;
            self.scroll_to = None;
            self.update_visible_indices(true);
        }
        self.check_thresholds();
    }

    pub fn scroll_position(&self) -> f64 {
        self.scroll_position
    }

    pub fn scroll_size(&self) -> f64 {
        self.scroll_size
    }

    pub fn range(&self) -> Option<IndexRange> {
        self.range
    }

    pub fn num(&self) -> usize {
        self.range.map_or(0, |r| r.len())
    }

    pub fn first_visible(&self) -> usize {
        self.first_visible
    }

    pub fn last_visible(&self) -> usize {
        self.last_visible
    }

    /// Whether the last pass used only measured sizes.
    pub fn is_stable(&self) -> bool {
        self.stable
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    pub fn metrics(&self) -> &MetricsStore {
        &self.metrics
    }

    /// The size assumed for unmeasured items.
    pub fn item_extent(&self) -> f64 {
        self.item_extent
    }

    /// Running size estimate; logs a warning and returns the configured default when nothing has
    /// been measured yet.
    pub fn estimated_item_size(&mut self) -> f64 {
        let default = self.options.direction.main(self.options.item_size);
        self.metrics.estimate_or(default)
    }

    /// Position of an item, estimated when it has never been laid out.
    pub fn item_position(&self, index: usize) -> Position {
        self.options
            .direction
            .position(self.position_of(index), 0.0)
    }

    /// Size of an item, estimated when it has never been measured.
    pub fn item_size_of(&self, index: usize) -> Size {
        let main = self.size_of(index).unwrap_or(self.item_extent);
        let cross = self.options.direction.cross(self.options.item_size);
        self.options.direction.size(main, cross)
    }

    /// Incremented every time a pass replaces the physical items.
    pub fn generation(&self) -> u64 {
        self.physical.generation()
    }

    pub fn pending_reflow(&self) -> bool {
        self.pending_reflow
    }

    pub fn schedule_reflow(&mut self) {
        self.pending_reflow = true;
    }

    /// Forces a remeasure of every active item on the next pass.
    pub fn request_remeasure(&mut self) {
        self.needs_remeasure = true;
        self.schedule_reflow();
    }

    /// Marks a measured item as stale so the next measurement replaces it.
    pub fn invalidate_item(&mut self, index: usize) -> bool {
        self.metrics.invalidate(index)
    }

    /// Forgets the last emitted positions so the next pass reports every active index.
    ///
    /// Call this when the consumer re-binds its rendered slots.
    pub fn forget_emitted_positions(&mut self) {
        self.emitted_positions.clear();
    }

    /// Drops physical items, measurements and the pinned anchor.
    pub fn reset(&mut self) {
        vdebug!(total_items = self.options.total_items, "Layout1d::reset");
        self.clear_physical();
        self.metrics.clear();
        self.item_extent = self.options.direction.main(self.options.item_size);
        self.scroll_size = 1.0;
        self.emitted_positions.clear();
        self.schedule_reflow();
    }

    /// Drains queued events.
    pub fn take_events(&mut self) -> Vec<LayoutEvent> {
        mem::take(&mut self.events)
    }

    /// Requests that `index` be scrolled into view at `position`. The request is consumed by the
    /// next reflow, which runs immediately, or by the first reflow with a non-empty viewport. A
    /// user scroll drops a request that is still pending.
    pub fn scroll_to_index(&mut self, request: ScrollToIndex) {
        let fraction = match request.position {
            ScrollToPosition::Start => 0.0,
            ScrollToPosition::Center => 0.5,
            ScrollToPosition::End => 1.0,
            ScrollToPosition::Nearest => {
                let past_middle = self
                    .range
                    .is_some_and(|r| request.index as f64 > r.first as f64 + r.len() as f64 / 2.0);
                if past_middle { 1.0 } else { 0.0 }
            }
        };
        vtrace!(index = request.index, fraction, "scroll_to_index");
        self.scroll_to = Some((request.index, fraction));
        self.schedule_reflow();
        self.reflow_if_needed();
    }

    /// Feeds real measurements back. Indexes without a physical item (outside the active window)
    /// are ignored.
    pub fn update_item_sizes<'a>(
        &mut self,
        measured: impl IntoIterator<Item = (usize, &'a ItemBox)>,
    ) {
        let direction = self.options.direction;
        for (index, item_box) in measured {
            if self.physical.get(index).is_none() {
                vtrace!(index, "update_item_sizes: index outside the active window");
                continue;
            }
            let size = self.metrics.record(index, item_box, direction);
            if let Some(item) = self.physical.get_mut(index) {
                item.size = size;
            }
        }

        match self.metrics.estimate() {
            Some(estimate) => {
                self.item_extent = estimate;
                self.schedule_reflow();
            }
            None => {
                vwarn!("update_item_sizes: no items measured yet");
            }
        }
    }

    /// Runs a reflow pass if one is pending. Returns `true` when a pass ran.
    pub fn reflow_if_needed(&mut self) -> bool {
        if !self.pending_reflow {
            return false;
        }
        self.pending_reflow = false;
        self.reflow();
        true
    }

    fn reflow(&mut self) {
        let prev_range = self.range;
        let prev_scroll_size = self.scroll_size;

        let default = self.options.direction.main(self.options.item_size);
        self.item_extent = self.metrics.estimate_or(default);

        self.update_scroll_size();
        self.apply_scroll_to();
        self.get_active_items();
        self.update_scroll_size_after_pass();
        if self.scroll_size != prev_scroll_size {
            self.emit_scroll_size();
        }

        self.update_visible_indices(false);
        let remeasure = mem::take(&mut self.needs_remeasure);
        self.emit_range(remeasure);
        self.emit_item_positions();
        self.emit_scroll_error();

        match self.range {
            None => self.reset_reflow_state(),
            Some(_) if prev_range == self.range && !remeasure => self.reset_reflow_state(),
            Some(_) => {}
        }

        vdebug!(
            first = self.range.map(|r| r.first),
            last = self.range.map(|r| r.last),
            stable = self.stable,
            scroll_size = self.scroll_size,
            "reflow"
        );
    }

    fn reset_reflow_state(&mut self) {
        self.anchor = None;
        self.stable = true;
    }

    fn delta(&self) -> f64 {
        self.item_extent + self.options.spacing
    }

    fn view_extent(&self) -> f64 {
        self.options.direction.main(self.viewport)
    }

    fn update_scroll_size(&mut self) {
        let estimated = (self.options.total_items as f64 * self.delta()).max(1.0);
        self.scroll_size = estimated.max(self.physical_max);
    }

    fn update_scroll_size_after_pass(&mut self) {
        self.scroll_size = self.scroll_size.max(self.physical_max);
    }

    /// Measured size, if any.
    fn size_of(&self, index: usize) -> Option<f64> {
        self.metrics.size_of(index, self.options.direction)
    }

    fn position_of(&self, index: usize) -> f64 {
        match self.physical.get(index) {
            Some(item) => item.pos,
            None => index as f64 * self.delta(),
        }
    }

    /// Applies a pending scroll-to request. With no viewport or no items the request stays
    /// pending for the first pass that has both.
    fn apply_scroll_to(&mut self) {
        let total = self.options.total_items;
        let view = self.view_extent();
        if view == 0.0 || total == 0 {
            return;
        }
        let Some((index, fraction)) = self.scroll_to.take() else {
            return;
        };
        let index = index.min(total - 1);
        let pos = self.position_of(index);
        let size = self.size_of(index).unwrap_or(self.item_extent);

        let max_scroll = (self.scroll_size - view).max(0.0);
        let target = px::floor((pos + size * fraction - view * fraction).max(0.0).min(max_scroll));

        self.scroll_error += self.scroll_position - target;
        self.scroll_position = target;
        self.anchor = Some(Anchor { index, pos });
    }

    fn get_active_items(&mut self) {
        let view = self.view_extent();
        if view == 0.0 || self.options.total_items == 0 {
            self.clear_items();
            return;
        }
        let overhang = self.options.overhang;
        let upper = self
            .scroll_size
            .min(self.scroll_position + view + overhang);
        let lower = (upper - view - 2.0 * overhang).max(0.0);
        self.get_items(lower, upper);
    }

    fn clear_items(&mut self) {
        self.clear_physical();
        self.first_visible = 0;
        self.last_visible = 0;
        self.stable = true;
    }

    fn clear_physical(&mut self) {
        self.physical.clear();
        self.physical_min = 0.0;
        self.physical_max = 0.0;
        self.range = None;
        self.anchor = None;
    }

    fn get_items(&mut self, mut lower: f64, mut upper: f64) {
        let total = self.options.total_items;
        let spacing = self.options.spacing;
        let extent = self.item_extent;

        let anchor = match self.anchor {
            Some(anchor) if anchor.index < total => anchor,
            _ => {
                let index = self.get_anchor(lower, upper);
                let anchor = Anchor {
                    index,
                    pos: self.position_of(index),
                };
                self.anchor = Some(anchor);
                anchor
            }
        };

        let mut stable = true;
        let anchor_size = match self.size_of(anchor.index) {
            Some(size) => size,
            None => {
                stable = false;
                extent
            }
        };

        // Keep the anchor inside the window by moving the window (and the scroll position).
        let mut shift = 0.0;
        if anchor.pos + anchor_size + spacing < lower {
            shift = lower - (anchor.pos + anchor_size + spacing);
        }
        if anchor.pos > upper {
            shift = upper - anchor.pos;
        }
        if shift != 0.0 {
            self.scroll_position -= shift;
            lower -= shift;
            upper -= shift;
            self.scroll_error += shift;
        }

        self.physical.staging_mut().clear();
        self.physical.stage(
            anchor.index,
            PhysicalItem {
                pos: anchor.pos,
                size: anchor_size,
            },
        );

        let mut first = anchor.index;
        self.physical_min = anchor.pos;
        while self.physical_min > lower && first > 0 {
            first -= 1;
            let size = match self.size_of(first) {
                Some(size) => size,
                None => {
                    stable = false;
                    extent
                }
            };
            self.physical_min -= size + spacing;
            self.physical.stage(
                first,
                PhysicalItem {
                    pos: self.physical_min,
                    size,
                },
            );
        }

        let mut last = anchor.index;
        self.physical_max = anchor.pos + anchor_size + spacing;
        while self.physical_max < upper && last + 1 < total {
            last += 1;
            let size = match self.size_of(last) {
                Some(size) => size,
                None => {
                    stable = false;
                    extent
                }
            };
            self.physical.stage(
                last,
                PhysicalItem {
                    pos: self.physical_max,
                    size,
                },
            );
            self.physical_max += size + spacing;
        }

        self.range = Some(IndexRange::new(first, last));
        self.stable = stable;

        let error = self.calculate_error(first, last);
        if error != 0.0 {
            vtrace!(error, first, last, "calculate_error");
            self.physical_min -= error;
            self.physical_max -= error;
            if let Some(anchor) = self.anchor.as_mut() {
                anchor.pos -= error;
            }
            self.scroll_position -= error;
            for item in self.physical.staging_mut().values_mut() {
                item.pos -= error;
            }
            self.scroll_error += error;
        }

        self.physical.commit();
    }

    /// Picks an anchor among the known physical items, or estimates one.
    fn get_anchor(&self, lower: f64, upper: f64) -> usize {
        if self.physical.is_empty() {
            return self.calculate_anchor(lower, upper);
        }
        let Some(range) = self.range else {
            return self.calculate_anchor(lower, upper);
        };
        if range.last >= self.options.total_items {
            vwarn!(
                last = range.last,
                total_items = self.options.total_items,
                "get_anchor: previous range exceeds total_items"
            );
            return self.calculate_anchor(lower, upper);
        }
        let (Some(first), Some(last)) = (self.physical.get(range.first), self.physical.get(range.last))
        else {
            return self.calculate_anchor(lower, upper);
        };

        let first_min = first.pos;
        let first_max = first_min + first.size;
        let last_min = last.pos;
        let last_max = last_min + last.size;

        if last_max < lower || first_min > upper {
            return self.calculate_anchor(lower, upper);
        }
        if first_min >= lower || first_max >= lower {
            return range.first;
        }
        if last_max <= upper || last_min <= upper {
            return range.last;
        }

        let mut lo = range.first;
        let mut hi = range.last;
        while lo <= hi {
            let mid = (lo + hi).div_ceil(2);
            let Some(item) = self.physical.get(mid) else {
                break;
            };
            let min = item.pos;
            let max = min + item.size;
            if (min >= lower && min <= upper) || (max >= lower && max <= upper) {
                return mid;
            }
            if max < lower {
                lo = mid + 1;
            } else if min > upper {
                if mid == 0 {
                    break;
                }
                hi = mid - 1;
            } else {
                // The item spans the whole window.
                return mid;
            }
        }
        self.calculate_anchor(lower, upper)
    }

    fn calculate_anchor(&self, lower: f64, upper: f64) -> usize {
        let total = self.options.total_items;
        if total == 0 || lower <= 0.0 {
            return 0;
        }
        if upper > self.scroll_size - self.view_extent() {
            return total - 1;
        }
        let estimate = px::floor((lower + upper) / 2.0 / self.delta());
        if estimate <= 0.0 {
            0
        } else {
            (estimate as usize).min(total - 1)
        }
    }

    /// The shift that pins the collection's ends: the first index at 0 and the last index at the
    /// end of the scroll extent.
    fn calculate_error(&self, first: usize, last: usize) -> f64 {
        let total = self.options.total_items;
        let slack = self.options.edge_slack;
        let delta = self.delta();
        if first == 0 {
            self.physical_min
        } else if self.physical_min <= slack {
            self.physical_min - first as f64 * delta
        } else if last + 1 == total {
            self.physical_max - self.scroll_size
        } else if self.physical_max >= self.scroll_size - slack {
            self.physical_max - self.scroll_size + (total - 1 - last) as f64 * delta
        } else {
            0.0
        }
    }

    fn check_thresholds(&mut self) {
        let view = self.view_extent();
        if view == 0.0 {
            if self.range.is_some() {
                self.schedule_reflow();
            }
            return;
        }
        let overhang = self.options.overhang;
        let lower = (self.scroll_position - overhang).max(0.0);
        let upper = self
            .scroll_size
            .min(self.scroll_position + view + overhang);
        if self.physical_min > lower || self.physical_max < upper {
            self.schedule_reflow();
        }
    }

    fn update_visible_indices(&mut self, emit: bool) {
        let Some(range) = self.range else {
            return;
        };
        let view = self.view_extent();
        let mut first_visible = range.first;
        let mut last_visible = range.first;
        for i in range.iter() {
            let pos = self.position_of(i);
            if pos <= self.scroll_position {
                first_visible = i;
            }
            if pos < self.scroll_position + view {
                last_visible = i;
            }
        }
        if first_visible > last_visible
            || (first_visible == self.first_visible && last_visible == self.last_visible)
        {
            return;
        }
        self.first_visible = first_visible;
        self.last_visible = last_visible;
        if emit {
            self.emit_range(false);
        }
    }

    fn emit_range(&mut self, remeasure: bool) {
        self.events.push(LayoutEvent::RangeChange(RangeChange {
            range: self.range,
            stable: self.stable,
            first_visible: self.first_visible,
            last_visible: self.last_visible,
            remeasure,
        }));
    }

    fn emit_scroll_size(&mut self) {
        let size = self.options.direction.size(self.scroll_size, 0.0);
        self.events.push(LayoutEvent::ScrollSizeChange(size));
    }

    fn emit_scroll_error(&mut self) {
        if self.scroll_error == 0.0 {
            return;
        }
        let error = self.options.direction.position(self.scroll_error, 0.0);
        self.scroll_error = 0.0;
        self.events.push(LayoutEvent::ScrollErrorChange(error));
    }

    /// Emits positions for active indexes that are new or moved since the last emission.
    fn emit_item_positions(&mut self) {
        let Some(range) = self.range else {
            self.emitted_positions.clear();
            return;
        };
        self.emitted_positions.retain(|i, _| range.contains(*i));

        let direction = self.options.direction;
        let mut changed = BTreeMap::new();
        for i in range.iter() {
            let pos = self.position_of(i);
            if self.emitted_positions.get(&i) != Some(&pos) {
                self.emitted_positions.insert(i, pos);
                changed.insert(i, direction.position(pos, 0.0));
            }
        }
        if !changed.is_empty() {
            self.events.push(LayoutEvent::ItemPositionChange(changed));
        }
    }
}
