use crate::*;

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::rc::Rc;
use alloc::string::ToString;
use alloc::vec::Vec;
use core::cell::RefCell;

use proptest::prelude::*;

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        debug_assert!(start < end_exclusive);
        start + (self.next_u64() % (end_exclusive - start) as u64) as usize
    }

    fn gen_range_f64(&mut self, start: u32, end_exclusive: u32) -> f64 {
        self.gen_range_usize(start as usize, end_exclusive as usize) as f64
    }
}

#[derive(Clone, Debug, Default)]
struct TestSlot {
    index: usize,
    hidden: bool,
    pos: Option<Position>,
}

/// An in-memory host: slots are rows in a column, heights come from a table.
#[derive(Debug)]
struct TestHost {
    viewport: Size,
    scroll: Position,
    default_height: f64,
    heights: BTreeMap<usize, f64>,
    slots: BTreeMap<SlotId, TestSlot>,
    order: Vec<SlotId>,
    container: Option<Size>,
    fail_index: Option<usize>,
    removed: usize,
    inserted: usize,
    positioned: Vec<(usize, f64)>,
}

impl TestHost {
    fn new(viewport: Size) -> Self {
        Self {
            viewport,
            scroll: Position::default(),
            default_height: 100.0,
            heights: BTreeMap::new(),
            slots: BTreeMap::new(),
            order: Vec::new(),
            container: None,
            fail_index: None,
            removed: 0,
            inserted: 0,
            positioned: Vec::new(),
        }
    }

    fn height_of(&self, index: usize) -> f64 {
        self.heights
            .get(&index)
            .copied()
            .unwrap_or(self.default_height)
    }

    /// Indexes of shown slots, in document order.
    fn shown(&self) -> Vec<usize> {
        self.order
            .iter()
            .filter_map(|s| self.slots.get(s))
            .filter(|s| !s.hidden)
            .map(|s| s.index)
            .collect()
    }

    fn top_of(&self, index: usize) -> Option<f64> {
        self.slots
            .values()
            .find(|s| !s.hidden && s.index == index)
            .and_then(|s| s.pos)
            .map(|p| p.top)
    }
}

impl Host for TestHost {
    type Error = &'static str;

    fn create_slot(&mut self, slot: SlotId, index: usize) -> Result<(), Self::Error> {
        if self.fail_index == Some(index) {
            return Err("factory exploded");
        }
        assert!(!self.slots.contains_key(&slot), "slot id reused");
        self.slots.insert(
            slot,
            TestSlot {
                index,
                ..TestSlot::default()
            },
        );
        Ok(())
    }

    fn update_slot(&mut self, slot: SlotId, index: usize) {
        self.slots.get_mut(&slot).expect("unknown slot").index = index;
    }

    fn remove_slot(&mut self, slot: SlotId) {
        self.slots.remove(&slot);
        self.order.retain(|s| *s != slot);
        self.removed += 1;
    }

    fn insert_before(&mut self, slot: SlotId, before: Option<SlotId>) {
        self.inserted += 1;
        self.order.retain(|s| *s != slot);
        match before.and_then(|b| self.order.iter().position(|s| *s == b)) {
            Some(at) => self.order.insert(at, slot),
            None => self.order.push(slot),
        }
    }

    fn next_sibling(&self, slot: SlotId) -> Option<SlotId> {
        let at = self.order.iter().position(|s| *s == slot)?;
        self.order.get(at + 1).copied()
    }

    fn is_attached(&self, slot: SlotId) -> bool {
        self.order.contains(&slot)
    }

    fn hide(&mut self, slot: SlotId) {
        self.slots.get_mut(&slot).expect("unknown slot").hidden = true;
    }

    fn show(&mut self, slot: SlotId) {
        self.slots.get_mut(&slot).expect("unknown slot").hidden = false;
    }

    fn measure(&mut self, slot: SlotId) -> ItemBox {
        let index = self.slots[&slot].index;
        ItemBox::new(300.0, self.height_of(index))
    }

    fn position_slot(&mut self, slot: SlotId, position: Position) {
        let entry = self.slots.get_mut(&slot).expect("unknown slot");
        entry.pos = Some(position);
        self.positioned.push((entry.index, position.top));
    }

    fn viewport(&self) -> (Size, Position) {
        (self.viewport, self.scroll)
    }

    fn size_container(&mut self, size: Option<Size>) {
        self.container = size;
    }

    fn correct_scroll_error(&mut self, error: Position) {
        self.scroll.top -= error.top;
        self.scroll.left -= error.left;
    }
}

fn viewport_500() -> Size {
    Size::new(300.0, 500.0)
}

fn layout_1000() -> Layout1d {
    let mut layout = Layout1d::new(LayoutOptions::new(1000));
    layout.set_viewport_size(viewport_500());
    layout
}

fn measure_range(layout: &mut Layout1d, height_of: impl Fn(usize) -> f64) -> usize {
    let Some(range) = layout.range() else {
        return 0;
    };
    let boxes: Vec<(usize, ItemBox)> = range
        .iter()
        .filter(|i| layout.metrics().get(*i).is_none())
        .map(|i| (i, ItemBox::new(300.0, height_of(i))))
        .collect();
    if !boxes.is_empty() {
        layout.update_item_sizes(boxes.iter().map(|(i, b)| (*i, b)));
    }
    boxes.len()
}

fn positions(layout: &Layout1d) -> Vec<(usize, f64)> {
    layout
        .range()
        .map(|r| r.iter().map(|i| (i, layout.item_position(i).top)).collect())
        .unwrap_or_default()
}

/// Reflows and measures until a pass neither measures anything new nor moves anything.
fn settle(layout: &mut Layout1d, height_of: impl Fn(usize) -> f64) -> usize {
    let mut prev = None;
    for round in 0..64 {
        layout.schedule_reflow();
        layout.reflow_if_needed();
        let snapshot = (
            layout.range(),
            positions(layout),
            layout.scroll_size(),
            layout.scroll_position(),
        );
        let measured = measure_range(layout, &height_of);
        if measured == 0 && layout.is_stable() && prev.as_ref() == Some(&snapshot) {
            return round;
        }
        prev = Some(snapshot);
    }
    panic!("layout did not settle");
}

fn virtualizer_1000(host: TestHost) -> Virtualizer<TestHost> {
    Virtualizer::new(host, VirtualizerOptions::new(1000))
}

fn assert_one_to_one<K: SlotKey>(pool: &RecyclePool<K>) {
    let mut slots = BTreeSet::new();
    let mut indexes = BTreeSet::new();
    for (index, slot) in pool.iter() {
        assert!(slots.insert(slot), "slot {slot:?} bound twice");
        assert!(indexes.insert(index), "index {index} bound twice");
    }
    if let Some(window) = pool.rendered() {
        assert_eq!(indexes.into_iter().collect::<Vec<_>>(), window.iter().collect::<Vec<_>>());
    }
}

#[test]
fn initial_range_covers_viewport_plus_overhang() {
    let mut layout = layout_1000();
    assert!(layout.reflow_if_needed());

    assert_eq!(layout.range(), Some(IndexRange::new(0, 6)));
    assert_eq!(layout.first_visible(), 0);
    assert_eq!(layout.last_visible(), 4);
    assert!(!layout.is_stable());

    let events = layout.take_events();
    assert_eq!(
        events[0],
        LayoutEvent::ScrollSizeChange(Size::new(0.0, 100_000.0))
    );
    let LayoutEvent::RangeChange(change) = events[1] else {
        panic!("expected a range change, got {:?}", events[1]);
    };
    assert_eq!(change.first(), 0);
    assert_eq!(change.last(), 6);
    assert_eq!(change.num(), 7);
    let LayoutEvent::ItemPositionChange(moved) = &events[2] else {
        panic!("expected item positions, got {:?}", events[2]);
    };
    assert_eq!(moved.len(), 7);
    assert_eq!(moved[&6], Position::new(600.0, 0.0));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, LayoutEvent::ScrollErrorChange(_)))
    );
}

#[test]
fn mid_list_anchor_is_estimated_from_the_scroll_position() {
    let mut layout = layout_1000();
    layout.set_viewport_scroll(Position::new(10_000.0, 0.0));
    layout.reflow_if_needed();

    assert_eq!(layout.anchor().map(|a| a.index), Some(102));
    let range = layout.range().unwrap();
    assert_eq!(range, IndexRange::new(98, 106));
    for i in range.iter() {
        assert_eq!(layout.item_position(i).top, i as f64 * 100.0);
    }

    measure_range(&mut layout, |_| 100.0);
    layout.reflow_if_needed();
    assert!(layout.is_stable());
    assert_eq!(layout.range(), Some(range));
    // Same range twice: the anchor is released.
    assert_eq!(layout.anchor(), None);
}

#[test]
fn scroll_to_index_center_places_item_mid_viewport() {
    let mut layout = layout_1000();
    layout.reflow_if_needed();
    layout.take_events();

    layout.scroll_to_index(ScrollToIndex::new(500, ScrollToPosition::Center));

    assert!(!layout.pending_reflow());
    assert_eq!(layout.scroll_position(), 49_800.0);
    let top = layout.item_position(500).top;
    assert_eq!(top, 50_000.0);
    let midpoint = top + 50.0;
    assert!((midpoint - (layout.scroll_position() + 250.0)).abs() <= 100.0);
    assert_eq!(layout.range(), Some(IndexRange::new(496, 504)));

    let events = layout.take_events();
    assert!(events.contains(&LayoutEvent::ScrollErrorChange(Position::new(-49_800.0, 0.0))));
}

#[test]
fn scroll_to_index_nearest_resolves_by_range_midpoint() {
    let mut layout = layout_1000();
    layout.reflow_if_needed();

    layout.scroll_to_index(ScrollToIndex::new(500, ScrollToPosition::Nearest));
    // Past the middle of 0..=6: aligned like `end`.
    assert_eq!(layout.scroll_position(), 49_600.0);

    layout.scroll_to_index(ScrollToIndex::new(490, ScrollToPosition::Nearest));
    assert_eq!(layout.scroll_position(), 49_000.0);
}

#[test]
fn resized_item_shifts_only_later_positions() {
    let mut layout = layout_1000();
    layout.reflow_if_needed();
    measure_range(&mut layout, |_| 100.0);
    layout.reflow_if_needed();
    assert!(layout.is_stable());
    layout.take_events();

    assert!(layout.invalidate_item(2));
    layout.update_item_sizes([(2, &ItemBox::new(300.0, 200.0))]);
    layout.reflow_if_needed();

    assert_eq!(layout.range(), Some(IndexRange::new(0, 5)));
    let moved: Vec<(usize, f64)> = layout
        .take_events()
        .into_iter()
        .filter_map(|e| match e {
            LayoutEvent::ItemPositionChange(m) => Some(m),
            _ => None,
        })
        .flat_map(|m| m.into_iter().map(|(i, p)| (i, p.top)))
        .collect();
    assert_eq!(moved, [(3, 400.0), (4, 500.0), (5, 600.0)]);
    assert_eq!(layout.item_position(2).top, 200.0);
    assert!(!layout.metrics().is_dirty(2));
}

#[test]
fn measurements_outside_the_window_are_ignored() {
    let mut layout = layout_1000();
    layout.reflow_if_needed();
    layout.update_item_sizes([(400, &ItemBox::new(300.0, 80.0))]);
    assert_eq!(layout.metrics().len(), 0);
    assert!(!layout.pending_reflow());
}

#[test]
fn margins_are_folded_into_the_estimate() {
    let mut layout = layout_1000();
    layout.reflow_if_needed();
    let boxed = ItemBox::new(300.0, 80.0).with_margins(5.0, 0.0, 5.0, 0.0);
    layout.update_item_sizes([(0, &boxed), (1, &boxed)]);
    assert_eq!(layout.metrics().estimate(), Some(90.0));
    assert_eq!(layout.metrics().get(0).unwrap().height, 90.0);
    layout.reflow_if_needed();
    assert_eq!(layout.item_extent(), 90.0);
}

#[test]
fn remeasuring_an_index_replaces_its_contribution() {
    let mut metrics = MetricsStore::new();
    metrics.record(0, &ItemBox::new(10.0, 100.0), Direction::Vertical);
    metrics.record(1, &ItemBox::new(10.0, 50.0), Direction::Vertical);
    assert_eq!(metrics.estimate(), Some(75.0));
    metrics.record(1, &ItemBox::new(10.0, 150.0), Direction::Vertical);
    assert_eq!(metrics.measured_count(), 2);
    assert_eq!(metrics.estimate(), Some(125.0));
    metrics.clear();
    assert_eq!(metrics.estimate(), None);
}

#[cfg(feature = "tracing")]
#[test]
#[tracing_test::traced_test]
fn estimate_without_measurements_warns_and_uses_default() {
    let mut layout = layout_1000();
    assert_eq!(layout.estimated_item_size(), 100.0);
    assert!(logs_contain("no items measured yet"));
}

#[test]
fn empty_collection_and_zero_viewport_have_no_range() {
    let mut layout = Layout1d::new(LayoutOptions::new(0));
    layout.set_viewport_size(viewport_500());
    layout.reflow_if_needed();
    assert_eq!(layout.range(), None);
    let change = layout
        .take_events()
        .into_iter()
        .find_map(|e| match e {
            LayoutEvent::RangeChange(c) => Some(c),
            _ => None,
        })
        .unwrap();
    assert_eq!((change.first(), change.last(), change.num()), (-1, -1, 0));

    let mut layout = Layout1d::new(LayoutOptions::new(50));
    layout.reflow_if_needed();
    assert_eq!(layout.range(), None);
    layout.set_viewport_size(viewport_500());
    assert!(layout.pending_reflow());
    layout.reflow_if_needed();
    assert_eq!(layout.range(), Some(IndexRange::new(0, 6)));
}

#[test]
fn shrinking_below_the_window_discards_physical_items() {
    let mut layout = layout_1000();
    settle(&mut layout, |_| 100.0);
    assert_eq!(layout.range(), Some(IndexRange::new(0, 6)));

    layout.set_total_items(3);
    assert_eq!(layout.metrics().len(), 0);
    layout.reflow_if_needed();
    assert_eq!(layout.range(), Some(IndexRange::new(0, 2)));

    layout.set_total_items(500);
    layout.reflow_if_needed();
    assert_eq!(layout.range(), Some(IndexRange::new(0, 6)));
}

#[test]
fn horizontal_layout_uses_width_and_left() {
    let options = LayoutOptions::new(100).with_direction(Direction::from_name("horizontal"));
    let mut layout = Layout1d::new(options);
    layout.set_viewport_size(Size::new(500.0, 300.0));
    layout.reflow_if_needed();
    assert_eq!(layout.range(), Some(IndexRange::new(0, 6)));
    assert_eq!(layout.item_position(3), Position::new(0.0, 300.0));

    let wide = ItemBox::new(50.0, 300.0);
    let range = layout.range().unwrap();
    let boxes: Vec<(usize, ItemBox)> = range.iter().map(|i| (i, wide)).collect();
    layout.update_item_sizes(boxes.iter().map(|(i, b)| (*i, b)));
    assert_eq!(layout.item_extent(), 50.0);
    assert_eq!(Direction::from_name("sideways"), Direction::Vertical);
}

#[test]
fn cross_axis_viewport_change_requests_remeasure() {
    let mut layout = layout_1000();
    settle(&mut layout, |_| 100.0);
    layout.take_events();

    layout.set_viewport_size(Size::new(200.0, 500.0));
    assert!(layout.reflow_if_needed());
    let remeasure = layout.take_events().into_iter().any(|e| {
        matches!(e, LayoutEvent::RangeChange(RangeChange { remeasure: true, .. }))
    });
    assert!(remeasure);

    // Main-axis growth inside the rendered overhang needs no reflow.
    layout.set_viewport_size(Size::new(200.0, 520.0));
    assert!(!layout.pending_reflow());
}

#[test]
fn spacing_separates_items() {
    let mut layout = Layout1d::new(LayoutOptions::new(100).with_spacing(10.0));
    layout.set_viewport_size(viewport_500());
    settle(&mut layout, |_| 100.0);
    assert_eq!(layout.item_position(3).top, 330.0);
    assert_eq!(layout.range(), Some(IndexRange::new(0, 5)));
}

#[test]
fn boundary_items_are_pinned_to_the_ends() {
    let height_of = |i: usize| 40.0 + ((i * 37) % 90) as f64;
    let mut layout = Layout1d::new(LayoutOptions::new(200));
    layout.set_viewport_size(viewport_500());
    settle(&mut layout, height_of);
    assert_eq!(layout.item_position(0).top, 0.0);

    layout.scroll_to_index(ScrollToIndex::new(199, ScrollToPosition::End));
    settle(&mut layout, height_of);
    let range = layout.range().unwrap();
    assert_eq!(range.last, 199);
    let trailing = layout.item_position(199).top + height_of(199);
    assert_eq!(trailing, layout.scroll_size());
}

#[test]
fn edge_slack_snaps_windows_near_the_start() {
    for (slack, expected) in [(0.0, 600.0), (1_000.0, 200.0)] {
        let options = LayoutOptions::new(1000)
            .with_overhang(0.0)
            .with_edge_slack(slack);
        let mut layout = Layout1d::new(options);
        layout.set_viewport_size(viewport_500());
        layout.set_viewport_scroll(Position::new(600.0, 0.0));
        layout.reflow_if_needed();
        assert_eq!(layout.range(), Some(IndexRange::new(6, 10)));

        // Items turn out half the default size; the window now starts near the top.
        measure_range(&mut layout, |_| 50.0);
        layout.reflow_if_needed();
        assert_eq!(layout.range(), Some(IndexRange::new(4, 13)));
        assert_eq!(layout.item_position(4).top, expected);
        assert_eq!(layout.scroll_position(), expected);
    }
}

#[test]
fn invalid_scroll_position_is_rejected() {
    let err = "middle".parse::<ScrollToPosition>().unwrap_err();
    assert_eq!(err, Error::InvalidScrollPosition("middle".into()));
    assert!(
        err.to_string()
            .starts_with("position must be one of: start, center, end, nearest")
    );
    assert_eq!("end".parse::<ScrollToPosition>(), Ok(ScrollToPosition::End));

    let mut v = virtualizer_1000(TestHost::new(viewport_500()));
    assert!(v.request_scroll_to_index_str(3, "top").is_err());
    assert_eq!(v.request_scroll_to_index_str(3, "center"), Ok(false));
}

#[test]
fn pool_reuses_keyed_slot_within_a_batch() {
    let mut host = TestHost::new(viewport_500());
    let mut pool: RecyclePool<ItemKey> = RecyclePool::new(64);
    let key_of = |i: usize| i as u64;
    pool.set_total_items(100);
    pool.set_range(0, 5);
    pool.render(&mut host, &key_of).unwrap();
    let slot_1 = pool.slot_for(1).unwrap();

    pool.set_incremental(true);
    pool.set_range(2, 5);
    pool.render(&mut host, &key_of).unwrap();
    assert_eq!(pool.retained_len(), 2);
    assert_eq!(pool.created(), 7);

    pool.set_range(0, 5);
    pool.render(&mut host, &key_of).unwrap();
    assert_eq!(pool.slot_for(1), Some(slot_1));
    assert_eq!(pool.created(), 7);
    assert_eq!(host.shown(), [0, 1, 2, 3, 4]);
    assert_one_to_one(&pool);
}

#[test]
fn pool_recycles_released_slots_only_after_the_batch() {
    let mut host = TestHost::new(viewport_500());
    let mut pool: RecyclePool<ItemKey> = RecyclePool::new(64);
    let key_of = |i: usize| i as u64;
    pool.set_total_items(100);
    pool.set_range(0, 5);
    pool.render(&mut host, &key_of).unwrap();
    let first_two = [pool.slot_for(0).unwrap(), pool.slot_for(1).unwrap()];

    pool.set_range(2, 5);
    pool.render(&mut host, &key_of).unwrap();
    // Released slots were not rebound in the same pass.
    assert_eq!(pool.created(), 7);
    assert_eq!(pool.free_len(), 2);

    pool.set_range(4, 5);
    pool.render(&mut host, &key_of).unwrap();
    assert_eq!(pool.created(), 7);
    let reused = BTreeSet::from([pool.slot_for(7).unwrap(), pool.slot_for(8).unwrap()]);
    assert_eq!(reused, BTreeSet::from(first_two));
    assert_eq!(host.shown(), [4, 5, 6, 7, 8]);
    assert_one_to_one(&pool);
}

#[test]
fn pool_follows_keys_across_reorders() {
    let mut host = TestHost::new(viewport_500());
    let mut pool: RecyclePool<u64> = RecyclePool::new(64);
    pool.set_total_items(10);
    pool.set_range(0, 4);
    pool.render(&mut host, &|i| 100 + i as u64).unwrap();
    let slot_of_key_102 = pool.slot_for(2).unwrap();
    pool.take_to_measure();

    // Keys reversed inside the window.
    pool.request_reset();
    pool.render(&mut host, &|i| 103 - i as u64).unwrap();
    assert_eq!(pool.slot_for(1), Some(slot_of_key_102));
    assert_eq!(pool.created(), 4);
    assert_eq!(host.shown(), [0, 1, 2, 3]);
    assert_one_to_one(&pool);
}

#[test]
fn pool_reset_keeps_attached_slots_in_place() {
    let mut host = TestHost::new(viewport_500());
    let mut pool: RecyclePool<ItemKey> = RecyclePool::new(64);
    let key_of = |i: usize| i as u64;
    pool.set_total_items(100);
    pool.set_incremental(true);
    pool.set_range(0, 5);
    pool.render(&mut host, &key_of).unwrap();
    assert_eq!(host.inserted, 5);

    pool.set_range(0, 0);
    pool.render(&mut host, &key_of).unwrap();
    assert!(host.shown().is_empty());
    assert_eq!(host.order.len(), 5);

    pool.set_range(0, 5);
    pool.render(&mut host, &key_of).unwrap();
    assert_eq!(host.shown(), [0, 1, 2, 3, 4]);
    assert_eq!(host.inserted, 5);
    assert_eq!(pool.created(), 5);
    assert_one_to_one(&pool);
}

#[test]
fn pool_free_list_is_bounded() {
    let mut host = TestHost::new(viewport_500());
    let mut pool: RecyclePool<ItemKey> = RecyclePool::new(2);
    let key_of = |i: usize| i as u64;
    pool.set_total_items(100);
    pool.set_range(0, 5);
    pool.render(&mut host, &key_of).unwrap();
    pool.set_range(10, 5);
    pool.render(&mut host, &key_of).unwrap();

    assert_eq!(pool.created(), 10);
    assert_eq!(pool.free_len(), 2);
    assert_eq!(host.removed, 3);
    assert_eq!(host.shown(), [10, 11, 12, 13, 14]);
}

#[test]
fn pool_clamps_window_to_total_items() {
    let mut pool: RecyclePool<ItemKey> = RecyclePool::new(8);
    pool.set_total_items(10);
    pool.set_range(8, 5);
    assert_eq!(pool.window(), Some(IndexRange::new(5, 9)));
    pool.set_total_items(3);
    assert_eq!(pool.window(), Some(IndexRange::new(0, 2)));
    pool.set_range(0, 0);
    assert_eq!(pool.window(), None);
}

#[test]
fn virtualizer_renders_the_initial_window() {
    let mut v = virtualizer_1000(TestHost::new(viewport_500()));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    v.add_range_listener(move |r| sink.borrow_mut().push(*r));

    assert!(v.is_pending());
    let ticks = v.run_until_idle(10).unwrap();
    assert_eq!(ticks, 2);
    assert!(v.layout().is_stable());

    assert_eq!(v.host().shown(), [0, 1, 2, 3, 4, 5, 6]);
    for i in 0..7 {
        assert_eq!(v.host().top_of(i), Some(i as f64 * 100.0));
    }
    assert_eq!(v.host().container, Some(Size::new(0.0, 100_000.0)));
    let expected = VisibleRange {
        first: 0,
        last: 6,
        first_visible: 0,
        last_visible: 4,
    };
    assert_eq!(seen.borrow().last(), Some(&expected));
    assert_eq!(v.visible_range(), Some(expected));
    assert_one_to_one(v.pool());
}

#[test]
fn virtualizer_remeasures_only_the_resized_slot() {
    let mut v = virtualizer_1000(TestHost::new(viewport_500()));
    v.run_until_idle(10).unwrap();
    let created = v.pool().created();

    let slot = v.pool().slot_for(2).unwrap();
    v.host_mut().heights.insert(2, 200.0);
    v.host_mut().positioned.clear();

    // Position-only notifications are ignored.
    assert!(!v.slots_resized([(v.pool().slot_for(3).unwrap(), Size::new(300.0, 100.0))]));
    assert!(v.slots_resized([(slot, Size::new(300.0, 200.0))]));
    v.run_until_idle(10).unwrap();

    assert_eq!(v.pool().created(), created);
    let moved: BTreeSet<usize> = v.host().positioned.iter().map(|(i, _)| *i).collect();
    assert!(!moved.contains(&0) && !moved.contains(&1));
    assert!(moved.contains(&3) && moved.contains(&5));
    assert_eq!(v.host().top_of(3), Some(400.0));
    assert_eq!(v.host().top_of(5), Some(600.0));
    assert_eq!(v.host().top_of(2), Some(200.0));
    assert_eq!(v.host().shown(), [0, 1, 2, 3, 4, 5]);
}

#[test]
fn virtualizer_scroll_to_index_corrects_host_scroll() {
    let mut v = virtualizer_1000(TestHost::new(viewport_500()));
    v.run_until_idle(10).unwrap();

    assert!(v.request_scroll_to_index(ScrollToIndex::new(500, ScrollToPosition::Center)));
    v.run_until_idle(10).unwrap();

    assert_eq!(v.host().scroll.top, 49_800.0);
    assert_eq!(v.host().top_of(500), Some(50_000.0));
    assert_eq!(v.host().shown(), (496..=504).collect::<Vec<_>>());
    assert!(v.layout().is_stable());
}

#[test]
fn scroll_to_index_waits_for_a_viewport() {
    let host = TestHost::new(Size::new(300.0, 0.0));
    let options = VirtualizerOptions::new(1000)
        .with_scroll_to_index(Some(ScrollToIndex::new(500, ScrollToPosition::Center)));
    let mut v = Virtualizer::new(host, options);
    v.run_until_idle(10).unwrap();
    assert!(v.host().shown().is_empty());
    assert_eq!(v.host().scroll.top, 0.0);

    v.host_mut().viewport = viewport_500();
    assert!(v.container_resized(viewport_500()));
    v.run_until_idle(10).unwrap();

    assert_eq!(v.host().scroll.top, 49_800.0);
    assert_eq!(v.host().top_of(500), Some(50_000.0));
    assert_eq!(v.host().shown(), (496..=504).collect::<Vec<_>>());
}

#[test]
fn user_scroll_drops_a_waiting_scroll_to_index() {
    let mut layout = Layout1d::new(LayoutOptions::new(1000));
    layout.scroll_to_index(ScrollToIndex::new(500, ScrollToPosition::Start));
    assert_eq!(layout.range(), None);

    layout.set_viewport_scroll(Position::new(1_000.0, 0.0));
    layout.set_viewport_size(viewport_500());
    layout.reflow_if_needed();
    assert_eq!(layout.scroll_position(), 1_000.0);
    assert_eq!(layout.range().map(|r| r.first), Some(8));
}

#[derive(Default)]
struct CountingObserver {
    counts: Rc<RefCell<(usize, usize)>>,
}

impl ResizeObserver for CountingObserver {
    fn observe_slot(&mut self, _slot: SlotId) {
        self.counts.borrow_mut().0 += 1;
    }

    fn unobserve_slot(&mut self, _slot: SlotId) {}

    fn disconnect(&mut self) {
        self.counts.borrow_mut().1 += 1;
    }
}

#[test]
fn dropping_the_engine_disconnects_its_observer() {
    let observer = CountingObserver::default();
    let counts = Rc::clone(&observer.counts);
    let mut v = Virtualizer::with_observer(
        TestHost::new(viewport_500()),
        observer,
        VirtualizerOptions::new(1000),
    );
    v.run_until_idle(10).unwrap();
    let (observed, disconnects) = *counts.borrow();
    assert!(observed > 0);
    assert_eq!(disconnects, 0);

    drop(v);
    assert_eq!(counts.borrow().1, 1);
}

#[test]
fn virtualizer_follows_user_scroll() {
    let mut v = virtualizer_1000(TestHost::new(viewport_500()));
    v.run_until_idle(10).unwrap();

    v.host_mut().scroll = Position::new(1_000.0, 0.0);
    assert!(v.request_update_view());
    assert!(!v.request_update_view());
    v.run_until_idle(10).unwrap();

    let shown = v.host().shown();
    assert_eq!(shown.first(), Some(&8));
    assert!(shown.contains(&15));
    assert_eq!(v.host().top_of(10), Some(1_000.0));
    assert_one_to_one(v.pool());
}

#[test]
fn factory_failure_rolls_back_and_retries() {
    let mut host = TestHost::new(viewport_500());
    host.fail_index = Some(3);
    let mut v = virtualizer_1000(host);

    let err = v.tick().unwrap_err();
    assert!(matches!(err, Error::SlotFactory { index: 3, .. }));
    assert_one_to_one(v.pool());
    assert!(v.is_pending());
    assert_eq!(v.host().shown(), [0, 1, 2]);

    v.host_mut().fail_index = None;
    v.run_until_idle(10).unwrap();
    assert_eq!(v.host().shown(), [0, 1, 2, 3, 4, 5, 6]);
    assert_eq!(v.pool().created(), 7);
    assert_eq!(v.host().top_of(3), Some(300.0));
}

#[test]
fn shrinking_total_items_trims_rendered_slots() {
    let mut v = virtualizer_1000(TestHost::new(viewport_500()));
    v.run_until_idle(10).unwrap();

    assert!(v.set_total_items(3));
    v.run_until_idle(10).unwrap();
    assert_eq!(v.host().shown(), [0, 1, 2]);

    v.set_total_items(0);
    v.run_until_idle(10).unwrap();
    assert!(v.host().shown().is_empty());
    assert_eq!(v.pool().active_len(), 0);
}

#[test]
fn clear_destroys_slots_and_starts_over() {
    let mut v = virtualizer_1000(TestHost::new(viewport_500()));
    v.run_until_idle(10).unwrap();
    v.clear();
    assert!(v.host().slots.is_empty());
    assert!(v.is_pending());
    v.run_until_idle(10).unwrap();
    assert_eq!(v.host().shown(), [0, 1, 2, 3, 4, 5, 6]);
}

#[test]
fn scheduler_coalesces_requests() {
    let mut s = Scheduler::new();
    assert!(s.request_update_view());
    assert!(!s.request_remeasure());
    assert!(!s.request_scroll_to(ScrollToIndex::new(1, ScrollToPosition::Start)));
    assert!(!s.request_scroll_to(ScrollToIndex::new(9, ScrollToPosition::End)));

    let work = s.begin_tick();
    assert!(work.update_view && work.remeasure && !work.reset);
    assert_eq!(work.scroll_to, Some(ScrollToIndex::new(9, ScrollToPosition::End)));
    assert!(!s.is_pending());
    assert!(s.begin_tick().is_empty());
    assert!(s.request_reset());
}

#[test]
fn resize_coordinator_swallows_first_report_once() {
    let mut r = ResizeCoordinator::new();
    let slot = SlotId(0);
    r.begin_render();
    assert!(r.track(slot, Size::new(10.0, 10.0)));
    assert_eq!(r.slots_resized([(slot, Size::new(10.0, 12.0))]), None);
    assert_eq!(
        r.slots_resized([(slot, Size::new(10.0, 14.0))]),
        Some(ResizeTarget::Slots(alloc::vec![slot]))
    );
    assert_eq!(r.slots_resized([(SlotId(9), Size::new(1.0, 1.0))]), None);

    assert!(r.container_resized(Size::new(5.0, 5.0)).is_some());
    assert!(r.container_resized(Size::new(5.0, 5.0)).is_none());
}

#[test]
fn random_scrolls_keep_slots_one_to_one() {
    let mut rng = Lcg::new(7);
    let mut host = TestHost::new(viewport_500());
    for i in 0..1000 {
        host.heights.insert(i, rng.gen_range_f64(30, 220));
    }
    let mut v = virtualizer_1000(host);
    v.run_until_idle(32).unwrap();

    for _ in 0..200 {
        match rng.gen_range_usize(0, 4) {
            0 => {
                v.host_mut().scroll.top = rng.gen_range_f64(0, 120_000);
                v.request_update_view();
            }
            1 => {
                let index = rng.gen_range_usize(0, 1000);
                v.request_scroll_to_index(ScrollToIndex::new(index, ScrollToPosition::Start));
            }
            2 => {
                let total = rng.gen_range_usize(0, 1000);
                v.set_total_items(total);
            }
            _ => {
                v.host_mut().scroll.top += rng.gen_range_f64(0, 400);
                v.request_update_view();
            }
        }
        v.run_until_idle(64).unwrap();
        assert_one_to_one(v.pool());

        let shown = v.host().shown();
        assert!(shown.windows(2).all(|w| w[0] + 1 == w[1]), "gap in {shown:?}");
        if let Some(range) = v.layout().range() {
            assert!(range.first <= range.last && range.last < v.total_items());
        } else {
            assert!(shown.is_empty() || v.total_items() == 0);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_range_stays_within_total(
        total in 0usize..400,
        scroll in 0u32..60_000,
        height in 100u32..900,
        shrink_to in 0usize..400,
    ) {
        let mut layout = Layout1d::new(LayoutOptions::new(total));
        layout.set_viewport_size(Size::new(300.0, height as f64));
        layout.set_viewport_scroll(Position::new(scroll as f64, 0.0));
        layout.reflow_if_needed();
        if let Some(range) = layout.range() {
            prop_assert!(range.first <= range.last && range.last < total);
        } else {
            prop_assert_eq!(total, 0);
        }

        layout.set_total_items(shrink_to);
        layout.reflow_if_needed();
        match layout.range() {
            Some(range) => prop_assert!(range.first <= range.last && range.last < shrink_to),
            None => prop_assert_eq!(shrink_to, 0),
        }
    }

    #[test]
    fn prop_settled_layout_is_idempotent(
        seed in any::<u64>(),
        total in 1usize..300,
        scroll in 0u32..30_000,
    ) {
        let mut rng = Lcg::new(seed);
        let heights: Vec<f64> = (0..total).map(|_| rng.gen_range_f64(20, 200)).collect();
        let mut layout = Layout1d::new(LayoutOptions::new(total));
        layout.set_viewport_size(viewport_500());
        layout.set_viewport_scroll(Position::new(scroll as f64, 0.0));
        settle(&mut layout, |i| heights[i]);

        let range = layout.range();
        let placed = positions(&layout);
        layout.schedule_reflow();
        layout.reflow_if_needed();
        prop_assert_eq!(layout.range(), range);
        prop_assert_eq!(positions(&layout), placed);

        if let Some(range) = range {
            if range.first == 0 {
                prop_assert_eq!(layout.item_position(0).top, 0.0);
            }
            for i in range.first..range.last {
                let gap = layout.item_position(i + 1).top - layout.item_position(i).top;
                prop_assert_eq!(gap, heights[i]);
            }
        }
    }

    #[test]
    fn prop_last_item_ends_at_the_scroll_size(
        seed in any::<u64>(),
        total in 1usize..300,
    ) {
        let mut rng = Lcg::new(seed);
        let heights: Vec<f64> = (0..total).map(|_| rng.gen_range_f64(20, 200)).collect();
        let mut layout = Layout1d::new(LayoutOptions::new(total));
        layout.set_viewport_size(viewport_500());
        settle(&mut layout, |i| heights[i]);
        prop_assert_eq!(layout.item_position(0).top, 0.0);

        layout.scroll_to_index(ScrollToIndex::new(total - 1, ScrollToPosition::End));
        settle(&mut layout, |i| heights[i]);
        let range = layout.range().unwrap();
        if range.last + 1 == total {
            let trailing = layout.item_position(total - 1).top + heights[total - 1];
            prop_assert!(
                (trailing - layout.scroll_size()).abs() < 1e-6,
                "last item ends at {} of {}",
                trailing,
                layout.scroll_size()
            );
        }
        if range.first == 0 {
            prop_assert_eq!(layout.item_position(0).top, 0.0);
        }
    }
}
