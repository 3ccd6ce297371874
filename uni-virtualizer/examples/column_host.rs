// Example: a minimal host that lays rows out in a column, with variable heights.
use std::collections::BTreeMap;

use uni_virtualizer::{
    Host, ItemBox, Position, ScrollToIndex, ScrollToPosition, Size, SlotId, Virtualizer,
    VirtualizerOptions,
};

#[derive(Default)]
struct Column {
    scroll: Position,
    order: Vec<SlotId>,
    rows: BTreeMap<SlotId, (usize, bool, Position)>,
    content: Option<Size>,
}

impl Column {
    fn height_of(index: usize) -> f64 {
        // Every tenth row is a tall one.
        if index % 10 == 0 { 160.0 } else { 40.0 }
    }
}

impl Host for Column {
    type Error = std::convert::Infallible;

    fn create_slot(&mut self, slot: SlotId, index: usize) -> Result<(), Self::Error> {
        self.rows.insert(slot, (index, false, Position::default()));
        Ok(())
    }

    fn update_slot(&mut self, slot: SlotId, index: usize) {
        if let Some(row) = self.rows.get_mut(&slot) {
            row.0 = index;
        }
    }

    fn remove_slot(&mut self, slot: SlotId) {
        self.rows.remove(&slot);
        self.order.retain(|s| *s != slot);
    }

    fn insert_before(&mut self, slot: SlotId, before: Option<SlotId>) {
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
        if let Some(row) = self.rows.get_mut(&slot) {
            row.1 = true;
        }
    }

    fn show(&mut self, slot: SlotId) {
        if let Some(row) = self.rows.get_mut(&slot) {
            row.1 = false;
        }
    }

    fn measure(&mut self, slot: SlotId) -> ItemBox {
        let index = self.rows.get(&slot).map_or(0, |row| row.0);
        ItemBox::new(320.0, Self::height_of(index))
    }

    fn position_slot(&mut self, slot: SlotId, position: Position) {
        if let Some(row) = self.rows.get_mut(&slot) {
            row.2 = position;
        }
    }

    fn viewport(&self) -> (Size, Position) {
        (Size::new(320.0, 480.0), self.scroll)
    }

    fn size_container(&mut self, size: Option<Size>) {
        self.content = size;
    }

    fn correct_scroll_error(&mut self, error: Position) {
        self.scroll.top -= error.top;
        self.scroll.left -= error.left;
    }
}

fn dump(v: &Virtualizer<Column>) {
    let host = v.host();
    let shown: Vec<String> = host
        .order
        .iter()
        .filter_map(|s| host.rows.get(s))
        .filter(|row| !row.1)
        .map(|row| format!("{}@{}", row.0, row.2.top))
        .collect();
    println!(
        "scroll={} content={:?} range={:?}",
        host.scroll.top,
        host.content.map(|s| s.height),
        v.visible_range()
    );
    println!("  {}", shown.join(" "));
}

fn main() {
    let mut v = Virtualizer::new(Column::default(), VirtualizerOptions::new(10_000));
    v.add_range_listener(|r| println!("rangechange {r:?}"));

    let ticks = v.run_until_idle(32).unwrap_or_default();
    println!("initial render took {ticks} ticks");
    dump(&v);

    v.request_scroll_to_index(ScrollToIndex::new(5_000, ScrollToPosition::Center));
    v.run_until_idle(32).unwrap_or_default();
    dump(&v);

    v.host_mut().scroll.top += 300.0;
    v.request_update_view();
    v.run_until_idle(32).unwrap_or_default();
    dump(&v);
}
