// Example: a list controller over the in-memory tree, with fragment insertion and an outer
// scroller.
use uni_virtualizer::{ItemBox, Position, ScrollToPosition, VirtualizerOptions};
use uni_virtualizer_host::{Insertion, ListController, NodeKind, Rect, ScrollTarget, TreeHost};

struct Message {
    id: u64,
    lines: usize,
}

fn main() {
    let items: Vec<Message> = (0..500)
        .map(|i| Message {
            id: 1_000 + i,
            lines: 1 + (i as usize % 4),
        })
        .collect();

    // The page scrolls; the list sits 120px below the top of the window.
    let target = ScrollTarget::external(
        Rect::new(120.0, 0.0, 360.0, 0.0),
        Rect::new(0.0, 0.0, 360.0, 640.0),
    );
    let host = TreeHost::new(
        items,
        target,
        |m: &Message, _| Ok(vec![format!("#{}", m.id); m.lines]),
        |_line: &String| ItemBox::new(360.0, 18.0),
    )
    .with_insertion(Insertion::Fragment);

    let mut list = ListController::new(host, VirtualizerOptions::new(0));
    list.set_item_key(|m: &Message| m.id);
    list.add_range_listener(|r| println!("rangechange {}..={}", r.first, r.last));

    if let Err(err) = list.run_until_idle(32) {
        eprintln!("render failed: {err}");
    }
    print(&list);

    list.scroll_to_index(250, ScrollToPosition::Start);
    let _ = list.run_until_idle(32);
    print(&list);

    list.scroll_to(Position::new(0.0, 0.0));
    let _ = list.run_until_idle(32);
    print(&list);
}

fn print(list: &ListController<Message, String>) {
    let tree = list.host().tree();
    let markers = tree
        .children()
        .iter()
        .filter(|id| matches!(tree.get(**id).map(|n| n.kind()), Some(NodeKind::Marker)))
        .count();
    println!(
        "scroll={:?} nodes={} markers={}",
        list.host().scroll_target().scroll(),
        tree.children().len(),
        markers
    );
    for item in list.rendered().iter().take(3) {
        println!("  {} at {:?}: {:?}", item.index, item.position, item.content);
    }
}
