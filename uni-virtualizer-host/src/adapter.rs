use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use uni_virtualizer::{Direction, Host, ItemBox, Position, Size, SlotId};

use crate::tree::{NodeId, NodeKind, NodeTree};
use crate::{HostError, ScrollTarget};

type RenderFn<I, N> = Box<dyn Fn(&I, usize) -> Result<Vec<N>, String>>;
type MeasureFn<N> = Box<dyn Fn(&N) -> ItemBox>;

/// How a slot's rendered content is placed in the container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Insertion {
    /// One wrapper node per slot, holding the rendered nodes as children.
    #[default]
    Element,
    /// The rendered nodes go straight into the container, between two marker nodes.
    Fragment,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SlotNodes {
    Element(NodeId),
    Fragment {
        start: NodeId,
        content: Vec<NodeId>,
        end: NodeId,
    },
}

impl SlotNodes {
    fn head(&self) -> NodeId {
        match self {
            Self::Element(id) => *id,
            Self::Fragment { start, .. } => *start,
        }
    }

    fn tail(&self) -> NodeId {
        match self {
            Self::Element(id) => *id,
            Self::Fragment { end, .. } => *end,
        }
    }

    /// Every node of the slot, in document order.
    fn run(&self) -> Vec<NodeId> {
        match self {
            Self::Element(id) => alloc::vec![*id],
            Self::Fragment {
                start,
                content,
                end,
            } => {
                let mut run = Vec::with_capacity(content.len() + 2);
                run.push(*start);
                run.extend_from_slice(content);
                run.push(*end);
                run
            }
        }
    }
}

#[derive(Clone, Debug)]
struct SlotEntry {
    nodes: SlotNodes,
    index: usize,
}

/// Counters for the slot lifecycle calls a [`TreeHost`] received.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostStats {
    pub created: usize,
    pub updated: usize,
    pub recycled: usize,
    pub removed: usize,
}

/// A visible slot, as read back from the tree.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedItem<'a, N> {
    pub slot: SlotId,
    pub index: usize,
    pub position: Option<Position>,
    pub content: Vec<&'a N>,
}

/// A [`Host`] over an in-memory [`NodeTree`].
///
/// Items are turned into nodes by a caller-supplied `render_item` function. A slot's box is its
/// nodes stacked along the scroll axis, each measured by `measure_node`.
pub struct TreeHost<I, N> {
    tree: NodeTree<N>,
    insertion: Insertion,
    direction: Direction,
    target: ScrollTarget,
    items: Vec<I>,
    render_item: RenderFn<I, N>,
    measure_node: MeasureFn<N>,
    slots: BTreeMap<SlotId, SlotEntry>,
    heads: BTreeMap<NodeId, SlotId>,
    content_size: Option<Size>,
    stats: HostStats,
}

impl<I, N> TreeHost<I, N> {
    pub fn new(
        items: Vec<I>,
        target: ScrollTarget,
        render_item: impl Fn(&I, usize) -> Result<Vec<N>, String> + 'static,
        measure_node: impl Fn(&N) -> ItemBox + 'static,
    ) -> Self {
        Self {
            tree: NodeTree::new(),
            insertion: Insertion::default(),
            direction: Direction::default(),
            target,
            items,
            render_item: Box::new(render_item),
            measure_node: Box::new(measure_node),
            slots: BTreeMap::new(),
            heads: BTreeMap::new(),
            content_size: None,
            stats: HostStats::default(),
        }
    }

    /// Selects the insertion strategy. Only meaningful before the first render.
    pub fn with_insertion(mut self, insertion: Insertion) -> Self {
        self.insertion = insertion;
        self
    }

    pub fn insertion(&self) -> Insertion {
        self.insertion
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn items(&self) -> &[I] {
        &self.items
    }

    /// Replaces the items. Slots keep their stale content until the engine re-binds them.
    pub fn set_items(&mut self, items: Vec<I>) {
        self.items = items;
    }

    /// Mutable items. The engine is not told; see [`Self::rerender`].
    pub fn items_mut(&mut self) -> &mut [I] {
        &mut self.items
    }

    pub fn tree(&self) -> &NodeTree<N> {
        &self.tree
    }

    pub fn scroll_target(&self) -> &ScrollTarget {
        &self.target
    }

    pub fn scroll_target_mut(&mut self) -> &mut ScrollTarget {
        &mut self.target
    }

    /// The size last requested for the scrollable content.
    pub fn content_size(&self) -> Option<Size> {
        self.content_size
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn slot_index(&self, slot: SlotId) -> Option<usize> {
        self.slots.get(&slot).map(|entry| entry.index)
    }

    /// The current border-box size of a slot, as a resize observer would report it.
    pub fn slot_size(&self, slot: SlotId) -> Option<Size> {
        let entry = self.slots.get(&slot)?;
        let item_box = self.stack(&entry.nodes);
        Some(Size::new(item_box.width, item_box.height))
    }

    /// Re-renders the slot bound to `index` without telling the engine, the way content can
    /// change size on its own. Returns the slot, if one is bound.
    pub fn rerender(&mut self, index: usize) -> Option<SlotId> {
        let slot = self
            .slots
            .iter()
            .find(|(_, entry)| {
                entry.index == index
                    && self
                        .tree
                        .get(entry.nodes.head())
                        .is_some_and(|head| !head.is_hidden())
            })
            .map(|(slot, _)| *slot)?;
        self.rebind(slot, index);
        Some(slot)
    }

    /// Visible slots in document order.
    pub fn rendered(&self) -> Vec<RenderedItem<'_, N>> {
        let mut out = Vec::new();
        for id in self.tree.children() {
            let Some(slot) = self.heads.get(id) else {
                continue;
            };
            let Some(entry) = self.slots.get(slot) else {
                continue;
            };
            let Some(head) = self.tree.get(*id) else {
                continue;
            };
            if head.is_hidden() {
                continue;
            }
            let content = entry
                .nodes
                .run()
                .into_iter()
                .filter_map(|id| self.tree.get(id))
                .flat_map(|node| node.content())
                .collect();
            out.push(RenderedItem {
                slot: *slot,
                index: entry.index,
                position: head.position(),
                content,
            });
        }
        out
    }

    fn render(&self, index: usize) -> Result<Vec<N>, HostError> {
        let item = self.items.get(index).ok_or(HostError::MissingItem {
            index,
            len: self.items.len(),
        })?;
        (self.render_item)(item, index).map_err(|message| HostError::Render { index, message })
    }

    fn stack(&self, nodes: &SlotNodes) -> ItemBox {
        let (mut main, mut cross) = (0.0_f64, 0.0_f64);
        for node in nodes.run().into_iter().filter_map(|id| self.tree.get(id)) {
            for content in node.content() {
                let outer = (self.measure_node)(content).outer();
                main += self.direction.main(outer);
                cross = cross.max(self.direction.cross(outer));
            }
        }
        let size = self.direction.size(main, cross);
        ItemBox::new(size.width, size.height)
    }

    fn build(&mut self, content: Vec<N>) -> SlotNodes {
        match self.insertion {
            Insertion::Element => SlotNodes::Element(self.tree.create(NodeKind::Element(content))),
            Insertion::Fragment => {
                let start = self.tree.create(NodeKind::Marker);
                let content = content
                    .into_iter()
                    .map(|node| self.tree.create(NodeKind::Content(node)))
                    .collect();
                let end = self.tree.create(NodeKind::Marker);
                SlotNodes::Fragment {
                    start,
                    content,
                    end,
                }
            }
        }
    }

    fn rebind(&mut self, slot: SlotId, index: usize) {
        let content = match self.render(index) {
            Ok(content) => content,
            Err(_err) => {
                vwarn!(slot = slot.0, error = %_err, "update_slot: rendering empty content");
                Vec::new()
            }
        };
        let Some(entry) = self.slots.get_mut(&slot) else {
            return;
        };
        entry.index = index;
        match &mut entry.nodes {
            SlotNodes::Element(id) => {
                self.tree.replace(*id, NodeKind::Element(content));
            }
            SlotNodes::Fragment {
                start,
                content: old,
                end,
            } => {
                for id in old.drain(..) {
                    self.tree.remove(id);
                }
                let (hidden, position) = self
                    .tree
                    .get(*start)
                    .map_or((false, None), |n| (n.is_hidden(), n.position()));
                for node in content {
                    let id = self.tree.create(NodeKind::Content(node));
                    self.tree.set_hidden(id, hidden);
                    if let Some(position) = position {
                        self.tree.set_position(id, position);
                    }
                    old.push(id);
                }
                if self.tree.is_attached(*end) {
                    self.tree.insert_before(old, Some(*end));
                }
            }
        }
    }

    fn set_hidden(&mut self, slot: SlotId, hidden: bool) {
        let Some(entry) = self.slots.get(&slot) else {
            return;
        };
        for id in entry.nodes.run() {
            self.tree.set_hidden(id, hidden);
        }
    }
}

impl<I, N> Host for TreeHost<I, N> {
    type Error = HostError;

    fn create_slot(&mut self, slot: SlotId, index: usize) -> Result<(), HostError> {
        let content = self.render(index)?;
        let nodes = self.build(content);
        vtrace!(slot = slot.0, index, "create_slot");
        self.heads.insert(nodes.head(), slot);
        self.slots.insert(slot, SlotEntry { nodes, index });
        self.stats.created += 1;
        Ok(())
    }

    fn update_slot(&mut self, slot: SlotId, index: usize) {
        self.rebind(slot, index);
        self.stats.updated += 1;
    }

    fn recycle_slot(&mut self, _slot: SlotId) {
        self.stats.recycled += 1;
    }

    fn remove_slot(&mut self, slot: SlotId) {
        let Some(entry) = self.slots.remove(&slot) else {
            return;
        };
        self.heads.remove(&entry.nodes.head());
        for id in entry.nodes.run() {
            self.tree.remove(id);
        }
        self.stats.removed += 1;
    }

    fn insert_before(&mut self, slot: SlotId, before: Option<SlotId>) {
        let Some(entry) = self.slots.get(&slot) else {
            return;
        };
        let run = entry.nodes.run();
        let before = before
            .and_then(|b| self.slots.get(&b))
            .map(|b| b.nodes.head());
        self.tree.insert_before(&run, before);
    }

    fn next_sibling(&self, slot: SlotId) -> Option<SlotId> {
        let tail = self.slots.get(&slot)?.nodes.tail();
        let next = self.tree.next_sibling(tail)?;
        self.heads.get(&next).copied()
    }

    fn is_attached(&self, slot: SlotId) -> bool {
        self.slots
            .get(&slot)
            .is_some_and(|entry| self.tree.is_attached(entry.nodes.head()))
    }

    fn hide(&mut self, slot: SlotId) {
        self.set_hidden(slot, true);
    }

    fn show(&mut self, slot: SlotId) {
        self.set_hidden(slot, false);
    }

    fn measure(&mut self, slot: SlotId) -> ItemBox {
        self.slots
            .get(&slot)
            .map(|entry| self.stack(&entry.nodes))
            .unwrap_or_default()
    }

    fn position_slot(&mut self, slot: SlotId, position: Position) {
        let Some(entry) = self.slots.get(&slot) else {
            return;
        };
        for id in entry.nodes.run() {
            self.tree.set_position(id, position);
        }
    }

    fn viewport(&self) -> (Size, Position) {
        self.target.viewport(self.direction)
    }

    fn size_container(&mut self, size: Option<Size>) {
        self.content_size = size;
    }

    fn correct_scroll_error(&mut self, error: Position) {
        self.target.correct_scroll_error(error);
    }
}

impl<I, N> core::fmt::Debug for TreeHost<I, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TreeHost")
            .field("insertion", &self.insertion)
            .field("direction", &self.direction)
            .field("target", &self.target)
            .field("items", &self.items.len())
            .field("slots", &self.slots.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
