use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use uni_virtualizer::Position;

/// Identifies a node in a [`NodeTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

/// What a node holds.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind<N> {
    /// A wrapper element owning the rendered content of one item.
    Element(Vec<N>),
    /// One top-level content node of a fragment.
    Content(N),
    /// An empty boundary node delimiting a fragment.
    Marker,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node<N> {
    kind: NodeKind<N>,
    hidden: bool,
    position: Option<Position>,
}

impl<N> Node<N> {
    pub fn kind(&self) -> &NodeKind<N> {
        &self.kind
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// The absolute position last assigned to the node, if any.
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Content carried by the node: the children of an element, or a single content node.
    pub fn content(&self) -> &[N] {
        match &self.kind {
            NodeKind::Element(children) => children,
            NodeKind::Content(node) => core::slice::from_ref(node),
            NodeKind::Marker => &[],
        }
    }
}

/// A retained, single-level container of nodes in document order.
///
/// Nodes exist independently of the container: a created node is detached until it is inserted,
/// and a detached node keeps its content.
#[derive(Clone, Debug)]
pub struct NodeTree<N> {
    nodes: BTreeMap<NodeId, Node<N>>,
    children: Vec<NodeId>,
    next_id: u32,
}

impl<N> Default for NodeTree<N> {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            children: Vec::new(),
            next_id: 0,
        }
    }
}

impl<N> NodeTree<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached node.
    pub fn create(&mut self, kind: NodeKind<N>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                kind,
                hidden: false,
                position: None,
            },
        );
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node<N>> {
        self.nodes.get(&id)
    }

    /// Replaces the content of a node. Returns the old content.
    pub fn replace(&mut self, id: NodeId, kind: NodeKind<N>) -> Option<NodeKind<N>> {
        let node = self.nodes.get_mut(&id)?;
        Some(core::mem::replace(&mut node.kind, kind))
    }

    /// Detaches and destroys a node.
    pub fn remove(&mut self, id: NodeId) -> Option<NodeKind<N>> {
        self.detach(id);
        self.nodes.remove(&id).map(|node| node.kind)
    }

    /// Takes a node out of the container without destroying it.
    pub fn detach(&mut self, id: NodeId) -> bool {
        match self.index_of(id) {
            Some(at) => {
                self.children.remove(at);
                true
            }
            None => false,
        }
    }

    /// Moves `run` (in order) right before `before`, or to the end when `before` is `None` or not
    /// attached. Nodes already in the container are moved, not duplicated.
    pub fn insert_before(&mut self, run: &[NodeId], before: Option<NodeId>) {
        for id in run {
            self.detach(*id);
        }
        let run = run.iter().copied().filter(|id| self.nodes.contains_key(id));
        let at = before
            .and_then(|b| self.index_of(b))
            .unwrap_or(self.children.len());
        self.children.splice(at..at, run);
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let at = self.index_of(id)?;
        self.children.get(at + 1).copied()
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.children.iter().position(|c| *c == id)
    }

    /// Attached nodes in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.hidden = hidden;
        }
    }

    pub fn set_position(&mut self, id: NodeId, position: Position) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = Some(position);
        }
    }
}
