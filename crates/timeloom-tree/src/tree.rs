//! Branching history storage
//!
//! Nodes are arena-allocated; a `NodeId` is an index into the arena. A node
//! may fork into any number of children, and may carry end-of-branch marks
//! for the step profiles that reached a terminal moment from it.

use std::fmt;

use timeloom_foundation::{State, StepProfile};

use crate::error::{Error, Result};

/// Unique identifier for a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A terminal end-of-branch mark, tagged with the step profile that was in
/// effect when the simulation reached its terminal moment.
#[derive(Debug, Clone)]
pub struct End {
    pub step_profile: StepProfile,
}

/// A single state in the history tree.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// The state this node holds
    pub state: State,
    /// Profile that produced this state; `None` for externally supplied
    /// states (roots, edited states)
    pub step_profile: Option<StepProfile>,
    /// End-of-branch marks hanging off this node
    ends: Vec<End>,
    /// Set while a human or tool is interactively modifying this node's
    /// state. Such a node must not be forked by a background worker.
    pub still_in_editing: bool,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Simulation clock of the held state
    pub fn clock(&self) -> f64 {
        self.state.clock
    }

    pub fn ends(&self) -> &[End] {
        &self.ends
    }

    /// Whether any branch terminates at this node
    pub fn is_end(&self) -> bool {
        !self.ends.is_empty()
    }

    /// Whether this node has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The branching history of states.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(Error::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(Error::NodeNotFound(id))
    }

    /// Add a root state, starting a new history.
    pub fn add_root(&mut self, state: State) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            parent: None,
            children: Vec::new(),
            state,
            step_profile: None,
            ends: Vec::new(),
            still_in_editing: false,
        });
        self.roots.push(id);
        id
    }

    /// Append `state` as a child of `parent`, tagged with the step profile
    /// that produced it.
    pub fn add_state(
        &mut self,
        state: State,
        parent: NodeId,
        step_profile: StepProfile,
    ) -> Result<NodeId> {
        self.node(parent)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            parent: Some(parent),
            children: Vec::new(),
            state,
            step_profile: Some(step_profile),
            ends: Vec::new(),
            still_in_editing: false,
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Mark `node` as a terminal end of its branch.
    pub fn make_end(&mut self, node: NodeId, step_profile: StepProfile) -> Result<()> {
        self.node_mut(node)?.ends.push(End { step_profile });
        Ok(())
    }

    /// Iterate over all nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeloom_foundation::{StepFunction, StepOutcome, Value};

    fn profile() -> StepProfile {
        StepProfile::bare(StepFunction::new("noop", |ctx| {
            StepOutcome::Next(ctx.state.clone())
        }))
    }

    #[test]
    fn test_add_root_and_children() {
        let mut tree = Tree::new();
        let root = tree.add_root(State::initial(Value::Int(0)));
        let a = tree
            .add_state(State::new(1.0, Value::Int(1)), root, profile())
            .unwrap();
        let b = tree
            .add_state(State::new(1.0, Value::Int(2)), root, profile())
            .unwrap();

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.roots(), &[root]);
        assert_eq!(tree.node(root).unwrap().children(), &[a, b]);
        assert_eq!(tree.node(a).unwrap().parent(), Some(root));
        assert_eq!(tree.node(b).unwrap().clock(), 1.0);
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let mut tree = Tree::new();
        let root = tree.add_root(State::initial(Value::Int(0)));
        let mut expected = Vec::new();
        for i in 0..5 {
            let child = tree
                .add_state(State::new(1.0, Value::Int(i)), root, profile())
                .unwrap();
            expected.push(child);
        }
        assert_eq!(tree.node(root).unwrap().children(), expected.as_slice());
    }

    #[test]
    fn test_make_end_marks_node() {
        let mut tree = Tree::new();
        let root = tree.add_root(State::initial(Value::Int(0)));

        assert!(!tree.node(root).unwrap().is_end());
        tree.make_end(root, profile()).unwrap();
        assert!(tree.node(root).unwrap().is_end());
        assert_eq!(tree.node(root).unwrap().ends().len(), 1);
    }

    #[test]
    fn test_unknown_parent_is_an_error() {
        let mut tree = Tree::new();
        let missing = NodeId(42);
        let result = tree.add_state(State::initial(Value::Int(0)), missing, profile());
        assert!(matches!(result, Err(Error::NodeNotFound(id)) if id == missing));
    }
}
