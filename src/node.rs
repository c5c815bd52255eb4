use crate::executable::Executable;
use crate::tree::CommandTree;
use std::sync::Arc;

/// An entry stored under a path segment of a [`CommandTree`].
#[derive(Debug)]
pub enum Node {
    Tree(CommandTree),
    Executable(Executable),
}

/// Nodes are shared so that every alias of a command points at one instance.
pub type NodeRef = Arc<Node>;

impl Node {
    /// Names of the wrapped tree or executable.
    pub fn names(&self) -> &[String] {
        match self {
            Node::Tree(tree) => tree.names(),
            Node::Executable(exe) => exe.names(),
        }
    }

    pub fn as_tree(&self) -> Option<&CommandTree> {
        match self {
            Node::Tree(tree) => Some(tree),
            Node::Executable(_) => None,
        }
    }

    pub fn as_executable(&self) -> Option<&Executable> {
        match self {
            Node::Tree(_) => None,
            Node::Executable(exe) => Some(exe),
        }
    }
}

/// The tree held by a node list, if the list is exactly one sub-tree.
pub(crate) fn single_tree(nodes: &[NodeRef]) -> Option<&CommandTree> {
    match nodes {
        [only] => only.as_tree(),
        _ => None,
    }
}
