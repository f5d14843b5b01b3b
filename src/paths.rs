//! Checks whether every leaf of a binary tree lies at the same depth.
//!
//! A leaf is a node without children. A node with a single child is not a leaf, so its missing
//! side does not count as a path.

#[cfg(feature = "alloc")]
use alloc::boxed::Box;

/// A node of a plain owned binary tree.
#[cfg(feature = "alloc")]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathNode {
    pub left: Option<Box<PathNode>>,
    pub right: Option<Box<PathNode>>,
}

#[cfg(feature = "alloc")]
impl PathNode {
    /// Returns a new node without children.
    pub fn leaf() -> Box<PathNode> {
        Box::default()
    }

    /// Returns a new node with the given children.
    pub fn with_children(left: Option<Box<PathNode>>, right: Option<Box<PathNode>>) -> Box<PathNode> {
        Box::new(PathNode { left, right })
    }
}

/// Returns `true` if every leaf of the tree rooted at `root` lies at the same depth.
///
/// An empty tree trivially satisfies this.
#[cfg(feature = "alloc")]
pub fn equal_paths(root: Option<&PathNode>) -> bool {
    equal_paths_by(root, &|node: &PathNode| {
        [node.left.as_deref(), node.right.as_deref()]
    })
}

pub(crate) fn equal_paths_by<N, F>(root: Option<N>, children: &F) -> bool
where
    N: Copy,
    F: Fn(N) -> [Option<N>; 2],
{
    root.map_or(true, |root| leaf_depth(root, children).is_some())
}

// Returns the depth shared by every leaf below `node`, counting `node` itself as 1, or `None` if
// two leaves differ.
fn leaf_depth<N, F>(node: N, children: &F) -> Option<usize>
where
    N: Copy,
    F: Fn(N) -> [Option<N>; 2],
{
    match children(node) {
        [None, None] => Some(1),
        [Some(only), None] | [None, Some(only)] => Some(1 + leaf_depth(only, children)?),
        [Some(left), Some(right)] => {
            let left = leaf_depth(left, children)?;
            let right = leaf_depth(right, children)?;
            (left == right).then_some(1 + left)
        }
    }
}
