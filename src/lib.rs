//! An intrusive AVL tree.
//!
//! [`AvlTree`] links user-provided nodes through an embedded [`Links`] field and owns them through
//! their [`Linked::Handle`]. [`AvlMap`] wraps it in a conventional ordered map.
#![cfg_attr(not(feature = "std"), no_std)]

// Conventions used in comments:
// - The height of a missing child is 0; the height of a node `x` is `h(x) = 1 + max(h(x.left),
//   h(x.right))`.
// - The balance of a node `x` is `b(x) = h(x.left) - h(x.right)`.
// - A node is left-heavy if `b(x) > 0` and right-heavy if `b(x) < 0`. The child on the heavy side
//   is the heavy child.
//
// The fundamental invariants of an AVL tree are:
// 1. Keys are in search tree order.
// 2. All balances are -1, 0 or 1.
//
// A balance of ±2 exists only between the structural change made by `insert` or `remove_at` and
// the rotation that repairs it.

#[cfg(feature = "alloc")]
extern crate alloc;

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not,
    ptr::NonNull,
};

use cordyceps::Linked;
use tracing::trace;

mod bst;
#[cfg(feature = "alloc")]
mod debug;
pub mod error;
mod iter;
#[cfg(feature = "alloc")]
pub mod map;
#[cfg(any(test, feature = "model"))]
pub mod model;
pub mod paths;

#[cfg(test)]
mod tests;

pub use error::KeyError;
pub use iter::Iter;
#[cfg(feature = "alloc")]
pub use map::AvlMap;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// Every node carries its balance factor, the height of its left subtree minus the height of its
/// right subtree. Insertion repairs the tree with at most one single or double rotation; removal
/// may rotate at several ancestors.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

/// The intrusive links of an [`AvlTree`] node.
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    /// The change in a parent's balance when its subtree on this side grows by one level.
    #[inline]
    fn weight(self) -> i8 {
        match self {
            Dir::Left => 1,
            Dir::Right => -1,
        }
    }
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    balance: i8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks every structural invariant of the tree, panicking on the first violation.
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0, "empty tree reports a nonzero length");
            return;
        };

        unsafe {
            assert_eq!(
                T::links(root).as_ref().parent(),
                None,
                "root parent pointer is set"
            );

            let mut count = 0;
            self.assert_invariants_at(root, None, None, &mut count);
            assert_eq!(count, self.len, "length does not match the number of nodes");
        }
    }

    // Checks the subtree at `node`, whose keys must lie strictly between `lower` and `upper`.
    //
    // Returns the height of the subtree.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at<'a>(
        &'a self,
        node: NonNull<T>,
        lower: Option<&'a T::Key>,
        upper: Option<&'a T::Key>,
        count: &mut usize,
    ) -> usize {
        unsafe {
            *count += 1;

            let key = node.as_ref().key();
            if let Some(lower) = lower {
                assert!(lower < key, "{key:?} is out of order after {lower:?}");
            }
            if let Some(upper) = upper {
                assert!(key < upper, "{key:?} is out of order before {upper:?}");
            }

            let mut heights = [0_usize; 2];
            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = T::links(node).as_ref().child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent, "child of {key:?} points at another parent");

                    let (lower, upper) = match dir {
                        Dir::Left => (lower, Some(key)),
                        Dir::Right => (Some(key), upper),
                    };
                    heights[dir as usize] = self.assert_invariants_at(child, lower, upper, count);
                }
            }

            // Ensure the stored balance is current and within bounds.
            let balance = T::links(node).as_ref().balance();
            let expected = heights[0] as isize - heights[1] as isize;
            assert_eq!(balance as isize, expected, "stale balance at {key:?}");
            assert!((-1..=1).contains(&balance), "{key:?} is unbalanced ({balance})");

            1 + heights[0].max(heights[1])
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If an item with an equal key is already present, `item` takes over its position and
    /// balance without any structural change, and the previous item is returned.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);
        unsafe { T::links(ptr).as_mut().clear() };

        let Some(root) = self.root else {
            // Tree is empty. Set `item` as the root and return.
            self.root = Some(ptr);
            self.len += 1;
            return None;
        };

        let mut parent = root;

        // Descend the tree, looking for a vacant child slot.
        let dir = loop {
            let dir = match unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) } {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return Some(unsafe { self.replace_at(parent, ptr) }),
                Ordering::Greater => Dir::Right,
            };

            match unsafe { T::links(parent).as_ref().child(dir) } {
                Some(child) => parent = child,
                None => break dir,
            }
        };

        unsafe {
            T::links(parent).as_mut().set_child(dir, Some(ptr));
            T::links(ptr).as_mut().set_parent(Some(parent));
            self.rebalance_inserted(ptr);
        }

        self.len += 1;
        None
    }

    // Puts `new` in the place of `old`, transferring its links and balance, and returns `old`.
    //
    // The caller must ensure that both keys are equal.
    unsafe fn replace_at(&mut self, old: NonNull<T>, new: NonNull<T>) -> T::Handle {
        unsafe {
            let inner = mem::replace(T::links(old).as_mut().inner.get_mut(), LinksInner::new());
            let parent = inner.parent;
            let [left, right] = inner.children;
            *T::links(new).as_mut().inner.get_mut() = inner;

            self.replace_child_or_set_root(parent, old, Some(new));
            self.maybe_set_parent(left, Some(new));
            self.maybe_set_parent(right, Some(new));

            T::from_ptr(old)
        }
    }

    // Performs a bottom-up rebalance of the tree after the insertion of the leaf `node`.
    //
    // Every ancestor visited had its subtree on the path grow by one level. Retracing stops at the
    // first ancestor whose height is unchanged: either it became balanced, or it was rotated back
    // to the height it had before the insertion.
    unsafe fn rebalance_inserted(&mut self, node: NonNull<T>) {
        let mut child = node;

        unsafe {
            while let Some(parent) = T::links(child).as_ref().parent() {
                let balance =
                    T::links(parent).as_ref().balance() + self.which_child(parent, child).weight();
                T::links(parent).as_mut().set_balance(balance);

                match balance {
                    0 => return,
                    -1 | 1 => child = parent,
                    _ => {
                        // The heavy child grew, so it cannot be balanced; the rotation always
                        // restores the previous height.
                        debug_assert_ne!(T::links(child).as_ref().balance(), 0);
                        self.rebalance_at(parent);
                        return;
                    }
                }
            }
        }
    }

    /// Removes the item associated with `key` and returns it.
    ///
    /// Returns `None`, leaving the tree untouched, if no item matches `key`.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are two cases:
        //
        // 1. `node` has no left child.
        //
        //    Its right child (which may be missing) is elevated to replace it.
        //
        // 2. `node` has a left child.
        //
        //    `node` trades places and balances with its predecessor[^1]. The predecessor has no
        //    right child by definition, so afterward neither does `node`, and its left child
        //    (which may be missing) is elevated to replace it.
        //
        // In both cases the subtree of the slot `node` is spliced out of becomes one level
        // shorter, which is repaired by retracing from that slot's parent.
        //
        // [^1]: The predecessor of a node `a` is the greatest node in `a`'s left subtree.
        unsafe {
            let replacement = match T::links(node).as_ref().left() {
                Some(left) => {
                    let predecessor = self.max_in_subtree(left);
                    self.swap_nodes(node, predecessor);
                    T::links(node).as_ref().left()
                }

                None => T::links(node).as_ref().right(),
            };

            let parent = T::links(node).as_ref().parent();
            let slot = parent.map(|p| self.which_child(p, node));

            self.replace_child_or_set_root(parent, node, replacement);
            self.maybe_set_parent(replacement, parent);

            if let (Some(parent), Some(slot)) = (parent, slot) {
                self.rebalance_removed(parent, slot);
            }

            self.len -= 1;

            T::links(node).as_mut().clear();
            T::from_ptr(node)
        }
    }

    // Performs a bottom-up rebalance of the tree after the `dir` subtree of `node` lost a level.
    //
    // Unlike insertion, a rotation here usually leaves the rotated subtree one level shorter, so
    // retracing continues above it and may rotate again at a higher ancestor.
    unsafe fn rebalance_removed(&mut self, mut node: NonNull<T>, mut dir: Dir) {
        unsafe {
            loop {
                let balance = T::links(node).as_ref().balance() - dir.weight();
                T::links(node).as_mut().set_balance(balance);

                let subtree = match balance {
                    // `node` was balanced; its height is unchanged.
                    -1 | 1 => return,
                    0 => node,
                    _ => match self.rebalance_at(node) {
                        (up, true) => up,
                        (_, false) => return,
                    },
                };

                let Some(parent) = T::links(subtree).as_ref().parent() else {
                    return;
                };

                dir = self.which_child(parent, subtree);
                node = parent;
            }
        }
    }

    // Restores the balance of `node`, whose balance is ±2, by rotation.
    //
    // The rotation is chosen from `node`'s own heavy side and the lean of its heavy child:
    // - If the heavy child leans the same way, or is balanced, `node` is rotated away from the
    //   heavy side.
    // - Otherwise the heavy child is first rotated toward the heavy side, then `node` away from
    //   it.
    //
    // Returns the new root of the subtree, and whether the subtree is now one level shorter than
    // it was while unbalanced.
    unsafe fn rebalance_at(&mut self, node: NonNull<T>) -> (NonNull<T>, bool) {
        unsafe {
            let balance = T::links(node).as_ref().balance();
            debug_assert_eq!(balance.abs(), 2, "rebalancing a balanced node");

            let heavy = if balance > 0 { Dir::Left } else { Dir::Right };
            let weight = heavy.weight();

            let child = T::links(node)
                .as_ref()
                .child(heavy)
                .expect("unbalanced node has no heavy child");
            let child_balance = T::links(child).as_ref().balance();

            if child_balance != -weight {
                trace!(key = ?node.as_ref().key(), balance, "single rotation");

                let up = self.rotate(node, !heavy);

                // A balanced heavy child only occurs after a removal. The subtree then keeps its
                // height and both nodes stay tilted.
                T::links(node).as_mut().set_balance(weight - child_balance);
                T::links(child).as_mut().set_balance(child_balance - weight);

                (up, child_balance != 0)
            } else {
                let grandchild = T::links(child)
                    .as_ref()
                    .child(!heavy)
                    .expect("inner-heavy child has no inner child");
                let grandchild_balance = T::links(grandchild).as_ref().balance();

                trace!(key = ?node.as_ref().key(), balance, "double rotation");

                self.rotate(child, heavy);
                let up = self.rotate(node, !heavy);
                debug_assert_eq!(up, grandchild);

                // The grandchild's subtrees are split between `child` and `node`; whichever side
                // received the shorter one leans away from it.
                let child_after = if grandchild_balance == -weight { weight } else { 0 };
                let node_after = if grandchild_balance == weight { -weight } else { 0 };

                T::links(child).as_mut().set_balance(child_after);
                T::links(node).as_mut().set_balance(node_after);
                T::links(grandchild).as_mut().set_balance(0);

                (up, true)
            }
        }
    }

    // Performs a rotation of `node` in direction `dir`, promoting its `!dir` child into its
    // position: `Dir::Left` rotates left, `Dir::Right` rotates right.
    //
    // - `node` becomes the `dir` child of the promoted node.
    // - The promoted node's `dir` child becomes the `!dir` child of `node`.
    //
    // The balances of affected nodes are not updated. Returns the promoted node, which is the new
    // root of the subtree.
    unsafe fn rotate(&mut self, node: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let Some(up) = T::links(node).as_ref().child(!dir) else {
                panic!("cannot rotate {dir:?} without a {:?} child", !dir);
            };

            let across = T::links(up).as_ref().child(dir);
            T::links(node).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(node));

            T::links(up).as_mut().set_child(dir, Some(node));
            let parent = T::links(node).as_mut().set_parent(Some(up));
            T::links(up).as_mut().set_parent(parent);

            self.replace_child_or_set_root(parent, node, Some(up));

            up
        }
    }

    // Exchanges the positions of `a` and `b` in the tree, including their balances.
    //
    // Every slot keeps its shape and balance while its occupant changes, which is equivalent to
    // exchanging the nodes' contents.
    unsafe fn swap_nodes(&mut self, a: NonNull<T>, b: NonNull<T>) {
        assert_ne!(a, b, "cannot swap a node with itself");

        unsafe {
            trace!(a = ?a.as_ref().key(), b = ?b.as_ref().key(), "swapping nodes");

            let a_slot = T::links(a).as_ref().parent().map(|p| self.which_child(p, a));
            let b_slot = T::links(b).as_ref().parent().map(|p| self.which_child(p, b));

            mem::swap(
                T::links(a).as_mut().inner.get_mut(),
                T::links(b).as_mut().inner.get_mut(),
            );

            // If the nodes were adjacent, each one now points at itself where it should point at
            // the other.
            for (node, other) in [(a, b), (b, a)] {
                if T::links(node).as_ref().parent() == Some(node) {
                    T::links(node).as_mut().set_parent(Some(other));
                }

                for dir in [Dir::Left, Dir::Right] {
                    if T::links(node).as_ref().child(dir) == Some(node) {
                        T::links(node).as_mut().set_child(dir, Some(other));
                    }
                }
            }

            // Point the neighbors of each slot at its new occupant.
            for (node, other, slot) in [(a, b, b_slot), (b, a, a_slot)] {
                match (T::links(node).as_ref().parent(), slot) {
                    (None, _) => self.root = Some(node),
                    (Some(parent), Some(slot)) if parent != other => {
                        T::links(parent).as_mut().set_child(slot, Some(node));
                    }
                    _ => (),
                }

                for dir in [Dir::Left, Dir::Right] {
                    if let Some(child) = T::links(node).as_ref().child(dir) {
                        if child != other {
                            T::links(child).as_mut().set_parent(Some(node));
                        }
                    }
                }
            }
        }
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.extreme(Dir::Left)?;
        Some(unsafe { self.remove_at(first) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.extreme(Dir::Right)?;
        Some(unsafe { self.remove_at(last) })
    }

    /// Returns an in-order iterator over the elements of the tree.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Clears the tree, removing all elements.
    ///
    /// This operation completes in _O(n)_ time without recursion.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root.take();

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node, then lift its right subtree into its place.
                let min = self.min_in_subtree(cur);
                let parent = T::links(min).as_ref().parent();
                let right = T::links(min).as_ref().right();

                if let Some(parent) = parent {
                    T::links(parent).as_mut().set_child(Dir::Left, right);
                }
                self.maybe_set_parent(right, parent);

                T::links(min).as_mut().clear();
                drop(T::from_ptr(min));
                self.len -= 1;

                // Continue in the lifted subtree, or climb once it is missing.
                opt_cur = right.or(parent);
            }
        }

        debug_assert_eq!(self.len(), 0);
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<'tree, T> IntoIterator for &'tree AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: ?Sized> LinksInner<T> {
    const fn new() -> Self {
        LinksInner {
            parent: None,
            children: [None; 2],
            balance: 0,
            _unpin: PhantomPinned,
        }
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner::new()),
        }
    }

    /// Returns the balance factor of the node: the height of its left subtree minus the height of
    /// its right subtree.
    #[inline]
    pub fn balance(&self) -> i8 {
        unsafe { (*self.inner.get()).balance }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_balance(&mut self, balance: i8) {
        self.inner.get_mut().balance = balance;
    }

    // Unlinks the node, resetting it to the state of a fresh leaf.
    #[inline]
    fn clear(&mut self) {
        *self.inner.get_mut() = LinksInner::new();
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("balance", &self.balance())
            .finish()
    }
}
