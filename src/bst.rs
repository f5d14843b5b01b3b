//! Plain binary search tree operations, which never look at balances.

use core::{borrow::Borrow, cmp::Ordering, pin::Pin, ptr::NonNull};

use crate::{paths, AvlTree, Dir, KeyError, Link, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the node corresponding to `key`.
    ///
    /// The key of the node must not be modified through the returned reference.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns a reference to the node corresponding to `key`, or [`KeyError`] if there is none.
    pub fn try_get<Q>(&self, key: &Q) -> Result<Pin<&T>, KeyError>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).ok_or(KeyError)
    }

    /// Returns `true` if the tree contains a node corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let first = self.extreme(Dir::Left)?;
        unsafe { Some(Pin::new_unchecked(first.as_ref())) }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let last = self.extreme(Dir::Right)?;
        unsafe { Some(Pin::new_unchecked(last.as_ref())) }
    }

    /// Returns the greatest element whose key is strictly less than `key`.
    ///
    /// `key` does not need to be present in the tree.
    pub fn predecessor<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.bound(key, Dir::Left)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns the least element whose key is strictly greater than `key`.
    ///
    /// `key` does not need to be present in the tree.
    pub fn successor<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.bound(key, Dir::Right)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    // Returns the nearest node to `key` on its `dir` side, excluding a node equal to `key`.
    fn bound<Q>(&self, key: &Q, dir: Dir) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        // How `key` compares to a node on its `dir` side.
        let wanted = match dir {
            Dir::Left => Ordering::Greater,
            Dir::Right => Ordering::Less,
        };

        let mut best = None;
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                if key.cmp(cur.as_ref().key().borrow()) == wanted {
                    // `cur` is a candidate; anything closer lies beneath it, toward `key`.
                    best = Some(cur);
                    opt_cur = T::links(cur).as_ref().child(!dir);
                } else {
                    opt_cur = T::links(cur).as_ref().child(dir);
                }
            }
        }

        best
    }

    /// Returns the height of the tree, which is 0 for an empty tree and 1 for a single node.
    pub fn height(&self) -> usize {
        unsafe { self.height_at(self.root) }
    }

    #[allow(clippy::only_used_in_recursion)]
    unsafe fn height_at(&self, node: Link<T>) -> usize {
        let Some(node) = node else {
            return 0;
        };

        unsafe {
            let left = self.height_at(T::links(node).as_ref().left());
            let right = self.height_at(T::links(node).as_ref().right());
            1 + left.max(right)
        }
    }

    /// Returns `true` if every leaf of the tree lies at the same depth.
    ///
    /// See [`paths::equal_paths`].
    pub fn has_equal_paths(&self) -> bool {
        paths::equal_paths_by(self.root, &|node: NonNull<T>| unsafe {
            let links = T::links(node).as_ref();
            [links.left(), links.right()]
        })
    }

    // Returns the extreme node of the tree in direction `dir`: the minimum for `Dir::Left`, the
    // maximum for `Dir::Right`.
    #[inline]
    pub(crate) fn extreme(&self, dir: Dir) -> Link<T> {
        let root = self.root?;
        Some(unsafe { self.extreme_in_subtree(root, dir) })
    }

    #[inline]
    unsafe fn extreme_in_subtree(&self, root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(child) = unsafe { T::links(cur).as_ref().child(dir) } {
            cur = child;
        }

        cur
    }

    // Returns the minimum node in the subtree.
    #[inline]
    pub(crate) unsafe fn min_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        unsafe { self.extreme_in_subtree(root, Dir::Left) }
    }

    // Returns the maximum node in the subtree.
    #[inline]
    pub(crate) unsafe fn max_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        unsafe { self.extreme_in_subtree(root, Dir::Right) }
    }

    // Returns the in-order neighbor of `node` in direction `dir`: the successor for `Dir::Right`,
    // the predecessor for `Dir::Left`.
    pub(crate) unsafe fn neighbor(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            if let Some(child) = T::links(node).as_ref().child(dir) {
                return Some(self.extreme_in_subtree(child, !dir));
            }

            // Climb until `cur` is a `!dir` child; its parent is the neighbor.
            let mut cur = node;
            while let Some(parent) = T::links(cur).as_ref().parent() {
                if T::links(parent).as_ref().child(!dir) == Some(cur) {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }

    #[inline]
    pub(crate) unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { T::links(parent).as_ref().left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    #[inline]
    pub(crate) unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    #[inline]
    pub(crate) unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that `old_child` is a child node of `parent`.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = if T::links(parent).as_ref().left() == Some(old_child) {
                Dir::Left
            } else {
                debug_assert_eq!(
                    T::links(parent).as_ref().right(),
                    Some(old_child),
                    "`old_child` must be a child of `parent`"
                );
                Dir::Right
            };

            T::links(parent).as_mut().set_child(dir, new_child);
        }
    }
}
