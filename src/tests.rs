extern crate std;

use std::{ops::Range, prelude::v1::*};

use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

// Preorder listing of `(key, balance, parent key)`, which pins down the exact shape of the tree.
type Shape = Vec<(u32, i8, Option<u32>)>;

fn shape(tree: &AvlTree<TestNode>) -> Shape {
    fn walk(node: Link<TestNode>, out: &mut Shape) {
        let Some(node) = node else {
            return;
        };

        unsafe {
            let links = TestNode::links(node).as_ref();
            out.push((
                node.as_ref().key,
                links.balance(),
                links.parent().map(|p| p.as_ref().key),
            ));
            walk(links.left(), out);
            walk(links.right(), out);
        }
    }

    let mut out = Vec::new();
    walk(tree.root, &mut out);
    out
}

fn tree_of(keys: &[u32]) -> AvlTree<TestNode> {
    let mut tree = AvlTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_none());
        tree.assert_invariants();
    }

    tree
}

fn keys(tree: &AvlTree<TestNode>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

fn root_key(tree: &AvlTree<TestNode>) -> u32 {
    unsafe { tree.root.expect("tree is empty").as_ref().key }
}

fn insert_find_all(keys: &[u32]) {
    let tree = tree_of(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

// Calls `f` with every permutation of `keys`.
fn for_each_permutation(keys: &mut [u32], k: usize, f: &mut impl FnMut(&[u32])) {
    if k == keys.len() {
        f(keys);
        return;
    }

    for i in k..keys.len() {
        keys.swap(k, i);
        for_each_permutation(keys, k + 1, f);
        keys.swap(k, i);
    }
}

#[test]
fn five_elems_find() {
    for_each_permutation(&mut [0, 1, 2, 3, 4], 0, &mut insert_find_all);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree = tree_of(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        let removed = unsafe { tree.remove_at(node) };
        assert_eq!(removed.key, *key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        assert!(tree.remove(key).is_some());
        assert!(!tree.contains_key(key));
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_six() {
    for_each_permutation(&mut [0, 1, 2, 3, 4, 5], 0, &mut insert_remove_all);
}

#[test]
fn ascending_insertions_stay_balanced() {
    let mut tree = AvlTree::new();

    for key in 1..=7 {
        tree.insert(TestNode::new(key));
        // Panics if any balance reached ±2.
        tree.assert_invariants();
    }

    assert_eq!(tree.height(), 3);
    assert_eq!(keys(&tree), (1..=7).collect::<Vec<_>>());
    assert!(tree.has_equal_paths());
}

#[test]
fn double_rotation_on_insert() {
    let tree = tree_of(&[10, 20, 30, 40, 50, 25]);

    assert_eq!(keys(&tree), vec![10, 20, 25, 30, 40, 50]);
    assert_eq!(root_key(&tree), 30);
    assert_eq!(
        shape(&tree),
        vec![
            (30, 0, None),
            (20, 0, Some(30)),
            (10, 0, Some(20)),
            (25, 0, Some(20)),
            (40, -1, Some(30)),
            (50, 0, Some(40)),
        ]
    );
}

#[test]
fn right_right_case_promotes_right_child() {
    let mut tree = tree_of(&[2, 1, 4, 3, 5]);
    assert_eq!(root_key(&tree), 2);
    assert_eq!(unsafe { TestNode::links(tree.root.unwrap()).as_ref().balance() }, -1);

    let before = keys(&tree);
    tree.insert(TestNode::new(6));
    tree.assert_invariants();

    // 2 became right-heavy by two; its right child 4 took its place.
    assert_eq!(root_key(&tree), 4);
    assert_eq!(keys(&tree), [before, vec![6]].concat());
    assert_eq!(
        shape(&tree),
        vec![
            (4, 0, None),
            (2, 0, Some(4)),
            (1, 0, Some(2)),
            (3, 0, Some(2)),
            (5, -1, Some(4)),
            (6, 0, Some(5)),
        ]
    );
}

#[test]
fn rotations_relink_without_reordering() {
    let mut tree = tree_of(&[2, 1, 4, 3, 5]);
    let before = keys(&tree);

    unsafe {
        let root = tree.root.unwrap();
        let up = tree.rotate(root, Dir::Left);

        assert_eq!(up.as_ref().key, 4);
        assert_eq!(tree.root, Some(up));
        assert_eq!(TestNode::links(up).as_ref().parent(), None);
        assert_eq!(TestNode::links(up).as_ref().left(), Some(root));
        assert_eq!(TestNode::links(root).as_ref().parent(), Some(up));

        // The promoted node's left subtree moved across.
        let across = TestNode::links(root).as_ref().right().unwrap();
        assert_eq!(across.as_ref().key, 3);
        assert_eq!(TestNode::links(across).as_ref().parent(), Some(root));
        assert_eq!(keys(&tree), before);

        // Rotating back restores the original links.
        let up = tree.rotate(up, Dir::Right);
        assert_eq!(up, root);
        assert_eq!(tree.root, Some(root));
        assert_eq!(keys(&tree), before);
    }

    // Balances were never touched, so the original tree is intact.
    tree.assert_invariants();
}

#[test]
#[should_panic(expected = "cannot rotate")]
fn rotation_without_child_panics() {
    let mut tree = tree_of(&[1]);
    let root = tree.root.unwrap();
    unsafe { tree.rotate(root, Dir::Left) };
}

#[test]
fn duplicate_insert_keeps_shape() {
    let mut tree = tree_of(&[8, 4, 12, 2, 6, 10, 14, 1]);
    let before = shape(&tree);

    let old = tree
        .insert(TestNode::with_value(6, 99))
        .expect("key was present");
    assert_eq!((old.key, old.value), (6, 0));

    tree.assert_invariants();
    assert_eq!(shape(&tree), before);
    assert_eq!(tree.len(), 8);
    assert_eq!(tree.get(&6).unwrap().value, 99);

    // Replacing the root keeps the root pointer current.
    let old = tree.insert(TestNode::with_value(8, 1)).unwrap();
    assert_eq!(old.key, 8);
    tree.assert_invariants();
    assert_eq!(shape(&tree), before);
}

#[test]
fn removing_missing_key_keeps_shape() {
    let mut tree = tree_of(&[8, 4, 12, 2, 6, 10, 14, 1]);
    let before = shape(&tree);

    assert!(tree.remove(&5).is_none());
    assert!(tree.remove(&100).is_none());

    assert_eq!(shape(&tree), before);
    assert_eq!(tree.len(), 8);

    let mut empty: AvlTree<TestNode> = AvlTree::new();
    assert!(empty.remove(&0).is_none());
    assert!(empty.pop_first().is_none());
    assert!(empty.pop_last().is_none());
}

#[test]
fn remove_leaf() {
    let mut tree = tree_of(&[1, 2, 3, 4, 5, 6, 7]);

    assert!(tree.remove(&5).is_some());
    tree.assert_invariants();

    assert_eq!(keys(&tree), vec![1, 2, 3, 4, 6, 7]);
    assert_eq!(
        shape(&tree),
        vec![
            (4, 0, None),
            (2, 0, Some(4)),
            (1, 0, Some(2)),
            (3, 0, Some(2)),
            (6, -1, Some(4)),
            (7, 0, Some(6)),
        ]
    );
}

#[test]
fn remove_node_with_one_child() {
    let mut tree = tree_of(&[2, 1, 3, 4]);

    assert!(tree.remove(&3).is_some());
    tree.assert_invariants();

    assert_eq!(
        shape(&tree),
        vec![(2, 0, None), (1, 0, Some(2)), (4, 0, Some(2))]
    );
}

#[test]
fn remove_node_with_two_children() {
    let mut tree = tree_of(&[1, 2, 3, 4, 5, 6, 7]);

    // The predecessor 3 takes the root's place and balance.
    assert!(tree.remove(&4).is_some());
    tree.assert_invariants();

    assert_eq!(
        shape(&tree),
        vec![
            (3, 0, None),
            (2, 1, Some(3)),
            (1, 0, Some(2)),
            (6, 0, Some(3)),
            (5, 0, Some(6)),
            (7, 0, Some(6)),
        ]
    );

    // The predecessor of 2 is its own left child.
    assert!(tree.remove(&2).is_some());
    tree.assert_invariants();

    assert_eq!(
        shape(&tree),
        vec![
            (3, -1, None),
            (1, 0, Some(3)),
            (6, 0, Some(3)),
            (5, 0, Some(6)),
            (7, 0, Some(6)),
        ]
    );
}

#[test]
fn removal_rotates_in_opposite_directions() {
    // Level order of:
    //
    //            30
    //        /        \
    //      20          50
    //     /  \       /    \
    //   10    25   40      70
    //   /         /       /  \
    //  5         35     60    80
    //                           \
    //                            90
    let mut tree = tree_of(&[30, 20, 50, 10, 25, 40, 70, 5, 35, 60, 80, 90]);
    assert_eq!(tree.height(), 5);
    assert_eq!(root_key(&tree), 30);

    // Removing 25 leaves 20 left-heavy by two, which needs a right rotation. That shortens the
    // left subtree of 30, leaving it right-heavy by two, which needs a left rotation.
    assert!(tree.remove(&25).is_some());
    tree.assert_invariants();

    assert_eq!(
        shape(&tree),
        vec![
            (50, 0, None),
            (30, 0, Some(50)),
            (10, 0, Some(30)),
            (5, 0, Some(10)),
            (20, 0, Some(10)),
            (40, 1, Some(30)),
            (35, 0, Some(40)),
            (70, -1, Some(50)),
            (60, 0, Some(70)),
            (80, -1, Some(70)),
            (90, 0, Some(80)),
        ]
    );
    assert_eq!(tree.height(), 4);
}

#[test]
fn removal_needs_double_rotation() {
    let mut tree = tree_of(&[20, 10, 30, 25]);

    // 20 becomes right-heavy by two while its right child leans left.
    assert!(tree.remove(&10).is_some());
    tree.assert_invariants();

    assert_eq!(
        shape(&tree),
        vec![(25, 0, None), (20, 0, Some(25)), (30, 0, Some(25))]
    );
}

#[test]
fn removal_with_balanced_heavy_child() {
    let mut tree = tree_of(&[20, 10, 30, 25, 35]);

    // The single rotation keeps the subtree's height, so both nodes stay tilted.
    assert!(tree.remove(&10).is_some());
    tree.assert_invariants();

    assert_eq!(
        shape(&tree),
        vec![
            (30, 1, None),
            (20, -1, Some(30)),
            (25, 0, Some(20)),
            (35, 0, Some(30)),
        ]
    );
}

#[test]
fn swap_nodes_exchanges_positions_and_keeps_slot_balances() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7, 8]);
    let before = shape(&tree);

    let relabel = |shape: &Shape, a: u32, b: u32| -> Shape {
        let swap = |k: u32| if k == a { b } else if k == b { a } else { k };
        shape
            .iter()
            .map(|&(key, balance, parent)| (swap(key), balance, parent.map(swap)))
            .collect()
    };

    unsafe {
        // Adjacent: 2 and its left child 1.
        let a = tree.get_raw(&2).unwrap();
        let b = tree.get_raw(&1).unwrap();
        tree.swap_nodes(a, b);
        assert_eq!(shape(&tree), relabel(&before, 2, 1));
        tree.swap_nodes(a, b);
        assert_eq!(shape(&tree), before);

        // Root and a distant node.
        let a = tree.get_raw(&4).unwrap();
        let b = tree.get_raw(&8).unwrap();
        tree.swap_nodes(a, b);
        assert_eq!(root_key(&tree), 8);
        assert_eq!(shape(&tree), relabel(&before, 4, 8));
        tree.swap_nodes(b, a);
        assert_eq!(shape(&tree), before);

        // Siblings.
        let a = tree.get_raw(&5).unwrap();
        let b = tree.get_raw(&7).unwrap();
        tree.swap_nodes(a, b);
        assert_eq!(shape(&tree), relabel(&before, 5, 7));
        tree.swap_nodes(a, b);
    }

    tree.assert_invariants();
    assert_eq!(shape(&tree), before);
}

#[test]
fn repeated_root_removal() {
    let mut tree = tree_of(&(0..64).collect::<Vec<_>>());

    while let Some(root) = tree.root {
        let key = unsafe { root.as_ref().key };
        let removed = tree.remove(&key).unwrap();
        assert_eq!(removed.key, key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn scrambled_insertions_and_removals() {
    // 7919 is coprime to 1009, so this visits every key below 1009 exactly once.
    let scrambled: Vec<u32> = (0..1009).map(|i| i * 7919 % 1009).collect();

    let mut tree = AvlTree::new();
    for &key in &scrambled {
        tree.insert(TestNode::new(key));
    }
    tree.assert_invariants();
    assert_eq!(tree.len(), 1009);

    // An AVL tree 15 levels tall holds at least 1596 nodes.
    assert!(tree.height() <= 14);

    for &key in scrambled.iter().filter(|&&k| k % 3 == 0) {
        assert!(tree.remove(&key).is_some());
    }
    tree.assert_invariants();

    let expected: Vec<u32> = (0..1009).filter(|k| k % 3 != 0).collect();
    assert_eq!(keys(&tree), expected);
}

#[test]
fn lookups() {
    let tree = tree_of(&[40, 20, 60, 10, 30, 50, 70]);

    assert_eq!(tree.first().map(|n| n.key), Some(10));
    assert_eq!(tree.last().map(|n| n.key), Some(70));
    assert_eq!(tree.try_get(&30).map(|n| n.key), Ok(30));
    assert_eq!(tree.try_get(&35).map(|n| n.key), Err(KeyError));

    assert_eq!(tree.predecessor(&40).map(|n| n.key), Some(30));
    assert_eq!(tree.predecessor(&10).map(|n| n.key), None);
    assert_eq!(tree.predecessor(&55).map(|n| n.key), Some(50));
    assert_eq!(tree.successor(&30).map(|n| n.key), Some(40));
    assert_eq!(tree.successor(&70).map(|n| n.key), None);
    assert_eq!(tree.successor(&0).map(|n| n.key), Some(10));

    let empty: AvlTree<TestNode> = AvlTree::new();
    assert!(empty.first().is_none());
    assert!(empty.predecessor(&1).is_none());
    assert_eq!(empty.height(), 0);
    assert!(empty.has_equal_paths());
}

#[test]
fn iterates_in_order_from_both_ends() {
    let tree = tree_of(&[5, 3, 8, 1, 4, 7, 9, 2, 6]);

    let forward: Vec<u32> = tree.iter().map(|n| n.key).collect();
    assert_eq!(forward, (1..=9).collect::<Vec<_>>());

    let backward: Vec<u32> = tree.iter().rev().map(|n| n.key).collect();
    assert_eq!(backward, (1..=9).rev().collect::<Vec<_>>());

    // Alternating ends meet in the middle without repeating.
    let mut iter = tree.iter();
    let mut seen = Vec::new();
    while let (Some(front), back) = (iter.next(), iter.next_back()) {
        seen.push(front.key);
        seen.extend(back.map(|n| n.key));
    }
    seen.sort_unstable();
    assert_eq!(seen, (1..=9).collect::<Vec<_>>());
}

#[test]
fn equal_paths_reflects_shape() {
    assert!(tree_of(&[2, 1, 3]).has_equal_paths());
    assert!(!tree_of(&[2, 1, 3, 4]).has_equal_paths());
    // A unary node's missing side is not a leaf.
    assert!(tree_of(&[1, 2]).has_equal_paths());
}

#[test]
fn pops_and_clear() {
    let mut tree = tree_of(&[3, 1, 4, 5, 9, 2, 6]);

    assert_eq!(tree.pop_first().map(|n| n.key), Some(1));
    tree.assert_invariants();
    assert_eq!(tree.pop_last().map(|n| n.key), Some(9));
    tree.assert_invariants();
    assert_eq!(keys(&tree), vec![2, 3, 4, 5, 6]);

    tree.clear();
    assert!(tree.is_empty());
    assert!(tree.root.is_none());
    tree.assert_invariants();

    // The tree is reusable after clearing.
    tree.insert(TestNode::new(1));
    tree.assert_invariants();
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn insert_then_remove_keeps_invariants(
        keys in proptest::collection::vec(0u32..500, 0..200),
        extra in 0u32..500,
    ) {
        let mut tree = AvlTree::new();
        for &key in &keys {
            tree.insert(TestNode::new(key));
            tree.assert_invariants();
        }

        tree.insert(TestNode::new(extra));
        tree.assert_invariants();

        prop_assert!(tree.remove(&extra).is_some());
        tree.assert_invariants();
        prop_assert!(!tree.contains_key(&extra));

        let mut expected: Vec<u32> = keys.iter().copied().filter(|&k| k != extra).collect();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(self::keys(&tree), expected);
        prop_assert_eq!(tree.len(), tree.iter().count());
    }
}
