use cordyceps_avl::AvlMap;

fn keys(map: &AvlMap<u32, &str>) -> Vec<u32> {
    map.keys().copied().collect()
}

fn main() {
    let mut map = AvlMap::new();

    // Ascending keys force a rotation on every other insertion.
    for key in 1..=7 {
        map.insert(key, "ascending");
        map.assert_invariants();
        println!("insert {key}: {:?} (height {})", keys(&map), map.height());
    }

    for key in [10, 9, 8] {
        map.insert(key, "descending");
        map.assert_invariants();
    }

    let old = map.insert(4, "replaced");
    println!("replace 4: {old:?} -> {:?}", map.get(&4));

    for key in [4, 1, 2, 6] {
        let removed = map.remove(&key);
        map.assert_invariants();
        println!("remove {key}: {removed:?} -> {:?}", keys(&map));
    }

    println!("predecessor of 5: {:?}", map.predecessor(&5));
    println!("successor of 5: {:?}", map.successor(&5));
    println!("equal paths: {}", map.has_equal_paths());

    let mut graph = String::new();
    if map.dotgraph("demo", &mut graph).is_ok() {
        println!("{graph}");
    }
}
