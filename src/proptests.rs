use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

fn class_ring(t: &Cedar, head: i32) -> Vec<usize> {
    let mut out = Vec::new();
    if head == 0 {
        return out;
    }
    let limit = t.size / BLOCK_SIZE + 1;
    let mut b = head;
    loop {
        let next = t.blocks.next(idx(b));
        assert_eq!(t.blocks.prev(idx(next)), b, "class ring back-link");
        out.push(idx(b));
        b = next;
        if b == head {
            break;
        }
        assert!(out.len() <= limit, "class ring does not close");
    }
    out
}

fn validate_trie(t: &Cedar) {
    assert_eq!(t.size % BLOCK_SIZE, 0);
    assert!(t.size <= t.capacity);
    assert_eq!(t.array.len(), t.capacity);
    assert_eq!(t.infos.len(), t.capacity);
    assert_eq!(t.blocks.len(), t.capacity / BLOCK_SIZE);
    assert_eq!(t.array.node(0), Node { base: 0, check: -1 }, "root moved");

    let nblocks = t.size / BLOCK_SIZE;

    // Per-block free rings.
    for b in 0..nblocks {
        let lo = (b * BLOCK_SIZE) as i32;
        let hi = lo + BLOCK_SIZE as i32;
        let num = t.blocks.num(b) as usize;
        let free = (lo..hi)
            .filter(|&i| i != 0 && t.array.check(idx(i)) < 0)
            .count();
        assert_eq!(free, num, "block {b} free count");
        if num == 0 {
            continue;
        }
        let head = t.blocks.head(b);
        let mut e = head;
        let mut seen = 0;
        loop {
            assert!((lo..hi).contains(&e), "free ring of block {b} leaves the block");
            let next = -t.array.check(idx(e));
            assert_eq!(t.array.base(idx(next)), -e, "free ring back-link");
            seen += 1;
            assert!(seen <= num, "free ring of block {b} does not close");
            e = next;
            if e == head {
                break;
            }
        }
        assert_eq!(seen, num);
    }

    // Class lists partition blocks 1..nblocks.
    let mut class = vec![None; nblocks];
    let lists = [
        ("open", class_ring(t, t.head_open)),
        ("closed", class_ring(t, t.head_closed)),
        ("full", class_ring(t, t.head_full)),
    ];
    for (name, ring) in &lists {
        for &b in ring {
            if b == 0 {
                assert_eq!(*name, "full", "block 0 listed outside the full sentinel");
                continue;
            }
            assert!(class[b].is_none(), "block {b} listed twice");
            class[b] = Some(*name);
            let num = t.blocks.num(b);
            match *name {
                "open" => {
                    assert!(num >= 2, "open block {b} has {num} free");
                    assert!(t.blocks.trial(b) < t.max_trial);
                }
                "closed" => assert!(num >= 1, "closed block {b} has no free node"),
                _ => assert_eq!(num, 0, "full block {b} has {num} free"),
            }
        }
    }
    for (b, c) in class.iter().enumerate().skip(1) {
        assert!(c.is_some(), "block {b} is in no class list");
    }

    // Every occupied node is reachable through its parent's chain.
    for i in 1..t.size {
        let parent = t.array.check(i);
        if parent < 0 {
            continue;
        }
        let base = t.array.base(idx(parent));
        assert!(base >= 0, "parent {parent} of {i} has no children");
        let label = base ^ i as i32;
        assert!((0..256).contains(&label), "node {i} outside its parent's block");

        let mut c = t.infos.child(idx(parent));
        let mut found = false;
        for _ in 0..=256 {
            if c as i32 == label {
                found = true;
                break;
            }
            c = t.infos.sibling(idx(base ^ c as i32));
            if c == 0 {
                break;
            }
        }
        assert!(found, "node {i} (label {label}) missing from chain of {parent}");
    }
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    // A narrow alphabet gives shared prefixes and base collisions.
    let byte = prop_oneof![
        6 => b'a'..=b'e',
        1 => 1u8..=255,
    ];
    prop::collection::vec(byte, 1..=10)
}

fn value_strategy() -> impl Strategy<Value = i32> {
    any::<i32>().prop_filter("reserved", |v| *v != NO_VALUE)
}

#[derive(Arbitrary, Clone, Debug)]
enum Op {
    #[proptest(weight = 5)]
    Update(
        #[proptest(strategy = "key_strategy()")] Vec<u8>,
        #[proptest(strategy = "value_strategy()")] i32,
    ),
    #[proptest(weight = 3)]
    Erase(#[proptest(strategy = "key_strategy()")] Vec<u8>),
    #[proptest(weight = 2)]
    Find(#[proptest(strategy = "key_strategy()")] Vec<u8>),
}

fn config_strategy() -> impl Strategy<Value = Config> {
    (any::<bool>(), 1i32..=3).prop_map(|(ordered, max_trial)| Config { ordered, max_trial })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(config in config_strategy(), ops in prop::collection::vec(any::<Op>(), 0..=600)) {
        let mut t = Cedar::with_config(config);
        let mut m: BTreeMap<Vec<u8>, i32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Update(key, value) => {
                    prop_assert_eq!(t.update(&key, value).unwrap(), value);
                    m.insert(key, value);
                }
                Op::Erase(key) => {
                    let got_t = t.erase(&key);
                    let got_m = m.remove(key.as_slice());
                    prop_assert_eq!(got_t, got_m);
                }
                Op::Find(key) => {
                    let got_t = t.find(&key).value();
                    let got_m = m.get(key.as_slice()).copied();
                    prop_assert_eq!(got_t, got_m);
                }
            }
        }

        validate_trie(&t);
        for (key, value) in &m {
            prop_assert_eq!(t.find(key), Probe::Value(*value));
        }

        let mut got: Vec<(Vec<u8>, i32)> = t.entries().collect();
        if !config.ordered {
            got.sort();
        }
        let expected: Vec<(Vec<u8>, i32)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(t.is_empty(), m.is_empty());
    }

    #[test]
    fn prop_serialize_round_trip(ops in prop::collection::vec(any::<Op>(), 0..=300)) {
        let mut t = Cedar::new();
        for op in ops {
            match op {
                Op::Update(key, value) => {
                    t.update(&key, value).unwrap();
                }
                Op::Erase(key) => {
                    t.erase(&key);
                }
                Op::Find(_) => {}
            }
        }
        let image = t.serialize();
        prop_assert_eq!(image.len(), t.serialized_len());
        let copy = Cedar::deserialize(&image).unwrap();
        prop_assert!(t.compare(&copy));
        prop_assert_eq!(copy.serialize(), image);
    }

    #[test]
    fn prop_prefixes_match_naive(
        keys in prop::collection::vec(key_strategy(), 1..50),
        query in key_strategy(),
    ) {
        let mut t = Cedar::new();
        let mut m: BTreeMap<Vec<u8>, i32> = BTreeMap::new();
        for (i, key) in keys.iter().enumerate() {
            t.update(key, i as i32).unwrap();
            m.insert(key.clone(), i as i32);
        }

        let got: Vec<(usize, i32)> = t.prefixes(&query).map(|p| (p.len, p.value)).collect();
        let expected: Vec<(usize, i32)> = (1..=query.len())
            .filter_map(|n| m.get(&query[..n]).map(|v| (n, *v)))
            .collect();
        prop_assert_eq!(got, expected);

        let mut predicted: Vec<(Vec<u8>, i32)> = t
            .predict(&query)
            .map(|p| {
                let mut key = query.clone();
                key.extend(t.suffix(p.node, p.len));
                (key, p.value)
            })
            .collect();
        predicted.sort();
        let expected: Vec<(Vec<u8>, i32)> = m
            .range(query.clone()..)
            .take_while(|(k, _)| k.starts_with(&query))
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        prop_assert_eq!(predicted, expected);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

fn small_set() -> Vec<Vec<u8>> {
    vec![
        b"a".to_vec(),
        b"b".to_vec(),
        b"c".to_vec(),
        b"aa".to_vec(),
        b"ab".to_vec(),
        b"ba".to_vec(),
    ]
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = small_set();
    for_each_permutation(&keys, |perm| {
        let mut t = Cedar::new();
        let mut m: BTreeMap<Vec<u8>, i32> = BTreeMap::new();
        for (i, k) in perm.into_iter().enumerate() {
            t.update(&k, i as i32).unwrap();
            m.insert(k, i as i32);
        }

        validate_trie(&t);
        let got: Vec<(Vec<u8>, i32)> = t.entries().collect();
        let expected: Vec<(Vec<u8>, i32)> = m.into_iter().collect();
        assert_eq!(got, expected);
    });
}

#[test]
fn exhaustive_erase_order_small_set() {
    let keys = small_set();
    let mut base = Cedar::new();
    base.build(&keys).unwrap();

    for_each_permutation(&keys, |perm| {
        let mut t = base.clone();
        let mut left: BTreeMap<Vec<u8>, i32> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i as i32))
            .collect();

        for k in perm {
            assert_eq!(t.erase(&k), left.remove(&k));
            validate_trie(&t);
            for (key, value) in &left {
                assert_eq!(t.find(key), Probe::Value(*value));
            }
        }
        assert!(t.is_empty());
    });
}

fn assert_fully_free(t: &Cedar) {
    validate_trie(t);
    assert!(t.is_empty());
    assert_eq!(t.head_closed, 0);
    assert_eq!(t.head_full, 0);
    assert_eq!(t.blocks.num(0), BLOCK_SIZE as i16 - 1);
    for b in 1..t.size / BLOCK_SIZE {
        assert_eq!(t.blocks.num(b), BLOCK_SIZE as i16, "block {b} still holds nodes");
    }
}

#[test]
fn mass_erase_returns_every_node() {
    let mut rng = StdRng::seed_from_u64(0xCEDA);
    let keys: Vec<Vec<u8>> = (0..1000)
        .map(|_| (0..30).map(|_| rng.gen_range(b'A'..=b'Z')).collect())
        .collect();

    let mut t = Cedar::new();
    t.build(&keys).unwrap();
    validate_trie(&t);
    for key in &keys {
        assert!(t.find(key).value().is_some());
    }

    for key in &keys {
        // Duplicates were overwritten, so the second erase of a key misses.
        let _ = t.erase(key);
        assert_eq!(t.find(key).value(), None);
    }
    assert_fully_free(&t);
}

#[test]
fn random_churn_matches_map() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut t = Cedar::new();
    let mut m: BTreeMap<Vec<u8>, i32> = BTreeMap::new();

    for round in 0..20_000 {
        let len = rng.gen_range(1..=6);
        let key: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'h')).collect();
        if rng.gen_bool(0.6) {
            let value = rng.gen_range(0..1_000_000);
            t.update(&key, value).unwrap();
            m.insert(key, value);
        } else {
            assert_eq!(t.erase(&key), m.remove(&key), "round {round}");
        }
    }

    validate_trie(&t);
    let got: Vec<(Vec<u8>, i32)> = t.entries().collect();
    let expected: Vec<(Vec<u8>, i32)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
    assert_eq!(got, expected);

    for key in m.keys().cloned().collect::<Vec<_>>() {
        t.erase(&key);
    }
    assert_fully_free(&t);
}
