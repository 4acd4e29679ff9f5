use dawg_automata::{
    Automaton, Dawg, EncodingChoice, RebuildOptions, Value,
};
use proptest::prelude::*;

use crate::{dawg_of, dawg_with_values};

#[test]
fn minimized_prefix_share() {
    let mut dawg = dawg_of(&["car", "cars", "cat", "cats"]);
    dawg.minimize().unwrap();
    let stats = dawg.stats();
    assert!(stats.node_count <= 7, "got {} nodes", stats.node_count);
    assert_eq!(
        dawg.find_prefixes("ca").collect::<Vec<_>>(),
        vec!["car", "cars", "cat", "cats"],
    );
}

#[test]
fn value_overwrite() {
    let mut dawg = Dawg::new();
    dawg.add("duplicate", Some(Value::Int(1)));
    dawg.add("duplicate", Some(Value::Int(100)));
    assert_eq!(
        dawg.lookup("duplicate").and_then(|m| m.value),
        Some(Value::Int(100)),
    );
    assert_eq!(dawg.all_keys().collect::<Vec<_>>(), vec!["duplicate"]);
}

#[test]
fn auto_compress_then_auto_widen() {
    let mut dawg = dawg_of(&[]);
    dawg.add("hello", None);
    assert!(dawg.stats().is_ascii_only);

    dawg.add("привет", None);
    assert!(dawg.stats().is_compressed_unicode);
    assert!(!dawg.stats().is_ascii_only);

    // Chinese plus enough Greek pushes the distinct unit count past the
    // 89 remap slots.
    dawg.add("你好世界", None);
    let greek: String =
        (0..90u32).filter_map(|i| char::from_u32(0x3B1 + i)).collect();
    dawg.add(&greek, None);
    let stats = dawg.stats();
    assert!(!stats.is_ascii_only);
    assert!(!stats.is_compressed_unicode);

    for key in ["hello", "привет", "你好世界"] {
        assert!(dawg.lookup(key).is_some(), "lost {} after widening", key);
    }
}

#[test]
fn queries_are_insertion_order_independent() {
    let mut forward = dawg_of(&["alpha", "beta", "gamma", "delta"]);
    let mut backward = dawg_of(&["delta", "gamma", "beta", "alpha"]);
    forward.minimize().unwrap();
    backward.minimize().unwrap();
    assert_eq!(
        forward.all_keys().collect::<Vec<_>>(),
        backward.all_keys().collect::<Vec<_>>(),
    );
    assert_eq!(
        forward.to_bytes().unwrap(),
        backward.to_bytes().unwrap(),
        "equal key sets serialize to identical containers",
    );
}

#[test]
fn rebuild_compacts_dead_value_entries() {
    let mut dawg = Dawg::new();
    for round in 0..5u64 {
        dawg.add("key", Some(Value::Int(round)));
    }
    assert_eq!(dawg.stats().value_count, 1);
    dawg.rebuild(RebuildOptions::new()).unwrap();
    assert_eq!(
        dawg.lookup("key").and_then(|m| m.value),
        Some(Value::Int(4)),
    );
}

#[test]
fn forced_rebuild_reports_encoding_exceeded() {
    let mut dawg = dawg_of(&["hello"]);
    let cjk: String =
        (0..100u32).filter_map(|i| char::from_u32(0x4E00 + i)).collect();
    dawg.add(&cjk, None);
    let err = dawg
        .rebuild(RebuildOptions::new().encoding(EncodingChoice::Compressed))
        .unwrap_err();
    assert!(err.is_encoding_exceeded());
    let err = dawg
        .rebuild(RebuildOptions::new().encoding(EncodingChoice::Ascii))
        .unwrap_err();
    assert!(err.is_encoding_exceeded());
    // Auto always succeeds.
    dawg.rebuild(RebuildOptions::new()).unwrap();
    assert!(dawg.contains("hello"));
    assert!(dawg.contains(&cjk));
}

#[test]
fn values_survive_encoding_upgrades() {
    let mut dawg = dawg_with_values(&[
        ("one", Value::Int(1)),
        ("two", Value::Str("a pair".to_string())),
    ]);
    dawg.add("три", Some(Value::Str("значение".to_string())));
    assert!(dawg.stats().is_compressed_unicode);
    assert_eq!(
        dawg.lookup("one").and_then(|m| m.value),
        Some(Value::Int(1)),
    );
    assert_eq!(
        dawg.lookup("три").and_then(|m| m.value),
        Some(Value::Str("значение".to_string())),
    );
}

#[test]
fn minimize_after_each_add_round() {
    // Interleave minimization and mutation; the thaw path must keep the
    // key set intact every round.
    let words = ["tap", "taps", "top", "tops", "tip", "tips"];
    let mut dawg = Dawg::new();
    for (i, word) in words.iter().enumerate() {
        dawg.add(word, None);
        dawg.minimize().unwrap();
        let keys: Vec<String> = dawg.all_keys().collect();
        let mut expected: Vec<&str> = words[..=i].to_vec();
        expected.sort_unstable();
        assert_eq!(keys, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn round_trip_closure(
        entries in prop::collection::btree_map(
            "[a-z]{0,8}", 0u64..1000, 0..40,
        ),
    ) {
        let mut dawg = Dawg::new();
        for (key, &value) in &entries {
            dawg.add(key, Some(Value::Int(value)));
        }
        let before = dawg.stats().node_count;
        let stats = dawg.minimize().unwrap();
        prop_assert!(stats.node_count <= before);

        for (key, &value) in &entries {
            prop_assert!(dawg.contains(key));
            prop_assert_eq!(
                dawg.lookup(key).and_then(|m| m.value),
                Some(Value::Int(value)),
            );
        }
        prop_assert!(!dawg.contains("NOT-A-KEY"));
        let keys: Vec<String> = dawg.all_keys().collect();
        let expected: Vec<String> = entries.keys().cloned().collect();
        prop_assert_eq!(keys, expected);
    }

    #[test]
    fn prefix_totality(
        keys in prop::collection::btree_set("[ab]{0,6}", 0..32),
        prefix in "[ab]{0,3}",
    ) {
        let mut dawg = Dawg::new();
        for key in &keys {
            dawg.add(key, None);
        }
        dawg.minimize().unwrap();
        let got: Vec<String> = dawg.find_prefixes(&prefix).collect();
        let expected: Vec<String> = keys
            .iter()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn binary_round_trip(
        keys in prop::collection::btree_set("[a-cх-ъ]{0,5}", 0..24),
    ) {
        let mut dawg = Dawg::new();
        for key in &keys {
            dawg.add(key, None);
        }
        dawg.minimize().unwrap();
        let bytes = dawg.to_bytes().unwrap();
        let back = Dawg::from_bytes(&bytes).unwrap();
        prop_assert_eq!(
            back.all_keys().collect::<Vec<_>>(),
            dawg.all_keys().collect::<Vec<_>>(),
        );
        for key in &keys {
            prop_assert!(back.contains(key));
        }
    }
}
