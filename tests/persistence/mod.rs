use std::sync::Arc;
use std::thread;

use dawg_automata::{
    container, Automaton, Container, Dawg, Encoding, MappedDawg, Value,
};

use crate::{dawg_of, dawg_with_values};

fn temp_path(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
    dir.path().join(name)
}

#[test]
fn binary_round_trip_with_values() {
    let mut dawg = dawg_with_values(&[
        ("apple", Value::Int(1)),
        ("banana", Value::Int(2)),
        ("cherry", Value::Int(3)),
    ]);
    dawg.minimize().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "fruit.dawg");
    dawg.save_binary(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], &[0x44, 0x41, 0x57, 0x47]);

    let reader = MappedDawg::open(&path).unwrap();
    for (key, expected) in [("apple", 1), ("banana", 2), ("cherry", 3)] {
        assert_eq!(
            reader.lookup(key).and_then(|m| m.value),
            Some(Value::Int(expected)),
            "{}",
            key,
        );
    }
    assert!(!reader.contains("grape"));
    reader.close();
}

#[test]
fn reader_matches_freshly_loaded_graph() {
    let mut dawg = dawg_with_values(&[
        ("sun", Value::Int(10)),
        ("sunny", Value::Str("bright".to_string())),
        ("луна", Value::Str("ночь".to_string())),
    ]);
    dawg.add("moonless", None);
    dawg.minimize().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "sky.dawg");
    dawg.save_binary(&path).unwrap();

    let reader = MappedDawg::open(&path).unwrap();
    let loaded = Dawg::load(&path).unwrap();
    assert_eq!(reader.encoding(), loaded.encoding());
    for key in ["sun", "sunny", "луна", "moonless", "", "absent", "лун"] {
        assert_eq!(reader.lookup(key), loaded.lookup(key), "{}", key);
        assert_eq!(reader.contains(key), loaded.contains(key), "{}", key);
    }
    assert_eq!(
        reader.find_prefixes("sun").collect::<Vec<_>>(),
        loaded.find_prefixes("sun").collect::<Vec<_>>(),
    );
    assert_eq!(
        reader.all_keys().collect::<Vec<_>>(),
        loaded.all_keys().collect::<Vec<_>>(),
    );
}

#[test]
fn wide_containers_round_trip() {
    let mut dawg = dawg_of(&["hello"]);
    let wide: String =
        (0..95u32).filter_map(|i| char::from_u32(0x4E00 + i)).collect();
    dawg.add(&wide, Some(Value::Int(42)));
    assert_eq!(dawg.encoding(), Encoding::Wide);
    dawg.minimize().unwrap();

    let bytes = dawg.to_bytes().unwrap();
    let container = Container::from_bytes(&bytes[..]).unwrap();
    assert_eq!(container.encoding(), Encoding::Wide);
    assert!(container.contains("hello"));
    assert_eq!(
        container.lookup(&wide).and_then(|m| m.value),
        Some(Value::Int(42)),
    );
}

#[test]
fn text_format_round_trips_through_load() {
    let mut dawg = dawg_with_values(&[
        ("pi", Value::Str("3.14".to_string())),
        ("e", Value::Int(2)),
    ]);
    dawg.add("мю", None);
    dawg.minimize().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "constants.json");
    dawg.save_text(&path).unwrap();

    // Sniffing must pick the text path: the file starts with '{'.
    let loaded = Dawg::load(&path).unwrap();
    assert_eq!(loaded.encoding(), dawg.encoding());
    for key in ["pi", "e", "мю"] {
        assert_eq!(loaded.lookup(key), dawg.lookup(key), "{}", key);
    }
}

#[test]
fn load_sniffs_binary_by_magic() {
    let mut dawg = dawg_of(&["alpha", "beta"]);
    dawg.minimize().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "either.bin");
    dawg.save_binary(&path).unwrap();
    let loaded = Dawg::load(&path).unwrap();
    assert_eq!(
        loaded.all_keys().collect::<Vec<_>>(),
        vec!["alpha", "beta"],
    );
}

#[test]
fn open_rejects_corruption() {
    let mut dawg = dawg_of(&["alpha", "beta"]);
    dawg.minimize().unwrap();
    let dir = tempfile::tempdir().unwrap();

    // Truncated file.
    let bytes = dawg.to_bytes().unwrap();
    let path = temp_path(&dir, "short.dawg");
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    let err = MappedDawg::open(&path).unwrap_err();
    assert!(err.is_bad_container());

    // Wrong magic.
    let mut bad = bytes.clone();
    bad[3] = b'!';
    let path = temp_path(&dir, "magic.dawg");
    std::fs::write(&path, &bad).unwrap();
    assert!(MappedDawg::open(&path).is_err());

    // Missing file.
    let err = MappedDawg::open(temp_path(&dir, "nope.dawg")).unwrap_err();
    assert!(matches!(
        err.kind(),
        dawg_automata::ErrorKind::Io(_),
    ));
}

#[test]
fn narrow_zero_target_is_the_root() {
    // Hand-pack a minimal ASCII container whose single edge targets node
    // 0. A zero 24-bit target is a real index (the root), not an "absent"
    // sentinel, and the reader must accept it.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&container::MAGIC);
    bytes.extend_from_slice(&container::VERSION.to_le_bytes());
    bytes.extend_from_slice(&(1u32 << 2).to_le_bytes()); // ascii-only
    bytes.extend_from_slice(&1u32.to_le_bytes()); // node count
    bytes.extend_from_slice(&1u32.to_le_bytes()); // edge count
    bytes.extend_from_slice(&64u32.to_le_bytes()); // root offset
    bytes.extend_from_slice(&104u32.to_le_bytes()); // value table offset
    bytes.extend_from_slice(&0u32.to_le_bytes()); // value count
    bytes.resize(64, 0);
    // Node 0: terminal, no value, one edge at offset 96.
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&u32::MAX.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&96u32.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 16]);
    // Edge: unit 'a', 24-bit target 0, reserved zero.
    bytes.push(b'a');
    bytes.extend_from_slice(&[0, 0, 0]);
    bytes.extend_from_slice(&[0u8; 4]);
    // Empty value table.
    bytes.extend_from_slice(&0u32.to_le_bytes());

    let container = Container::from_bytes(&bytes[..]).unwrap();
    assert!(container.contains(""));
    assert!(container.contains("a"));
    assert!(container.contains("aaaa"));
}

#[test]
fn concurrent_readers_agree() {
    let mut dawg = dawg_of(&[
        "alpha", "beta", "gamma", "delta", "epsilon", "zeta",
    ]);
    dawg.minimize().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "shared.dawg");
    dawg.save_binary(&path).unwrap();

    // A no-longer-mutated graph is shared immutably across threads; the
    // mapped reader is shared the same way.
    let dawg = Arc::new(dawg);
    let reader = Arc::new(MappedDawg::open(&path).unwrap());
    let mut handles = Vec::new();
    for _ in 0..4 {
        let dawg = Arc::clone(&dawg);
        let reader = Arc::clone(&reader);
        handles.push(thread::spawn(move || {
            for key in ["alpha", "epsilon", "missing", "zet", "zeta"] {
                assert_eq!(dawg.contains(key), reader.contains(key));
            }
            reader.all_keys().count()
        }));
    }
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 6);
    }
}

#[test]
fn save_is_deterministic() {
    let mut a = dawg_with_values(&[("k1", Value::Int(1))]);
    a.add("k2", None);
    a.minimize().unwrap();
    let mut b = dawg_with_values(&[("k1", Value::Int(1))]);
    b.add("k2", None);
    b.minimize().unwrap();
    assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
}
