use dawg_automata::{Automaton, MappedDawg, Value};

use crate::{dawg_of, dawg_with_values};

#[test]
fn wildcard_scenarios() {
    let mut dawg = dawg_of(&["apple", "application", "apply", "banana"]);
    dawg.minimize().unwrap();
    assert_eq!(
        dawg.find_wildcard("a?p*"),
        vec!["apple", "application", "apply"],
    );
    assert_eq!(dawg.find_wildcard("*tion"), vec!["application"]);
}

#[test]
fn fuzzy_scenarios() {
    let mut dawg = dawg_of(&["apple", "apply", "hello", "world"]);
    dawg.minimize().unwrap();
    assert_eq!(
        dawg.find_fuzzy("aple", 2),
        vec![("apple".to_string(), 1), ("apply".to_string(), 2)],
    );
    assert_eq!(
        dawg.find_fuzzy("wrld", 1),
        vec![("world".to_string(), 1)],
    );
}

#[test]
fn searches_work_on_the_mapped_reader() {
    let mut dawg = dawg_with_values(&[
        ("apple", Value::Int(1)),
        ("application", Value::Int(2)),
        ("apply", Value::Int(3)),
        ("banana", Value::Int(4)),
    ]);
    dawg.minimize().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("search.dawg");
    dawg.save_binary(&path).unwrap();
    let reader = MappedDawg::open(&path).unwrap();

    assert_eq!(reader.find_wildcard("a?p*"), dawg.find_wildcard("a?p*"));
    assert_eq!(
        reader.find_fuzzy("aple", 2),
        dawg.find_fuzzy("aple", 2),
    );
    assert_eq!(reader.closest("banan", 1), dawg.closest("banan", 1));
    assert_eq!(reader.spell_check("aply"), dawg.spell_check("aply"));
}

#[test]
fn wildcard_on_non_ascii_keys() {
    let mut dawg = dawg_of(&["привет", "приказ", "пока"]);
    dawg.minimize().unwrap();
    // Lexicographic by code point: 'в' sorts before 'к'.
    assert_eq!(dawg.find_wildcard("при*"), vec!["привет", "приказ"]);
    assert_eq!(dawg.find_wildcard("пок?"), vec!["пока"]);
    assert_eq!(dawg.find_wildcard("?ока"), vec!["пока"]);
}

#[test]
fn fuzzy_on_non_ascii_keys() {
    let mut dawg = dawg_of(&["привет", "совет"]);
    dawg.minimize().unwrap();
    assert_eq!(
        dawg.find_fuzzy("привед", 1),
        vec![("привет".to_string(), 1)],
    );
    assert!(dawg.find_fuzzy("привед", 0).is_empty());
}

#[test]
fn closest_gives_up_past_the_target_length() {
    let mut dawg = dawg_of(&["aaaaaaaaaa"]);
    dawg.minimize().unwrap();
    // Nothing within |target| edits of "zz"; closest returns what the
    // final threshold found.
    assert!(dawg.closest("zz", 1).is_empty());
}

#[test]
fn spell_check_bounds_suggestions_by_word_length() {
    let mut dawg = dawg_of(&["cat", "category", "cart"]);
    dawg.minimize().unwrap();
    // "cat" is present: no suggestions.
    assert!(dawg.spell_check("cat").is_empty());
    // One edit within ceil(3/3) = 1.
    assert_eq!(dawg.spell_check("cab"), vec!["cat"]);
    // "category" is far out of range and must not be suggested for
    // "cata"; results come back distance-first.
    let hits = dawg.spell_check("cata");
    assert_eq!(hits, vec!["cat", "cart"]);
}

#[test]
fn empty_pattern_and_empty_target() {
    let mut dawg = dawg_of(&["", "a"]);
    dawg.minimize().unwrap();
    assert_eq!(dawg.find_wildcard(""), vec![""]);
    assert_eq!(dawg.find_wildcard("*"), vec!["", "a"]);
    assert_eq!(
        dawg.find_fuzzy("", 1),
        vec![("".to_string(), 0), ("a".to_string(), 1)],
    );
}
