use crate::automaton::Automaton;

/// Find every key within edit distance `max_distance` of `target`,
/// together with its exact Levenshtein distance, sorted by distance
/// ascending and then lexicographically.
///
/// This is the classic row-at-a-time dynamic program threaded through the
/// graph walk: each recursion level extends the candidate key by one unit
/// and derives the next DP row from the previous one, so keys sharing a
/// prefix share the work for that prefix. A subtree is cut as soon as the
/// smallest entry of its row exceeds the bound, since every extension of
/// the row is at least that large.
pub(crate) fn find<A: Automaton>(
    aut: &A,
    target: &str,
    max_distance: usize,
) -> Vec<(String, usize)> {
    let target: Vec<char> = target.chars().collect();
    let first_row: Vec<usize> = (0..=target.len()).collect();
    let mut out = Vec::new();
    let mut key = String::new();
    explore(
        aut,
        aut.start(),
        &target,
        &first_row,
        max_distance,
        &mut key,
        &mut out,
    );
    out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    out
}

fn explore<A: Automaton>(
    aut: &A,
    sid: u32,
    target: &[char],
    row: &[usize],
    max_distance: usize,
    key: &mut String,
    out: &mut Vec<(String, usize)>,
) {
    // Every extension of this key is at least min(row) away from the
    // target, so once that exceeds the bound nothing below can match.
    if row.iter().all(|&d| d > max_distance) {
        return;
    }
    let distance = row[row.len() - 1];
    if aut.is_terminal(sid) && distance <= max_distance {
        out.push((key.clone(), distance));
    }
    for (c, child) in aut.edges(sid) {
        let mut next = Vec::with_capacity(row.len());
        next.push(row[0] + 1);
        for (i, &tc) in target.iter().enumerate() {
            let substitute = row[i] + usize::from(tc != c);
            let insert = next[i] + 1;
            let delete = row[i + 1] + 1;
            next.push(substitute.min(insert).min(delete));
        }
        key.push(c);
        explore(aut, child, target, &next, max_distance, key, out);
        key.pop();
    }
}

/// Find the keys closest to `target`: widen the distance threshold from 0
/// until `limit` results are collected or the threshold exceeds the length
/// of the target.
pub(crate) fn closest<A: Automaton>(
    aut: &A,
    target: &str,
    limit: usize,
) -> Vec<(String, usize)> {
    let len = target.chars().count();
    let mut out = Vec::new();
    for max_distance in 0..=len {
        out = find(aut, target, max_distance);
        if out.len() >= limit {
            break;
        }
    }
    out.truncate(limit);
    out
}

/// Spelling suggestions: nothing if `word` is already present, otherwise
/// the keys within one third of the word's length (rounded up).
pub(crate) fn spell_check<A: Automaton>(
    aut: &A,
    word: &str,
) -> Vec<String> {
    if aut.contains(word) {
        return Vec::new();
    }
    let max_distance = (word.chars().count() + 2) / 3;
    find(aut, word, max_distance)
        .into_iter()
        .map(|(key, _)| key)
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::automaton::Automaton;
    use crate::dawg::Dawg;

    fn sample() -> Dawg {
        let mut dawg = Dawg::new();
        for key in ["apple", "apply", "hello", "world"] {
            dawg.add(key, None);
        }
        dawg.minimize().unwrap();
        dawg
    }

    /// Plain two-row Levenshtein over strings, as the oracle.
    fn reference(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let mut row: Vec<usize> = (0..=b.len()).collect();
        for (i, &ca) in a.iter().enumerate() {
            let mut prev = row[0];
            row[0] = i + 1;
            for (j, &cb) in b.iter().enumerate() {
                let sub = prev + usize::from(ca != cb);
                prev = row[j + 1];
                row[j + 1] = sub.min(row[j] + 1).min(prev + 1);
            }
        }
        row[b.len()]
    }

    #[test]
    fn distances_are_exact_and_sorted() {
        let dawg = sample();
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
    fn agrees_with_the_oracle() {
        let dawg = sample();
        let keys: Vec<String> = dawg.all_keys().collect();
        for target in ["apple", "appel", "h", "banana", "", "worlds"] {
            for max in 0..4 {
                let mut expected: Vec<(String, usize)> = keys
                    .iter()
                    .map(|k| (k.clone(), reference(k, target)))
                    .filter(|&(_, d)| d <= max)
                    .collect();
                expected.sort_by(|a, b| {
                    a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0))
                });
                assert_eq!(
                    dawg.find_fuzzy(target, max),
                    expected,
                    "target {:?} max {}",
                    target,
                    max,
                );
            }
        }
    }

    #[test]
    fn exact_match_is_distance_zero() {
        let dawg = sample();
        let hits = dawg.find_fuzzy("hello", 0);
        assert_eq!(hits, vec![("hello".to_string(), 0)]);
    }

    #[test]
    fn closest_widens_until_satisfied() {
        let dawg = sample();
        let hits = dawg.closest("aply", 2);
        assert_eq!(
            hits,
            vec![("apply".to_string(), 1), ("apple".to_string(), 2)],
        );
        // A limit of one stops at the first threshold that yields a hit.
        assert_eq!(
            dawg.closest("aply", 1),
            vec![("apply".to_string(), 1)],
        );
    }

    #[test]
    fn spell_check_is_silent_on_correct_words() {
        let dawg = sample();
        assert!(dawg.spell_check("hello").is_empty());
        assert_eq!(dawg.spell_check("helo"), vec!["hello"]);
        // A 4-char word allows ceil(4/3) = 2 edits, which reaches both
        // "apple" and "apply" from "appx".
        let hits = dawg.spell_check("appx");
        assert_eq!(hits, vec!["apple", "apply"]);
    }
}
