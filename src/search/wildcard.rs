use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::automaton::Automaton;

/// One element of a parsed wildcard pattern.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Token {
    /// Matches exactly this character.
    Literal(char),
    /// `?`: matches exactly one unit.
    One,
    /// `*`: matches zero or more units.
    Any,
}

fn parse(pattern: &str) -> Vec<Token> {
    pattern
        .chars()
        .map(|c| match c {
            '?' => Token::One,
            '*' => Token::Any,
            c => Token::Literal(c),
        })
        .collect()
}

/// Find every key matching `pattern`, deduplicated and sorted
/// lexicographically.
///
/// The matcher is a recursive descent over `(state, pattern position)`
/// pairs. The set of suffixes matching from such a pair is independent of
/// how the state was reached, so results are memoized per pair; that is
/// what keeps patterns like `**` or `*a*` from exploding on graphs with
/// heavy state sharing.
pub(crate) fn find<A: Automaton>(aut: &A, pattern: &str) -> Vec<String> {
    let pattern = parse(pattern);
    let mut memo = HashMap::new();
    let matches = suffixes(aut, aut.start(), 0, &pattern, &mut memo);
    matches.iter().cloned().collect()
}

/// The set of key suffixes, spelled from `sid`, that match the pattern
/// tail starting at `pos`.
fn suffixes<A: Automaton>(
    aut: &A,
    sid: u32,
    pos: usize,
    pattern: &[Token],
    memo: &mut HashMap<(u32, usize), Rc<BTreeSet<String>>>,
) -> Rc<BTreeSet<String>> {
    if let Some(hit) = memo.get(&(sid, pos)) {
        return Rc::clone(hit);
    }
    let mut out = BTreeSet::new();
    match pattern.get(pos) {
        None => {
            if aut.is_terminal(sid) {
                out.insert(String::new());
            }
        }
        Some(&Token::Literal(c)) => {
            if let Some(next) = aut.next(sid, c) {
                for s in suffixes(aut, next, pos + 1, pattern, memo).iter() {
                    out.insert(prepend(c, s));
                }
            }
        }
        Some(&Token::One) => {
            for (c, next) in aut.edges(sid) {
                for s in suffixes(aut, next, pos + 1, pattern, memo).iter() {
                    out.insert(prepend(c, s));
                }
            }
        }
        Some(&Token::Any) => {
            // Match zero units: skip the star.
            for s in suffixes(aut, sid, pos + 1, pattern, memo).iter() {
                out.insert(s.clone());
            }
            // Match one more unit: descend an edge, stay on the star.
            for (c, next) in aut.edges(sid) {
                for s in suffixes(aut, next, pos, pattern, memo).iter() {
                    out.insert(prepend(c, s));
                }
            }
        }
    }
    let out = Rc::new(out);
    memo.insert((sid, pos), Rc::clone(&out));
    out
}

fn prepend(c: char, s: &str) -> String {
    let mut t = String::with_capacity(c.len_utf8() + s.len());
    t.push(c);
    t.push_str(s);
    t
}

#[cfg(test)]
mod tests {
    use crate::automaton::Automaton;
    use crate::dawg::Dawg;

    fn sample() -> Dawg {
        let mut dawg = Dawg::new();
        for key in ["apple", "application", "apply", "banana"] {
            dawg.add(key, None);
        }
        dawg.minimize().unwrap();
        dawg
    }

    #[test]
    fn mixed_literal_and_wildcards() {
        let dawg = sample();
        assert_eq!(
            dawg.find_wildcard("a?p*"),
            vec!["apple", "application", "apply"],
        );
        assert_eq!(dawg.find_wildcard("*tion"), vec!["application"]);
    }

    #[test]
    fn question_mark_is_exactly_one_unit() {
        let dawg = sample();
        assert_eq!(dawg.find_wildcard("appl?"), vec!["apple", "apply"]);
        assert!(dawg.find_wildcard("apple?").is_empty());
    }

    #[test]
    fn star_matches_zero_units() {
        let dawg = sample();
        assert_eq!(dawg.find_wildcard("apple*"), vec!["apple"]);
        assert_eq!(dawg.find_wildcard("*apple"), vec!["apple"]);
    }

    #[test]
    fn repeated_stars_do_not_duplicate_or_hang() {
        let dawg = sample();
        let all = dawg.find_wildcard("**");
        assert_eq!(all, dawg.all_keys().collect::<Vec<_>>());
        assert_eq!(dawg.find_wildcard("*a*a*"), vec!["application", "banana"]);
    }

    #[test]
    fn pattern_without_wildcards_is_membership() {
        let dawg = sample();
        assert_eq!(dawg.find_wildcard("banana"), vec!["banana"]);
        assert!(dawg.find_wildcard("bananas").is_empty());
    }

    #[test]
    fn agrees_with_a_brute_force_oracle() {
        let dawg = sample();
        let keys: Vec<String> = dawg.all_keys().collect();
        for pattern in ["*", "?????", "a*", "*n*", "b?n*", "*y", "??"] {
            let expected: Vec<&String> =
                keys.iter().filter(|k| oracle(pattern, k)).collect();
            let got = dawg.find_wildcard(pattern);
            assert_eq!(
                got.iter().collect::<Vec<_>>(),
                expected,
                "pattern {}",
                pattern,
            );
        }
    }

    /// Naive reference matcher over plain strings.
    fn oracle(pattern: &str, key: &str) -> bool {
        let p: Vec<char> = pattern.chars().collect();
        let k: Vec<char> = key.chars().collect();
        fn go(p: &[char], k: &[char]) -> bool {
            match p.first() {
                None => k.is_empty(),
                Some('*') => {
                    go(&p[1..], k)
                        || (!k.is_empty() && go(p, &k[1..]))
                }
                Some('?') => !k.is_empty() && go(&p[1..], &k[1..]),
                Some(&c) => {
                    k.first() == Some(&c) && go(&p[1..], &k[1..])
                }
            }
        }
        go(&p, &k)
    }
}
