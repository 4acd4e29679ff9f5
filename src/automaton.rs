use crate::search;
use crate::value::Value;

/// A trait describing read-only traversal of a word graph.
///
/// This is the interface shared by the live, heap-allocated
/// [`Dawg`](crate::Dawg) and the read-only [`MappedDawg`](crate::MappedDawg)
/// that traverses a container file in place. Everything query-shaped is a
/// provided method on this trait, so the two implementations cannot drift
/// apart: membership, lookup, prefix enumeration and the wildcard and edit
/// distance searches all run on top of the same four primitive operations.
///
/// A state is identified by an opaque `u32`. For the live graph it is a node
/// ID; for the mapped reader it is an index into the node table. States are
/// only meaningful for the automaton that produced them and only for as long
/// as that automaton is not mutated.
///
/// # Determinism
///
/// [`Automaton::edges`] must enumerate in strictly ascending unit order.
/// Every provided method inherits its output order from that guarantee:
/// prefix enumeration is lexicographic by unit code, and the searches are
/// lexicographic (wildcard) or distance-then-lexicographic (edit distance),
/// independent of insertion order and of whether minimization has run.
pub trait Automaton {
    /// The start state, i.e. the state reached by the empty key.
    fn start(&self) -> u32;

    /// Returns true if `sid` accepts, i.e. the key leading to it was
    /// inserted.
    fn is_terminal(&self, sid: u32) -> bool;

    /// The value attached to `sid`, decoded from the value table. `None` for
    /// non-terminal states and for keys inserted without a value.
    fn value(&self, sid: u32) -> Option<Value>;

    /// Follow the transition labelled by the character `c`, encoding it
    /// through the current alphabet. A character the alphabet cannot
    /// represent is a miss, never an error.
    fn next(&self, sid: u32, c: char) -> Option<u32>;

    /// All outgoing transitions of `sid` with their labels decoded back to
    /// characters, in strictly ascending unit order.
    fn edges(&self, sid: u32) -> Vec<(char, u32)>;

    /// Walk the automaton along `key`, returning the landing state.
    fn walk(&self, key: &str) -> Option<u32> {
        let mut sid = self.start();
        for c in key.chars() {
            sid = self.next(sid, c)?;
        }
        Some(sid)
    }

    /// Returns true if `key` was inserted into the automaton.
    ///
    /// # Example
    ///
    /// ```
    /// use dawg_automata::{Automaton, Dawg};
    ///
    /// let mut dawg = Dawg::new();
    /// dawg.add("cart", None);
    /// assert!(dawg.contains("cart"));
    /// // Interior states are not accepted keys.
    /// assert!(!dawg.contains("car"));
    /// ```
    fn contains(&self, key: &str) -> bool {
        self.walk(key).map_or(false, |sid| self.is_terminal(sid))
    }

    /// Returns true if at least one inserted key starts with `prefix`.
    fn contains_prefix(&self, prefix: &str) -> bool {
        match self.walk(prefix) {
            None => false,
            Some(sid) => {
                self.is_terminal(sid) || !self.edges(sid).is_empty()
            }
        }
    }

    /// Look up `key`, returning it together with its stored value.
    ///
    /// # Example
    ///
    /// ```
    /// use dawg_automata::{Automaton, Dawg, Value};
    ///
    /// let mut dawg = Dawg::new();
    /// dawg.add("seven", Some(Value::Int(7)));
    /// dawg.add("unvalued", None);
    ///
    /// let hit = dawg.lookup("seven").unwrap();
    /// assert_eq!(hit.key, "seven");
    /// assert_eq!(hit.value, Some(Value::Int(7)));
    /// assert_eq!(dawg.lookup("unvalued").unwrap().value, None);
    /// assert!(dawg.lookup("missing").is_none());
    /// ```
    fn lookup(&self, key: &str) -> Option<Lookup> {
        let sid = self.walk(key)?;
        if !self.is_terminal(sid) {
            return None;
        }
        Some(Lookup { key: key.to_string(), value: self.value(sid) })
    }

    /// Enumerate every inserted key starting with `prefix`, in lexicographic
    /// order by unit code. The iterator is lazy; dropping it abandons the
    /// enumeration.
    ///
    /// # Example
    ///
    /// ```
    /// use dawg_automata::{Automaton, Dawg};
    ///
    /// let mut dawg = Dawg::new();
    /// for key in ["car", "cart", "cat", "dog"] {
    ///     dawg.add(key, None);
    /// }
    /// let keys: Vec<String> = dawg.find_prefixes("ca").collect();
    /// assert_eq!(keys, vec!["car", "cart", "cat"]);
    /// assert_eq!(dawg.find_prefixes("x").count(), 0);
    /// ```
    fn find_prefixes(&self, prefix: &str) -> PrefixIter<'_, Self>
    where
        Self: Sized,
    {
        PrefixIter::new(self, prefix)
    }

    /// Enumerate every inserted key. Equivalent to `find_prefixes("")`.
    fn all_keys(&self) -> PrefixIter<'_, Self>
    where
        Self: Sized,
    {
        self.find_prefixes("")
    }

    /// Find every key matching a wildcard pattern, where `?` matches exactly
    /// one unit and `*` matches zero or more. Output is deduplicated and
    /// sorted lexicographically.
    ///
    /// # Example
    ///
    /// ```
    /// use dawg_automata::{Automaton, Dawg};
    ///
    /// let mut dawg = Dawg::new();
    /// for key in ["apple", "application", "apply", "banana"] {
    ///     dawg.add(key, None);
    /// }
    /// assert_eq!(
    ///     dawg.find_wildcard("a?p*"),
    ///     vec!["apple", "application", "apply"],
    /// );
    /// assert_eq!(dawg.find_wildcard("*an*"), vec!["banana"]);
    /// ```
    fn find_wildcard(&self, pattern: &str) -> Vec<String>
    where
        Self: Sized,
    {
        search::wildcard::find(self, pattern)
    }

    /// Find every key within edit distance `max_distance` of `target`,
    /// together with its exact distance. Output is sorted by distance
    /// ascending, then lexicographically.
    ///
    /// # Example
    ///
    /// ```
    /// use dawg_automata::{Automaton, Dawg};
    ///
    /// let mut dawg = Dawg::new();
    /// dawg.add("apple", None);
    /// dawg.add("ample", None);
    /// assert_eq!(
    ///     dawg.find_fuzzy("apple", 1),
    ///     vec![("apple".to_string(), 0), ("ample".to_string(), 1)],
    /// );
    /// ```
    fn find_fuzzy(
        &self,
        target: &str,
        max_distance: usize,
    ) -> Vec<(String, usize)>
    where
        Self: Sized,
    {
        search::levenshtein::find(self, target, max_distance)
    }

    /// Find the keys closest to `target`, progressively widening the
    /// distance threshold from 0 until `limit` results are collected or the
    /// threshold exceeds the length of `target`.
    fn closest(&self, target: &str, limit: usize) -> Vec<(String, usize)>
    where
        Self: Sized,
    {
        search::levenshtein::closest(self, target, limit)
    }

    /// Spelling suggestions for `word`: empty if the word is already
    /// present, otherwise the keys within an edit distance of one third of
    /// the word's length (rounded up).
    fn spell_check(&self, word: &str) -> Vec<String>
    where
        Self: Sized,
    {
        search::levenshtein::spell_check(self, word)
    }
}

/// The result of a successful [`Automaton::lookup`]: the key echoed back and
/// the value stored with it, if any.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Lookup {
    /// The key that was found.
    pub key: String,
    /// The value stored with the key, if it was inserted with one.
    pub value: Option<Value>,
}

/// A lazy depth-first enumeration of the keys below a prefix.
///
/// Yields keys in lexicographic order by unit code. Created by
/// [`Automaton::find_prefixes`] and [`Automaton::all_keys`].
#[derive(Debug)]
pub struct PrefixIter<'a, A> {
    aut: &'a A,
    /// The key spelled so far. Grows and shrinks with the stack.
    key: String,
    /// A state whose subtree has not been entered yet, along with the UTF-8
    /// length of the character that was appended to reach it.
    pending: Option<(u32, usize)>,
    stack: Vec<Frame>,
}

#[derive(Debug)]
struct Frame {
    edges: Vec<(char, u32)>,
    next: usize,
    /// Bytes to truncate from the key when this frame is popped.
    chop: usize,
}

impl<'a, A: Automaton> PrefixIter<'a, A> {
    fn new(aut: &'a A, prefix: &str) -> PrefixIter<'a, A> {
        let pending = aut.walk(prefix).map(|sid| (sid, 0));
        PrefixIter {
            aut,
            key: prefix.to_string(),
            pending,
            stack: Vec::new(),
        }
    }
}

impl<'a, A: Automaton> Iterator for PrefixIter<'a, A> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some((sid, chop)) = self.pending.take() {
                let terminal = self.aut.is_terminal(sid);
                self.stack.push(Frame {
                    edges: self.aut.edges(sid),
                    next: 0,
                    chop,
                });
                if terminal {
                    return Some(self.key.clone());
                }
                continue;
            }
            let frame = self.stack.last_mut()?;
            if frame.next < frame.edges.len() {
                let (c, child) = frame.edges[frame.next];
                frame.next += 1;
                self.key.push(c);
                self.pending = Some((child, c.len_utf8()));
            } else if let Some(done) = self.stack.pop() {
                self.key.truncate(self.key.len() - done.chop);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dawg::Dawg;

    #[test]
    fn prefix_iter_is_lazy_and_ordered() {
        let mut dawg = Dawg::new();
        for key in ["cat", "car", "cars", "carts", "dog"] {
            dawg.add(key, None);
        }
        let mut it = dawg.find_prefixes("car");
        assert_eq!(it.next().as_deref(), Some("car"));
        assert_eq!(it.next().as_deref(), Some("cars"));
        assert_eq!(it.next().as_deref(), Some("carts"));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn contains_prefix_distinguishes_interior_states() {
        let mut dawg = Dawg::new();
        dawg.add("carts", None);
        assert!(dawg.contains_prefix("car"));
        assert!(dawg.contains_prefix("carts"));
        assert!(!dawg.contains_prefix("cartsx"));
        assert!(!dawg.contains("car"));
    }
}
