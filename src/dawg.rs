use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use log::debug;

use crate::alphabet::{Alphabet, Encoding, EncodingChoice};
use crate::automaton::Automaton;
use crate::container::{self, Container};
use crate::error::Error;
use crate::id::{NodeID, ValueIndex};
use crate::minimize::{MinimizeStats, Minimizer};
use crate::node::Node;
use crate::text;
use crate::value::Value;

/// One entry of the dense value table: the key it belongs to and the stored
/// value. Entries are append-only while building; overwriting a key's value
/// abandons the old entry, and abandoned entries are compacted by `rebuild`.
#[derive(Clone, Debug)]
pub(crate) struct ValueEntry {
    pub(crate) key: String,
    pub(crate) value: Value,
}

/// A mutable word graph: build it up with [`Dawg::add`], collapse shared
/// suffixes with [`Dawg::minimize`], then query it or persist it.
///
/// The graph starts as a plain trie. Calling `minimize` merges every pair of
/// states with the same right-language, producing the unique minimal
/// automaton for the inserted key set. Further calls to `add` transparently
/// rebuild an unminimized graph first, so that shared states are never
/// mutated through one key on behalf of another.
///
/// The alphabet representation adapts automatically: a graph of ASCII keys
/// uses single-byte units, up to 89 distinct code points are compressed into
/// single-byte remap slots, and anything larger falls back to full 32-bit
/// code points. Queries for characters the current alphabet cannot represent
/// are misses, never errors.
///
/// # Example
///
/// ```
/// use dawg_automata::{Automaton, Dawg, Value};
///
/// let mut dawg = Dawg::new();
/// dawg.add("car", None);
/// dawg.add("cars", None);
/// dawg.add("cat", Some(Value::Int(7)));
/// dawg.add("cats", None);
/// dawg.minimize()?;
///
/// assert!(dawg.contains("cat"));
/// assert_eq!(dawg.lookup("cat").and_then(|m| m.value), Some(Value::Int(7)));
/// let keys: Vec<String> = dawg.find_prefixes("ca").collect();
/// assert_eq!(keys, vec!["car", "cars", "cat", "cats"]);
/// # Ok::<(), dawg_automata::Error>(())
/// ```
///
/// # Concurrency
///
/// Mutation requires exclusive ownership (`&mut self`). A `Dawg` that is no
/// longer being mutated can be shared freely across threads; every query
/// takes `&self` and there is no interior mutability.
#[derive(Clone, Debug)]
pub struct Dawg {
    /// The node arena, indexed by `NodeID`. Minimization tombstones the
    /// slots of merged-away nodes instead of compacting, which is what keeps
    /// surviving IDs stable.
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) root: NodeID,
    pub(crate) values: Vec<ValueEntry>,
    pub(crate) alphabet: Alphabet,
    minimized: bool,
    live_nodes: usize,
    live_edges: usize,
    key_count: usize,
    live_values: usize,
}

impl Dawg {
    /// Create an empty word graph. The root exists from the start and the
    /// alphabet begins in ASCII mode.
    pub fn new() -> Dawg {
        Dawg {
            nodes: vec![Some(Node::empty())],
            root: NodeID::ZERO,
            values: Vec::new(),
            alphabet: Alphabet::new(),
            minimized: false,
            live_nodes: 1,
            live_edges: 0,
            key_count: 0,
            live_values: 0,
        }
    }

    /// Insert `key`, optionally with a value. The empty key is legal and
    /// marks the root terminal.
    ///
    /// Re-adding an existing key overwrites its stored value, including
    /// overwriting it with "no value". If the current alphabet cannot
    /// represent a character of the key (or of a string value), the graph is
    /// transparently rebuilt into the smallest encoding that fits before the
    /// insertion proceeds; `add` itself never fails.
    pub fn add(&mut self, key: &str, value: impl Into<Option<Value>>) {
        let value = value.into();
        if self.minimized {
            self.thaw();
        }
        let table_str = value.as_ref().map(Value::to_table_string);
        if !self.alphabet.admits(key, table_str.as_deref()) {
            self.upgrade_for(key, table_str.as_deref());
        }
        self.alphabet.record(key, table_str.as_deref());
        // The upgrade above rebuilt the alphabet around this key, so
        // encoding can no longer miss.
        let units = self
            .alphabet
            .encode_key(key)
            .expect("alphabet accepts the key after upgrade");

        let mut cur = self.root;
        for &unit in &units {
            cur = match self.node_ref(cur).get_edge(unit) {
                Some(next) => next,
                None => {
                    let next = self.alloc_node();
                    self.node_mut(cur).set_edge(unit, next);
                    self.live_edges += 1;
                    next
                }
            };
        }

        let was_terminal = self.node_ref(cur).is_terminal();
        let had_value = self.node_ref(cur).value_index().is_some();
        let index = value.map(|value| {
            self.values.push(ValueEntry { key: key.to_string(), value });
            ValueIndex::new(self.values.len() - 1)
                .expect("value table within index limit")
        });
        let has_value = index.is_some();
        self.node_mut(cur).set_terminal(index);

        if !was_terminal {
            self.key_count += 1;
        }
        match (had_value, has_value) {
            (false, true) => self.live_values += 1,
            (true, false) => self.live_values -= 1,
            _ => {}
        }
    }

    /// Merge every pair of states with equal right-languages, leaving the
    /// unique minimal automaton for the current key set. A second call is a
    /// no-op until the graph is mutated again.
    ///
    /// Returns the size of the minimized graph and how many states were
    /// merged away. If the (defensive) consistency check detects that the
    /// accepted key set changed, the graph is left untouched and
    /// `MinimizeConsistency` is returned.
    pub fn minimize(&mut self) -> Result<MinimizeStats, Error> {
        if self.minimized {
            return Ok(MinimizeStats {
                node_count: self.live_nodes,
                edge_count: self.live_edges,
                merge_count: 0,
            });
        }
        let stats = Minimizer::new(self).run()?;
        self.minimized = true;
        self.live_nodes = stats.node_count;
        self.live_edges = stats.edge_count;
        debug!(
            "minimized graph: {} nodes, {} edges, {} merges",
            stats.node_count, stats.edge_count, stats.merge_count,
        );
        Ok(stats)
    }

    /// Collect every `(key, value)` pair through the current decode path and
    /// construct a fresh automaton in the requested encoding, compacting
    /// abandoned value table entries along the way.
    ///
    /// With [`EncodingChoice::Auto`] this re-evaluates the encoding
    /// decision and may shrink a wide graph back down to a narrow one. A
    /// forced encoding that cannot hold the data fails with
    /// `EncodingExceeded` and leaves the graph unchanged.
    pub fn rebuild(&mut self, options: RebuildOptions) -> Result<(), Error> {
        let was_minimized = self.minimized;
        self.rebuild_with(options.encoding, "", None)?;
        if options.preserve_minimized && was_minimized {
            self.minimize()?;
        }
        Ok(())
    }

    /// Counters and encoding facts about the current graph.
    pub fn stats(&self) -> Stats {
        let encoding = self.alphabet.encoding();
        Stats {
            node_count: self.live_nodes,
            edge_count: self.live_edges,
            minimized: self.minimized,
            key_count: self.key_count,
            value_count: self.live_values,
            estimated_bytes: container::estimated_len(
                self,
                self.live_nodes,
                self.live_edges,
            ),
            is_ascii_only: encoding == Encoding::Ascii,
            is_compressed_unicode: encoding == Encoding::Compressed,
            mapped_units: self.alphabet.mapped_units(),
        }
    }

    /// The encoding the graph is currently using.
    pub fn encoding(&self) -> Encoding {
        self.alphabet.encoding()
    }

    /// Returns true if the graph is currently minimized.
    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    /// The number of keys in the graph.
    pub fn len(&self) -> usize {
        self.key_count
    }

    /// Returns true if no key has been inserted.
    pub fn is_empty(&self) -> bool {
        self.key_count == 0
    }

    /// The ID of the root node.
    pub fn root_id(&self) -> u32 {
        self.root.as_u32()
    }

    /// Fetch a node by its stable ID. Returns `None` for IDs whose node was
    /// merged away by minimization; the live IDs are in bijection with the
    /// reachable nodes.
    pub fn get_node_by_id(&self, id: u32) -> Option<&Node> {
        self.nodes.get(id as usize)?.as_ref()
    }

    /// Derived statistics of the subtree below a node: how many accepted
    /// suffixes it recognizes and the shortest and longest of them.
    ///
    /// In a minimized graph a "subtree" is really a sub-DAG; the suffix
    /// count is the number of accepted paths, not of nodes. Returns `None`
    /// for an ID that does not resolve to a live node.
    ///
    /// # Example
    ///
    /// ```
    /// use dawg_automata::Dawg;
    ///
    /// let mut dawg = Dawg::new();
    /// dawg.add("car", None);
    /// dawg.add("cart", None);
    /// let stats = dawg.subtree_stats(dawg.root_id()).unwrap();
    /// assert_eq!(stats.word_count, 2);
    /// assert_eq!(stats.min_depth, 3);
    /// assert_eq!(stats.max_depth, 4);
    /// ```
    pub fn subtree_stats(&self, id: u32) -> Option<SubtreeStats> {
        self.get(id)?;
        let mut memo: HashMap<u32, SubtreeStats> = HashMap::new();
        Some(self.subtree_stats_memo(id, &mut memo))
    }

    fn subtree_stats_memo(
        &self,
        id: u32,
        memo: &mut HashMap<u32, SubtreeStats>,
    ) -> SubtreeStats {
        if let Some(&hit) = memo.get(&id) {
            return hit;
        }
        let node = match self.get(id) {
            None => {
                return SubtreeStats {
                    word_count: 0,
                    min_depth: 0,
                    max_depth: 0,
                };
            }
            Some(node) => node,
        };
        let terminal = node.is_terminal();
        let mut stats = SubtreeStats {
            word_count: usize::from(terminal),
            min_depth: 0,
            max_depth: 0,
        };
        let mut min_child: Option<usize> = None;
        for edge in node.edges() {
            let child =
                self.subtree_stats_memo(edge.target().as_u32(), memo);
            stats.word_count += child.word_count;
            if child.word_count > 0 {
                let candidate = child.min_depth + 1;
                min_child = Some(
                    min_child.map_or(candidate, |m| m.min(candidate)),
                );
                stats.max_depth = stats.max_depth.max(child.max_depth + 1);
            }
        }
        if !terminal {
            stats.min_depth = min_child.unwrap_or(0);
        }
        memo.insert(id, stats);
        stats
    }

    /// Serialize the graph into the fixed-width binary container format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        container::serialize(self)
    }

    /// Write the binary container format to a file.
    pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(Error::io)
    }

    /// Write the portable JSON interchange format to a file.
    ///
    /// The text format round-trips every value class (including the
    /// integer/string distinction the binary format infers from digits) and
    /// records the character map of a compressed graph.
    pub fn save_text<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let json = text::to_json_string(self)?;
        fs::write(path, json).map_err(Error::io)
    }

    /// Load a graph from a file, sniffing the format: a file starting with
    /// the container magic takes the binary path, anything else is parsed as
    /// the JSON interchange format.
    ///
    /// The loaded graph is minimized before it is returned.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Dawg, Error> {
        let bytes = fs::read(path).map_err(Error::io)?;
        if bytes.len() >= container::MAGIC.len()
            && bytes[..container::MAGIC.len()] == container::MAGIC
        {
            Dawg::from_bytes(&bytes)
        } else {
            let mut dawg = text::from_json_bytes(&bytes)?;
            dawg.minimize()?;
            Ok(dawg)
        }
    }

    /// Materialize a live graph from a serialized container buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Dawg, Error> {
        let container = Container::from_bytes(bytes)?;
        Dawg::from_container(&container)
    }

    /// Materialize a live graph from a validated container, preserving its
    /// encoding and (for compressed containers) honoring the stored
    /// character map. The result is minimized.
    pub fn from_container<T: AsRef<[u8]>>(
        container: &Container<T>,
    ) -> Result<Dawg, Error> {
        let pairs = collect_pairs(container);
        let choice = match container.encoding() {
            Encoding::Ascii => EncodingChoice::Ascii,
            Encoding::Compressed => EncodingChoice::Compressed,
            Encoding::Wide => EncodingChoice::Wide,
        };
        let mut dawg =
            Dawg::from_pairs(pairs, choice, container.char_map_entries())?;
        dawg.minimize()?;
        Ok(dawg)
    }

    /// Build a graph from scratch over a pair list, in the given encoding,
    /// optionally honoring a previously recorded character map.
    pub(crate) fn from_pairs(
        pairs: Vec<(String, Option<Value>)>,
        choice: EncodingChoice,
        map_entries: Option<&[(char, u8)]>,
    ) -> Result<Dawg, Error> {
        let (key_chars, used_chars) = char_sets(&pairs, "", None);
        let alphabet = match (choice, map_entries) {
            (EncodingChoice::Compressed, Some(entries)) => {
                Alphabet::for_data_with_map(key_chars, used_chars, entries)?
            }
            _ => Alphabet::for_data(choice, key_chars, used_chars)?,
        };
        Ok(Dawg::assemble(alphabet, pairs))
    }

    /// Every `(key, value)` pair of the graph, decoded through the current
    /// alphabet, in lexicographic unit order.
    pub(crate) fn pairs(&self) -> Vec<(String, Option<Value>)> {
        collect_pairs(self)
    }

    /// Rebuild into `choice`, reserving room in the new alphabet for the
    /// extra key/value characters of an insertion that is about to happen.
    fn rebuild_with(
        &mut self,
        choice: EncodingChoice,
        extra_key: &str,
        extra_value: Option<&str>,
    ) -> Result<(), Error> {
        let pairs = self.pairs();
        let (key_chars, used_chars) =
            char_sets(&pairs, extra_key, extra_value);
        let alphabet = Alphabet::for_data(choice, key_chars, used_chars)?;
        debug!(
            "rebuilding {} keys into {:?} encoding",
            pairs.len(),
            alphabet.encoding(),
        );
        *self = Dawg::assemble(alphabet, pairs);
        Ok(())
    }

    /// Insert `pairs` into a fresh arena under an alphabet that is already
    /// known to hold them.
    fn assemble(
        alphabet: Alphabet,
        pairs: Vec<(String, Option<Value>)>,
    ) -> Dawg {
        let mut dawg = Dawg::new();
        dawg.alphabet = alphabet;
        for (key, value) in pairs {
            dawg.add(&key, value);
        }
        dawg
    }

    /// Rebuild a minimized graph into plain trie form (same encoding), so a
    /// mutation cannot edit a state shared between unrelated keys.
    fn thaw(&mut self) {
        debug!("thawing minimized graph before mutation");
        let choice = match self.alphabet.encoding() {
            Encoding::Ascii => EncodingChoice::Ascii,
            Encoding::Compressed => EncodingChoice::Compressed,
            Encoding::Wide => EncodingChoice::Wide,
        };
        // Re-encoding a data set that already fits its encoding cannot
        // fail.
        self.rebuild_with(choice, "", None)
            .expect("re-encoding into the current encoding");
    }

    /// Handle an insertion the current alphabet cannot represent: pick the
    /// smallest encoding that fits the union of the current data and the
    /// incoming key/value, and rebuild into it.
    fn upgrade_for(&mut self, key: &str, value_chars: Option<&str>) {
        let target = self.alphabet.choose_with(key, value_chars);
        debug!(
            "alphabet upgrade to {:?} triggered by key {:?}",
            target, key,
        );
        let choice = match target {
            Encoding::Ascii => EncodingChoice::Ascii,
            Encoding::Compressed => EncodingChoice::Compressed,
            Encoding::Wide => EncodingChoice::Wide,
        };
        // The target was chosen to fit this exact union of characters.
        self.rebuild_with(choice, key, value_chars)
            .expect("chosen encoding fits the union of old and new data");
    }

    pub(crate) fn node_ref(&self, id: NodeID) -> &Node {
        self.nodes[id].as_ref().expect("live node behind a held NodeID")
    }

    pub(crate) fn node_mut(&mut self, id: NodeID) -> &mut Node {
        self.nodes[id].as_mut().expect("live node behind a held NodeID")
    }

    pub(crate) fn tombstone(&mut self, id: NodeID) {
        self.nodes[id] = None;
    }

    fn alloc_node(&mut self) -> NodeID {
        let id = NodeID::must(self.nodes.len());
        self.nodes.push(Some(Node::empty()));
        self.live_nodes += 1;
        id
    }

    fn get(&self, sid: u32) -> Option<&Node> {
        self.nodes.get(sid as usize)?.as_ref()
    }
}

impl Default for Dawg {
    fn default() -> Dawg {
        Dawg::new()
    }
}

impl Automaton for Dawg {
    fn start(&self) -> u32 {
        self.root.as_u32()
    }

    fn is_terminal(&self, sid: u32) -> bool {
        self.get(sid).map_or(false, Node::is_terminal)
    }

    fn value(&self, sid: u32) -> Option<Value> {
        let index = self.get(sid)?.value_index()?;
        self.values.get(index.as_usize()).map(|e| e.value.clone())
    }

    fn next(&self, sid: u32, c: char) -> Option<u32> {
        let unit = self.alphabet.encode_unit(c)?;
        self.get(sid)?.get_edge(unit).map(|id| id.as_u32())
    }

    fn edges(&self, sid: u32) -> Vec<(char, u32)> {
        match self.get(sid) {
            None => Vec::new(),
            Some(node) => node
                .edges()
                .iter()
                .filter_map(|e| {
                    let c = self.alphabet.decode_unit(e.unit())?;
                    Some((c, e.target().as_u32()))
                })
                .collect(),
        }
    }
}

/// Collect every `(key, value)` pair of any automaton, in enumeration
/// order.
pub(crate) fn collect_pairs<A: Automaton>(
    aut: &A,
) -> Vec<(String, Option<Value>)> {
    aut.all_keys()
        .map(|key| {
            let value =
                aut.walk(&key).and_then(|sid| aut.value(sid));
            (key, value)
        })
        .collect()
}

/// The distinct character sets of a pair list: characters across keys, and
/// characters across keys plus value table strings.
fn char_sets(
    pairs: &[(String, Option<Value>)],
    extra_key: &str,
    extra_value: Option<&str>,
) -> (BTreeSet<char>, BTreeSet<char>) {
    let mut key_chars: BTreeSet<char> = BTreeSet::new();
    let mut used_chars: BTreeSet<char> = BTreeSet::new();
    for (key, value) in pairs {
        key_chars.extend(key.chars());
        used_chars.extend(key.chars());
        if let Some(value) = value {
            used_chars.extend(value.to_table_string().chars());
        }
    }
    key_chars.extend(extra_key.chars());
    used_chars.extend(extra_key.chars());
    if let Some(s) = extra_value {
        used_chars.extend(s.chars());
    }
    (key_chars, used_chars)
}

/// Options for [`Dawg::rebuild`].
///
/// ```
/// use dawg_automata::{Dawg, EncodingChoice, RebuildOptions};
///
/// let mut dawg = Dawg::new();
/// dawg.add("hello", None);
/// dawg.rebuild(
///     RebuildOptions::new().encoding(EncodingChoice::Wide),
/// )?;
/// assert!(!dawg.stats().is_ascii_only);
/// # Ok::<(), dawg_automata::Error>(())
/// ```
#[derive(Clone, Copy, Debug)]
pub struct RebuildOptions {
    encoding: EncodingChoice,
    preserve_minimized: bool,
}

impl RebuildOptions {
    /// Default options: re-evaluate the encoding automatically and keep a
    /// minimized graph minimized.
    pub fn new() -> RebuildOptions {
        RebuildOptions {
            encoding: EncodingChoice::Auto,
            preserve_minimized: true,
        }
    }

    /// Set the target encoding.
    pub fn encoding(mut self, choice: EncodingChoice) -> RebuildOptions {
        self.encoding = choice;
        self
    }

    /// Set whether a graph that was minimized before the rebuild is
    /// re-minimized afterwards. Defaults to true.
    pub fn preserve_minimized(mut self, yes: bool) -> RebuildOptions {
        self.preserve_minimized = yes;
        self
    }
}

impl Default for RebuildOptions {
    fn default() -> RebuildOptions {
        RebuildOptions::new()
    }
}

/// Derived statistics of one subtree, reported by
/// [`Dawg::subtree_stats`].
///
/// Depths are measured in units from the queried node to a terminal state.
/// A subtree recognizing no suffix at all reports zero for every field.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SubtreeStats {
    /// The number of accepted suffixes below (and including) the node.
    pub word_count: usize,
    /// The length of the shortest accepted suffix.
    pub min_depth: usize,
    /// The length of the longest accepted suffix.
    pub max_depth: usize,
}

impl Extend<(String, Option<Value>)> for Dawg {
    fn extend<I: IntoIterator<Item = (String, Option<Value>)>>(
        &mut self,
        iter: I,
    ) {
        for (key, value) in iter {
            self.add(&key, value);
        }
    }
}

impl FromIterator<(String, Option<Value>)> for Dawg {
    fn from_iter<I: IntoIterator<Item = (String, Option<Value>)>>(
        iter: I,
    ) -> Dawg {
        let mut dawg = Dawg::new();
        dawg.extend(iter);
        dawg
    }
}

impl<'a> Extend<&'a str> for Dawg {
    fn extend<I: IntoIterator<Item = &'a str>>(&mut self, iter: I) {
        for key in iter {
            self.add(key, None);
        }
    }
}

impl<'a> FromIterator<&'a str> for Dawg {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Dawg {
        let mut dawg = Dawg::new();
        dawg.extend(iter);
        dawg
    }
}

/// Counters and encoding facts reported by [`Dawg::stats`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Stats {
    /// Live (reachable) nodes.
    pub node_count: usize,
    /// Live edges.
    pub edge_count: usize,
    /// Whether the graph is currently minimized.
    pub minimized: bool,
    /// Number of distinct keys.
    pub key_count: usize,
    /// Number of keys currently holding a value.
    pub value_count: usize,
    /// The size of the binary container this graph would serialize to.
    pub estimated_bytes: usize,
    /// True if the alphabet is in ASCII mode.
    pub is_ascii_only: bool,
    /// True if the alphabet is in compressed single-byte mode.
    pub is_compressed_unicode: bool,
    /// The number of remapped code points (0 outside compressed mode).
    pub mapped_units: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} keys, {} nodes, {} edges{}, {} values, ~{} bytes",
            self.key_count,
            self.node_count,
            self.edge_count,
            if self.minimized { " (minimized)" } else { "" },
            self.value_count,
            self.estimated_bytes,
        )
    }
}
