/*!
The fixed-width binary container format and its zero-copy view.

A serialized word graph is laid out as five contiguous regions, all little
endian:

```text
Header         (64 bytes, fixed)
Node table     (node_count x 32 bytes)
Edge table     (edge_count x 8 bytes, grouped per node, sorted by unit)
Value table    (variable)
Character map  (present iff compressed; variable)
```

The layout is chosen so that a read-only consumer never materializes the
graph: a "node" is a byte offset into the node table, following an edge is a
binary search over that node's slice of the edge table, and only the value
table is touched when a match is actually found. [`Container`] is that
consumer, generic over any byte storage (`Vec<u8>`, `&[u8]`, a memory map),
the same way a deserialized DFA is generic over its transition storage.

Edge records come in two forms. When the graph's alphabet is narrow (ASCII
or compressed), byte 0 is the unit and bytes 1..=3 are a 24-bit target node
index, capping narrow containers at 2^24 nodes; a zero target is node 0,
the root, which is a legal edge target and never means "absent". Otherwise
the unit and the target each take a full `u32`.

[`Container::from_bytes`] validates everything up front - magic, version,
region extents, per-node edge counts against the header total, edge target
ranges, unit ordering, value table structure and the character map - so
traversal can use plain offset arithmetic without re-checking.
*/

use std::collections::HashMap;

use log::trace;

use crate::alphabet::{CharMap, Encoding};
use crate::automaton::Automaton;
use crate::dawg::Dawg;
use crate::error::Error;
use crate::id::{NodeID, ValueIndex};
use crate::value::Value;
use crate::wire::{check_len, read_u24, read_u32, write_u24, write_u32};

/// The four magic bytes at offset 0 of every container file: `DAWG`.
pub const MAGIC: [u8; 4] = *b"DAWG";

/// The container format version this crate reads and writes.
pub const VERSION: u32 = 1;

pub(crate) const HEADER_LEN: usize = 64;
pub(crate) const NODE_LEN: usize = 32;
pub(crate) const EDGE_LEN: usize = 8;

/// Header flag: every unit is an ASCII byte.
const FLAG_ASCII: u32 = 1 << 2;
/// Header flag: units are single bytes under a character map.
const FLAG_COMPRESSED: u32 = 1 << 3;

/// Node flag: the key leading here is accepted.
const NODE_TERMINAL: u32 = 1 << 0;
/// Node flag: `value_index` names a value table entry.
const NODE_HAS_VALUE: u32 = 1 << 1;

/// The largest node count a narrow (24-bit target) container can hold.
const NARROW_NODE_LIMIT: usize = 1 << 24;

/// The parsed fixed-size header of a container.
#[derive(Clone, Copy, Debug)]
struct Header {
    flags: u32,
    node_count: u32,
    edge_count: u32,
    root_offset: u32,
    value_offset: u32,
    value_count: u32,
}

impl Header {
    fn encoding(&self) -> Encoding {
        if self.flags & FLAG_ASCII != 0 {
            Encoding::Ascii
        } else if self.flags & FLAG_COMPRESSED != 0 {
            Encoding::Compressed
        } else {
            Encoding::Wide
        }
    }

    fn narrow(&self) -> bool {
        self.encoding().is_narrow()
    }
}

/// One 32-byte node record, decoded on the fly from the node table.
#[derive(Clone, Copy, Debug)]
struct NodeRecord {
    flags: u32,
    value_index: u32,
    edge_count: u32,
    edges_offset: u32,
}

/// A validated, zero-copy view of a serialized word graph.
///
/// `T` is the byte storage: a `Vec<u8>` for an owned buffer, `&[u8]` for a
/// borrowed one, or a memory map for
/// [`MappedDawg`](crate::MappedDawg). Construction validates the whole
/// buffer once; afterwards every query is offset arithmetic plus binary
/// search, with nothing copied out of the buffer except decoded match
/// results.
///
/// `Container` implements [`Automaton`], so it answers the same query
/// surface as a live [`Dawg`](crate::Dawg): `contains`, `lookup`,
/// `find_prefixes`, the wildcard and edit-distance searches.
///
/// # Example
///
/// ```
/// use dawg_automata::{Automaton, Container, Dawg, Value};
///
/// let mut dawg = Dawg::new();
/// dawg.add("apple", Some(Value::Int(1)));
/// dawg.minimize()?;
/// let bytes = dawg.to_bytes()?;
///
/// let container = Container::from_bytes(&bytes[..])?;
/// assert!(container.contains("apple"));
/// assert_eq!(&bytes[0..4], b"DAWG");
/// # Ok::<(), dawg_automata::Error>(())
/// ```
#[derive(Debug)]
pub struct Container<T> {
    bytes: T,
    header: Header,
    /// Byte offset of each value table entry, pre-scanned at load so a
    /// value index resolves in constant time.
    value_offsets: Vec<u32>,
    /// The character tables of a compressed container, rebuilt at load.
    /// Bounded by the 89 remap slots.
    map: Option<CharMap>,
}

impl<T: AsRef<[u8]>> Container<T> {
    /// Validate `bytes` as a container and return a view over it.
    ///
    /// Rejects buffers with an unknown magic or version, with both narrow
    /// flags set, with truncated or overlapping regions, with per-node edge
    /// counts that do not add up to the header total, with an edge target
    /// at or beyond the node count, or with edges out of unit order.
    pub fn from_bytes(bytes: T) -> Result<Container<T>, Error> {
        let header = Container::<T>::read_header(bytes.as_ref())?;
        let container = Container {
            bytes,
            header,
            value_offsets: Vec::new(),
            map: None,
        };
        container.validated()
    }

    fn read_header(bytes: &[u8]) -> Result<Header, Error> {
        check_len(bytes, 0, HEADER_LEN, "header")?;
        if bytes[0..4] != MAGIC {
            return Err(Error::bad_container(
                "first 4 bytes are not the magic",
            ));
        }
        let version = read_u32(bytes, 4, "header version")?;
        if version != VERSION {
            return Err(Error::bad_container(format!(
                "unknown format version {}",
                version,
            )));
        }
        let flags = read_u32(bytes, 8, "header flags")?;
        if flags & FLAG_ASCII != 0 && flags & FLAG_COMPRESSED != 0 {
            return Err(Error::bad_container(
                "both the ascii-only and compressed-unicode flags are set",
            ));
        }
        Ok(Header {
            flags,
            node_count: read_u32(bytes, 12, "header node count")?,
            edge_count: read_u32(bytes, 16, "header edge count")?,
            root_offset: read_u32(bytes, 20, "header root offset")?,
            value_offset: read_u32(bytes, 24, "header value table offset")?,
            value_count: read_u32(bytes, 28, "header value count")?,
        })
    }

    fn validated(mut self) -> Result<Container<T>, Error> {
        let bytes = self.bytes.as_ref();
        let header = self.header;
        let node_count = header.node_count as usize;
        let root_offset = header.root_offset as usize;
        let value_offset = header.value_offset as usize;

        if node_count == 0 {
            return Err(Error::bad_container(
                "a container holds at least the root node",
            ));
        }
        if root_offset < HEADER_LEN {
            return Err(Error::bad_container(
                "root offset points inside the header",
            ));
        }
        let node_table_len = node_count
            .checked_mul(NODE_LEN)
            .ok_or_else(|| Error::bad_container("node table overflow"))?;
        check_len(bytes, root_offset, node_table_len, "node table")?;
        let edge_base = root_offset + node_table_len;
        if value_offset < edge_base || value_offset > bytes.len() {
            return Err(Error::bad_container(
                "value table offset out of range",
            ));
        }

        // Walk every node record once: counts, extents, target ranges and
        // unit ordering.
        let mut edge_sum = 0u64;
        for index in 0..node_count as u32 {
            let rec = self.node_record(index);
            let edges_len = rec.edge_count as usize * EDGE_LEN;
            let start = rec.edges_offset as usize;
            if start < edge_base
                || start.checked_add(edges_len).map_or(true, |e| {
                    e > value_offset
                })
            {
                return Err(Error::bad_container(format!(
                    "edges of node {} fall outside the edge table",
                    index,
                )));
            }
            if rec.flags & NODE_HAS_VALUE != 0 {
                if rec.value_index >= header.value_count {
                    return Err(Error::bad_container(format!(
                        "value index of node {} out of range",
                        index,
                    )));
                }
            } else if rec.value_index != ValueIndex::NONE {
                return Err(Error::bad_container(format!(
                    "node {} has no value but a value index",
                    index,
                )));
            }
            let mut prev_unit: Option<u32> = None;
            for e in 0..rec.edge_count {
                let (unit, target) = self.edge_at(&rec, e);
                if target >= header.node_count {
                    return Err(Error::bad_container(format!(
                        "edge target {} at node {} exceeds the node count",
                        target, index,
                    )));
                }
                if prev_unit.map_or(false, |p| p >= unit) {
                    return Err(Error::bad_container(format!(
                        "edges of node {} are not in ascending unit order",
                        index,
                    )));
                }
                prev_unit = Some(unit);
            }
            edge_sum += u64::from(rec.edge_count);
        }
        if edge_sum != u64::from(header.edge_count) {
            return Err(Error::bad_container(format!(
                "per-node edge counts sum to {}, header says {}",
                edge_sum, header.edge_count,
            )));
        }

        // Pre-scan the value table so entries resolve in constant time.
        let mut at = value_offset;
        let table_count = read_u32(bytes, at, "value table count")?;
        at += 4;
        if table_count != header.value_count {
            return Err(Error::bad_container(format!(
                "value table holds {} entries, header says {}",
                table_count, header.value_count,
            )));
        }
        // Value table strings are narrow bytes only in ASCII containers;
        // compressed containers store them as full code points.
        let unit_width =
            if header.encoding() == Encoding::Ascii { 1 } else { 4 };
        let mut value_offsets = Vec::with_capacity(table_count as usize);
        for _ in 0..table_count {
            value_offsets.push(at as u32);
            for what in ["value entry key", "value entry payload"] {
                let len = read_u32(bytes, at, "value entry length")? as usize;
                at += 4;
                check_len(bytes, at, len, "value entry bytes")?;
                if len % unit_width != 0 {
                    return Err(Error::bad_container(format!(
                        "{} length {} is not unit aligned",
                        what, len,
                    )));
                }
                at += len;
            }
        }
        self.value_offsets = value_offsets;

        // The character map sits after the value table in compressed
        // containers.
        if header.encoding() == Encoding::Compressed {
            let count = read_u32(bytes, at, "character map count")?;
            at += 4;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                check_len(bytes, at, 8, "character map entry")?;
                let cp = read_u32(bytes, at, "character map code point")?;
                let mapped = bytes[at + 4];
                let c = char::from_u32(cp).ok_or_else(|| {
                    Error::bad_container(format!(
                        "character map entry {:#x} is not a code point",
                        cp,
                    ))
                })?;
                entries.push((c, mapped));
                at += 8;
            }
            self.map = CharMap::from_entries(&entries)
                .map(Some)
                .ok_or_else(|| {
                    Error::bad_container("character map is not a valid \
                                          slot assignment")
                })?;
        }

        // Every value entry must decode, so queries cannot fail later.
        for index in 0..self.value_offsets.len() {
            if self.value_entry(index as u32).is_none() {
                return Err(Error::bad_container(format!(
                    "value entry {} does not decode in this encoding",
                    index,
                )));
            }
        }

        trace!(
            "validated container: {} nodes, {} edges, {} values, {} bytes",
            header.node_count,
            header.edge_count,
            header.value_count,
            bytes.len(),
        );
        Ok(self)
    }

    /// The encoding recorded in the header flags.
    pub fn encoding(&self) -> Encoding {
        self.header.encoding()
    }

    /// The number of nodes in the container.
    pub fn node_count(&self) -> usize {
        self.header.node_count as usize
    }

    /// The number of edges in the container.
    pub fn edge_count(&self) -> usize {
        self.header.edge_count as usize
    }

    pub(crate) fn char_map_entries(&self) -> Option<&[(char, u8)]> {
        self.map.as_ref().map(CharMap::entries)
    }

    fn node_record(&self, index: u32) -> NodeRecord {
        let bytes = self.bytes.as_ref();
        let at = self.header.root_offset as usize
            + index as usize * NODE_LEN;
        let word = |i: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[at + i..at + i + 4]);
            u32::from_le_bytes(buf)
        };
        NodeRecord {
            flags: word(0),
            value_index: word(4),
            edge_count: word(8),
            edges_offset: word(12),
        }
    }

    fn edge_at(&self, rec: &NodeRecord, index: u32) -> (u32, u32) {
        let bytes = self.bytes.as_ref();
        let at = rec.edges_offset as usize + index as usize * EDGE_LEN;
        if self.header.narrow() {
            // A zero 24-bit target is node 0, the root; narrow targets are
            // indices, never sentinels.
            (u32::from(bytes[at]), read_u24(bytes, at + 1))
        } else {
            let mut unit = [0u8; 4];
            unit.copy_from_slice(&bytes[at..at + 4]);
            let mut target = [0u8; 4];
            target.copy_from_slice(&bytes[at + 4..at + 8]);
            (u32::from_le_bytes(unit), u32::from_le_bytes(target))
        }
    }

    /// Binary search the sorted edge slice of a node for `unit`.
    fn find_edge(&self, rec: &NodeRecord, unit: u32) -> Option<u32> {
        let (mut lo, mut hi) = (0u32, rec.edge_count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (u, target) = self.edge_at(rec, mid);
            match u.cmp(&unit) {
                core::cmp::Ordering::Equal => return Some(target),
                core::cmp::Ordering::Less => lo = mid + 1,
                core::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }

    fn encode_unit(&self, c: char) -> Option<u32> {
        match self.header.encoding() {
            Encoding::Ascii => {
                if c.is_ascii() {
                    Some(c as u32)
                } else {
                    None
                }
            }
            Encoding::Compressed => {
                self.map.as_ref()?.encode(c).map(u32::from)
            }
            Encoding::Wide => Some(c as u32),
        }
    }

    fn decode_unit(&self, unit: u32) -> Option<char> {
        match self.header.encoding() {
            Encoding::Ascii | Encoding::Wide => char::from_u32(unit),
            Encoding::Compressed => {
                let b = u8::try_from(unit).ok()?;
                self.map.as_ref()?.decode(b)
            }
        }
    }

    /// Decode value table entry `index` into its `(key, value)` pair.
    fn value_entry(&self, index: u32) -> Option<(String, Value)> {
        let bytes = self.bytes.as_ref();
        let at = *self.value_offsets.get(index as usize)? as usize;
        let (key, at) = self.table_string(bytes, at)?;
        let (payload, _) = self.table_string(bytes, at)?;
        Some((key, Value::from_table_string(payload)))
    }

    /// Decode one length-prefixed string of the value table: narrow bytes
    /// in ASCII containers, 4-byte code points otherwise.
    fn table_string(
        &self,
        bytes: &[u8],
        at: usize,
    ) -> Option<(String, usize)> {
        let mut len = [0u8; 4];
        len.copy_from_slice(bytes.get(at..at + 4)?);
        let len = u32::from_le_bytes(len) as usize;
        let data = bytes.get(at + 4..at + 4 + len)?;
        let s = if self.header.encoding() == Encoding::Ascii {
            data.iter().map(|&b| char::from(b)).collect()
        } else {
            let mut s = String::with_capacity(len / 4);
            for chunk in data.chunks_exact(4) {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(chunk);
                s.push(char::from_u32(u32::from_le_bytes(buf))?);
            }
            s
        };
        Some((s, at + 4 + len))
    }
}

impl<T: AsRef<[u8]>> Automaton for Container<T> {
    fn start(&self) -> u32 {
        0
    }

    fn is_terminal(&self, sid: u32) -> bool {
        if sid >= self.header.node_count {
            return false;
        }
        self.node_record(sid).flags & NODE_TERMINAL != 0
    }

    fn value(&self, sid: u32) -> Option<Value> {
        if sid >= self.header.node_count {
            return None;
        }
        let rec = self.node_record(sid);
        if rec.flags & NODE_HAS_VALUE == 0 {
            return None;
        }
        self.value_entry(rec.value_index).map(|(_, value)| value)
    }

    fn next(&self, sid: u32, c: char) -> Option<u32> {
        if sid >= self.header.node_count {
            return None;
        }
        let unit = self.encode_unit(c)?;
        self.find_edge(&self.node_record(sid), unit)
    }

    fn edges(&self, sid: u32) -> Vec<(char, u32)> {
        if sid >= self.header.node_count {
            return Vec::new();
        }
        let rec = self.node_record(sid);
        (0..rec.edge_count)
            .filter_map(|i| {
                let (unit, target) = self.edge_at(&rec, i);
                Some((self.decode_unit(unit)?, target))
            })
            .collect()
    }
}

/// Serialize a live graph into the container format.
///
/// Nodes are laid out breadth-first from the root, which assigns each
/// reachable node a dense index with the root at index 0; edges follow,
/// grouped per node in unit order; then the value table (abandoned entries
/// included, so node value indexes stay valid) and, for compressed graphs,
/// the character map.
pub(crate) fn serialize(dawg: &Dawg) -> Result<Vec<u8>, Error> {
    let encoding = dawg.alphabet.encoding();
    let narrow = encoding.is_narrow();

    // Dense index assignment, breadth-first.
    let mut order: Vec<NodeID> = vec![dawg.root];
    let mut index_of: HashMap<NodeID, u32> = HashMap::new();
    index_of.insert(dawg.root, 0);
    let mut head = 0;
    while head < order.len() {
        let id = order[head];
        head += 1;
        for edge in dawg.node_ref(id).edges() {
            if !index_of.contains_key(&edge.target()) {
                index_of.insert(edge.target(), order.len() as u32);
                order.push(edge.target());
            }
        }
    }
    let node_count = order.len();
    let edge_count: usize =
        order.iter().map(|&id| dawg.node_ref(id).edge_count()).sum();
    if narrow && node_count > NARROW_NODE_LIMIT {
        return Err(Error::encoding_exceeded(
            dawg.alphabet.distinct_units(),
            "narrow edge records hold 24-bit targets; \
             rebuild into the wide encoding to serialize this graph",
        ));
    }

    let flags = match encoding {
        Encoding::Ascii => FLAG_ASCII,
        Encoding::Compressed => FLAG_COMPRESSED,
        Encoding::Wide => 0,
    };
    let edge_base = HEADER_LEN + node_count * NODE_LEN;
    let value_offset = edge_base + edge_count * EDGE_LEN;

    let mut buf = Vec::with_capacity(
        estimated_len(dawg, node_count, edge_count),
    );
    buf.extend_from_slice(&MAGIC);
    write_u32(&mut buf, VERSION);
    write_u32(&mut buf, flags);
    write_u32(&mut buf, node_count as u32);
    write_u32(&mut buf, edge_count as u32);
    write_u32(&mut buf, HEADER_LEN as u32);
    write_u32(&mut buf, value_offset as u32);
    write_u32(&mut buf, dawg.values.len() as u32);
    // Reserved tail of the header must be zero.
    buf.resize(HEADER_LEN, 0);

    // Node table, computing each node's edge slice offset as we go.
    let mut next_edges_offset = edge_base;
    for &id in &order {
        let node = dawg.node_ref(id);
        let mut node_flags = 0u32;
        if node.is_terminal() {
            node_flags |= NODE_TERMINAL;
        }
        let value_index = match node.value_index() {
            Some(index) => {
                node_flags |= NODE_HAS_VALUE;
                index.as_u32()
            }
            None => ValueIndex::NONE,
        };
        write_u32(&mut buf, node_flags);
        write_u32(&mut buf, value_index);
        write_u32(&mut buf, node.edge_count() as u32);
        write_u32(&mut buf, next_edges_offset as u32);
        buf.extend_from_slice(&[0u8; 16]);
        next_edges_offset += node.edge_count() * EDGE_LEN;
    }

    // Edge table, grouped per node, already in unit order.
    for &id in &order {
        for edge in dawg.node_ref(id).edges() {
            let target = index_of[&edge.target()];
            if narrow {
                buf.push(edge.unit() as u8);
                write_u24(&mut buf, target);
                buf.extend_from_slice(&[0u8; 4]);
            } else {
                write_u32(&mut buf, edge.unit());
                write_u32(&mut buf, target);
            }
        }
    }

    // Value table: every entry, abandoned ones included, so the indexes
    // stored in node records keep pointing at the right slots.
    write_u32(&mut buf, dawg.values.len() as u32);
    for entry in &dawg.values {
        write_table_string(&mut buf, &entry.key, encoding);
        write_table_string(
            &mut buf,
            &entry.value.to_table_string(),
            encoding,
        );
    }

    if let Some(map) = dawg.alphabet.char_map() {
        write_u32(&mut buf, map.entries().len() as u32);
        for &(c, mapped) in map.entries() {
            write_u32(&mut buf, c as u32);
            buf.push(mapped);
            buf.extend_from_slice(&[0u8; 3]);
        }
    }

    trace!(
        "serialized container: {} nodes, {} edges, {} bytes",
        node_count,
        edge_count,
        buf.len(),
    );
    Ok(buf)
}

fn write_table_string(buf: &mut Vec<u8>, s: &str, encoding: Encoding) {
    if encoding == Encoding::Ascii {
        write_u32(buf, s.len() as u32);
        buf.extend_from_slice(s.as_bytes());
    } else {
        write_u32(buf, 4 * s.chars().count() as u32);
        for c in s.chars() {
            write_u32(buf, c as u32);
        }
    }
}

/// The exact size `serialize` would produce for the given live counts.
pub(crate) fn estimated_len(
    dawg: &Dawg,
    node_count: usize,
    edge_count: usize,
) -> usize {
    let unit_width =
        if dawg.alphabet.encoding() == Encoding::Ascii { 1 } else { 4 };
    let values: usize = dawg
        .values
        .iter()
        .map(|entry| {
            8 + unit_width
                * (entry.key.chars().count()
                    + entry.value.to_table_string().chars().count())
        })
        .sum();
    let char_map = match dawg.alphabet.char_map() {
        None => 0,
        Some(map) => 4 + 8 * map.entries().len(),
    };
    HEADER_LEN + node_count * NODE_LEN + edge_count * EDGE_LEN
        + 4 + values + char_map
}
