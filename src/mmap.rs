/*!
A read-only, memory-mapped view of a container file.

Opening a file maps it into the address space, validates the container once
and then answers the full query surface straight out of the mapping: no
node, edge or value is copied until a query actually matches. Because
traversal only ever reads bytes, any number of threads - and any number of
processes mapping the same file - can query concurrently; the kernel's page
cache provides the sharing.

The only state decoded at open time is the header, the value table's entry
offsets and (for compressed containers) the character map, which is bounded
by the 89 remap slots.
*/

use std::fs::File;
use std::path::Path;

use log::debug;
use memmap2::Mmap;

use crate::alphabet::Encoding;
use crate::automaton::Automaton;
use crate::container::Container;
use crate::error::Error;
use crate::value::Value;

/// A word graph queried directly out of a memory-mapped container file.
///
/// `MappedDawg` exposes the read-only half of the
/// [`Dawg`](crate::Dawg) surface - membership, lookup, prefix enumeration
/// and, through [`Automaton`], the wildcard and edit-distance searches -
/// without ever materializing the graph on the heap.
///
/// # Example
///
/// ```no_run
/// use dawg_automata::{Automaton, Dawg, MappedDawg, Value};
///
/// let mut dawg = Dawg::new();
/// dawg.add("apple", Some(Value::Int(1)));
/// dawg.minimize()?;
/// dawg.save_binary("words.dawg")?;
///
/// let reader = MappedDawg::open("words.dawg")?;
/// assert!(reader.contains("apple"));
/// assert_eq!(
///     reader.lookup("apple").and_then(|m| m.value),
///     Some(Value::Int(1)),
/// );
/// reader.close();
/// # Ok::<(), dawg_automata::Error>(())
/// ```
///
/// # File lifetime
///
/// The mapping holds the file open for as long as the reader lives. The
/// file must not be truncated while mapped; doing so is a program error on
/// the writer's side that the reader cannot defend against.
#[derive(Debug)]
pub struct MappedDawg {
    container: Container<Mmap>,
}

impl MappedDawg {
    /// Map `path` read-only and validate it as a container.
    ///
    /// Fails with `Io` if the file cannot be opened or mapped, and with
    /// `BadContainer` if its contents do not validate.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<MappedDawg, Error> {
        let path = path.as_ref();
        let file = File::open(path).map_err(Error::io)?;
        // Safety: the map is read-only and the persistence contract forbids
        // truncating a file while readers map it.
        let map = unsafe { Mmap::map(&file) }.map_err(Error::io)?;
        debug!(
            "mapped {} ({} bytes) read-only",
            path.display(),
            map.len(),
        );
        let container = Container::from_bytes(map)?;
        Ok(MappedDawg { container })
    }

    /// The encoding recorded in the container header.
    pub fn encoding(&self) -> Encoding {
        self.container.encoding()
    }

    /// The number of nodes in the mapped graph.
    pub fn node_count(&self) -> usize {
        self.container.node_count()
    }

    /// The number of edges in the mapped graph.
    pub fn edge_count(&self) -> usize {
        self.container.edge_count()
    }

    /// Borrow the underlying validated container view.
    pub fn container(&self) -> &Container<Mmap> {
        &self.container
    }

    /// Unmap the file and close it.
    ///
    /// Dropping the reader does the same; this spelling exists for callers
    /// that want the release to be visible in the code.
    pub fn close(self) {}
}

impl Automaton for MappedDawg {
    fn start(&self) -> u32 {
        self.container.start()
    }

    fn is_terminal(&self, sid: u32) -> bool {
        self.container.is_terminal(sid)
    }

    fn value(&self, sid: u32) -> Option<Value> {
        self.container.value(sid)
    }

    fn next(&self, sid: u32, c: char) -> Option<u32> {
        self.container.next(sid, c)
    }

    fn edges(&self, sid: u32) -> Vec<(char, u32)> {
        self.container.edges(sid)
    }
}
