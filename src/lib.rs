/*!
A library for building, querying and memory-mapping minimal deterministic
acyclic word graphs (DAWGs).

A DAWG is the minimal deterministic finite automaton recognizing a fixed
set of strings, optionally mapping each accepted string to a value. It is
built for dictionary-shaped workloads: the key set is built once (or
rarely), queried many times, and may be shipped as an immutable on-disk
artifact that any number of processes query through a shared memory map
with no deserialization step.

This crate provides four things:

* A mutable [`Dawg`] with an explicit [`minimize`](Dawg::minimize) step
  that collapses states with equal right-languages, so shared suffixes are
  stored once.
* An adaptive alphabet: ASCII keys use single-byte edge labels, up to 89
  distinct code points are transparently compressed into single-byte remap
  slots, and larger alphabets fall back to 32-bit code points. Transitions
  between these encodings happen automatically as keys are added (see
  [`Encoding`]).
* A fixed-width binary [`container`] format designed for traversal by
  pointer arithmetic, and a [`MappedDawg`] reader that answers queries
  straight out of a memory-mapped container file.
* Search extensions over any of the above: wildcard matching (`?`/`*`) and
  bounded Levenshtein search, both defined once on the [`Automaton`] trait.

# Example: build, persist, map

```no_run
use dawg_automata::{Automaton, Dawg, MappedDawg, Value};

let mut dawg = Dawg::new();
dawg.add("apple", Some(Value::Int(1)));
dawg.add("apply", None);
dawg.add("application", None);
dawg.minimize()?;
dawg.save_binary("words.dawg")?;

let reader = MappedDawg::open("words.dawg")?;
let keys: Vec<String> = reader.find_prefixes("appl").collect();
assert_eq!(keys, vec!["apple", "application", "apply"]);
assert_eq!(reader.find_wildcard("*tion"), vec!["application"]);
# Ok::<(), dawg_automata::Error>(())
```

# Example: fuzzy search

```
use dawg_automata::{Automaton, Dawg};

let mut dawg = Dawg::new();
dawg.add("apple", None);
dawg.add("apply", None);
dawg.minimize()?;

assert_eq!(
    dawg.find_fuzzy("aple", 1),
    vec![("apple".to_string(), 1)],
);
# Ok::<(), dawg_automata::Error>(())
```

# Determinism

Edge enumeration, prefix enumeration and both searches return results in an
order that depends only on the unit-code ordering of the alphabet - never
on insertion order, and never on whether `minimize` has run. Building the
same key set twice produces byte-identical containers.

# Concurrency

A `Dawg` is mutated under exclusive ownership and can then be shared
immutably across threads; queries take `&self` and there is no interior
mutability. A `MappedDawg` is safe for concurrent reads from any number of
threads and processes over the same file.

# Logging

This crate never installs a logger, but emits construction-time
diagnostics through the [`log`] crate facade: encoding transitions and
minimization results at `debug`, container region sizes at `trace`.
*/

#![deny(unsafe_op_in_unsafe_fn)]

mod alphabet;
mod automaton;
pub mod container;
mod dawg;
mod error;
mod id;
mod minimize;
mod mmap;
mod node;
mod search;
mod text;
mod value;
mod wire;

pub use crate::{
    alphabet::{Encoding, EncodingChoice},
    automaton::{Automaton, Lookup, PrefixIter},
    container::Container,
    dawg::{Dawg, RebuildOptions, Stats, SubtreeStats},
    error::{Error, ErrorKind},
    id::{NodeID, NodeIDError, ValueIndex},
    minimize::MinimizeStats,
    mmap::MappedDawg,
    node::{Edge, Node},
    value::Value,
};
