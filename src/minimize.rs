use std::collections::HashMap;

use log::trace;

use crate::dawg::Dawg;
use crate::error::Error;
use crate::id::{NodeID, ValueIndex};

/// An implementation of bottom-up signature minimization for word graphs.
///
/// Unlike the partition-refinement algorithms used for general DFAs
/// (Hopcroft et al.), an acyclic automaton can be minimized in a single
/// post-order pass: once every descendant of a node has been replaced by the
/// canonical survivor of its equivalence class, the node's right-language is
/// fully determined by its terminal flag, its value index and its outgoing
/// `(unit, canonical child)` list. Encoding that triple into a byte string
/// gives a signature that two nodes share exactly when their right-languages
/// are equal, so a registry keyed by signature finds every merge.
///
/// Some properties worth calling out:
///
/// 1. The pass is deterministic. Post-order visitation follows the edge
///    ordering invariant (strictly ascending units), so when several
///    structurally equal nodes exist, the survivor is always the first one
///    reaching the registry, independent of allocation order.
/// 2. Survivor IDs are stable. The registry keeps the arena ID of each
///    canonical node; merged-away nodes are tombstoned and their IDs stop
///    resolving, but a survivor keeps the ID it was allocated with.
/// 3. Registry hits are double-checked structurally before merging. The
///    signature encoding is exact, so a collision would indicate a bug, but
///    the check is cheap and turns such a bug into a missed merge instead
///    of a corrupted graph.
/// 4. The input is an invariant DAG, but a malformed builder could hand us
///    a back-edge. The traversal marks nodes in progress and refuses to
///    recurse into them, which guarantees termination; the consistency
///    check below then rejects the result.
/// 5. Before anything is mutated, the accepted key set of the remapped
///    graph is compared against the input's. On any difference the
///    automaton is left byte-for-byte unchanged and
///    [`MinimizeConsistency`](crate::ErrorKind::MinimizeConsistency) is
///    returned.
///
/// The registry and the ID remap are scoped to one call and released before
/// control returns.
pub(crate) struct Minimizer<'a> {
    dawg: &'a mut Dawg,
    /// Signature bytes to the canonical node of that equivalence class.
    registry: HashMap<Vec<u8>, NodeID>,
    /// Arena ID to canonical ID; identity for survivors.
    remap: Vec<NodeID>,
    merge_count: usize,
}

/// The outcome of a successful [`Dawg::minimize`](crate::Dawg::minimize):
/// the size of the minimized graph and the number of states merged away.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MinimizeStats {
    /// Reachable nodes after minimization.
    pub node_count: usize,
    /// Edges after minimization.
    pub edge_count: usize,
    /// States merged into a canonical survivor by this call.
    pub merge_count: usize,
}

const WHITE: u8 = 0;
const GRAY: u8 = 1;
const BLACK: u8 = 2;

impl<'a> Minimizer<'a> {
    pub(crate) fn new(dawg: &'a mut Dawg) -> Minimizer<'a> {
        let remap =
            (0..dawg.nodes.len()).map(NodeID::new_unchecked).collect();
        Minimizer {
            dawg,
            registry: HashMap::new(),
            remap,
            merge_count: 0,
        }
    }

    pub(crate) fn run(mut self) -> Result<MinimizeStats, Error> {
        let before = self.language(false);

        // Post-order over the DAG. GRAY marks the path currently on the
        // stack; an edge into a GRAY node is a back-edge and is skipped
        // rather than followed, so the pass terminates even on malformed
        // input.
        let mut color = vec![WHITE; self.dawg.nodes.len()];
        let mut stack: Vec<(NodeID, usize)> = vec![(self.dawg.root, 0)];
        color[self.dawg.root.as_usize()] = GRAY;
        while let Some(frame) = stack.last_mut() {
            let id = frame.0;
            let node = self.dawg.node_ref(id);
            if frame.1 < node.edge_count() {
                let child = node.edges()[frame.1].target();
                frame.1 += 1;
                if color[child.as_usize()] == WHITE {
                    color[child.as_usize()] = GRAY;
                    stack.push((child, 0));
                }
            } else {
                stack.pop();
                color[id.as_usize()] = BLACK;
                self.finish(id);
            }
        }

        let after = self.language(true);
        if before != after {
            return Err(Error::minimize_consistency());
        }

        let (node_count, edge_count) = self.commit(&color);
        trace!(
            "signature registry resolved {} classes, {} merges",
            self.registry.len(),
            self.merge_count,
        );
        Ok(MinimizeStats {
            node_count,
            edge_count,
            merge_count: self.merge_count,
        })
    }

    /// Resolve the equivalence class of `id`. All descendants are final by
    /// the time this runs.
    fn finish(&mut self, id: NodeID) {
        let sig = self.signature(id);
        if let Some(&canonical) = self.registry.get(&sig) {
            if self.structurally_equal(id, canonical) {
                self.remap[id] = canonical;
                self.merge_count += 1;
                return;
            }
            // A collision between structurally different nodes would mean
            // the signature encoding is not injective; keep both nodes
            // rather than merge wrongly.
        }
        self.registry.insert(sig, id);
    }

    /// The exact byte encoding of a node's right-language, given that its
    /// children have already been remapped to canonical survivors.
    fn signature(&self, id: NodeID) -> Vec<u8> {
        let node = self.dawg.node_ref(id);
        let mut sig = Vec::with_capacity(6 + node.edge_count() * 8);
        sig.push(node.is_terminal() as u8);
        match node.value_index() {
            None => sig.push(0),
            Some(index) => {
                sig.push(1);
                sig.extend_from_slice(&index.as_u32().to_le_bytes());
            }
        }
        for edge in node.edges() {
            sig.extend_from_slice(&edge.unit().to_le_bytes());
            sig.extend_from_slice(&self.remap[edge.target()].to_le_bytes());
        }
        sig
    }

    /// The defensive second check behind a registry hit: equal terminal
    /// flag, equal value index, and pairwise equal edges (by unit and by
    /// canonical target).
    fn structurally_equal(&self, a: NodeID, b: NodeID) -> bool {
        let (na, nb) = (self.dawg.node_ref(a), self.dawg.node_ref(b));
        na.is_terminal() == nb.is_terminal()
            && na.value_index() == nb.value_index()
            && na.edge_count() == nb.edge_count()
            && na.edges().iter().zip(nb.edges()).all(|(ea, eb)| {
                ea.unit() == eb.unit()
                    && self.remap[ea.target()] == self.remap[eb.target()]
            })
    }

    /// Every accepted `(unit path, value index)` of the graph, in DFS unit
    /// order. With `remapped` set, edges are followed through the remap,
    /// which walks the would-be minimized graph without mutating anything.
    fn language(
        &self,
        remapped: bool,
    ) -> Vec<(Vec<u32>, Option<ValueIndex>)> {
        let resolve = |id: NodeID| -> NodeID {
            if remapped {
                self.remap[id]
            } else {
                id
            }
        };
        let mut out = Vec::new();
        let root = resolve(self.dawg.root);
        let root_node = self.dawg.node_ref(root);
        if root_node.is_terminal() {
            out.push((Vec::new(), root_node.value_index()));
        }
        let mut path: Vec<u32> = Vec::new();
        // (node, next edge, whether this frame appended a unit)
        let mut stack: Vec<(NodeID, usize, bool)> = vec![(root, 0, false)];
        while let Some(frame) = stack.last_mut() {
            let node = self.dawg.node_ref(frame.0);
            if frame.1 < node.edge_count() {
                let edge = node.edges()[frame.1];
                frame.1 += 1;
                let child = resolve(edge.target());
                path.push(edge.unit());
                let child_node = self.dawg.node_ref(child);
                if child_node.is_terminal() {
                    out.push((path.clone(), child_node.value_index()));
                }
                stack.push((child, 0, true));
            } else {
                let (_, _, pushed) = stack.pop().expect("frame present");
                if pushed {
                    path.pop();
                }
            }
        }
        out
    }

    /// Apply the remap: rewrite the edges of every survivor and tombstone
    /// everything else. Returns the live node and edge counts.
    fn commit(&mut self, color: &[u8]) -> (usize, usize) {
        let old_root = self.dawg.root;
        let mut node_count = 0;
        let mut edge_count = 0;
        for index in 0..self.dawg.nodes.len() {
            let id = NodeID::new_unchecked(index);
            let survives =
                color[index] == BLACK && self.remap[id] == id;
            if survives {
                let remap = &self.remap;
                self.dawg.node_mut(id).remap_edges(|t| remap[t]);
                node_count += 1;
                edge_count += self.dawg.node_ref(id).edge_count();
            } else {
                self.dawg.tombstone(id);
            }
        }
        self.dawg.root = self.remap[old_root];
        (node_count, edge_count)
    }
}
