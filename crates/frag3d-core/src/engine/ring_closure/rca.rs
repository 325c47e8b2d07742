use crate::core::graph::attachment::ApClass;
use crate::core::graph::graph::Graph;
use crate::core::models::atom::AttractorKind;
use crate::core::models::ids::VertexId;
use crate::core::models::topology::BondType;
use crate::engine::assembly::AssembledStructure;
use crate::engine::error::{EngineError, GeometryError};
use itertools::Itertools;
use std::collections::HashSet;
use tracing::warn;

/// A pseudo-atom pulling its source atom towards a ring-closure partner.
#[derive(Debug, Clone, PartialEq)]
pub struct RingClosingAttractor {
    pub atom: usize,
    /// The real atom the attractor is bonded to.
    pub source_atom: usize,
    pub kind: AttractorKind,
    pub vertex: Option<VertexId>,
    pub class: Option<ApClass>,
    pub used: bool,
}

impl RingClosingAttractor {
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.atom != other.atom
            && self.source_atom != other.source_atom
            && self.kind.is_compatible_with(other.kind)
    }
}

/// Two attractors (indices into the attractor list) to close together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttractorPair {
    pub head: usize,
    pub tail: usize,
    pub bond_type: BondType,
}

impl AttractorPair {
    fn key(&self) -> (usize, usize) {
        (self.head.min(self.tail), self.head.max(self.tail))
    }
}

/// Scans the structure for ring-closing attractors, in atom order.
pub fn find_attractors(
    assembled: &AssembledStructure,
) -> Result<Vec<RingClosingAttractor>, EngineError> {
    let structure = &assembled.structure;
    let mut found = Vec::new();
    for (index, atom) in structure.atoms().iter().enumerate() {
        let Some(kind) = atom.attractor_kind() else {
            continue;
        };
        let source_atom = match structure.neighbors(index) {
            &[source] => source,
            // Hung from its parent by a bondless edge: follow the edge instead.
            [] => {
                let partners = assembled.edge_partners(index);
                match (partners.first(), partners.len()) {
                    (Some(&source), 1) => source,
                    (_, found) => {
                        return Err(GeometryError::MalformedAttractor { atom: index, found }.into());
                    }
                }
            }
            many => {
                return Err(GeometryError::MalformedAttractor {
                    atom: index,
                    found: many.len(),
                }
                .into());
            }
        };
        let class = assembled
            .aps_on_atom(index)
            .iter()
            .filter_map(|&id| assembled.ap(id))
            .find_map(|ap| ap.class.clone());
        found.push(RingClosingAttractor {
            atom: index,
            source_atom,
            kind,
            vertex: atom.vertex_id,
            class,
            used: false,
        });
    }
    Ok(found)
}

/// Attractor pairs requested by the graph's ring list.
///
/// Rings whose placeholders carry no attractor, or whose attractors are
/// incompatible, are skipped with a warning.
pub fn ring_pairs(graph: &Graph, attractors: &[RingClosingAttractor]) -> Vec<AttractorPair> {
    let on_vertex = |v: VertexId| attractors.iter().position(|a| a.vertex == Some(v));
    graph
        .rings()
        .iter()
        .filter_map(|ring| {
            let (Some(head), Some(tail)) = (on_vertex(ring.head), on_vertex(ring.tail)) else {
                warn!(head = %ring.head, tail = %ring.tail, "Ring placeholders carry no attractor.");
                return None;
            };
            if !attractors[head].is_compatible_with(&attractors[tail]) {
                warn!(head = %ring.head, tail = %ring.tail, "Ring attractors are incompatible.");
                return None;
            }
            Some(AttractorPair {
                head,
                tail,
                bond_type: ring.bond_type,
            })
        })
        .collect()
}

/// Sets of `size` compatible, attractor-disjoint pairs, at most `limit` of them.
///
/// Pairs that are not in the graph's ring list are closed with single bonds.
pub fn alternative_pairings(
    attractors: &[RingClosingAttractor],
    size: usize,
    limit: usize,
) -> Vec<Vec<AttractorPair>> {
    if size == 0 {
        return Vec::new();
    }
    let pairs: Vec<AttractorPair> = (0..attractors.len())
        .tuple_combinations()
        .filter(|&(a, b)| attractors[a].is_compatible_with(&attractors[b]))
        .map(|(head, tail)| AttractorPair {
            head,
            tail,
            bond_type: BondType::Single,
        })
        .collect();

    pairs
        .into_iter()
        .combinations(size)
        .filter(|set| {
            let mut seen = HashSet::new();
            set.iter().all(|p| seen.insert(p.head) && seen.insert(p.tail))
        })
        .take(limit)
        .collect()
}

/// Whether two pairings close the same attractor pairs.
pub fn same_pairing(a: &[AttractorPair], b: &[AttractorPair]) -> bool {
    let keys = |set: &[AttractorPair]| set.iter().map(AttractorPair::key).sorted().collect_vec();
    keys(a) == keys(b)
}
