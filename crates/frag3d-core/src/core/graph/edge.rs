use crate::core::models::ids::{ApId, VertexId};
use crate::core::models::topology::BondType;
use serde::{Deserialize, Serialize};

/// A tree edge pairing one AP on the parent (source) vertex with one AP on the
/// child (target) vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub src_ap: ApId,
    pub trg_ap: ApId,
    pub bond_type: BondType,
}

impl Edge {
    pub fn has_chemical_bond(&self) -> bool {
        self.bond_type.has_chemical_analogue()
    }
}

/// A chord between two vertices (normally ring-closing vertices) that should
/// eventually be joined by a ring-closing bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ring {
    pub head: VertexId,
    pub tail: VertexId,
    #[serde(default)]
    pub bond_type: BondType,
}

impl Ring {
    pub fn involves(&self, vertex: VertexId) -> bool {
        self.head == vertex || self.tail == vertex
    }
}
