use super::attachment::ApClass;
use crate::core::library::BlockRef;
use crate::core::models::ids::{ApId, VertexId};
use serde::{Deserialize, Serialize};

/// What a vertex is made of.
///
/// Only building-block vertices may carry atoms; whether a particular block actually
/// does is a property of the block itself (see [`Vertex::contains_atoms`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VertexKind {
    BuildingBlock {
        block: BlockRef,
    },
    /// A vertex with no atoms whose APs are declared inline.
    Empty {
        #[serde(default)]
        ap_classes: Vec<Option<ApClass>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: VertexId,
    pub kind: VertexKind,
    pub(crate) aps: Vec<ApId>,
    pub(crate) contains_atoms: bool,
    pub ring_closing: bool,
}

impl Vertex {
    pub(crate) fn new(
        id: VertexId,
        kind: VertexKind,
        contains_atoms: bool,
        ring_closing: bool,
    ) -> Self {
        Self {
            id,
            kind,
            aps: Vec::new(),
            contains_atoms,
            ring_closing,
        }
    }

    /// APs in declaration order.
    pub fn aps(&self) -> &[ApId] {
        &self.aps
    }

    pub fn ap(&self, index: usize) -> Option<ApId> {
        self.aps.get(index).copied()
    }

    pub fn contains_atoms(&self) -> bool {
        self.contains_atoms
    }

    pub fn block(&self) -> Option<BlockRef> {
        match &self.kind {
            VertexKind::BuildingBlock { block } => Some(*block),
            VertexKind::Empty { .. } => None,
        }
    }

    pub(crate) fn kind_code(&self) -> char {
        match &self.kind {
            VertexKind::BuildingBlock { block } => block.kind.code(),
            VertexKind::Empty { .. } => 'E',
        }
    }
}
