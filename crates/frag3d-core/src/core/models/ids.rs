use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Arena handle of an attachment point owned by a [`Graph`](crate::core::graph::graph::Graph).
    pub struct ApId;
}

/// Caller-assigned identifier of a graph vertex.
///
/// Vertex ids are persisted (per-atom origin tags, graph encodings), so they are plain
/// integers rather than arena keys.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VertexId(pub u32);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VertexId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
