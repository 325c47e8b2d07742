use super::attachment::AttachmentPoint;
use super::edge::{Edge, Ring};
use super::vertex::{Vertex, VertexKind};
use crate::core::library::{BuildingBlockProvider, LibraryError};
use crate::core::models::ids::{ApId, VertexId};
use crate::core::models::topology::BondType;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Vertex {0} already exists in the graph")]
    DuplicateVertex(VertexId),
    #[error("Vertex {0} does not exist in the graph")]
    UnknownVertex(VertexId),
    #[error("Attachment point handle does not belong to this graph")]
    UnknownAp,
    #[error("Vertex {vertex} has no attachment point {index}")]
    NoSuchAp { vertex: VertexId, index: usize },
    #[error("Edge would connect vertex {vertex} to itself")]
    SameVertex { vertex: VertexId },
    #[error("Attachment point {index} of vertex {vertex} is already used")]
    ApAlreadyUsed { vertex: VertexId, index: usize },
    #[error("Vertex {vertex} already has a parent edge")]
    MultipleParents { vertex: VertexId },
    #[error("Edge from vertex {parent} to vertex {child} would close a cycle in the tree")]
    Cycle { parent: VertexId, child: VertexId },
    #[error("Ring cannot start and end on vertex {0}")]
    DegenerateRing(VertexId),
    #[error("Building block of vertex {vertex} is unusable: {source}")]
    Library {
        vertex: VertexId,
        source: LibraryError,
    },
    #[error("Graph is not a rooted spanning tree: {0}")]
    NotATree(String),
    #[error("JSON graph encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A spanning tree of building-block vertices plus ring-closing chords.
///
/// Attachment points live in an arena owned by the graph and are referred to by
/// [`ApId`] handles everywhere else. The tree is only ever extended through
/// [`Graph::add_edge`], which enforces the single-parent and acyclicity rules.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub id: u64,
    vertices: Vec<Vertex>,
    vertex_index: HashMap<VertexId, usize>,
    aps: SlotMap<ApId, AttachmentPoint>,
    edges: Vec<Edge>,
    rings: Vec<Ring>,
    parent_edges: HashMap<VertexId, usize>,
}

impl Graph {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Adds a vertex and instantiates its attachment points.
    pub fn add_vertex(
        &mut self,
        id: VertexId,
        kind: VertexKind,
        ring_closing: bool,
        provider: &dyn BuildingBlockProvider,
    ) -> Result<VertexId, GraphError> {
        if self.vertex_index.contains_key(&id) {
            return Err(GraphError::DuplicateVertex(id));
        }

        let (templates, contains_atoms): (Vec<AttachmentPoint>, bool) = match &kind {
            VertexKind::BuildingBlock { block } => {
                let block = provider
                    .block(*block)
                    .map_err(|source| GraphError::Library { vertex: id, source })?;
                let aps = block
                    .attachment_points
                    .iter()
                    .enumerate()
                    .map(|(index, ap)| {
                        AttachmentPoint::new(
                            id,
                            index,
                            block.contains_atoms.then_some(ap.atom),
                            Point3::from(ap.end_point),
                            ap.class.clone(),
                        )
                    })
                    .collect();
                (aps, block.contains_atoms)
            }
            VertexKind::Empty { ap_classes } => {
                let aps = ap_classes
                    .iter()
                    .enumerate()
                    .map(|(index, class)| {
                        AttachmentPoint::new(id, index, None, Point3::origin(), class.clone())
                    })
                    .collect();
                (aps, false)
            }
        };

        let mut vertex = Vertex::new(id, kind, contains_atoms, ring_closing);
        for mut ap in templates {
            ap.ring_closing = ring_closing;
            vertex.aps.push(self.aps.insert(ap));
        }
        self.vertex_index.insert(id, self.vertices.len());
        self.vertices.push(vertex);
        Ok(id)
    }

    /// Adds a tree edge from the parent-side AP `src_ap` to the child-side AP `trg_ap`.
    ///
    /// Both APs are marked used. Returns the edge's position in the edge listing.
    pub fn add_edge(
        &mut self,
        src_ap: ApId,
        trg_ap: ApId,
        bond_type: BondType,
    ) -> Result<usize, GraphError> {
        let src = self.aps.get(src_ap).ok_or(GraphError::UnknownAp)?;
        let trg = self.aps.get(trg_ap).ok_or(GraphError::UnknownAp)?;
        let (parent, child) = (src.owner, trg.owner);

        if parent == child {
            return Err(GraphError::SameVertex { vertex: parent });
        }
        for ap in [src, trg] {
            if ap.used {
                return Err(GraphError::ApAlreadyUsed {
                    vertex: ap.owner,
                    index: ap.index,
                });
            }
        }
        if self.parent_edges.contains_key(&child) {
            return Err(GraphError::MultipleParents { vertex: child });
        }
        if self.ancestors(parent).any(|v| v == child) {
            return Err(GraphError::Cycle { parent, child });
        }

        self.aps[src_ap].used = true;
        self.aps[trg_ap].used = true;
        self.edges.push(Edge {
            src_ap,
            trg_ap,
            bond_type,
        });
        let index = self.edges.len() - 1;
        self.parent_edges.insert(child, index);
        Ok(index)
    }

    /// Convenience wrapper over [`Graph::add_edge`] addressing APs by vertex and index.
    pub fn connect(
        &mut self,
        parent: VertexId,
        parent_ap: usize,
        child: VertexId,
        child_ap: usize,
        bond_type: BondType,
    ) -> Result<usize, GraphError> {
        let src = self.ap_of(parent, parent_ap)?;
        let trg = self.ap_of(child, child_ap)?;
        self.add_edge(src, trg, bond_type)
    }

    pub fn add_ring(
        &mut self,
        head: VertexId,
        tail: VertexId,
        bond_type: BondType,
    ) -> Result<(), GraphError> {
        for v in [head, tail] {
            if !self.vertex_index.contains_key(&v) {
                return Err(GraphError::UnknownVertex(v));
            }
        }
        if head == tail {
            return Err(GraphError::DegenerateRing(head));
        }
        self.rings.push(Ring {
            head,
            tail,
            bond_type,
        });
        Ok(())
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertex_index.get(&id).map(|&i| &self.vertices[i])
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn ap(&self, id: ApId) -> Option<&AttachmentPoint> {
        self.aps.get(id)
    }

    pub fn aps(&self) -> &SlotMap<ApId, AttachmentPoint> {
        &self.aps
    }

    pub fn ap_of(&self, vertex: VertexId, index: usize) -> Result<ApId, GraphError> {
        self.vertex(vertex)
            .ok_or(GraphError::UnknownVertex(vertex))?
            .ap(index)
            .ok_or(GraphError::NoSuchAp { vertex, index })
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, index: usize) -> Option<&Edge> {
        self.edges.get(index)
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    /// Parent and child vertex of an edge.
    pub fn edge_vertices(&self, edge: &Edge) -> (VertexId, VertexId) {
        (self.aps[edge.src_ap].owner, self.aps[edge.trg_ap].owner)
    }

    pub fn parent_edge(&self, vertex: VertexId) -> Option<usize> {
        self.parent_edges.get(&vertex).copied()
    }

    /// Edges leaving `vertex`, in edge-listing order.
    pub fn children_edges(&self, vertex: VertexId) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| self.aps[e.src_ap].owner == vertex)
            .map(|(i, _)| i)
            .collect()
    }

    /// The first vertex, in insertion order, without a parent edge.
    pub fn root(&self) -> Option<VertexId> {
        self.vertices
            .iter()
            .map(|v| v.id)
            .find(|id| !self.parent_edges.contains_key(id))
    }

    /// Verifies that edges form a single rooted spanning tree and returns its root.
    pub fn check_tree_shape(&self) -> Result<VertexId, GraphError> {
        let roots: Vec<VertexId> = self
            .vertices
            .iter()
            .map(|v| v.id)
            .filter(|id| !self.parent_edges.contains_key(id))
            .collect();
        let root = match roots.as_slice() {
            [root] => *root,
            [] => return Err(GraphError::NotATree("no root vertex".to_string())),
            many => {
                return Err(GraphError::NotATree(format!(
                    "{} vertices without parent: {:?}",
                    many.len(),
                    many.iter().map(|v| v.0).collect::<Vec<_>>()
                )));
            }
        };

        let mut seen = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(v) = queue.pop_front() {
            for e in self.children_edges(v) {
                let (_, child) = self.edge_vertices(&self.edges[e]);
                if !seen.insert(child) {
                    return Err(GraphError::NotATree(format!(
                        "vertex {} reached twice",
                        child
                    )));
                }
                queue.push_back(child);
            }
        }
        if seen.len() != self.vertices.len() {
            return Err(GraphError::NotATree(format!(
                "{} of {} vertices unreachable from root {}",
                self.vertices.len() - seen.len(),
                self.vertices.len(),
                root
            )));
        }
        Ok(root)
    }

    fn ancestors(&self, vertex: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        let mut current = Some(vertex);
        std::iter::from_fn(move || {
            let v = current?;
            current = self
                .parent_edges
                .get(&v)
                .map(|&e| self.aps[self.edges[e].src_ap].owner);
            Some(v)
        })
    }

    /// Compact single-line encoding: `"<graph-id> <vertices> <edges> <rings>"`.
    ///
    /// Lists are comma separated, `-` marks an empty list. Vertices render as
    /// `id_<kind><index>_<rc>`, edges as `parent_ap_child_ap_bond`, rings as
    /// `head_tail_bond`.
    pub fn to_graph_string(&self) -> String {
        fn join(items: Vec<String>) -> String {
            if items.is_empty() {
                "-".to_string()
            } else {
                items.join(",")
            }
        }

        let vertices = self
            .vertices
            .iter()
            .map(|v| {
                let index = v.block().map_or(String::new(), |b| b.index.to_string());
                format!(
                    "{}_{}{}_{}",
                    v.id,
                    v.kind_code(),
                    index,
                    u8::from(v.ring_closing)
                )
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .map(|e| {
                let (src, trg) = (&self.aps[e.src_ap], &self.aps[e.trg_ap]);
                format!(
                    "{}_{}_{}_{}_{}",
                    src.owner, src.index, trg.owner, trg.index, e.bond_type
                )
            })
            .collect();
        let rings = self
            .rings
            .iter()
            .map(|r| format!("{}_{}_{}", r.head, r.tail, r.bond_type))
            .collect();

        format!("{} {} {} {}", self.id, join(vertices), join(edges), join(rings))
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        let record = GraphRecord {
            graph_id: self.id,
            vertices: self
                .vertices
                .iter()
                .map(|v| VertexRecord {
                    id: v.id,
                    kind: v.kind.clone(),
                    ring_closing: v.ring_closing,
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|e| {
                    let (src, trg) = (&self.aps[e.src_ap], &self.aps[e.trg_ap]);
                    EdgeRecord {
                        src_vertex: src.owner,
                        src_ap: src.index,
                        trg_vertex: trg.owner,
                        trg_ap: trg.index,
                        bond_type: e.bond_type,
                    }
                })
                .collect(),
            rings: self.rings.clone(),
        };
        Ok(serde_json::to_string(&record)?)
    }

    pub fn from_json(json: &str, provider: &dyn BuildingBlockProvider) -> Result<Self, GraphError> {
        let record: GraphRecord = serde_json::from_str(json)?;
        let mut graph = Graph::new(record.graph_id);
        for v in record.vertices {
            graph.add_vertex(v.id, v.kind, v.ring_closing, provider)?;
        }
        for e in record.edges {
            graph.connect(e.src_vertex, e.src_ap, e.trg_vertex, e.trg_ap, e.bond_type)?;
        }
        for r in record.rings {
            graph.add_ring(r.head, r.tail, r.bond_type)?;
        }
        Ok(graph)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct GraphRecord {
    #[serde(default)]
    graph_id: u64,
    vertices: Vec<VertexRecord>,
    #[serde(default)]
    edges: Vec<EdgeRecord>,
    #[serde(default)]
    rings: Vec<Ring>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct VertexRecord {
    id: VertexId,
    #[serde(flatten)]
    kind: VertexKind,
    #[serde(default)]
    ring_closing: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct EdgeRecord {
    src_vertex: VertexId,
    src_ap: usize,
    trg_vertex: VertexId,
    trg_ap: usize,
    #[serde(default)]
    bond_type: BondType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::{
        ApTemplate, BlockAtom, BlockKind, BlockRef, BuildingBlock, FragmentLibrary,
    };

    fn block(name: &str, n_atoms: usize, n_aps: usize) -> BuildingBlock {
        BuildingBlock {
            name: name.to_string(),
            contains_atoms: n_atoms > 0,
            atoms: (0..n_atoms)
                .map(|i| BlockAtom {
                    element: "C".into(),
                    position: [i as f64 * 1.5, 0.0, 0.0],
                    charge: 0,
                })
                .collect(),
            bonds: vec![],
            attachment_points: (0..n_aps)
                .map(|i| ApTemplate {
                    atom: i % n_atoms.max(1),
                    end_point: [0.0, 1.0, 0.0],
                    class: Some("C:0".parse().unwrap()),
                })
                .collect(),
        }
    }

    fn library() -> (FragmentLibrary, BlockRef, BlockRef) {
        let mut lib = FragmentLibrary::new();
        let s = lib.add(BlockKind::Scaffold, block("s", 2, 3));
        let f = lib.add(BlockKind::Fragment, block("f", 1, 2));
        (lib, s, f)
    }

    fn bb(block: BlockRef) -> VertexKind {
        VertexKind::BuildingBlock { block }
    }

    fn star() -> (Graph, FragmentLibrary) {
        let (lib, s, f) = library();
        let mut g = Graph::new(7);
        g.add_vertex(VertexId(1), bb(s), false, &lib).unwrap();
        g.add_vertex(VertexId(2), bb(f), false, &lib).unwrap();
        g.add_vertex(VertexId(3), bb(f), true, &lib).unwrap();
        g.connect(VertexId(1), 0, VertexId(2), 0, BondType::Single)
            .unwrap();
        g.connect(VertexId(1), 1, VertexId(3), 0, BondType::Double)
            .unwrap();
        (g, lib)
    }

    #[test]
    fn add_vertex_instantiates_aps_from_block() {
        let (g, _) = star();
        let v = g.vertex(VertexId(1)).unwrap();
        assert_eq!(v.aps().len(), 3);
        assert!(v.contains_atoms());
        let ap = g.ap(v.aps()[1]).unwrap();
        assert_eq!(ap.owner, VertexId(1));
        assert_eq!(ap.index, 1);
        assert_eq!(ap.src_atom_local, Some(1));
        assert!(ap.used);
        assert!(!g.ap(v.aps()[2]).unwrap().used);
    }

    #[test]
    fn ring_closing_vertex_marks_its_aps() {
        let (g, _) = star();
        let ap = g.ap(g.vertex(VertexId(3)).unwrap().aps()[1]).unwrap();
        assert!(ap.ring_closing);
    }

    #[test]
    fn add_vertex_rejects_duplicates_and_bad_blocks() {
        let (mut g, lib) = star();
        let f = BlockRef::new(BlockKind::Fragment, 0);
        assert!(matches!(
            g.add_vertex(VertexId(1), bb(f), false, &lib),
            Err(GraphError::DuplicateVertex(_))
        ));
        let missing = BlockRef::new(BlockKind::CappingGroup, 0);
        assert!(matches!(
            g.add_vertex(VertexId(9), bb(missing), false, &lib),
            Err(GraphError::Library { .. })
        ));
    }

    #[test]
    fn empty_vertex_has_aps_without_source_atoms() {
        let lib = FragmentLibrary::new();
        let mut g = Graph::new(1);
        g.add_vertex(
            VertexId(1),
            VertexKind::Empty {
                ap_classes: vec![None, Some("X:1".parse().unwrap())],
            },
            false,
            &lib,
        )
        .unwrap();
        let v = g.vertex(VertexId(1)).unwrap();
        assert!(!v.contains_atoms());
        assert_eq!(v.aps().len(), 2);
        assert!(v.aps().iter().all(|&ap| g.ap(ap).unwrap().src_atom_local.is_none()));
    }

    #[test]
    fn add_edge_enforces_tree_rules() {
        let (mut g, lib) = star();
        let f = BlockRef::new(BlockKind::Fragment, 0);
        g.add_vertex(VertexId(4), bb(f), false, &lib).unwrap();

        // Used AP on the parent side.
        assert!(matches!(
            g.connect(VertexId(1), 0, VertexId(4), 0, BondType::Single),
            Err(GraphError::ApAlreadyUsed { .. })
        ));
        // Same vertex on both sides.
        assert!(matches!(
            g.connect(VertexId(4), 0, VertexId(4), 1, BondType::Single),
            Err(GraphError::SameVertex { .. })
        ));
        // Child that already has a parent.
        assert!(matches!(
            g.connect(VertexId(4), 0, VertexId(2), 1, BondType::Single),
            Err(GraphError::MultipleParents { .. })
        ));
        // Edge back to an ancestor.
        assert!(matches!(
            g.connect(VertexId(2), 1, VertexId(1), 2, BondType::Single),
            Err(GraphError::Cycle { .. })
        ));
        assert!(matches!(
            g.connect(VertexId(1), 7, VertexId(4), 0, BondType::Single),
            Err(GraphError::NoSuchAp { .. })
        ));
    }

    #[test]
    fn tree_navigation_follows_edge_order() {
        let (g, _) = star();
        assert_eq!(g.root(), Some(VertexId(1)));
        assert_eq!(g.children_edges(VertexId(1)), vec![0, 1]);
        assert_eq!(g.parent_edge(VertexId(3)), Some(1));
        assert_eq!(g.parent_edge(VertexId(1)), None);
        assert_eq!(g.edge_vertices(&g.edges()[1]), (VertexId(1), VertexId(3)));
        assert_eq!(g.check_tree_shape().unwrap(), VertexId(1));
    }

    #[test]
    fn check_tree_shape_detects_forests() {
        let (mut g, lib) = star();
        let f = BlockRef::new(BlockKind::Fragment, 0);
        g.add_vertex(VertexId(4), bb(f), false, &lib).unwrap();
        assert!(matches!(g.check_tree_shape(), Err(GraphError::NotATree(_))));
        assert!(matches!(Graph::new(0).check_tree_shape(), Err(GraphError::NotATree(_))));
    }

    #[test]
    fn add_ring_validates_vertices() {
        let (mut g, _) = star();
        g.add_ring(VertexId(2), VertexId(3), BondType::Single).unwrap();
        assert_eq!(g.rings().len(), 1);
        assert!(g.rings()[0].involves(VertexId(3)));
        assert!(matches!(
            g.add_ring(VertexId(2), VertexId(99), BondType::Single),
            Err(GraphError::UnknownVertex(_))
        ));
        assert!(matches!(
            g.add_ring(VertexId(2), VertexId(2), BondType::Single),
            Err(GraphError::DegenerateRing(_))
        ));
    }

    #[test]
    fn graph_string_lists_vertices_edges_and_rings() {
        let (mut g, _) = star();
        assert_eq!(
            g.to_graph_string(),
            "7 1_S0_0,2_F0_0,3_F0_1 1_0_2_0_Single,1_1_3_0_Double -"
        );
        g.add_ring(VertexId(2), VertexId(3), BondType::Single).unwrap();
        assert!(g.to_graph_string().ends_with(" 2_3_Single"));
    }

    #[test]
    fn json_encoding_round_trips_topology() {
        let (mut g, lib) = star();
        g.add_ring(VertexId(2), VertexId(3), BondType::Single).unwrap();

        let json = g.to_json().unwrap();
        let back = Graph::from_json(&json, &lib).unwrap();

        assert_eq!(back.id, 7);
        assert_eq!(back.vertices().len(), 3);
        assert_eq!(back.edges().len(), 2);
        assert_eq!(back.rings(), g.rings());
        assert!(back.vertex(VertexId(3)).unwrap().ring_closing);
        assert_eq!(back.to_graph_string(), g.to_graph_string());
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        let lib = FragmentLibrary::new();
        assert!(matches!(
            Graph::from_json("{not json", &lib),
            Err(GraphError::Json(_))
        ));
    }
}
