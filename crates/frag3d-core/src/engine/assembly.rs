use crate::core::graph::attachment::AttachmentPoint;
use crate::core::io::sdf::{
    PROP_FREE_AP, PROP_GRAPH_ENC, PROP_GRAPH_JSON, PROP_MOL_ERROR, PROP_UID, SdfMetadata,
};
use crate::core::models::ids::{ApId, VertexId};
use crate::core::models::structure::{IndexRemap, Structure};
use nalgebra::{Matrix3, Point3, Vector3};
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet};

const FRAME_EPSILON: f64 = 1e-6;

/// Graph provenance carried alongside an assembled structure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructureMetadata {
    pub graph_id: u64,
    pub graph_string: String,
    pub graph_json: String,
    /// Free-text note, e.g. about rings that could not be closed.
    pub annotation: Option<String>,
}

/// A flat structure built from a graph, with the maps relating it back to the graph.
///
/// The structure owns a private copy of the graph's attachment points whose
/// coordinates and global atom indices follow every transformation applied here.
/// All four provenance maps use plain atom and bond indices; every operation that
/// renumbers atoms or bonds updates them in the same call.
#[derive(Debug, Clone)]
pub struct AssembledStructure {
    pub structure: Structure,
    pub metadata: StructureMetadata,
    /// Rings already closed by the builder (placeholder removal).
    pub closed_rings: usize,
    aps: SlotMap<ApId, AttachmentPoint>,
    vertex_aps: BTreeMap<VertexId, Vec<ApId>>,
    edge_aps: BTreeMap<usize, (ApId, ApId)>,
    atom_aps: BTreeMap<usize, Vec<ApId>>,
    bond_aps: BTreeMap<usize, (ApId, ApId)>,
}

impl AssembledStructure {
    pub(crate) fn new(aps: SlotMap<ApId, AttachmentPoint>, metadata: StructureMetadata) -> Self {
        Self {
            structure: Structure::new(),
            metadata,
            closed_rings: 0,
            aps,
            vertex_aps: BTreeMap::new(),
            edge_aps: BTreeMap::new(),
            atom_aps: BTreeMap::new(),
            bond_aps: BTreeMap::new(),
        }
    }

    pub fn ap(&self, id: ApId) -> Option<&AttachmentPoint> {
        self.aps.get(id)
    }

    pub(crate) fn ap_mut(&mut self, id: ApId) -> Option<&mut AttachmentPoint> {
        self.aps.get_mut(id)
    }

    pub fn aps(&self) -> impl Iterator<Item = (ApId, &AttachmentPoint)> {
        self.aps.iter()
    }

    /// APs of a placed vertex, in declaration order.
    pub fn vertex_aps(&self, vertex: VertexId) -> &[ApId] {
        self.vertex_aps.get(&vertex).map_or(&[], Vec::as_slice)
    }

    /// The (parent-side, child-side) AP pair of a tree edge.
    pub fn edge_aps(&self, edge: usize) -> Option<(ApId, ApId)> {
        self.edge_aps.get(&edge).copied()
    }

    pub fn aps_on_atom(&self, atom: usize) -> &[ApId] {
        self.atom_aps.get(&atom).map_or(&[], Vec::as_slice)
    }

    /// The AP pair that produced an inter-fragment bond.
    pub fn bond_aps(&self, bond: usize) -> Option<(ApId, ApId)> {
        self.bond_aps.get(&bond).copied()
    }

    /// Atoms linked to `atom` by a tree edge, whether or not the edge made a bond.
    pub fn edge_partners(&self, atom: usize) -> BTreeSet<usize> {
        let global = |id: ApId| self.aps.get(id).and_then(|ap| ap.src_atom_global);
        self.edge_aps
            .values()
            .filter_map(|&(src, trg)| match (global(src), global(trg)) {
                (Some(a), Some(b)) if a == atom && b != atom => Some(b),
                (Some(a), Some(b)) if b == atom && a != atom => Some(a),
                _ => None,
            })
            .collect()
    }

    pub fn inter_fragment_bonds(&self) -> impl Iterator<Item = usize> + '_ {
        self.bond_aps.keys().copied()
    }

    pub(crate) fn record_vertex(&mut self, vertex: VertexId, aps: Vec<ApId>) {
        for &id in &aps {
            if let Some(atom) = self.aps.get(id).and_then(|ap| ap.src_atom_global) {
                self.atom_aps.entry(atom).or_default().push(id);
            }
        }
        self.vertex_aps.insert(vertex, aps);
    }

    pub(crate) fn record_edge(&mut self, edge: usize, aps: (ApId, ApId)) {
        self.edge_aps.insert(edge, aps);
    }

    pub(crate) fn record_bond(&mut self, bond: usize, aps: (ApId, ApId)) {
        self.bond_aps.insert(bond, aps);
    }

    /// APs that no edge consumed and that sit on an atom, ordered by atom index.
    pub fn free_aps(&self) -> Vec<&AttachmentPoint> {
        let mut free: Vec<&AttachmentPoint> = self
            .aps
            .values()
            .filter(|ap| !ap.used && ap.src_atom_global.is_some())
            .collect();
        free.sort_by_key(|ap| (ap.src_atom_global, ap.owner, ap.index));
        free
    }

    /// Follows an atom renumbering: AP source indices and the atom → APs map.
    ///
    /// APs on removed atoms lose their global index and their map entries.
    pub fn remap_atoms(&mut self, remap: &IndexRemap) {
        for ap in self.aps.values_mut() {
            ap.src_atom_global = ap.src_atom_global.and_then(|old| remap.atom(old));
        }
        self.atom_aps = std::mem::take(&mut self.atom_aps)
            .into_iter()
            .filter_map(|(old, aps)| remap.atom(old).map(|new| (new, aps)))
            .collect();
    }

    /// Follows a bond renumbering: entries of removed bonds are dropped.
    pub fn remap_bonds(&mut self, remap: &IndexRemap) {
        self.bond_aps = std::mem::take(&mut self.bond_aps)
            .into_iter()
            .filter_map(|(old, aps)| remap.bond(old).map(|new| (new, aps)))
            .collect();
    }

    /// Deletes atoms (and their bonds) while keeping every provenance map consistent.
    pub fn remove_atoms(&mut self, atoms: &BTreeSet<usize>) -> IndexRemap {
        let remap = self.structure.remove_atoms(atoms);
        self.remap_atoms(&remap);
        self.remap_bonds(&remap);
        remap
    }

    /// Reorders atoms, see [`Structure::permute`].
    pub fn permute(&mut self, new_order: &[usize]) -> Option<IndexRemap> {
        let remap = self.structure.permute(new_order)?;
        self.remap_atoms(&remap);
        self.remap_bonds(&remap);
        Some(remap)
    }

    /// Replaces all atom positions, carrying AP endpoints along.
    ///
    /// Each AP endpoint keeps its coordinates relative to a local frame spanned by
    /// its source atom and two bonded neighbours; where no such frame exists it
    /// follows the source atom by translation.
    pub fn set_positions(&mut self, positions: &[Point3<f64>]) {
        let old = self.structure.positions();
        for ap in self.aps.values_mut() {
            let Some(src) = ap.src_atom_global else {
                continue;
            };
            if src >= positions.len() || src >= old.len() {
                continue;
            }
            let before = local_frame(&self.structure, &old, src);
            let after = local_frame(&self.structure, positions, src);
            ap.end_point = match (before, after) {
                (Some(before), Some(after)) => {
                    let local = before.transpose() * (ap.end_point - old[src]);
                    positions[src] + after * local
                }
                _ => ap.end_point + (positions[src] - old[src]),
            };
        }
        for (atom, position) in self.structure.atoms_mut().iter_mut().zip(positions) {
            atom.position = *position;
        }
    }

    /// Side-channel properties for persisting this structure as SDF.
    pub fn sdf_metadata(&self, title: &str) -> SdfMetadata {
        let mut metadata = SdfMetadata::new(title)
            .with_property(PROP_UID, self.metadata.graph_id.to_string())
            .with_property(PROP_GRAPH_ENC, self.metadata.graph_string.clone())
            .with_property(PROP_GRAPH_JSON, self.metadata.graph_json.clone());
        if let Some(note) = &self.metadata.annotation {
            metadata.set(PROP_MOL_ERROR, note.clone());
        }
        let free: Vec<String> = self
            .free_aps()
            .into_iter()
            .filter_map(AttachmentPoint::to_free_ap_string)
            .collect();
        if !free.is_empty() {
            metadata.set(PROP_FREE_AP, free.join(" "));
        }
        metadata
    }
}

/// Orthonormal frame at `atom` built from its first two neighbours (or its first
/// neighbour and that neighbour's next neighbour).
fn local_frame(
    structure: &Structure,
    positions: &[Point3<f64>],
    atom: usize,
) -> Option<Matrix3<f64>> {
    let neighbors = structure.neighbors(atom);
    let first = *neighbors.first()?;
    let second = neighbors.get(1).copied().or_else(|| {
        structure
            .neighbors(first)
            .iter()
            .copied()
            .find(|&n| n != atom)
    })?;
    let origin = positions.get(atom)?;
    let e1 = (positions.get(first)? - origin).try_normalize(FRAME_EPSILON)?;
    let v2 = positions.get(second)? - origin;
    let e2 = (v2 - e1 * v2.dot(&e1)).try_normalize(FRAME_EPSILON)?;
    let e3: Vector3<f64> = e1.cross(&e2);
    Some(Matrix3::from_columns(&[e1, e2, e3]))
}
