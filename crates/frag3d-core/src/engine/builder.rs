use super::assembly::{AssembledStructure, StructureMetadata};
use super::config::BuilderConfig;
use super::error::{EngineError, GeometryError};
use crate::core::graph::graph::{Graph, GraphError};
use crate::core::graph::vertex::Vertex;
use crate::core::library::BuildingBlockProvider;
use crate::core::models::ids::{ApId, VertexId};
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondType;
use crate::core::utils::geometry::{
    is_finite_point, random_point_in_cube, rotate_about, rotation_to_align,
};
use nalgebra::{Point3, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, trace, warn};

const VECTOR_EPSILON: f64 = 1e-8;

/// Turns a graph of building blocks into one flat 3D structure.
///
/// The builder borrows the building-block library and never mutates it: every
/// fragment is materialised as a fresh copy before it is moved into place.
pub struct TreeBuilder<'a> {
    library: &'a dyn BuildingBlockProvider,
    config: BuilderConfig,
    rng: StdRng,
    /// Atom-less vertices already given a position.
    anchored: BTreeSet<VertexId>,
}

/// The fragment being attached: its atoms and the handles of its APs.
struct Placement<'v> {
    vertex: &'v Vertex,
    atoms: Structure,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(library: &'a dyn BuildingBlockProvider, config: BuilderConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            library,
            config,
            rng,
            anchored: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Assembles `graph` depth-first from its root.
    ///
    /// # Errors
    ///
    /// Fails when the graph is not a rooted tree, a building block is unusable, or
    /// any transformation produces non-finite coordinates.
    #[instrument(skip_all, name = "tree_assembly", fields(graph_id = graph.id))]
    pub fn assemble(
        &mut self,
        graph: &Graph,
        remove_used_ring_placeholders: bool,
        enforce_valence_requirements: bool,
    ) -> Result<AssembledStructure, EngineError> {
        let root = graph.check_tree_shape()?;
        let metadata = StructureMetadata {
            graph_id: graph.id,
            graph_string: graph.to_graph_string(),
            graph_json: graph.to_json()?,
            annotation: None,
        };
        let mut assembly = AssembledStructure::new(graph.aps().clone(), metadata);
        let mut appended = 0;
        self.anchored.clear();

        let root_vertex = vertex(graph, root)?;
        let root_atoms = self.materialise(root_vertex)?;
        append_fragment(
            &mut assembly,
            Placement {
                vertex: root_vertex,
                atoms: root_atoms,
            },
            &mut appended,
        );
        debug!(root = %root, atoms = appended, "Seeded structure with root vertex.");

        self.attach_children(graph, root, &mut assembly, &mut appended)?;

        info!(
            atoms = assembly.structure.atom_count(),
            bonds = assembly.structure.bond_count(),
            "Tree assembly complete."
        );

        if remove_used_ring_placeholders {
            remove_ring_placeholders(graph, &mut assembly)?;
        }
        if enforce_valence_requirements {
            enforce_valence(&mut assembly.structure);
        }
        Ok(assembly)
    }

    fn attach_children(
        &mut self,
        graph: &Graph,
        parent: VertexId,
        assembly: &mut AssembledStructure,
        appended: &mut usize,
    ) -> Result<(), EngineError> {
        for edge_index in graph.children_edges(parent) {
            let child = self.attach_child(graph, edge_index, assembly, appended)?;
            self.attach_children(graph, child, assembly, appended)?;
        }
        Ok(())
    }

    fn attach_child(
        &mut self,
        graph: &Graph,
        edge_index: usize,
        assembly: &mut AssembledStructure,
        appended: &mut usize,
    ) -> Result<VertexId, EngineError> {
        let edge = *graph
            .edge(edge_index)
            .ok_or_else(|| EngineError::Internal(format!("edge {} vanished", edge_index)))?;
        let (parent_id, child_id) = graph.edge_vertices(&edge);
        let parent = vertex(graph, parent_id)?;
        let child = vertex(graph, child_id)?;
        trace!(edge = edge_index, parent = %parent_id, child = %child_id, "Attaching child.");

        let parent_source = assembly
            .ap(edge.src_ap)
            .and_then(|ap| ap.src_atom_global)
            .and_then(|i| assembly.structure.atom(i).map(|atom| (i, atom.position)));

        let mut placement = Placement {
            vertex: child,
            atoms: self.materialise(child)?,
        };

        if self.config.align_building_blocks {
            match parent_source {
                Some((_, source)) if child.contains_atoms() => {
                    let ring_edge = parent.ring_closing || child.ring_closing;
                    align(
                        &mut placement,
                        assembly,
                        edge.src_ap,
                        edge.trg_ap,
                        &source,
                        ring_edge,
                    )?;
                }
                _ => {
                    let inherited = self
                        .anchored
                        .contains(&parent_id)
                        .then(|| assembly.ap(edge.src_ap).map(|ap| ap.end_point))
                        .flatten();
                    self.anchor(&mut placement, assembly, edge.trg_ap, inherited)?;
                }
            }
        }

        append_fragment(assembly, placement, appended);

        let child_atom = assembly.ap(edge.trg_ap).and_then(|ap| ap.src_atom_global);
        if edge.has_chemical_bond() {
            if let (Some((parent_atom, _)), Some(child_atom)) = (parent_source, child_atom) {
                if let Some(bond) =
                    assembly
                        .structure
                        .add_bond(parent_atom, child_atom, edge.bond_type)
                {
                    assembly.record_bond(bond, (edge.src_ap, edge.trg_ap));
                }
            }
        }
        assembly.record_edge(edge_index, (edge.src_ap, edge.trg_ap));
        Ok(child_id)
    }

    /// Fresh copy of the vertex's atoms, or nothing for atom-less vertices.
    fn materialise(&self, vertex: &Vertex) -> Result<Structure, EngineError> {
        if !vertex.contains_atoms() {
            return Ok(Structure::new());
        }
        let block = vertex.block().ok_or_else(|| {
            EngineError::Internal(format!("vertex {} has atoms but no block", vertex.id))
        })?;
        Ok(self.library.block(block)?.to_structure(vertex.id))
    }

    /// Places a child without a usable parent atom, or without atoms of its own.
    ///
    /// Children of an anchored atom-less parent reuse the point their parent AP
    /// was pinned to; everything else goes to a random point near the current
    /// structure.
    fn anchor(
        &mut self,
        placement: &mut Placement<'_>,
        assembly: &mut AssembledStructure,
        child_ap: ApId,
        inherited: Option<Point3<f64>>,
    ) -> Result<(), EngineError> {
        let anchor = match inherited {
            Some(point) => point,
            None => {
                let center = assembly
                    .structure
                    .centroid()
                    .unwrap_or_else(Point3::origin);
                random_point_in_cube(&center, self.config.anchor_box_edge, &mut self.rng)
            }
        };
        debug!(vertex = %placement.vertex.id, ?anchor, inherited = inherited.is_some(), "Anchoring vertex.");

        if placement.atoms.is_empty() {
            self.anchored.insert(placement.vertex.id);
            for &id in placement.vertex.aps() {
                if let Some(ap) = assembly.ap_mut(id) {
                    ap.end_point = anchor;
                }
            }
        } else {
            let source = child_source_position(placement, assembly, child_ap)?;
            let shift = anchor - source;
            transform(placement, assembly, |p| p + shift);
        }
        check_finite(placement, assembly, "anchoring")
    }
}

fn vertex(graph: &Graph, id: VertexId) -> Result<&Vertex, EngineError> {
    graph
        .vertex(id)
        .ok_or_else(|| GraphError::UnknownVertex(id).into())
}

fn child_source_position(
    placement: &Placement<'_>,
    assembly: &AssembledStructure,
    child_ap: ApId,
) -> Result<Point3<f64>, EngineError> {
    let ap = assembly.ap(child_ap).ok_or(GraphError::UnknownAp)?;
    ap.src_atom_local
        .and_then(|local| placement.atoms.atom(local))
        .map(|atom| atom.position)
        .ok_or_else(|| {
            GeometryError::MissingSourceAtom {
                vertex: ap.owner,
                index: ap.index,
            }
            .into()
        })
}

/// Roto-translates the child so that its AP meets the parent AP.
fn align(
    placement: &mut Placement<'_>,
    assembly: &mut AssembledStructure,
    parent_ap: ApId,
    child_ap: ApId,
    source: &Point3<f64>,
    ring_edge: bool,
) -> Result<(), EngineError> {
    let parent_end = assembly.ap(parent_ap).ok_or(GraphError::UnknownAp)?.end_point;
    let child_end = assembly.ap(child_ap).ok_or(GraphError::UnknownAp)?.end_point;
    let child_source = child_source_position(placement, assembly, child_ap)?;

    let vp = parent_end - source;
    let vc = child_end - child_source;

    let shift = source - child_end;
    transform(placement, assembly, |p| p + shift);
    check_finite(placement, assembly, "translation")?;

    let vc_rotated = match rotation_to_align(&(-vc), &vp) {
        Some(rotation) => {
            transform(placement, assembly, |p| rotate_about(p, source, &rotation));
            check_finite(placement, assembly, "rotation")?;
            rotation * vc
        }
        None => vc,
    };

    let shift = if ring_edge {
        // Ring placeholders sit at the longer AP length from the parent atom.
        vp.try_normalize(VECTOR_EPSILON)
            .map_or_else(Vector3::zeros, |dir| {
                dir * (vp.norm().max(vc.norm()) - vc.norm())
            })
    } else {
        (vp + vc_rotated) * 0.5
    };
    transform(placement, assembly, |p| p + shift);
    check_finite(placement, assembly, "final translation")
}

fn transform(
    placement: &mut Placement<'_>,
    assembly: &mut AssembledStructure,
    f: impl Fn(&Point3<f64>) -> Point3<f64>,
) {
    for atom in placement.atoms.atoms_mut() {
        atom.position = f(&atom.position);
    }
    for &id in placement.vertex.aps() {
        if let Some(ap) = assembly.ap_mut(id) {
            ap.end_point = f(&ap.end_point);
        }
    }
}

fn check_finite(
    placement: &Placement<'_>,
    assembly: &AssembledStructure,
    stage: &'static str,
) -> Result<(), EngineError> {
    let atoms_ok = placement
        .atoms
        .atoms()
        .iter()
        .all(|a| is_finite_point(&a.position));
    let aps_ok = placement
        .vertex
        .aps()
        .iter()
        .filter_map(|&id| assembly.ap(id))
        .all(|ap| is_finite_point(&ap.end_point));
    if atoms_ok && aps_ok {
        Ok(())
    } else {
        Err(GeometryError::NonFinite {
            vertex: placement.vertex.id,
            stage,
        }
        .into())
    }
}

/// Appends the fragment's atoms and bonds and assigns global indices to its APs.
fn append_fragment(
    assembly: &mut AssembledStructure,
    placement: Placement<'_>,
    appended: &mut usize,
) {
    let offset = *appended;
    for atom in placement.atoms.atoms() {
        assembly.structure.add_atom(atom.clone());
    }
    for bond in placement.atoms.bonds() {
        assembly
            .structure
            .add_bond(bond.atom1 + offset, bond.atom2 + offset, bond.order);
    }
    *appended += placement.atoms.atom_count();

    for &id in placement.vertex.aps() {
        if let Some(ap) = assembly.ap_mut(id) {
            ap.src_atom_global = ap.src_atom_local.map(|local| local + offset);
        }
    }
    assembly.record_vertex(placement.vertex.id, placement.vertex.aps().to_vec());
}

/// Atoms contributed by `vertex` and the single atom outside it they hang from.
///
/// Placeholders joined by a bondless edge have no bonded neighbour; their
/// partner is then taken from the edge's attachment points.
fn placeholder_atoms(
    assembly: &AssembledStructure,
    vertex: VertexId,
) -> Option<(Vec<usize>, usize)> {
    let structure = &assembly.structure;
    let own: Vec<usize> = structure
        .atoms()
        .iter()
        .enumerate()
        .filter(|(_, a)| a.vertex_id == Some(vertex))
        .map(|(i, _)| i)
        .collect();
    let mut outside: BTreeSet<usize> = own
        .iter()
        .flat_map(|&i| structure.neighbors(i).iter().copied())
        .filter(|n| !own.contains(n))
        .collect();
    if outside.is_empty() {
        outside = own
            .iter()
            .flat_map(|&i| assembly.edge_partners(i))
            .filter(|n| !own.contains(n))
            .collect();
    }
    match (own.is_empty(), outside.len()) {
        (false, 1) => outside.first().map(|&n| (own, n)),
        _ => None,
    }
}

/// Replaces every ring's pair of placeholder vertices by a direct bond.
#[instrument(skip_all, name = "ring_placeholder_removal")]
fn remove_ring_placeholders(
    graph: &Graph,
    assembly: &mut AssembledStructure,
) -> Result<(), EngineError> {
    let mut doomed = BTreeSet::new();
    for ring in graph.rings() {
        let head = placeholder_atoms(assembly, ring.head)
            .ok_or(GeometryError::UnresolvedRingPlaceholder { vertex: ring.head })?;
        let tail = placeholder_atoms(assembly, ring.tail)
            .ok_or(GeometryError::UnresolvedRingPlaceholder { vertex: ring.tail })?;
        if head.1 == tail.1 {
            warn!(head = %ring.head, tail = %ring.tail, "Ring placeholders share their neighbour; ring skipped.");
            continue;
        }

        if ring.bond_type.has_chemical_analogue() {
            let bond = assembly.structure.add_bond(head.1, tail.1, ring.bond_type);
            let aps = [ring.head, ring.tail].map(|v| {
                graph
                    .parent_edge(v)
                    .and_then(|e| assembly.edge_aps(e))
                    .map(|(src, _)| src)
            });
            if let (Some(bond), [Some(a), Some(b)]) = (bond, aps) {
                assembly.record_bond(bond, (a, b));
            }
        }
        doomed.extend(head.0);
        doomed.extend(tail.0);
        assembly.closed_rings += 1;
    }

    if !doomed.is_empty() {
        assembly.remove_atoms(&doomed);
        info!(
            removed_atoms = doomed.len(),
            rings = assembly.closed_rings,
            "Removed ring placeholders."
        );
    }
    Ok(())
}

/// Hydrogens are explicit; ambiguous bonds become single bonds.
fn enforce_valence(structure: &mut Structure) {
    for atom in structure.atoms_mut() {
        atom.implicit_hydrogens = Some(0);
    }
    for index in 0..structure.bond_count() {
        if let Some(bond) = structure.bond_mut(index) {
            if bond.order == BondType::Undefined {
                bond.order = BondType::Single;
            }
        }
    }
}
