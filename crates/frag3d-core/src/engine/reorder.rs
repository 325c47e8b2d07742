use super::assembly::AssembledStructure;
use crate::core::models::structure::{IndexRemap, Structure};
use crate::core::models::topology::BondType;
use std::collections::BTreeSet;

/// Atom order suitable for internal coordinates.
///
/// Each connected component is walked depth-first from its first real atom, taking
/// neighbours in ascending index order, so every atom after the first of its
/// component is bonded to an atom placed earlier.
pub fn internal_coordinate_order(structure: &Structure) -> Vec<usize> {
    let n = structure.atom_count();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);

    for component in structure.connected_components() {
        let start = component
            .iter()
            .copied()
            .find(|&i| !structure.atoms()[i].is_pseudo())
            .unwrap_or(component[0]);
        let mut stack = vec![start];
        while let Some(atom) = stack.pop() {
            if visited[atom] {
                continue;
            }
            visited[atom] = true;
            order.push(atom);
            let mut next: Vec<usize> = structure
                .neighbors(atom)
                .iter()
                .copied()
                .filter(|&nb| !visited[nb])
                .collect();
            next.sort_unstable_by(|a, b| b.cmp(a));
            stack.extend(next);
        }
    }
    order
}

/// Renumbers the atoms of `assembled` into [`internal_coordinate_order`].
pub fn reorder_for_internal_coordinates(assembled: &mut AssembledStructure) -> IndexRemap {
    let order = internal_coordinate_order(&assembled.structure);
    let identity = IndexRemap::identity(
        assembled.structure.atom_count(),
        assembled.structure.bond_count(),
    );
    // `order` is a permutation by construction.
    assembled.permute(&order).unwrap_or(identity)
}

/// Bonds that lie on at least one ring (i.e. are not bridges).
pub fn cyclic_bonds(structure: &Structure) -> BTreeSet<usize> {
    let n = structure.atom_count();
    let mut discovery = vec![usize::MAX; n];
    let mut low = vec![0; n];
    let mut bridges = BTreeSet::new();
    let mut time = 0;

    for root in 0..n {
        if discovery[root] != usize::MAX {
            continue;
        }
        // (atom, bond used to reach it, next neighbour position)
        let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(root, None, 0)];
        discovery[root] = time;
        low[root] = time;
        time += 1;

        while let Some(top) = stack.last_mut() {
            let (atom, via) = (top.0, top.1);
            let neighbors = structure.neighbors(atom);
            if top.2 < neighbors.len() {
                let next = neighbors[top.2];
                top.2 += 1;
                let Some(bond) = structure.bond_between(atom, next) else {
                    continue;
                };
                if Some(bond) == via {
                    continue;
                }
                if discovery[next] == usize::MAX {
                    discovery[next] = time;
                    low[next] = time;
                    time += 1;
                    stack.push((next, Some(bond), 0));
                } else {
                    low[atom] = low[atom].min(discovery[next]);
                }
            } else {
                stack.pop();
                if let (Some(bond), Some(&(parent, _, _))) = (via, stack.last()) {
                    low[parent] = low[parent].min(low[atom]);
                    if low[atom] > discovery[parent] {
                        bridges.insert(bond);
                    }
                }
            }
        }
    }

    (0..structure.bond_count())
        .filter(|b| !bridges.contains(b))
        .collect()
}

/// Inter-fragment single bonds about which rotation changes the geometry.
///
/// Bonds in rings and bonds to terminal atoms are excluded.
pub fn rotatable_bonds(assembled: &AssembledStructure) -> Vec<usize> {
    let structure = &assembled.structure;
    let cyclic = cyclic_bonds(structure);
    let mut bonds: Vec<usize> = assembled
        .inter_fragment_bonds()
        .filter(|b| !cyclic.contains(b))
        .filter(|&b| {
            structure.bond(b).is_some_and(|bond| {
                bond.order == BondType::Single
                    && structure.neighbors(bond.atom1).len() > 1
                    && structure.neighbors(bond.atom2).len() > 1
            })
        })
        .collect();
    bonds.sort_unstable();
    bonds
}
