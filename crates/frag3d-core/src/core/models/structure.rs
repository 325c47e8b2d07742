use super::atom::Atom;
use super::topology::{Bond, BondType};
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Old-to-new index translation produced by operations that renumber atoms or bonds.
///
/// Entries are `None` for atoms or bonds that no longer exist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexRemap {
    atoms: Vec<Option<usize>>,
    bonds: Vec<Option<usize>>,
}

impl IndexRemap {
    pub fn identity(atom_count: usize, bond_count: usize) -> Self {
        Self {
            atoms: (0..atom_count).map(Some).collect(),
            bonds: (0..bond_count).map(Some).collect(),
        }
    }

    pub fn atom(&self, old: usize) -> Option<usize> {
        self.atoms.get(old).copied().flatten()
    }

    pub fn bond(&self, old: usize) -> Option<usize> {
        self.bonds.get(old).copied().flatten()
    }

    pub fn removed_atoms(&self) -> impl Iterator<Item = usize> + '_ {
        self.atoms
            .iter()
            .enumerate()
            .filter_map(|(old, new)| new.is_none().then_some(old))
    }
}

/// A flat, ordered collection of atoms and the bonds between them.
///
/// Atom and bond indices are stable handles: appending never moves existing entries,
/// and every operation that does renumber returns an [`IndexRemap`] so dependants
/// can follow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    /// Atoms in sequence order.
    atoms: Vec<Atom>,
    /// Bonds in creation order.
    bonds: Vec<Bond>,
    /// Cached adjacency list for bond connectivity, indexed by atom.
    adjacency: Vec<Vec<usize>>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn atom_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(index)
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Mutable access to the atoms; the slice cannot change the atom count.
    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn bond(&self, index: usize) -> Option<&Bond> {
        self.bonds.get(index)
    }

    pub fn bond_mut(&mut self, index: usize) -> Option<&mut Bond> {
        self.bonds.get_mut(index)
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    /// Adds a bond and returns its index.
    ///
    /// Adding a bond that already exists returns the existing index (idempotent);
    /// unknown atoms and self-bonds return `None`.
    pub fn add_bond(&mut self, atom1: usize, atom2: usize, order: BondType) -> Option<usize> {
        if atom1 == atom2 || atom1 >= self.atoms.len() || atom2 >= self.atoms.len() {
            return None;
        }
        if let Some(existing) = self.bond_between(atom1, atom2) {
            return Some(existing);
        }

        self.bonds.push(Bond::new(atom1, atom2, order));
        self.adjacency[atom1].push(atom2);
        self.adjacency[atom2].push(atom1);
        Some(self.bonds.len() - 1)
    }

    pub fn bond_between(&self, atom1: usize, atom2: usize) -> Option<usize> {
        if !self.adjacency.get(atom1)?.contains(&atom2) {
            return None;
        }
        self.bonds.iter().position(|b| b.connects(atom1, atom2))
    }

    pub fn neighbors(&self, atom: usize) -> &[usize] {
        self.adjacency.get(atom).map_or(&[], |v| v.as_slice())
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.atoms.is_empty() {
            return None;
        }
        let sum: Vector3<f64> = self.atoms.iter().map(|a| a.position.coords).sum();
        Some(Point3::from(sum / self.atoms.len() as f64))
    }

    /// Deletes the given atoms and every bond touching them, compacting indices.
    pub fn remove_atoms(&mut self, to_remove: &BTreeSet<usize>) -> IndexRemap {
        let mut atom_map = Vec::with_capacity(self.atoms.len());
        let mut next = 0;
        for old in 0..self.atoms.len() {
            if to_remove.contains(&old) {
                atom_map.push(None);
            } else {
                atom_map.push(Some(next));
                next += 1;
            }
        }

        let old_atoms = std::mem::take(&mut self.atoms);
        self.atoms = old_atoms
            .into_iter()
            .enumerate()
            .filter(|(old, _)| !to_remove.contains(old))
            .map(|(_, atom)| atom)
            .collect();

        let mut bond_map = Vec::with_capacity(self.bonds.len());
        let old_bonds = std::mem::take(&mut self.bonds);
        for bond in old_bonds {
            match (atom_map[bond.atom1], atom_map[bond.atom2]) {
                (Some(a1), Some(a2)) => {
                    bond_map.push(Some(self.bonds.len()));
                    self.bonds.push(Bond::new(a1, a2, bond.order));
                }
                _ => bond_map.push(None),
            }
        }

        self.rebuild_adjacency();
        IndexRemap {
            atoms: atom_map,
            bonds: bond_map,
        }
    }

    /// Reorders atoms so that new position `k` holds the atom previously at `new_order[k]`.
    ///
    /// Returns `None` (leaving the structure untouched) if `new_order` is not a
    /// permutation of the current atom indices. Bond order is preserved.
    pub fn permute(&mut self, new_order: &[usize]) -> Option<IndexRemap> {
        if new_order.len() != self.atoms.len() {
            return None;
        }
        let mut atom_map = vec![None; self.atoms.len()];
        for (new, &old) in new_order.iter().enumerate() {
            if old >= self.atoms.len() || atom_map[old].is_some() {
                return None;
            }
            atom_map[old] = Some(new);
        }

        self.atoms = new_order.iter().map(|&old| self.atoms[old].clone()).collect();
        for bond in &mut self.bonds {
            // Every slot was filled above, so both lookups succeed.
            bond.atom1 = atom_map[bond.atom1].unwrap_or(bond.atom1);
            bond.atom2 = atom_map[bond.atom2].unwrap_or(bond.atom2);
        }
        self.rebuild_adjacency();

        Some(IndexRemap {
            atoms: atom_map,
            bonds: (0..self.bonds.len()).map(Some).collect(),
        })
    }

    /// Atoms reachable from `start` through at most `max_bonds` bonds, `start` included.
    pub fn atoms_within_bonds(&self, start: usize, max_bonds: usize) -> HashSet<usize> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0)]);
        while let Some((atom, depth)) = queue.pop_front() {
            if depth == max_bonds {
                continue;
            }
            for &n in self.neighbors(atom) {
                if seen.insert(n) {
                    queue.push_back((n, depth + 1));
                }
            }
        }
        seen
    }

    /// Connected components as lists of atom indices, each sorted, ordered by first atom.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.atoms.len()];
        let mut components = Vec::new();
        for start in 0..self.atoms.len() {
            if visited[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            visited[start] = true;
            while let Some(atom) = stack.pop() {
                component.push(atom);
                for &n in self.neighbors(atom) {
                    if !visited[n] {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    fn rebuild_adjacency(&mut self) {
        self.adjacency = vec![Vec::new(); self.atoms.len()];
        for bond in &self.bonds {
            self.adjacency[bond.atom1].push(bond.atom2);
            self.adjacency[bond.atom2].push(bond.atom1);
        }
    }
}
