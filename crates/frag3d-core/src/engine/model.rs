use super::assembly::AssembledStructure;
use super::error::EngineError;
use super::reorder::{cyclic_bonds, reorder_for_internal_coordinates, rotatable_bonds};
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondType;
use crate::core::zmatrix::ZMatrix;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// An assembled structure together with its internal-coordinate twin.
///
/// Atoms share one numbering in both representations. Geometry changes made in
/// internal coordinates are pushed to Cartesian space with
/// [`MolecularModel::refresh_cartesian`].
#[derive(Debug, Clone)]
pub struct MolecularModel {
    pub assembled: AssembledStructure,
    pub zmatrix: ZMatrix,
    /// Rotatable bonds as atom pairs, lower index first.
    pub rotatable_bonds: Vec<(usize, usize)>,
}

impl MolecularModel {
    /// Reorders the atoms for internal coordinates and builds the Z-matrix.
    #[instrument(skip_all, name = "model_preparation")]
    pub fn prepare(
        mut assembled: AssembledStructure,
        atom_types: &HashMap<String, u32>,
    ) -> Result<Self, EngineError> {
        reorder_for_internal_coordinates(&mut assembled);
        let mut zmatrix = ZMatrix::from_structure(&assembled.structure, atom_types)?;
        zmatrix.title = format!("graph {}", assembled.metadata.graph_id);

        let structure = &assembled.structure;
        let rotatable = rotatable_bonds(&assembled)
            .into_iter()
            .filter_map(|b| structure.bond(b))
            .map(|bond| ordered(bond.atom1, bond.atom2))
            .collect::<Vec<_>>();
        debug!(
            atoms = zmatrix.len(),
            rotatable = rotatable.len(),
            "Prepared internal coordinates."
        );

        Ok(Self {
            assembled,
            zmatrix,
            rotatable_bonds: rotatable,
        })
    }

    pub fn structure(&self) -> &Structure {
        &self.assembled.structure
    }

    /// Recomputes Cartesian coordinates (and AP endpoints) from the Z-matrix.
    pub fn refresh_cartesian(&mut self) -> Result<(), EngineError> {
        let coords = self.zmatrix.to_cartesian()?;
        self.assembled.set_positions(&coords);
        Ok(())
    }

    /// Adds a bond to the structure and records it in the Z-matrix.
    pub fn add_bond(&mut self, atom1: usize, atom2: usize, order: BondType) -> Option<usize> {
        let existed = self.assembled.structure.bond_between(atom1, atom2).is_some();
        let bond = self.assembled.structure.add_bond(atom1, atom2, order)?;
        let in_chain = self.zmatrix.atoms.iter().enumerate().any(|(i, z)| {
            z.bond_ref
                .is_some_and(|r| ordered(r, i) == ordered(atom1, atom2))
        });
        if !existed && !in_chain {
            self.zmatrix.extra_bonds.push(ordered(atom1, atom2));
        }
        Some(bond)
    }

    /// Drops rotatable bonds that have become part of a ring.
    pub fn drop_cyclic_rotatable_bonds(&mut self) {
        let structure = &self.assembled.structure;
        let cyclic = cyclic_bonds(structure);
        self.rotatable_bonds.retain(|&(a, b)| {
            structure
                .bond_between(a, b)
                .is_none_or(|bond| !cyclic.contains(&bond))
        });
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}
