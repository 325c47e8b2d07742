use super::rca::RingClosingAttractor;
use crate::core::utils::elements::{self, CAPPING_ELEMENT, DUMMY_ELEMENT};
use crate::core::zmatrix::ZMatrixError;
use crate::engine::error::EngineError;
use crate::engine::model::MolecularModel;
use std::collections::HashMap;
use tracing::trace;

/// Replaces every attractor with a final atom.
///
/// Used attractors become inert dummies in place; unused ones become capping
/// hydrogens `cap_bond_length` away from their source atom along the existing
/// bond. The Cartesian atoms and the Z-matrix are updated together.
pub fn saturate(
    model: &mut MolecularModel,
    attractors: &[RingClosingAttractor],
    cap_bond_length: f64,
    atom_types: &HashMap<String, u32>,
) -> Result<(), EngineError> {
    for rca in attractors {
        let symbol = if rca.used {
            DUMMY_ELEMENT
        } else {
            CAPPING_ELEMENT
        };
        let atom_type = atom_types
            .get(symbol)
            .copied()
            .or_else(|| elements::default_tinker_type(symbol))
            .ok_or_else(|| ZMatrixError::UnknownAtomType {
                atom: rca.atom,
                symbol: symbol.to_string(),
            })?;

        let structure = &mut model.assembled.structure;
        let source = structure
            .atom(rca.source_atom)
            .map(|a| a.position)
            .ok_or_else(|| EngineError::Internal(format!("attractor source {} missing", rca.source_atom)))?;
        let atom = structure
            .atom_mut(rca.atom)
            .ok_or_else(|| EngineError::Internal(format!("attractor atom {} missing", rca.atom)))?;

        let mut replacement = atom.substituted(symbol);
        if !rca.used {
            if let Some(direction) = (atom.position - source).try_normalize(f64::EPSILON) {
                replacement.position = source + direction * cap_bond_length;
            }
        }
        *atom = replacement;

        model.zmatrix.set_identity(rca.atom, symbol, atom_type)?;
        if !rca.used {
            if let Some(z) = model.zmatrix.atoms.get_mut(rca.atom) {
                if z.bond_ref == Some(rca.source_atom) {
                    z.bond_length = cap_bond_length;
                }
            }
        }
        trace!(atom = rca.atom, symbol, "Saturated ring-closing attractor.");
    }
    Ok(())
}
