//! # Internal Coordinates
//!
//! Z-matrix representation of molecular geometry as exchanged with the external
//! conformational search, together with the forward (internal → Cartesian) and
//! inverse (Cartesian → internal) conversions.
//!
//! ## Conventions
//!
//! - Atom and reference indices are 0-based; Tinker files are 1-based on disk.
//! - Angles are stored in degrees.
//! - `chirality == 0` means the third value is a proper dihedral about the
//!   bond-ref/angle-ref axis; `±1` means it is a second bond angle (to the torsion
//!   reference) and the sign selects the side of the plane.

mod convert;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ZMatrixError {
    #[error("Atom {atom} references atom {reference}, which is not placed before it")]
    ForwardReference { atom: usize, reference: usize },
    #[error("Atom {atom} is missing its {which} reference")]
    MissingReference { atom: usize, which: &'static str },
    #[error("Atom {atom} uses the same atom for more than one reference")]
    RepeatedReference { atom: usize },
    #[error("Reference atoms of atom {atom} are collinear")]
    LinearReference { atom: usize },
    #[error("Non-finite coordinates computed for atom {atom}")]
    NonFinite { atom: usize },
    #[error("No Tinker atom type known for atom {atom} ('{symbol}')")]
    UnknownAtomType { atom: usize, symbol: String },
    #[error("Atom count mismatch: expected {expected}, found {found}")]
    AtomCountMismatch { expected: usize, found: usize },
    #[error("Atom {0} does not exist")]
    NoSuchAtom(usize),
}

/// One line of a Z-matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ZAtom {
    pub symbol: String,
    pub atom_type: u32,
    pub bond_ref: Option<usize>,
    pub angle_ref: Option<usize>,
    pub torsion_ref: Option<usize>,
    pub bond_length: f64,
    pub angle: f64,
    pub torsion: f64,
    pub chirality: i8,
}

impl ZAtom {
    pub fn is_improper(&self) -> bool {
        self.chirality != 0
    }

    fn references(&self) -> impl Iterator<Item = usize> {
        [self.bond_ref, self.angle_ref, self.torsion_ref]
            .into_iter()
            .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZMatrix {
    pub title: String,
    pub atoms: Vec<ZAtom>,
    /// Bonds not implied by the `bond_ref` chain (ring and inter-component bonds).
    pub extra_bonds: Vec<(usize, usize)>,
    /// Chain links that are not chemical bonds.
    pub broken_bonds: Vec<(usize, usize)>,
}

impl ZMatrix {
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atom(&self, index: usize) -> Option<&ZAtom> {
        self.atoms.get(index)
    }

    /// Changes the element of an atom together with its force-field type.
    pub fn set_identity(
        &mut self,
        index: usize,
        symbol: &str,
        atom_type: u32,
    ) -> Result<(), ZMatrixError> {
        let atom = self
            .atoms
            .get_mut(index)
            .ok_or(ZMatrixError::NoSuchAtom(index))?;
        atom.symbol = symbol.to_string();
        atom.atom_type = atom_type;
        Ok(())
    }

    /// Copies bond lengths, angles, torsions and chiralities from `other`.
    ///
    /// Symbols, atom types and connectivity of `self` are kept; `other` must
    /// describe the same atom sequence.
    pub fn absorb_geometry(&mut self, other: &ZMatrix) -> Result<(), ZMatrixError> {
        if other.len() != self.len() {
            return Err(ZMatrixError::AtomCountMismatch {
                expected: self.len(),
                found: other.len(),
            });
        }
        for (mine, theirs) in self.atoms.iter_mut().zip(&other.atoms) {
            mine.bond_ref = theirs.bond_ref;
            mine.angle_ref = theirs.angle_ref;
            mine.torsion_ref = theirs.torsion_ref;
            mine.bond_length = theirs.bond_length;
            mine.angle = theirs.angle;
            mine.torsion = theirs.torsion;
            mine.chirality = theirs.chirality;
        }
        Ok(())
    }

    /// Checks that every reference points to an earlier, distinct atom.
    pub fn validate(&self) -> Result<(), ZMatrixError> {
        for (i, atom) in self.atoms.iter().enumerate() {
            let needed = [
                (1, atom.bond_ref, "bond"),
                (2, atom.angle_ref, "angle"),
                (3, atom.torsion_ref, "torsion"),
            ];
            for (from, reference, which) in needed {
                if i >= from && reference.is_none() {
                    return Err(ZMatrixError::MissingReference { atom: i, which });
                }
            }
            let refs: Vec<usize> = atom.references().collect();
            if let Some(&bad) = refs.iter().find(|&&r| r >= i) {
                return Err(ZMatrixError::ForwardReference {
                    atom: i,
                    reference: bad,
                });
            }
            for (k, r) in refs.iter().enumerate() {
                if refs[k + 1..].contains(r) {
                    return Err(ZMatrixError::RepeatedReference { atom: i });
                }
            }
        }
        Ok(())
    }
}
