use crate::core::graph::attachment::ApClass;
use crate::core::models::atom::Atom;
use crate::core::models::ids::VertexId;
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondType;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// The collection a building block is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Scaffold,
    Fragment,
    CappingGroup,
}

impl BlockKind {
    pub fn code(self) -> char {
        match self {
            Self::Scaffold => 'S',
            Self::Fragment => 'F',
            Self::CappingGroup => 'C',
        }
    }
}

/// Library coordinates of a building block: which collection, which position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockRef {
    pub kind: BlockKind,
    pub index: usize,
}

impl BlockRef {
    pub fn new(kind: BlockKind, index: usize) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BlockAtom {
    pub element: String,
    pub position: [f64; 3],
    #[serde(default)]
    pub charge: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BlockBond {
    pub atoms: [usize; 2],
    #[serde(default)]
    pub order: BondType,
}

/// Attachment point as declared by a building block, in the block's own frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ApTemplate {
    /// Local index of the source atom.
    pub atom: usize,
    /// Endpoint of the direction vector starting at the source atom.
    pub end_point: [f64; 3],
    #[serde(default)]
    pub class: Option<ApClass>,
}

/// Read-only template of a scaffold, fragment or capping group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuildingBlock {
    pub name: String,
    #[serde(default = "default_contains_atoms")]
    pub contains_atoms: bool,
    #[serde(default)]
    pub atoms: Vec<BlockAtom>,
    #[serde(default)]
    pub bonds: Vec<BlockBond>,
    #[serde(default)]
    pub attachment_points: Vec<ApTemplate>,
}

fn default_contains_atoms() -> bool {
    true
}

impl BuildingBlock {
    /// Materialises a fresh copy of the block's atoms and bonds, tagged with `vertex_id`.
    pub fn to_structure(&self, vertex_id: VertexId) -> Structure {
        let mut structure = Structure::new();
        for atom in &self.atoms {
            let mut new_atom =
                Atom::new(&atom.element, Point3::from(atom.position)).with_vertex(vertex_id);
            new_atom.formal_charge = atom.charge;
            structure.add_atom(new_atom);
        }
        for bond in &self.bonds {
            structure.add_bond(bond.atoms[0], bond.atoms[1], bond.order);
        }
        structure
    }

    fn validate(&self, block: BlockRef) -> Result<(), LibraryError> {
        let malformed = |reason: String| LibraryError::Malformed {
            block,
            name: self.name.clone(),
            reason,
        };

        if self.contains_atoms && self.atoms.is_empty() {
            return Err(malformed(
                "declares that it contains atoms but supplies none".to_string(),
            ));
        }
        if !self.contains_atoms && !self.atoms.is_empty() {
            return Err(malformed(format!(
                "declares no atoms but supplies {}",
                self.atoms.len()
            )));
        }
        for bond in &self.bonds {
            if bond.atoms.iter().any(|&i| i >= self.atoms.len()) || bond.atoms[0] == bond.atoms[1]
            {
                return Err(malformed(format!(
                    "bond {:?} references invalid atoms",
                    bond.atoms
                )));
            }
        }
        if self.contains_atoms {
            for (i, ap) in self.attachment_points.iter().enumerate() {
                if ap.atom >= self.atoms.len() {
                    return Err(malformed(format!(
                        "attachment point {} references atom {} out of {}",
                        i,
                        ap.atom,
                        self.atoms.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Building block {0} does not exist in the library")]
    UnknownBlock(BlockRef),
    #[error("Malformed building block {block} ('{name}'): {reason}")]
    Malformed {
        block: BlockRef,
        name: String,
        reason: String,
    },
}

/// Anything able to hand out building blocks by library coordinates.
///
/// Lookups never mutate the provider; callers clone before transforming.
pub trait BuildingBlockProvider {
    fn block(&self, block: BlockRef) -> Result<&BuildingBlock, LibraryError>;
}

/// Immutable library of scaffolds, fragments and capping groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FragmentLibrary {
    #[serde(default)]
    scaffolds: Vec<BuildingBlock>,
    #[serde(default)]
    fragments: Vec<BuildingBlock>,
    #[serde(default)]
    capping_groups: Vec<BuildingBlock>,
}

impl FragmentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let content = std::fs::read_to_string(path).map_err(|e| LibraryError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| LibraryError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Appends a block and returns its coordinates.
    pub fn add(&mut self, kind: BlockKind, block: BuildingBlock) -> BlockRef {
        let collection = self.collection_mut(kind);
        collection.push(block);
        BlockRef::new(kind, collection.len() - 1)
    }

    pub fn len(&self, kind: BlockKind) -> usize {
        self.collection(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.scaffolds.is_empty() && self.fragments.is_empty() && self.capping_groups.is_empty()
    }

    fn collection(&self, kind: BlockKind) -> &Vec<BuildingBlock> {
        match kind {
            BlockKind::Scaffold => &self.scaffolds,
            BlockKind::Fragment => &self.fragments,
            BlockKind::CappingGroup => &self.capping_groups,
        }
    }

    fn collection_mut(&mut self, kind: BlockKind) -> &mut Vec<BuildingBlock> {
        match kind {
            BlockKind::Scaffold => &mut self.scaffolds,
            BlockKind::Fragment => &mut self.fragments,
            BlockKind::CappingGroup => &mut self.capping_groups,
        }
    }
}

impl BuildingBlockProvider for FragmentLibrary {
    fn block(&self, block: BlockRef) -> Result<&BuildingBlock, LibraryError> {
        let found = self
            .collection(block.kind)
            .get(block.index)
            .ok_or(LibraryError::UnknownBlock(block))?;
        found.validate(block)?;
        Ok(found)
    }
}
