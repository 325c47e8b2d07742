//! # Core Models Module
//!
//! Fundamental data structures for atomic structures handled by the assembly engine.
//!
//! ## Key Components
//!
//! - [`atom`] - Atoms, including ring-closing attractor and dummy pseudo-atoms
//! - [`topology`] - Bonds and bond types
//! - [`structure`] - Flat ordered atom/bond collections with stable indices
//! - [`ids`] - Identifier types for vertices and attachment points
//!
//! ## Usage
//!
//! ```ignore
//! use frag3d::core::models::{atom::Atom, structure::Structure, topology::BondType};
//!
//! let mut structure = Structure::new();
//! let c = structure.add_atom(Atom::new("C", Point3::new(0.0, 0.0, 0.0)));
//! let o = structure.add_atom(Atom::new("O", Point3::new(1.2, 0.0, 0.0)));
//! structure.add_bond(c, o, BondType::Double);
//! ```

pub mod atom;
pub mod ids;
pub mod structure;
pub mod topology;
