//! # Core Module
//!
//! Stateless building blocks of the assembly engine: data models, geometry, the
//! building-block graph and library, internal coordinates and file formats.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds and flat structures
//! - **Building-Block Graph** ([`graph`]) - Vertices, attachment points, edges and rings
//! - **Building-Block Library** ([`library`]) - Immutable scaffolds, fragments and capping groups
//! - **Internal Coordinates** ([`zmatrix`]) - Z-matrix model and Cartesian conversion
//! - **File I/O** ([`io`]) - SD files and Tinker exchange files
//! - **Utilities** ([`utils`]) - Geometry helpers and element tables

pub mod graph;
pub mod io;
pub mod library;
pub mod models;
pub mod utils;
pub mod zmatrix;
