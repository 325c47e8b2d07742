//! # Building-Block Graph
//!
//! Abstract molecular graphs whose vertices are building blocks and whose edges pair
//! one attachment point on a parent vertex with one on a child vertex.
//!
//! ## Key Components
//!
//! - [`attachment`] - Attachment points and their class tags
//! - [`vertex`] - Vertices and the building-block / empty vertex kinds
//! - [`edge`] - Tree edges and ring-closing chords
//! - [`graph`] - The graph itself, its tree invariants and its encodings

pub mod attachment;
pub mod edge;
#[allow(clippy::module_inception)]
pub mod graph;
pub mod vertex;
