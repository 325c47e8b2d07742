//! # frag3d Core Library
//!
//! Three-dimensional model building for combinatorial molecular design: building-block
//! graphs are assembled into molecules, converted to internal coordinates and
//! their rings closed with the help of an external conformational search.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture so that each concern can be
//! tested on its own.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `Graph`,
//!   `FragmentLibrary`), geometry helpers, Z-matrix conversion and file formats.
//!
//! - **[`engine`]: The Logic Core.** The tree builder that roto-translates building
//!   blocks onto their parents, atom reordering, rotatable-bond perception, and the
//!   ring-closure evaluator with its saturation and ranking steps.
//!
//! - **[`workflows`]: The Public API.** Complete procedures such as
//!   [`workflows::build::run`], which turns a graph into ranked 3D candidates.

pub mod core;
pub mod engine;
pub mod workflows;
