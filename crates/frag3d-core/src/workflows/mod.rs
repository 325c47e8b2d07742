//! # Workflows Module
//!
//! High-level entry points that run a complete build from a building-block graph
//! to ranked 3D candidates.
//!
//! ## Overview
//!
//! Workflows tie the [`engine`](crate::engine) components together: tree assembly,
//! internal-coordinate preparation, ring closure and ranking. They take care of
//! phase reporting and hand back results that are ready to be written out.
//!
//! ## Architecture
//!
//! - **Build Workflow** ([`build`]) - Assembles a graph into a molecular model and
//!   closes its rings, optionally through an external Tinker search.

pub mod build;
