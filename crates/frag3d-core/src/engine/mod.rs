//! # Engine Module
//!
//! This module turns building-block graphs into three-dimensional molecular models
//! and resolves the rings those graphs declare.
//!
//! ## Overview
//!
//! A build starts from a tree-shaped [`Graph`](crate::core::graph::graph::Graph).
//! The [`builder`] walks the tree from its root, copying each vertex's building
//! block out of the library and roto-translating it onto its parent's attachment
//! point. The resulting [`assembly::AssembledStructure`] remembers which atoms,
//! bonds and attachment points came from which vertex and edge.
//!
//! The assembled atoms are then renumbered for internal coordinates ([`reorder`])
//! and paired with a Z-matrix ([`model`]). Rings are closed by the
//! [`ring_closure`] evaluator, which delegates conformational search to an external
//! program and keeps every candidate it could evaluate, ranked best first.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Builder, ring-closure and Tinker settings with validating builders
//! - **Assembly** ([`builder`], [`assembly`]) - Tree-to-3D construction and provenance bookkeeping
//! - **Internal Coordinates** ([`reorder`], [`model`]) - Atom ordering, rotatable bonds, Z-matrix twin
//! - **Ring Closure** ([`ring_closure`]) - Attractor pairing, search, closability, saturation, ranking
//! - **Progress Monitoring** ([`progress`]) - Progress reporting and user feedback mechanisms
//! - **Error Handling** ([`error`]) - Engine-specific error types and error propagation
//!
//! Candidate ring-closure combinations are evaluated in parallel when the
//! `parallel` feature is enabled; each worker owns a deep copy of the model.

pub mod assembly;
pub mod builder;
pub mod config;
pub mod error;
pub mod model;
pub mod progress;
pub mod reorder;
pub mod ring_closure;
