//! Provides input/output functionality for molecular file formats.
//!
//! Assembled structures are persisted as SD files carrying side-channel data
//! items (graph encodings, free attachment points, per-atom vertex tags), and
//! internal coordinates are exchanged with the external conformational search
//! through Tinker files.

pub mod sdf;
pub mod tinker;
pub mod traits;
