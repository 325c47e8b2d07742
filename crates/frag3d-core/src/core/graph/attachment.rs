use crate::core::models::ids::VertexId;
use nalgebra::{Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Compatibility tag of an attachment point, e.g. `"amide:1"`.
///
/// The content is opaque to the assembly engine; it is carried through so that
/// callers can reason about chemical compatibility and so free APs can be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApClass(String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid attachment point class '{0}': must be non-empty and contain no whitespace")]
pub struct ParseApClassError(pub String);

impl ApClass {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ApClass {
    type Err = ParseApClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(ParseApClassError(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ApClass {
    type Error = ParseApClassError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ApClass> for String {
    fn from(value: ApClass) -> Self {
        value.0
    }
}

impl fmt::Display for ApClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directional handle on a building block marking where it can bond to another.
///
/// The source atom is addressed in two numbering spaces: `src_atom_local` indexes the
/// owning block's own atom list and never changes; `src_atom_global` indexes the
/// assembled structure and is only known once the owner has been placed.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentPoint {
    pub owner: VertexId,
    /// Position within the owner's ordered AP list.
    pub index: usize,
    /// `None` for APs of vertices without atoms.
    pub src_atom_local: Option<usize>,
    pub src_atom_global: Option<usize>,
    /// Endpoint of the AP vector, in the same frame as the source atom.
    pub end_point: Point3<f64>,
    pub class: Option<ApClass>,
    pub used: bool,
    pub ring_closing: bool,
}

impl AttachmentPoint {
    pub fn new(
        owner: VertexId,
        index: usize,
        src_atom_local: Option<usize>,
        end_point: Point3<f64>,
        class: Option<ApClass>,
    ) -> Self {
        Self {
            owner,
            index,
            src_atom_local,
            src_atom_global: None,
            end_point,
            class,
            used: false,
            ring_closing: false,
        }
    }

    /// The AP vector pointing from `source` (the source atom position) to the endpoint.
    pub fn vector_from(&self, source: &Point3<f64>) -> Vector3<f64> {
        self.end_point - source
    }

    pub fn translate(&mut self, shift: &Vector3<f64>) {
        self.end_point += shift;
    }

    pub fn rotate_about(&mut self, pivot: &Point3<f64>, rotation: &Rotation3<f64>) {
        self.end_point = crate::core::utils::geometry::rotate_about(&self.end_point, pivot, rotation);
    }

    /// Renders the AP as `atom#class:x,y,z` with a 1-based global atom index.
    pub fn to_free_ap_string(&self) -> Option<String> {
        let atom = self.src_atom_global?;
        Some(format!(
            "{}#{}:{:.4},{:.4},{:.4}",
            atom + 1,
            self.class.as_ref().map_or("", ApClass::as_str),
            self.end_point.x,
            self.end_point.y,
            self.end_point.z
        ))
    }
}
