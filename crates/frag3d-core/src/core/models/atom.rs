use super::ids::VertexId;
use crate::core::utils::elements;
use nalgebra::Point3;
use std::fmt;
use std::str::FromStr;

/// Flavour of a ring-closing attractor pseudo-atom.
///
/// Attractors of opposite polarity (`Plus`/`Minus`) pair with each other, while
/// `Neutral` attractors only pair with other neutral ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttractorKind {
    /// Pseudo-element `ATP`.
    Plus,
    /// Pseudo-element `ATM`.
    Minus,
    /// Pseudo-element `ATN`.
    Neutral,
}

impl AttractorKind {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Plus => "ATP",
            Self::Minus => "ATM",
            Self::Neutral => "ATN",
        }
    }

    pub fn is_compatible_with(self, other: AttractorKind) -> bool {
        matches!(
            (self, other),
            (Self::Plus, Self::Minus) | (Self::Minus, Self::Plus) | (Self::Neutral, Self::Neutral)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAttractorKindError(pub String);

impl fmt::Display for ParseAttractorKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a ring-closing attractor symbol", self.0)
    }
}

impl std::error::Error for ParseAttractorKindError {}

impl FromStr for AttractorKind {
    type Err = ParseAttractorKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ATP" => Ok(Self::Plus),
            "ATM" => Ok(Self::Minus),
            "ATN" => Ok(Self::Neutral),
            _ => Err(ParseAttractorKindError(s.to_string())),
        }
    }
}

impl fmt::Display for AttractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// An atom of a building block or of an assembled structure.
///
/// Elements are kept as symbols because assembled structures routinely carry
/// pseudo-elements (ring-closing attractors, dummy atoms) that are not part of
/// the periodic table.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Element or pseudo-element symbol (e.g. "C", "ATP", "Du").
    pub element: String,
    /// Cartesian coordinates in Angstroms.
    pub position: Point3<f64>,
    /// Formal charge in elementary charge units.
    pub formal_charge: i8,
    /// Implicit hydrogen count, `None` when not perceived.
    pub implicit_hydrogens: Option<u8>,
    /// The vertex this atom was contributed by, if any.
    pub vertex_id: Option<VertexId>,
}

impl Atom {
    pub fn new(element: &str, position: Point3<f64>) -> Self {
        Self {
            element: element.to_string(),
            position,
            formal_charge: 0,
            implicit_hydrogens: None,
            vertex_id: None,
        }
    }

    pub fn with_vertex(mut self, vertex_id: VertexId) -> Self {
        self.vertex_id = Some(vertex_id);
        self
    }

    pub fn attractor_kind(&self) -> Option<AttractorKind> {
        self.element.parse().ok()
    }

    pub fn is_dummy(&self) -> bool {
        elements::is_dummy_element(&self.element)
    }

    /// Pseudo-atoms never take part in steric scoring or chemistry perception.
    pub fn is_pseudo(&self) -> bool {
        self.is_dummy() || self.attractor_kind().is_some()
    }

    /// Returns a copy of this atom carrying a different element.
    ///
    /// Position, origin vertex and formal charge are preserved; the implicit hydrogen
    /// count is element-specific and therefore dropped.
    pub fn substituted(&self, element: &str) -> Self {
        Self {
            element: element.to_string(),
            implicit_hydrogens: None,
            ..self.clone()
        }
    }
}
