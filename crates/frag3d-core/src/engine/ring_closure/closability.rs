use crate::core::models::structure::Structure;
use crate::engine::config::ClosabilityStrategy;
use nalgebra::{Point3, Vector3};

use super::rca::RingClosingAttractor;

/// Geometry of a prospective ring-closing bond: both source atoms and the
/// attractors hanging from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingClosure {
    pub head_source: Point3<f64>,
    pub head_attractor: Point3<f64>,
    pub tail_source: Point3<f64>,
    pub tail_attractor: Point3<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Closability {
    pub closable: bool,
    /// Deviation from the ideal closure; lower is better.
    pub quality: f64,
}

impl RingClosure {
    pub fn from_structure(
        structure: &Structure,
        head: &RingClosingAttractor,
        tail: &RingClosingAttractor,
    ) -> Option<Self> {
        let position = |i: usize| structure.atom(i).map(|a| a.position);
        Some(Self {
            head_source: position(head.source_atom)?,
            head_attractor: position(head.atom)?,
            tail_source: position(tail.source_atom)?,
            tail_attractor: position(tail.atom)?,
        })
    }

    pub fn head_vector(&self) -> Vector3<f64> {
        self.head_attractor - self.head_source
    }

    pub fn tail_vector(&self) -> Vector3<f64> {
        self.tail_attractor - self.tail_source
    }

    /// Cosine of the angle between the two attractor vectors; -1 when they face
    /// each other.
    fn alignment(&self) -> Option<f64> {
        let h = self.head_vector().try_normalize(f64::EPSILON)?;
        let t = self.tail_vector().try_normalize(f64::EPSILON)?;
        Some(h.dot(&t))
    }

    /// Judges whether the two sources may be bonded.
    ///
    /// `distance_tolerance` scales the attractor-vector lengths; the attractor
    /// vectors must be anti-parallel within `dot_tolerance`.
    pub fn evaluate(
        &self,
        strategy: ClosabilityStrategy,
        distance_tolerance: f64,
        dot_tolerance: f64,
    ) -> Closability {
        let Some(cos) = self.alignment() else {
            return Closability {
                closable: false,
                quality: f64::INFINITY,
            };
        };
        let facing = cos <= -(1.0 - dot_tolerance);
        let h = self.head_vector().norm();
        let t = self.tail_vector().norm();

        match strategy {
            ClosabilityStrategy::BondOverlap => {
                let d1 = (self.head_attractor - self.tail_source).norm();
                let d2 = (self.tail_attractor - self.head_source).norm();
                Closability {
                    closable: facing
                        && d1 <= distance_tolerance * h
                        && d2 <= distance_tolerance * t,
                    quality: 0.5 * (d1 + d2),
                }
            }
            ClosabilityStrategy::BondComplementarity => {
                let ideal = 0.5 * (h + t);
                let window = 0.5 * distance_tolerance * ideal;
                let sources = (self.head_source - self.tail_source).norm();
                let attractors = (self.head_attractor - self.tail_attractor).norm();
                let length_error = (sources - ideal).abs();
                let crossing_error = (attractors - sources).abs();
                Closability {
                    closable: facing && length_error <= window && crossing_error <= window,
                    quality: 0.5 * (length_error + crossing_error),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closure(tail_source: [f64; 3], tail_attractor: [f64; 3]) -> RingClosure {
        RingClosure {
            head_source: Point3::origin(),
            head_attractor: Point3::new(1.5, 0.0, 0.0),
            tail_source: Point3::from(tail_source),
            tail_attractor: Point3::from(tail_attractor),
        }
    }

    #[test]
    fn ideal_overlap_is_closable_with_zero_deviation() {
        let c = closure([1.5, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let result = c.evaluate(ClosabilityStrategy::BondOverlap, 1.0, 0.5);
        assert!(result.closable);
        assert!(result.quality.abs() < 1e-12);

        let legacy = c.evaluate(ClosabilityStrategy::BondComplementarity, 1.0, 0.5);
        assert!(legacy.closable);
        assert!(legacy.quality.abs() < 1e-12);
    }

    #[test]
    fn distant_sources_are_not_closable() {
        let c = closure([6.0, 0.0, 0.0], [4.5, 0.0, 0.0]);
        let result = c.evaluate(ClosabilityStrategy::BondOverlap, 1.0, 0.5);
        assert!(!result.closable);
        assert!((result.quality - 4.5).abs() < 1e-12);
    }

    #[test]
    fn parallel_attractors_are_not_closable() {
        // Close enough, but both attractors point the same way.
        let c = closure([1.2, 0.5, 0.0], [2.7, 0.5, 0.0]);
        assert!(!c.evaluate(ClosabilityStrategy::BondOverlap, 1.0, 0.5).closable);
    }

    #[test]
    fn tolerance_controls_the_distance_window() {
        let c = closure([2.4, 0.0, 0.0], [0.9, 0.0, 0.0]);
        assert!(c.evaluate(ClosabilityStrategy::BondOverlap, 1.0, 0.5).closable);
        assert!(!c.evaluate(ClosabilityStrategy::BondOverlap, 0.5, 0.5).closable);
    }

    #[test]
    fn degenerate_vectors_never_close() {
        let c = RingClosure {
            head_source: Point3::origin(),
            head_attractor: Point3::origin(),
            tail_source: Point3::new(1.0, 0.0, 0.0),
            tail_attractor: Point3::origin(),
        };
        let result = c.evaluate(ClosabilityStrategy::BondOverlap, 1.0, 0.5);
        assert!(!result.closable);
        assert!(result.quality.is_infinite());
    }
}
