use super::rca::AttractorPair;
use crate::core::io::sdf::{PROP_RING_CLOSURES, SdfMetadata};
use crate::core::models::structure::Structure;
use crate::engine::model::MolecularModel;
use std::cmp::Ordering;

/// Relative difference below which two closure qualities are considered equal.
pub const QUALITY_TIE_TOLERANCE: f64 = 0.05;

/// Atom pairs at most this many bonds apart are ignored by [`separation_score`].
const MIN_SEPARATION_BONDS: usize = 3;

/// One evaluated ring-closure combination.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub model: MolecularModel,
    /// The attractor pairs this combination tried to close.
    pub pairs: Vec<AttractorPair>,
    pub requested: usize,
    pub closed: usize,
    /// Mean deviation of the closed rings from ideal geometry; infinite when
    /// nothing was closed.
    pub quality: f64,
    pub separation: f64,
}

impl Candidate {
    pub fn is_complete(&self) -> bool {
        self.closed == self.requested
    }

    pub fn sdf_metadata(&self, title: &str) -> SdfMetadata {
        self.model
            .assembled
            .sdf_metadata(title)
            .with_property(
                PROP_RING_CLOSURES,
                format!("{}/{}", self.closed, self.requested),
            )
    }
}

/// Non-bonded separation score of a structure; higher means fewer clashes.
///
/// Sums `-1/d^6` over real-atom pairs more than three bonds apart.
pub fn separation_score(structure: &Structure) -> f64 {
    let atoms = structure.atoms();
    let mut score = 0.0;
    for i in 0..atoms.len() {
        if atoms[i].is_pseudo() {
            continue;
        }
        let near = structure.atoms_within_bonds(i, MIN_SEPARATION_BONDS);
        for j in (i + 1)..atoms.len() {
            if atoms[j].is_pseudo() || near.contains(&j) {
                continue;
            }
            let d2 = (atoms[i].position - atoms[j].position).norm_squared();
            if d2 > 0.0 {
                score -= 1.0 / (d2 * d2 * d2);
            } else {
                return f64::NEG_INFINITY;
            }
        }
    }
    score
}

fn compare_quality(a: f64, b: f64) -> Ordering {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => {
            let scale = a.abs().max(b.abs());
            if (a - b).abs() <= QUALITY_TIE_TOLERANCE * scale {
                Ordering::Equal
            } else {
                a.total_cmp(&b)
            }
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// Orders candidates best first: more closed rings, then lower quality
/// deviation (5% relative tie), then larger separation.
pub fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    b.closed
        .cmp(&a.closed)
        .then_with(|| compare_quality(a.quality, b.quality))
        .then_with(|| b.separation.total_cmp(&a.separation))
}

/// Sorts candidates best first.
///
/// The quality tie makes [`compare`] non-transitive, so candidates are ranked by
/// repeatedly taking the best of the remainder; the earlier candidate wins ties.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut ranked = Vec::with_capacity(candidates.len());
    while !candidates.is_empty() {
        let mut best = 0;
        for i in 1..candidates.len() {
            if compare(&candidates[i], &candidates[best]) == Ordering::Less {
                best = i;
            }
        }
        ranked.push(candidates.remove(best));
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::topology::BondType;
    use crate::core::zmatrix::ZMatrix;
    use crate::engine::assembly::{AssembledStructure, StructureMetadata};
    use nalgebra::Point3;
    use slotmap::SlotMap;

    fn candidate(tag: u64, closed: usize, quality: f64, separation: f64) -> Candidate {
        let metadata = StructureMetadata {
            graph_id: tag,
            ..StructureMetadata::default()
        };
        Candidate {
            model: MolecularModel {
                assembled: AssembledStructure::new(SlotMap::with_key(), metadata),
                zmatrix: ZMatrix::default(),
                rotatable_bonds: Vec::new(),
            },
            pairs: Vec::new(),
            requested: 2,
            closed,
            quality,
            separation,
        }
    }

    fn tags(ranked: &[Candidate]) -> Vec<u64> {
        ranked.iter().map(|c| c.model.assembled.metadata.graph_id).collect()
    }

    #[test]
    fn more_closed_rings_always_win() {
        let ranked = rank(vec![
            candidate(1, 1, 0.01, 0.0),
            candidate(2, 2, 0.9, -5.0),
        ]);
        assert_eq!(tags(&ranked), vec![2, 1]);
    }

    #[test]
    fn lower_quality_deviation_wins() {
        let ranked = rank(vec![
            candidate(1, 2, 0.50, 0.0),
            candidate(2, 2, 0.10, -1.0),
        ]);
        assert_eq!(tags(&ranked), vec![2, 1]);
    }

    #[test]
    fn near_equal_quality_falls_back_to_separation() {
        let ranked = rank(vec![
            candidate(1, 2, 0.100, -2.0),
            candidate(2, 2, 0.103, -0.5),
        ]);
        assert_eq!(tags(&ranked), vec![2, 1]);
    }

    #[test]
    fn unclosed_candidates_rank_by_separation() {
        let ranked = rank(vec![
            candidate(1, 0, f64::INFINITY, -3.0),
            candidate(2, 0, f64::INFINITY, -1.0),
            candidate(3, 1, 0.2, -9.0),
        ]);
        assert_eq!(tags(&ranked), vec![3, 2, 1]);
    }

    #[test]
    fn full_ties_keep_input_order() {
        let ranked = rank(vec![candidate(1, 1, 0.2, -1.0), candidate(2, 1, 0.2, -1.0)]);
        assert_eq!(tags(&ranked), vec![1, 2]);
        assert_eq!(
            compare(&ranked[0], &ranked[1]),
            Ordering::Equal
        );
    }

    #[test]
    fn metadata_reports_ring_closures() {
        let c = candidate(4, 1, 0.2, -1.0);
        assert!(!c.is_complete());
        let meta = c.sdf_metadata("mol");
        assert_eq!(meta.get(PROP_RING_CLOSURES), Some("1/2"));
    }

    #[test]
    fn separation_ignores_close_neighbours_and_pseudo_atoms() {
        let mut s = Structure::new();
        for (i, element) in ["C", "C", "C", "C", "C"].iter().enumerate() {
            s.add_atom(Atom::new(element, Point3::new(i as f64 * 1.5, 0.0, 0.0)));
        }
        for i in 0..4 {
            s.add_bond(i, i + 1, BondType::Single);
        }
        // Only 0..4 are more than three bonds apart.
        let expected = -1.0 / 6.0f64.powi(6);
        assert!((separation_score(&s) - expected).abs() < 1e-15);

        s.add_atom(Atom::new("Du", Point3::new(0.0, 0.5, 0.0)));
        assert!((separation_score(&s) - expected).abs() < 1e-15);
    }

    #[test]
    fn clashing_atoms_lower_the_score() {
        let mut far = Structure::new();
        far.add_atom(Atom::new("C", Point3::origin()));
        far.add_atom(Atom::new("C", Point3::new(4.0, 0.0, 0.0)));
        let mut near = Structure::new();
        near.add_atom(Atom::new("C", Point3::origin()));
        near.add_atom(Atom::new("C", Point3::new(1.0, 0.0, 0.0)));
        assert!(separation_score(&far) > separation_score(&near));
    }
}
