use super::{ZAtom, ZMatrix, ZMatrixError};
use crate::core::models::structure::Structure;
use crate::core::utils::elements;
use crate::core::utils::geometry::{any_normal, bond_angle, dihedral, is_finite_point};
use nalgebra::{Point3, Vector3};
use std::collections::{HashMap, HashSet};

/// Reference triples whose cosine magnitude is this close to one are collinear.
const LINEAR_TOLERANCE: f64 = 1e-4;
const EPSILON: f64 = 1e-8;

impl ZMatrix {
    /// Forward kinematics: computes Cartesian coordinates for every atom.
    ///
    /// The first atom sits at the origin, the second on the +z axis from its bond
    /// reference and the third in the xz-plane. Every later atom is placed from its
    /// three references, which must precede it.
    pub fn to_cartesian(&self) -> Result<Vec<Point3<f64>>, ZMatrixError> {
        self.validate()?;

        let mut coords: Vec<Point3<f64>> = Vec::with_capacity(self.len());
        for (i, atom) in self.atoms.iter().enumerate() {
            let position = match i {
                0 => Point3::origin(),
                1 => {
                    let a = coords[reference(i, atom.bond_ref, "bond")?];
                    a + Vector3::z() * atom.bond_length
                }
                2 if atom.torsion_ref.is_none() => {
                    let a = coords[reference(i, atom.bond_ref, "bond")?];
                    let b = coords[reference(i, atom.angle_ref, "angle")?];
                    place_in_plane(&a, &b, atom)
                }
                _ => {
                    let a = coords[reference(i, atom.bond_ref, "bond")?];
                    let b = coords[reference(i, atom.angle_ref, "angle")?];
                    let c = coords[reference(i, atom.torsion_ref, "torsion")?];
                    if atom.is_improper() {
                        place_improper(&a, &b, &c, atom)
                    } else {
                        place_proper(&a, &b, &c, atom)
                            .ok_or(ZMatrixError::LinearReference { atom: i })?
                    }
                }
            };
            if !is_finite_point(&position) {
                return Err(ZMatrixError::NonFinite { atom: i });
            }
            coords.push(position);
        }
        Ok(coords)
    }

    /// Computes internal coordinates for a structure whose atoms are already in a
    /// usable order.
    ///
    /// References prefer bonded earlier atoms. When an atom has no bonded partner
    /// suitable for a proper dihedral, an improper (second bond angle) reference on
    /// the same centre is used. Atoms opening a new connected component are chained
    /// to the nearest earlier atom, and that link is listed in `broken_bonds`.
    pub fn from_structure(
        structure: &Structure,
        atom_types: &HashMap<String, u32>,
    ) -> Result<Self, ZMatrixError> {
        let positions = structure.positions();
        let mut atoms = Vec::with_capacity(positions.len());
        let mut chain_links = HashSet::new();
        let mut broken_bonds = Vec::new();

        for (i, atom) in structure.atoms().iter().enumerate() {
            let atom_type = atom_types
                .get(&atom.element)
                .copied()
                .or_else(|| elements::default_tinker_type(&atom.element))
                .ok_or_else(|| ZMatrixError::UnknownAtomType {
                    atom: i,
                    symbol: atom.element.clone(),
                })?;
            let mut z = ZAtom {
                symbol: atom.element.clone(),
                atom_type,
                bond_ref: None,
                angle_ref: None,
                torsion_ref: None,
                bond_length: 0.0,
                angle: 0.0,
                torsion: 0.0,
                chirality: 0,
            };
            let p = positions[i];

            if i >= 1 {
                let a = choose_bond_ref(structure, &positions, i);
                z.bond_ref = Some(a);
                z.bond_length = (p - positions[a]).norm();
                chain_links.insert(ordered(a, i));
                if structure.bond_between(a, i).is_none() {
                    broken_bonds.push((a, i));
                }

                if i >= 2 {
                    let b = choose_angle_ref(structure, &positions, i, a)
                        .ok_or(ZMatrixError::LinearReference { atom: i })?;
                    z.angle_ref = Some(b);
                    z.angle = bond_angle(&p, &positions[a], &positions[b]).to_degrees();

                    if i >= 3 {
                        let (c, improper) = choose_torsion_ref(structure, &positions, i, a, b)
                            .ok_or(ZMatrixError::LinearReference { atom: i })?;
                        z.torsion_ref = Some(c);
                        let (pa, pb, pc) = (positions[a], positions[b], positions[c]);
                        if improper {
                            z.torsion = bond_angle(&p, &pa, &pc).to_degrees();
                            let t = (pa - pc).normalize().cross(&(pb - pa).normalize());
                            z.chirality = if (p - pa).dot(&t) < 0.0 { -1 } else { 1 };
                        } else {
                            z.torsion = dihedral(&p, &pa, &pb, &pc).to_degrees();
                        }
                    }
                }
            }
            atoms.push(z);
        }

        let extra_bonds = structure
            .bonds()
            .iter()
            .map(|b| ordered(b.atom1, b.atom2))
            .filter(|pair| !chain_links.contains(pair))
            .collect();

        Ok(ZMatrix {
            title: String::new(),
            atoms,
            extra_bonds,
            broken_bonds,
        })
    }
}

fn reference(atom: usize, r: Option<usize>, which: &'static str) -> Result<usize, ZMatrixError> {
    r.ok_or(ZMatrixError::MissingReference { atom, which })
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

fn is_collinear(u: &Vector3<f64>, v: &Vector3<f64>) -> bool {
    let (nu, nv) = (u.norm(), v.norm());
    if nu < EPSILON || nv < EPSILON {
        return true;
    }
    (u.dot(v) / (nu * nv)).abs() > 1.0 - LINEAR_TOLERANCE
}

fn place_in_plane(a: &Point3<f64>, b: &Point3<f64>, atom: &ZAtom) -> Point3<f64> {
    let e = (b - a).normalize();
    let mut perp = Vector3::x() - e * e.x;
    if perp.norm() < 1e-6 {
        perp = Vector3::y() - e * e.y;
    }
    let perp = perp.normalize();
    let theta = atom.angle.to_radians();
    a + (e * theta.cos() + perp * theta.sin()) * atom.bond_length
}

fn place_proper(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    atom: &ZAtom,
) -> Option<Point3<f64>> {
    let ab = (a - b).normalize();
    let bc = (b - c).normalize();
    let cosine = ab.dot(&bc);
    if cosine.abs() > 1.0 - LINEAR_TOLERANCE {
        return None;
    }
    let sine = (1.0 - cosine * cosine).sqrt();
    let t = bc.cross(&ab) / sine;
    let u = t.cross(&ab);

    let (sin_a, cos_a) = atom.angle.to_radians().sin_cos();
    let (sin_t, cos_t) = atom.torsion.to_radians().sin_cos();
    Some(a + (u * sin_a * cos_t + t * sin_a * sin_t - ab * cos_a) * atom.bond_length)
}

/// Placement from two bond angles; degenerate references fall back to the
/// in-plane projection with no out-of-plane component.
fn place_improper(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, atom: &ZAtom) -> Point3<f64> {
    let ba = (b - a).normalize();
    let ac = (a - c).normalize();
    let t = ac.cross(&ba);
    let cosine = ba.dot(&ac);
    let sine2 = (1.0 - cosine * cosine).max(EPSILON);
    let (sin1, cos1) = atom.angle.to_radians().sin_cos();
    let cos2 = atom.torsion.to_radians().cos();

    let coef_ac = (-cos2 - cosine * cos1) / sine2;
    let coef_ba = (cos1 + cosine * cos2) / sine2;
    let coef_t = (1.0 + coef_ac * cos2 - coef_ba * cos1) / sine2;

    let direction = if coef_t > EPSILON {
        ac * coef_ac + ba * coef_ba + t * (f64::from(atom.chirality.signum()) * coef_t.sqrt())
    } else if coef_t < -EPSILON {
        let projected = ac * coef_ac + ba * coef_ba;
        let norm = projected.norm();
        if norm > EPSILON {
            projected / norm
        } else {
            // Fully collinear references: honour the first angle only.
            ba * cos1 + any_normal(&ba) * sin1
        }
    } else {
        ac * coef_ac + ba * coef_ba
    };
    a + direction * atom.bond_length
}

fn earlier_neighbors(structure: &Structure, atom: usize, before: usize) -> Vec<usize> {
    let mut n: Vec<usize> = structure
        .neighbors(atom)
        .iter()
        .copied()
        .filter(|&x| x < before)
        .collect();
    n.sort_unstable();
    n
}

fn earlier_by_distance(positions: &[Point3<f64>], from: usize, before: usize) -> Vec<usize> {
    let mut all: Vec<usize> = (0..before).collect();
    all.sort_by(|&x, &y| {
        let dx = (positions[x] - positions[from]).norm_squared();
        let dy = (positions[y] - positions[from]).norm_squared();
        dx.total_cmp(&dy).then(x.cmp(&y))
    });
    all
}

fn choose_bond_ref(structure: &Structure, positions: &[Point3<f64>], i: usize) -> usize {
    earlier_neighbors(structure, i, i)
        .first()
        .copied()
        .unwrap_or_else(|| earlier_by_distance(positions, i, i)[0])
}

fn choose_angle_ref(
    structure: &Structure,
    positions: &[Point3<f64>],
    i: usize,
    a: usize,
) -> Option<usize> {
    earlier_neighbors(structure, a, i)
        .into_iter()
        .chain(earlier_neighbors(structure, i, i))
        .chain(earlier_by_distance(positions, a, i))
        .find(|&b| b != a && (positions[b] - positions[a]).norm() > EPSILON)
}

fn choose_torsion_ref(
    structure: &Structure,
    positions: &[Point3<f64>],
    i: usize,
    a: usize,
    b: usize,
) -> Option<(usize, bool)> {
    let ab = positions[a] - positions[b];
    let proper_ok = |c: usize| c != a && c != b && !is_collinear(&ab, &(positions[b] - positions[c]));
    let ba = positions[b] - positions[a];
    let improper_ok =
        |c: usize| c != a && c != b && !is_collinear(&ba, &(positions[a] - positions[c]));

    if let Some(c) = earlier_neighbors(structure, b, i).into_iter().find(|&c| proper_ok(c)) {
        return Some((c, false));
    }
    if let Some(c) = earlier_neighbors(structure, a, i).into_iter().find(|&c| improper_ok(c)) {
        return Some((c, true));
    }
    earlier_by_distance(positions, a, i)
        .into_iter()
        .find(|&c| proper_ok(c))
        .map(|c| (c, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::topology::BondType;

    fn zatom(
        symbol: &str,
        refs: [Option<usize>; 3],
        values: [f64; 3],
        chirality: i8,
    ) -> ZAtom {
        ZAtom {
            symbol: symbol.into(),
            atom_type: elements::default_tinker_type(symbol).unwrap_or(0),
            bond_ref: refs[0],
            angle_ref: refs[1],
            torsion_ref: refs[2],
            bond_length: values[0],
            angle: values[1],
            torsion: values[2],
            chirality,
        }
    }

    fn structure_from(z: &ZMatrix, coords: &[Point3<f64>]) -> Structure {
        let mut s = Structure::new();
        for (atom, p) in z.atoms.iter().zip(coords) {
            s.add_atom(Atom::new(&atom.symbol, *p));
        }
        for (i, atom) in z.atoms.iter().enumerate() {
            if let Some(a) = atom.bond_ref {
                s.add_bond(a, i, BondType::Single);
            }
        }
        s
    }

    fn branched() -> ZMatrix {
        ZMatrix {
            title: "branched".into(),
            atoms: vec![
                zatom("C", [None, None, None], [0.0, 0.0, 0.0], 0),
                zatom("C", [Some(0), None, None], [1.53, 0.0, 0.0], 0),
                zatom("C", [Some(1), Some(0), None], [1.53, 111.0, 0.0], 0),
                zatom("O", [Some(2), Some(1), Some(0)], [1.43, 108.0, -63.0], 0),
                zatom("H", [Some(2), Some(1), Some(3)], [1.09, 109.5, 109.5], 1),
                zatom("H", [Some(2), Some(1), Some(3)], [1.09, 109.5, 109.5], -1),
                zatom("N", [Some(0), Some(1), Some(2)], [1.47, 110.0, 175.0], 0),
            ],
            ..ZMatrix::default()
        }
    }

    fn assert_points_eq(a: &[Point3<f64>], b: &[Point3<f64>], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (i, (p, q)) in a.iter().zip(b).enumerate() {
            assert!((p - q).norm() < tol, "atom {i}: {p:?} != {q:?}");
        }
    }

    #[test]
    fn first_atoms_use_canonical_frame() {
        let coords = branched().to_cartesian().unwrap();
        assert_eq!(coords[0], Point3::origin());
        assert!((coords[1] - Point3::new(0.0, 0.0, 1.53)).norm() < 1e-12);
        assert!(coords[2].y.abs() < 1e-12);
        assert!(coords[2].x > 0.0);
    }

    #[test]
    fn proper_dihedral_places_known_geometry() {
        let mut z = ZMatrix::default();
        z.atoms = vec![
            zatom("C", [None, None, None], [0.0; 3], 0),
            zatom("C", [Some(0), None, None], [1.0, 0.0, 0.0], 0),
            zatom("C", [Some(1), Some(0), None], [1.0, 90.0, 0.0], 0),
            zatom("C", [Some(2), Some(1), Some(0)], [1.0, 90.0, 0.0], 0),
        ];
        let coords = z.to_cartesian().unwrap();
        assert!((coords[2] - Point3::new(1.0, 0.0, 1.0)).norm() < 1e-12);
        assert!((coords[3] - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);

        z.atoms[3].torsion = 90.0;
        let coords = z.to_cartesian().unwrap();
        assert!((coords[3] - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn improper_placement_reproduces_both_angles_and_side() {
        let z = branched();
        let coords = z.to_cartesian().unwrap();
        for idx in [4, 5] {
            let a1 = bond_angle(&coords[idx], &coords[2], &coords[1]).to_degrees();
            let a2 = bond_angle(&coords[idx], &coords[2], &coords[3]).to_degrees();
            assert!((a1 - 109.5).abs() < 1e-6);
            assert!((a2 - 109.5).abs() < 1e-6);
            assert!(((coords[idx] - coords[2]).norm() - 1.09).abs() < 1e-9);
        }
        assert!((coords[4] - coords[5]).norm() > 1.0);
    }

    #[test]
    fn conversion_is_deterministic() {
        let z = branched();
        assert_eq!(z.to_cartesian().unwrap(), z.to_cartesian().unwrap());
    }

    #[test]
    fn cartesian_round_trip_reproduces_coordinates() {
        let z = branched();
        let coords = z.to_cartesian().unwrap();
        let structure = structure_from(&z, &coords);

        let measured = ZMatrix::from_structure(&structure, &HashMap::new()).unwrap();
        let rebuilt = measured.to_cartesian().unwrap();

        assert_points_eq(&coords, &rebuilt, 1e-6);
        assert!(measured.broken_bonds.is_empty());
        assert!(measured.extra_bonds.is_empty());
    }

    #[test]
    fn round_trip_preserves_internal_distances_of_arbitrary_frames() {
        let mut s = Structure::new();
        let pts = [
            Point3::new(3.0, -1.0, 2.0),
            Point3::new(4.2, -0.3, 2.5),
            Point3::new(4.9, 0.8, 1.7),
            Point3::new(6.3, 0.9, 2.1),
            Point3::new(4.0, 1.9, 1.2),
        ];
        for p in pts {
            s.add_atom(Atom::new("C", p));
        }
        for (x, y) in [(0, 1), (1, 2), (2, 3), (2, 4)] {
            s.add_bond(x, y, BondType::Single);
        }

        let z = ZMatrix::from_structure(&s, &HashMap::new()).unwrap();
        let rebuilt = z.to_cartesian().unwrap();
        for i in 0..pts.len() {
            for j in 0..pts.len() {
                let d0 = (pts[i] - pts[j]).norm();
                let d1 = (rebuilt[i] - rebuilt[j]).norm();
                assert!((d0 - d1).abs() < 1e-6, "pair {i}-{j}: {d0} vs {d1}");
            }
        }
    }

    #[test]
    fn ring_bonds_become_extra_bonds_and_gaps_broken_bonds() {
        let mut s = Structure::new();
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, 0.0, 0.0),
            Point3::new(1.5, 1.5, 0.0),
            Point3::new(0.0, 1.5, 0.2),
            Point3::new(8.0, 0.0, 0.0),
        ];
        for p in pts {
            s.add_atom(Atom::new("C", p));
        }
        for (x, y) in [(0, 1), (1, 2), (2, 3), (3, 0)] {
            s.add_bond(x, y, BondType::Single);
        }

        let z = ZMatrix::from_structure(&s, &HashMap::new()).unwrap();

        assert_eq!(z.atoms[3].bond_ref, Some(0));
        assert_eq!(z.extra_bonds, vec![(2, 3)]);
        assert_eq!(z.broken_bonds, vec![(z.atoms[4].bond_ref.unwrap(), 4)]);
        let rebuilt = z.to_cartesian().unwrap();
        assert!(((rebuilt[4] - rebuilt[1]).norm() - 6.5).abs() < 1e-6);
    }

    #[test]
    fn custom_atom_types_override_defaults() {
        let mut s = Structure::new();
        s.add_atom(Atom::new("C", Point3::origin()));
        s.add_atom(Atom::new("Zz", Point3::new(1.0, 0.0, 0.0)));
        assert!(matches!(
            ZMatrix::from_structure(&s, &HashMap::new()),
            Err(ZMatrixError::UnknownAtomType { atom: 1, .. })
        ));

        let types = HashMap::from([("Zz".to_string(), 77), ("C".to_string(), 2)]);
        let z = ZMatrix::from_structure(&s, &types).unwrap();
        assert_eq!(z.atoms[0].atom_type, 2);
        assert_eq!(z.atoms[1].atom_type, 77);
    }

    #[test]
    fn collinear_proper_reference_is_rejected() {
        let mut z = ZMatrix::default();
        z.atoms = vec![
            zatom("C", [None, None, None], [0.0; 3], 0),
            zatom("C", [Some(0), None, None], [1.0, 0.0, 0.0], 0),
            zatom("C", [Some(1), Some(0), None], [1.0, 180.0, 0.0], 0),
            zatom("C", [Some(2), Some(1), Some(0)], [1.0, 109.5, 60.0], 0),
        ];
        assert_eq!(
            z.to_cartesian(),
            Err(ZMatrixError::LinearReference { atom: 3 })
        );
    }

    #[test]
    fn degenerate_improper_falls_back_without_nan() {
        let mut z = ZMatrix::default();
        z.atoms = vec![
            zatom("C", [None, None, None], [0.0; 3], 0),
            zatom("C", [Some(0), None, None], [1.0, 0.0, 0.0], 0),
            zatom("C", [Some(1), Some(0), None], [1.0, 180.0, 0.0], 0),
            zatom("H", [Some(1), Some(0), Some(2)], [1.0, 30.0, 30.0], 1),
        ];
        let coords = z.to_cartesian().unwrap();
        assert!(is_finite_point(&coords[3]));
    }

    #[test]
    fn forward_references_are_rejected() {
        let mut z = branched();
        z.atoms[4].torsion_ref = Some(6);
        assert!(matches!(
            z.to_cartesian(),
            Err(ZMatrixError::ForwardReference {
                atom: 4,
                reference: 6
            })
        ));
    }
}
