use nalgebra::{Point3, Rotation3, Unit, Vector3};
use rand::Rng;

/// Angles (radians) below this value, or this close to pi, are treated as degenerate.
pub const ANGLE_THRESHOLD: f64 = 1e-5;

/// Rotation taking the direction of `from` onto the direction of `to`.
///
/// Returns `None` when no rotation is needed: the vectors are already aligned
/// within [`ANGLE_THRESHOLD`] or one of them has zero length. Anti-parallel
/// vectors have no defined cross product, so the half-turn is taken about an
/// arbitrary axis normal to `to`.
pub fn rotation_to_align(from: &Vector3<f64>, to: &Vector3<f64>) -> Option<Rotation3<f64>> {
    if from.norm() < f64::EPSILON || to.norm() < f64::EPSILON {
        return None;
    }
    let angle = from.angle(to);
    if angle < ANGLE_THRESHOLD {
        return None;
    }
    let axis = if (std::f64::consts::PI - angle).abs() < ANGLE_THRESHOLD {
        any_normal(to)
    } else {
        from.cross(to)
    };
    Some(Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle))
}

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// A unit vector perpendicular to `v`.
pub fn any_normal(v: &Vector3<f64>) -> Vector3<f64> {
    let helper = if v.x.abs() < 0.9 * v.norm() {
        Vector3::x()
    } else {
        Vector3::y()
    };
    v.cross(&helper).normalize()
}

pub fn rotate_about(point: &Point3<f64>, pivot: &Point3<f64>, rotation: &Rotation3<f64>) -> Point3<f64> {
    pivot + rotation * (point - pivot)
}

/// Angle at `vertex` formed by `a` and `b`, in radians.
pub fn bond_angle(a: &Point3<f64>, vertex: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - vertex).angle(&(b - vertex))
}

/// Signed dihedral angle p0-p1-p2-p3 in radians, in `(-pi, pi]`.
pub fn dihedral(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>, p3: &Point3<f64>) -> f64 {
    let b0 = p0 - p1;
    let b1 = (p2 - p1).normalize();
    let b2 = p3 - p2;
    let v = b0 - b1 * b0.dot(&b1);
    let w = b2 - b1 * b2.dot(&b1);
    b1.cross(&v).dot(&w).atan2(v.dot(&w))
}

pub fn is_finite_point(p: &Point3<f64>) -> bool {
    p.iter().all(|c| c.is_finite())
}

/// Uniformly random point in the axis-aligned cube of edge `edge` centred on `center`.
pub fn random_point_in_cube(center: &Point3<f64>, edge: f64, rng: &mut impl Rng) -> Point3<f64> {
    let half = edge / 2.0;
    if half <= 0.0 {
        return *center;
    }
    center
        + Vector3::new(
            rng.gen_range(-half..=half),
            rng.gen_range(-half..=half),
            rng.gen_range(-half..=half),
        )
}
