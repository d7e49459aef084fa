/// Vector, matrix and quaternion helpers for the physics core
///
/// All simulation math is 64-bit (`DVec3`, `DQuat`, `DMat3`, `DAffine3`) for
/// planetary-scale precision. glam covers the basic operations; this module
/// adds the rigid-body pieces it does not ship: orientation integration from
/// angular velocity, inertia tensor transport into world space, and the
/// checked/guarded variants the integrator relies on.

use glam::{DAffine3, DMat3, DQuat, DVec3};

pub const DBL_EPSILON: f64 = f64::EPSILON;

/// Normalize a quaternion, returning the identity (no-rotation) quaternion
/// when the squared magnitude is too small to divide by.
pub fn normalize_or_identity(q: DQuat) -> DQuat {
    if q.length_squared() < DBL_EPSILON {
        DQuat::IDENTITY
    } else {
        q.normalize()
    }
}

/// Matrix inverse that treats a zero determinant as a programming error.
///
/// A singular inertia or rotation matrix means an invariant was violated
/// upstream (zero mass, degenerate shape). There is no sensible recovery.
pub fn inverse_checked(m: DMat3) -> DMat3 {
    let det = m.determinant();
    if det == 0.0 {
        panic!("zero matrix determinant");
    }
    m.inverse()
}

/// Integrate angular velocity into an orientation over `dt` seconds using
/// `q' = q + 0.5 * (w ⊗ q) * dt`, where `w` is the angular velocity vector
/// promoted to a pure quaternion. The result is not normalized; callers
/// re-normalize once per tick to keep drift out of the unit quaternion.
pub fn integrate_orientation(q: DQuat, angular_velocity: DVec3, dt: f64) -> DQuat {
    let w = DQuat::from_xyzw(
        angular_velocity.x * dt,
        angular_velocity.y * dt,
        angular_velocity.z * dt,
        0.0,
    );
    let delta = w * q;
    DQuat::from_xyzw(
        q.x + delta.x * 0.5,
        q.y + delta.y * 0.5,
        q.z + delta.z * 0.5,
        q.w + delta.w * 0.5,
    )
}

/// Build the body→world transform (3x4: rotation + translation) from an
/// entity's position and orientation.
pub fn body_to_world(position: DVec3, orientation: DQuat) -> DAffine3 {
    DAffine3::from_rotation_translation(orientation, position)
}

/// Transport the body-space inverse inertia tensor into world space by
/// conjugating it through the rotation part of the body→world transform:
/// `I_world = R * I_body * R^T`.
pub fn world_inv_inertia(inv_body: DMat3, transform: &DAffine3) -> DMat3 {
    let rot = transform.matrix3;
    rot * inv_body * rot.transpose()
}

/// Local forward axis (+X) rotated into world space. Thrust is applied
/// along this axis.
pub fn forward_vector(orientation: DQuat) -> DVec3 {
    orientation * DVec3::X
}

/// Inertia tensor of a solid cuboid of the given mass and dimensions.
/// See https://en.wikipedia.org/wiki/List_of_moments_of_inertia
pub fn inertia_tensor_cuboid(mass: f64, w: f64, h: f64, d: f64) -> DMat3 {
    let (w2, h2, d2) = (w * w, h * h, d * d);
    let x = mass / 12.0;
    DMat3::from_diagonal(DVec3::new(x * (h2 + d2), x * (w2 + d2), x * (w2 + h2)))
}

/// Inertia tensor of a solid sphere of the given mass and radius.
pub fn inertia_tensor_sphere(mass: f64, radius: f64) -> DMat3 {
    DMat3::from_diagonal(DVec3::splat(0.4 * mass * radius * radius))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_guards_zero_quaternion() {
        let q = normalize_or_identity(DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0));
        assert_eq!(q, DQuat::IDENTITY);
    }

    #[test]
    fn orientation_integration_spins_about_z() {
        // quarter-turn per second about +Z, integrated over small steps
        let mut q = DQuat::IDENTITY;
        let w = DVec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let dt = 1e-4;
        let steps = (1.0 / dt) as usize;
        for _ in 0..steps {
            q = normalize_or_identity(integrate_orientation(q, w, dt));
        }
        let fwd = forward_vector(q);
        assert_relative_eq!(fwd.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(fwd.y, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn world_tensor_is_conjugated_by_rotation() {
        let inv_body = inertia_tensor_sphere(10.0, 2.0).inverse();
        // a sphere's tensor is isotropic: any rotation leaves it unchanged
        let t = body_to_world(
            DVec3::new(5.0, -3.0, 1.0),
            DQuat::from_rotation_y(0.7),
        );
        let inv_world = world_inv_inertia(inv_body, &t);
        for c in 0..3 {
            for r in 0..3 {
                assert_relative_eq!(
                    inv_world.col(c)[r],
                    inv_body.col(c)[r],
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    #[should_panic(expected = "zero matrix determinant")]
    fn singular_inverse_panics() {
        inverse_checked(DMat3::ZERO);
    }
}
