//! Bounding sphere used for node bounds and LOD centres

use crate::core::types::{Mat4, Vec3};
use crate::math::Aabb;

/// Sphere bound. A negative radius marks an empty (invalid) bound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self::INVALID
    }
}

impl BoundingSphere {
    /// Empty bound; expanding it by a valid sphere yields that sphere.
    pub const INVALID: Self = Self {
        center: Vec3::ZERO,
        radius: -1.0,
    };

    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Smallest sphere centred on the box that contains it
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            center: aabb.center(),
            radius: aabb.half_extent().length(),
        }
    }

    pub fn valid(&self) -> bool {
        self.radius >= 0.0
    }

    /// Grow minimally so that `other` is enclosed.
    pub fn expand_by_sphere(&mut self, other: &BoundingSphere) {
        if !other.valid() {
            return;
        }
        if !self.valid() {
            *self = *other;
            return;
        }

        let d = self.center.distance(other.center);

        // already encloses other
        if d + other.radius <= self.radius {
            return;
        }
        // other encloses self
        if d + self.radius <= other.radius {
            *self = *other;
            return;
        }

        let new_radius = (self.radius + d + other.radius) * 0.5;
        let ratio = (new_radius - self.radius) / d;
        self.center += (other.center - self.center) * ratio;
        self.radius = new_radius;
    }

    /// Sphere in the parent space of `matrix`.
    ///
    /// The radius is scaled by the largest axis scale so non-uniform scales stay conservative.
    pub fn transformed(&self, matrix: &Mat4) -> BoundingSphere {
        if !self.valid() {
            return *self;
        }
        let scale = matrix
            .x_axis
            .truncate()
            .length()
            .max(matrix.y_axis.truncate().length())
            .max(matrix.z_axis.truncate().length());

        BoundingSphere {
            center: matrix.transform_point3(self.center),
            radius: self.radius * scale,
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        self.valid() && self.center.distance(point) <= self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_default_is_invalid() {
        assert!(!BoundingSphere::default().valid());
        assert!(BoundingSphere::new(Vec3::ZERO, 0.0).valid());
    }

    #[test]
    fn test_from_aabb() {
        let s = BoundingSphere::from_aabb(&Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)));
        assert_eq!(s.center, Vec3::ZERO);
        assert!(approx(s.radius, 3.0_f32.sqrt()));
    }

    #[test]
    fn test_expand_invalid_takes_other() {
        let mut s = BoundingSphere::INVALID;
        let other = BoundingSphere::new(Vec3::X, 2.0);
        s.expand_by_sphere(&other);
        assert_eq!(s, other);
    }

    #[test]
    fn test_expand_by_invalid_is_noop() {
        let mut s = BoundingSphere::new(Vec3::X, 2.0);
        s.expand_by_sphere(&BoundingSphere::INVALID);
        assert_eq!(s, BoundingSphere::new(Vec3::X, 2.0));
    }

    #[test]
    fn test_expand_contained_is_noop() {
        let mut s = BoundingSphere::new(Vec3::ZERO, 10.0);
        s.expand_by_sphere(&BoundingSphere::new(Vec3::X, 1.0));
        assert_eq!(s, BoundingSphere::new(Vec3::ZERO, 10.0));
    }

    #[test]
    fn test_expand_disjoint_encloses_both() {
        let mut s = BoundingSphere::new(Vec3::ZERO, 1.0);
        let other = BoundingSphere::new(Vec3::new(10.0, 0.0, 0.0), 1.0);
        s.expand_by_sphere(&other);

        assert!(approx(s.radius, 6.0));
        assert!(approx(s.center.x, 5.0));
        assert!(s.contains(Vec3::new(-1.0, 0.0, 0.0)));
        assert!(s.contains(Vec3::new(11.0, 0.0, 0.0)));
    }

    #[test]
    fn test_transformed_translation_and_scale() {
        let s = BoundingSphere::new(Vec3::ZERO, 2.0);
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 3.0, 1.0),
            glam::Quat::IDENTITY,
            Vec3::new(5.0, 0.0, 0.0),
        );
        let t = s.transformed(&m);
        assert!(approx(t.center.x, 5.0));
        assert!(approx(t.radius, 6.0));
    }

    #[test]
    fn test_transformed_invalid_stays_invalid() {
        let t = BoundingSphere::INVALID.transformed(&Mat4::from_translation(Vec3::ONE));
        assert!(!t.valid());
    }
}
