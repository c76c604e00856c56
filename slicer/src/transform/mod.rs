//! Rigid placements: a rotation followed by a displacement.

use std::{
    cell::OnceCell,
    fmt,
    ops::{Div, Mul},
};

use anyhow::{bail, Result};
use nalgebra::Matrix3;

use crate::{Point, Pos};

mod quaternion;
pub use quaternion::{cos_degrees, sin_degrees, Quaternion};

/// Tolerance used when comparing two placements.
pub const PLACEMENT_EPSILON: f64 = 1e-9;

#[derive(Clone, Default)]
pub struct Placement {
    displacement: Pos,
    rotation: Quaternion,

    // Derived from `rotation`, cleared whenever it changes.
    matrix: OnceCell<Matrix3<f64>>,
}

impl Placement {
    pub fn new(displacement: Pos, rotation: Quaternion) -> Self {
        Self {
            displacement,
            rotation,
            matrix: OnceCell::new(),
        }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    pub fn from_translation(displacement: Pos) -> Self {
        Self::new(displacement, Quaternion::IDENTITY)
    }

    /// Displacement plus XYZ Euler rotation in degrees.
    pub fn from_euler_degrees(displacement: Pos, rotation: &Pos) -> Self {
        Self::new(displacement, Quaternion::from_euler_degrees(rotation))
    }

    pub fn displacement(&self) -> &Pos {
        &self.displacement
    }

    pub fn rotation(&self) -> &Quaternion {
        &self.rotation
    }

    pub fn set_displacement(&mut self, displacement: Pos) {
        self.displacement = displacement;
    }

    pub fn set_rotation(&mut self, rotation: Quaternion) {
        self.rotation = rotation;
        self.matrix = OnceCell::new();
    }

    pub fn translate(&mut self, delta: &Pos) {
        self.displacement += delta;
    }

    pub fn is_identity(&self) -> bool {
        self.rotation.is_identity() && self.displacement.norm() <= PLACEMENT_EPSILON
    }

    /// A planar placement keeps the XY plane parallel to itself.
    pub fn is_planar(&self) -> bool {
        !self.rotation.rotates_out_of_plane()
    }

    /// The same rotation without any displacement along Z.
    pub fn flattened(&self) -> Self {
        let mut out = self.clone();
        out.displacement.z = 0.0;
        out
    }

    pub fn rotation_matrix(&self) -> &Matrix3<f64> {
        self.matrix.get_or_init(|| self.rotation.rotation_matrix())
    }

    pub fn apply_rotation_only(&self, pos: &Pos) -> Pos {
        if self.rotation.is_identity() {
            return *pos;
        }

        self.rotation_matrix() * pos
    }

    pub fn apply(&self, pos: &Pos) -> Pos {
        self.apply_rotation_only(pos) + self.displacement
    }

    /// Places a point of the XY plane. Fails for placements that tilt the
    /// plane or move it along Z, since the result would leave the plane.
    pub fn apply_point(&self, point: &Point) -> Result<Point> {
        if self.rotation.rotates_out_of_plane() {
            bail!("Placement {self:?} rotates a 2D point out of the XY plane");
        }
        if self.displacement.z != 0.0 {
            bail!("Placement {self:?} displaces a 2D point along Z");
        }

        Ok(self.apply(&point.push(0.0)).xy())
    }

    /// The placement `d` with `d * other == self`.
    pub fn difference(&self, other: &Placement) -> Placement {
        self / other
    }
}

impl Mul for &Placement {
    type Output = Placement;

    /// Applies `rhs` first, then `self`.
    fn mul(self, rhs: Self) -> Self::Output {
        Placement::new(
            self.displacement + self.apply_rotation_only(&rhs.displacement),
            self.rotation * rhs.rotation,
        )
    }
}

impl Div for &Placement {
    type Output = Placement;

    fn div(self, rhs: Self) -> Self::Output {
        let rotation = Placement::new(Pos::zeros(), self.rotation / rhs.rotation);
        let displacement = self.displacement - rotation.apply_rotation_only(&rhs.displacement);
        Placement::new(displacement, *rotation.rotation())
    }
}

impl PartialEq for Placement {
    fn eq(&self, other: &Self) -> bool {
        (self.displacement - other.displacement).norm() <= PLACEMENT_EPSILON
            && 1.0 - self.rotation.dot(&other.rotation).abs() <= PLACEMENT_EPSILON
    }
}

impl fmt::Debug for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.displacement;
        let q = self.rotation;
        write!(
            f,
            "Placement(({}, {}, {}), [{}, {}, {}, {}])",
            d.x, d.y, d.z, q.w, q.x, q.y, q.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_placement() -> impl Strategy<Value = Placement> {
        (
            (-100.0_f64..100.0, -100.0_f64..100.0, -100.0_f64..100.0),
            (-12_i32..12, -12_i32..12, -12_i32..12),
        )
            .prop_map(|(d, r)| {
                // Whole steps of 15 degrees keep every quaternion component
                // well away from the snapping threshold.
                let r = Pos::new(r.0 as f64, r.1 as f64, r.2 as f64) * 15.0;
                Placement::from_euler_degrees(Pos::new(d.0, d.1, d.2), &r)
            })
    }

    fn close(a: &Pos, b: &Pos) -> bool {
        (a - b).norm() < 1e-6
    }

    #[test]
    fn compose_applies_right_first() {
        let turn = Placement::new(Pos::zeros(), Quaternion::from_z_degrees(90.0));
        let shift = Placement::from_translation(Pos::new(1.0, 0.0, 0.0));

        let p = Pos::new(1.0, 0.0, 0.0);
        assert!(close(&(&turn * &shift).apply(&p), &Pos::new(0.0, 2.0, 0.0)));
        assert!(close(&(&shift * &turn).apply(&p), &Pos::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn planar_points() {
        let placement = Placement::new(Pos::new(2.0, 3.0, 0.0), Quaternion::from_z_degrees(180.0));
        let point = placement.apply_point(&Point::new(1.0, 1.0)).unwrap();
        assert!((point - Point::new(1.0, 2.0)).norm() < 1e-12);

        let lifted = Placement::from_translation(Pos::new(0.0, 0.0, 0.4));
        assert!(lifted.apply_point(&Point::new(1.0, 1.0)).is_err());
        assert!(lifted.flattened().apply_point(&Point::new(1.0, 1.0)).is_ok());

        let tilted = Placement::from_euler_degrees(Pos::zeros(), &Pos::new(0.0, 30.0, 0.0));
        assert!(!tilted.is_planar());
        assert!(tilted.apply_point(&Point::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn matrix_tracks_rotation() {
        let mut placement = Placement::new(Pos::zeros(), Quaternion::from_z_degrees(90.0));
        let before = placement.apply(&Pos::new(1.0, 0.0, 0.0));
        placement.set_rotation(Quaternion::IDENTITY);
        let after = placement.apply(&Pos::new(1.0, 0.0, 0.0));

        assert!(close(&before, &Pos::new(0.0, 1.0, 0.0)));
        assert!(close(&after, &Pos::new(1.0, 0.0, 0.0)));
    }

    proptest! {
        #[test]
        fn difference_round_trip(a in arb_placement(), b in arb_placement()) {
            let diff = a.difference(&b);
            let back = &diff * &b;

            let p = Pos::new(1.0, -2.0, 3.0);
            prop_assert!(close(&back.apply(&p), &a.apply(&p)));
            prop_assert!(close(back.displacement(), a.displacement()));
        }

        #[test]
        fn self_difference_is_identity(a in arb_placement()) {
            prop_assert!((&a / &a).is_identity());
        }
    }
}
