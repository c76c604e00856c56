use std::ops::{Div, Mul};

use nalgebra::Matrix3;

use crate::Pos;

/// Components smaller than this are treated as exactly zero.
pub const EPSILON: f64 = 1e-4;

/// A unit quaternion describing a rotation. Construction always normalizes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }.normalized()
    }

    /// Rotation about the Z axis, in degrees.
    pub fn from_z_degrees(angle: f64) -> Self {
        Self::from_euler_degrees(&Pos::new(0.0, 0.0, angle))
    }

    /// Builds a rotation from XYZ Euler angles in degrees, applied about X
    /// first, then Y, then Z.
    pub fn from_euler_degrees(angles: &Pos) -> Self {
        let (sx, cx) = (sin_degrees(angles.x / 2.0), cos_degrees(angles.x / 2.0));
        let (sy, cy) = (sin_degrees(angles.y / 2.0), cos_degrees(angles.y / 2.0));
        let (sz, cz) = (sin_degrees(angles.z / 2.0), cos_degrees(angles.z / 2.0));

        Self::new(
            cx * cy * cz + sx * sy * sz,
            sx * cy * cz - cx * sy * sz,
            cx * sy * cz + sx * cy * sz,
            cx * cy * sz - sx * sy * cz,
        )
    }

    /// Rescales to unit length unless already within tolerance, then snaps
    /// tiny components to zero. Applying it twice changes nothing.
    pub fn normalized(self) -> Self {
        let mag2 = self.dot(&self);
        let mut out = self;
        if (mag2 - 1.0).abs() > EPSILON && mag2.abs() > EPSILON {
            let mag = mag2.sqrt();
            out = Self {
                w: self.w / mag,
                x: self.x / mag,
                y: self.y / mag,
                z: self.z / mag,
            };
        }

        Self {
            w: snap(out.w),
            x: snap(out.x),
            y: snap(out.y),
            z: snap(out.z),
        }
    }

    pub fn conjugate(&self) -> Self {
        Self {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// True if the rotation axis is not parallel to Z, so the rotation tilts
    /// the XY plane.
    pub fn rotates_out_of_plane(&self) -> bool {
        self.x != 0.0 || self.y != 0.0
    }

    pub fn is_identity(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        let Self { w, x, y, z } = *self;
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);

        Matrix3::new(
            1.0 - 2.0 * (yy + zz),
            2.0 * (xy - wz),
            2.0 * (xz + wy),
            2.0 * (xy + wz),
            1.0 - 2.0 * (xx + zz),
            2.0 * (yz - wx),
            2.0 * (xz - wy),
            2.0 * (yz + wx),
            1.0 - 2.0 * (xx + yy),
        )
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, rhs: Self) -> Self::Output {
        let (a, b) = (self, rhs);
        Quaternion::new(
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        )
    }
}

impl Div for Quaternion {
    type Output = Quaternion;

    fn div(self, rhs: Self) -> Self::Output {
        self * rhs.conjugate()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn snap(value: f64) -> f64 {
    if value.abs() < EPSILON {
        0.0
    } else {
        value
    }
}

/// Sine of an angle in degrees, exact at multiples of 90.
pub fn sin_degrees(angle: f64) -> f64 {
    let angle = angle.rem_euclid(360.0);
    if angle == 0.0 || angle == 180.0 {
        0.0
    } else if angle == 90.0 {
        1.0
    } else if angle == 270.0 {
        -1.0
    } else {
        angle.to_radians().sin()
    }
}

/// Cosine of an angle in degrees, exact at multiples of 90.
pub fn cos_degrees(angle: f64) -> f64 {
    sin_degrees(angle + 90.0)
}
