//! Spatial primitives shared by the gaze and capture paths.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// 3D point or direction in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit-length copy, or `None` when the vector is degenerate.
    pub fn normalized(&self) -> Option<Vec3> {
        let len = self.length();
        if len <= f32::EPSILON {
            return None;
        }
        Some(Vec3::new(self.x / len, self.y / len, self.z / len))
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Which side of the anchor the attached panel is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Side {
    /// Signed lateral offset along the anchor's right axis.
    pub fn signed(&self, magnitude: f32) -> f32 {
        match self {
            Side::Left => -magnitude,
            Side::Right => magnitude,
        }
    }
}

/// Pose of the object the panel anchors to: position plus the two axes the
/// placement formula needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorTransform {
    pub position: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
}

impl Default for AnchorTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::new(0.0, 0.0, 1.0),
            right: Vec3::new(1.0, 0.0, 0.0),
        }
    }
}

impl AnchorTransform {
    pub const fn new(position: Vec3, forward: Vec3, right: Vec3) -> Self {
        Self {
            position,
            forward,
            right,
        }
    }

    /// Panel placement point: forward offset plus a signed lateral shift.
    pub fn panel_point(&self, forward_offset: f32, side: Side, lateral_magnitude: f32) -> Vec3 {
        self.position + self.forward * forward_offset + self.right * side.signed(lateral_magnitude)
    }
}
