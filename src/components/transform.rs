// src/components/transform.rs
//! Pose and velocity of an entity.
//!
//! The entity owns its `Transform`. The playground writes dirty transforms into rapier
//! before integrating and reads every body back right after, so between two steps the
//! transform is the single source of truth for game logic.

use std::f64::consts::PI;

use nalgebra::{Isometry2, Rotation2, Vector2};
use serde::{Deserialize, Serialize};

/// A `(position, angle)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub position: Vector2<f64>,
    pub angle: f64,
}

impl Coordinates {
    #[inline]
    pub fn new(x: f64, y: f64, angle: f64) -> Self {
        Self {
            position: Vector2::new(x, y),
            angle,
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.position.x.is_finite() && self.position.y.is_finite() && self.angle.is_finite()
    }

    #[inline]
    pub fn isometry(&self) -> Isometry2<f64> {
        Isometry2::new(self.position, self.angle)
    }
}

impl From<((f64, f64), f64)> for Coordinates {
    fn from(((x, y), angle): ((f64, f64), f64)) -> Self {
        Self::new(x, y, angle)
    }
}

/// Position, angle and their rates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vector2<f64>,
    pub angle: f64,
    pub velocity: Vector2<f64>,
    pub angular_velocity: f64,
}

impl Transform {
    pub fn at(coordinates: Coordinates) -> Self {
        Self {
            position: coordinates.position,
            angle: coordinates.angle,
            ..Self::default()
        }
    }

    #[inline]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            position: self.position,
            angle: self.angle,
        }
    }

    #[inline]
    pub fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.position = coordinates.position;
        self.angle = coordinates.angle;
    }

    #[inline]
    pub fn stop(&mut self) {
        self.velocity = Vector2::zeros();
        self.angular_velocity = 0.0;
    }

    /// Map a local offset to world space.
    #[inline]
    pub fn to_world(&self, local: Vector2<f64>) -> Vector2<f64> {
        self.position + Rotation2::new(self.angle) * local
    }

    #[inline]
    pub fn isometry(&self) -> Isometry2<f64> {
        Isometry2::new(self.position, self.angle)
    }
}

/// Wrap an angle into `(-pi, pi]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_angle_range() {
        assert!((wrap_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(-PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert_eq!(wrap_angle(PI), PI);
        assert_eq!(wrap_angle(0.0), 0.0);
    }

    #[test]
    fn local_offsets_rotate_with_angle() {
        let transform = Transform::at(Coordinates::new(1.0, 2.0, PI / 2.0));
        let world = transform.to_world(Vector2::new(3.0, 0.0));
        assert!((world.x - 1.0).abs() < 1e-12);
        assert!((world.y - 5.0).abs() < 1e-12);
    }
}
