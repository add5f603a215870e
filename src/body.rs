// src/body.rs
//! Rigid body owned by an entity: mass model plus the rapier handle once inserted.

use rapier2d::prelude::*;

use crate::components::Transform;
use crate::config::PlaygroundConfig;
use crate::contour::{Contour, PhysicalShape};
use crate::{Error, Result};

/// Mass model of an entity body.
///
/// Static bodies report infinite mass and moment and are never integrated.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalBody {
    movable: bool,
    mass: Option<f64>,
    moment: f64,
    handle: Option<RigidBodyHandle>,
}

impl PhysicalBody {
    /// Compute the mass properties for `contour`.
    ///
    /// `mass` is ignored for static bodies and required (positive, finite) for movable ones.
    pub fn new(movable: bool, mass: Option<f64>, contour: &Contour) -> Result<Self> {
        if !movable {
            return Ok(Self {
                movable,
                mass: None,
                moment: f64::INFINITY,
                handle: None,
            });
        }

        let mass = match mass {
            Some(m) if m.is_finite() && m > 0.0 => m,
            Some(m) => return Err(Error::InvalidOption(format!("mass must be positive, got {m}"))),
            None => return Err(Error::InvalidOption("movable entities need a mass".into())),
        };

        Ok(Self {
            movable,
            mass: Some(mass),
            moment: moment_for(mass, contour)?,
            handle: None,
        })
    }

    #[inline]
    pub fn movable(&self) -> bool {
        self.movable
    }

    /// Mass, `f64::INFINITY` for static bodies.
    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass.unwrap_or(f64::INFINITY)
    }

    /// Moment of inertia, `f64::INFINITY` for static bodies.
    #[inline]
    pub fn moment(&self) -> f64 {
        self.moment
    }

    #[inline]
    pub fn handle(&self) -> Option<RigidBodyHandle> {
        self.handle
    }

    pub(crate) fn set_handle(&mut self, handle: Option<RigidBodyHandle>) {
        self.handle = handle;
    }

    /// Rapier description of this body at `transform`.
    ///
    /// Colliders attached to it carry no density, so its mass properties are exactly
    /// the ones computed here.
    pub(crate) fn build(&self, transform: &Transform, config: &PlaygroundConfig, can_sleep: bool) -> RigidBody {
        let builder = if self.movable {
            RigidBodyBuilder::dynamic()
                .additional_mass_properties(MassProperties::new(point![0.0, 0.0], self.mass(), self.moment))
                .linear_damping(config.linear_damping)
                .angular_damping(config.angular_damping)
                .linvel(transform.velocity)
                .angvel(transform.angular_velocity)
                .can_sleep(can_sleep)
        } else {
            RigidBodyBuilder::fixed()
        };

        builder
            .translation(transform.position)
            .rotation(transform.angle)
            .build()
    }
}

/// Moment of inertia around the centre of mass.
pub fn moment_for(mass: f64, contour: &Contour) -> Result<f64> {
    match contour.shape() {
        PhysicalShape::Circle => Ok(mass * contour.radius().powi(2) / 2.0),
        PhysicalShape::Triangle | PhysicalShape::Square | PhysicalShape::Pentagon | PhysicalShape::Hexagon => {
            let vertices = contour.vertices(0.0, false);
            let mut numerator = 0.0;
            let mut area = 0.0;
            for (i, v1) in vertices.iter().enumerate() {
                let v2 = vertices[(i + 1) % vertices.len()];
                let cross = v2.x * v1.y - v2.y * v1.x;
                numerator += cross * (v1.dot(v1) + v1.dot(&v2) + v2.dot(&v2));
                area += cross;
            }
            if area == 0.0 {
                return Err(Error::InvalidShape(format!("degenerate {} outline", contour.shape())));
            }
            Ok(mass * numerator / (6.0 * area))
        }
        PhysicalShape::Rectangle => {
            let (width, height) = contour.size();
            Ok(mass * (width * width + height * height) / 12.0)
        }
    }
}
