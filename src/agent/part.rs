// src/agent/part.rs
//! Agent parts: the base, jointed limbs and sensor parts carried by another part.

use std::fmt;

use nalgebra::Vector2;
use rapier2d::prelude::ImpulseJointHandle;
use serde::{Deserialize, Serialize};

use crate::agent::controller::Controller;
use crate::contour::{PhysicalShape, DEFAULT_INVISIBLE_RANGE};
use crate::entity::{EntityOptions, Entity, EntityId};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(pub usize);

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pin joint between a limb and its anchor, driven by a velocity motor.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub(crate) anchor: PartId,
    pub(crate) pivot_on_part: Vector2<f64>,
    pub(crate) pivot_on_anchor: Vector2<f64>,
    pub(crate) rest_angle: f64,
    pub(crate) rotation_range: f64,
    pub(crate) motor_rate: f64,
    pub(crate) handle: Option<ImpulseJointHandle>,
}

impl Joint {
    #[inline]
    pub fn anchor(&self) -> PartId {
        self.anchor
    }

    #[inline]
    pub fn pivot_on_part(&self) -> Vector2<f64> {
        self.pivot_on_part
    }

    #[inline]
    pub fn pivot_on_anchor(&self) -> Vector2<f64> {
        self.pivot_on_anchor
    }

    /// Angle of the part relative to its anchor at rest.
    #[inline]
    pub fn rest_angle(&self) -> f64 {
        self.rest_angle
    }

    /// Total allowed rotation, centred on the rest angle.
    #[inline]
    pub fn rotation_range(&self) -> f64 {
        self.rotation_range
    }

    /// Motor rate of the last step; the relative velocity of the part is its opposite.
    #[inline]
    pub fn motor_rate(&self) -> f64 {
        self.motor_rate
    }

    #[inline]
    pub fn handle(&self) -> Option<ImpulseJointHandle> {
        self.handle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Holds graspable entities while its `grasp` command is on.
    Grasper,
    /// Activates switches and dispensers while its `activate` command is on.
    Activator,
    /// Trigger area around the anchor.
    Halo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartRole {
    Base,
    Limb(Joint),
    Sensor { anchor: PartId, kind: SensorKind },
}

/// A grasped entity and the joint holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grasp {
    pub target: EntityId,
    pub joint: ImpulseJointHandle,
}

#[derive(Debug)]
pub struct Part {
    pub(crate) id: PartId,
    pub(crate) entity: Entity,
    pub(crate) role: PartRole,
    pub(crate) controllers: Vec<Controller>,
    pub(crate) grasp: Option<Grasp>,
}

impl Part {
    #[inline]
    pub fn id(&self) -> PartId {
        self.id
    }

    #[inline]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    #[inline]
    pub(crate) fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    #[inline]
    pub fn role(&self) -> &PartRole {
        &self.role
    }

    pub fn joint(&self) -> Option<&Joint> {
        match &self.role {
            PartRole::Limb(joint) => Some(joint),
            _ => None,
        }
    }

    /// Part this one hangs on; `None` for the base.
    pub fn anchor(&self) -> Option<PartId> {
        match &self.role {
            PartRole::Base => None,
            PartRole::Limb(joint) => Some(joint.anchor),
            PartRole::Sensor { anchor, .. } => Some(*anchor),
        }
    }

    pub fn sensor_kind(&self) -> Option<SensorKind> {
        match self.role {
            PartRole::Sensor { kind, .. } => Some(kind),
            _ => None,
        }
    }

    #[inline]
    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn controller(&self, name: &str) -> Result<&Controller> {
        self.controllers
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| self.unknown_controller(name))
    }

    pub(crate) fn controller_mut(&mut self, name: &str) -> Result<&mut Controller> {
        let missing = self.unknown_controller(name);
        self.controllers.iter_mut().find(|c| c.name() == name).ok_or(missing)
    }

    fn unknown_controller(&self, name: &str) -> Error {
        Error::UnknownController {
            part: self.entity.name().to_string(),
            controller: name.to_string(),
        }
    }

    /// Value of a boolean-ish controller, false if the part has none by that name.
    pub(crate) fn is_on(&self, name: &str) -> bool {
        self.controller(name).map_or(false, Controller::as_bool)
    }

    pub(crate) fn command(&self, name: &str) -> f64 {
        self.controller(name).map_or(0.0, Controller::as_f64)
    }

    /// Entity held by this grasper.
    #[inline]
    pub fn grasped(&self) -> Option<EntityId> {
        self.grasp.map(|g| g.target)
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Body of an agent's base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaseOptions {
    pub physical_shape: PhysicalShape,
    pub radius: Option<f64>,
    pub size: Option<[f64; 2]>,
    pub mass: f64,
    pub name: Option<String>,
    pub appearance: Option<String>,
    pub teams: Vec<String>,
}

impl Default for BaseOptions {
    fn default() -> Self {
        Self {
            physical_shape: PhysicalShape::Circle,
            radius: Some(10.0),
            size: None,
            mass: 10.0,
            name: None,
            appearance: None,
            teams: Vec::new(),
        }
    }
}

impl BaseOptions {
    pub(crate) fn entity_options(&self) -> EntityOptions {
        EntityOptions {
            physical_shape: self.physical_shape,
            radius: self.radius,
            size: self.size,
            mass: Some(self.mass),
            movable: true,
            appearance: self.appearance.clone(),
            invisible_range: DEFAULT_INVISIBLE_RANGE,
            ..EntityOptions::default()
        }
    }
}

/// Body and joint of a limb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimbOptions {
    pub physical_shape: PhysicalShape,
    pub radius: Option<f64>,
    pub size: Option<[f64; 2]>,
    pub mass: f64,
    pub pivot_on_part: [f64; 2],
    pub pivot_on_anchor: [f64; 2],
    pub rest_angle: f64,
    pub rotation_range: f64,
    pub appearance: Option<String>,
}

impl Default for LimbOptions {
    fn default() -> Self {
        Self {
            physical_shape: PhysicalShape::Rectangle,
            radius: None,
            size: Some([30.0, 8.0]),
            mass: 1.0,
            pivot_on_part: [-15.0, 0.0],
            pivot_on_anchor: [10.0, 0.0],
            rest_angle: 0.0,
            rotation_range: std::f64::consts::PI,
            appearance: None,
        }
    }
}

impl LimbOptions {
    pub(crate) fn entity_options(&self) -> EntityOptions {
        EntityOptions {
            physical_shape: self.physical_shape,
            radius: self.radius,
            size: self.size,
            mass: Some(self.mass),
            movable: true,
            appearance: self.appearance.clone(),
            ..EntityOptions::default()
        }
    }

    pub(crate) fn joint(&self, anchor: PartId) -> Result<Joint> {
        let finite = self.pivot_on_part.iter().chain(&self.pivot_on_anchor).all(|v| v.is_finite())
            && self.rest_angle.is_finite();
        if !finite {
            return Err(Error::InvalidOption("limb pivots and rest angle must be finite".into()));
        }
        if !(self.rotation_range.is_finite() && self.rotation_range >= 0.0) {
            return Err(Error::InvalidOption(format!(
                "rotation range must be a non-negative angle, got {}",
                self.rotation_range
            )));
        }
        Ok(Joint {
            anchor,
            pivot_on_part: Vector2::new(self.pivot_on_part[0], self.pivot_on_part[1]),
            pivot_on_anchor: Vector2::new(self.pivot_on_anchor[0], self.pivot_on_anchor[1]),
            rest_angle: self.rest_angle,
            rotation_range: self.rotation_range,
            motor_rate: 0.0,
            handle: None,
        })
    }
}
