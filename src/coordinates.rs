// src/coordinates.rs
//! Where entities start and how scripted ones move.
//!
//! Initial coordinates are either a literal pose, a sampler drawing a fresh pose at every
//! placement, or a trajectory that also drives the entity at every `pre_step`.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::components::Coordinates;
use crate::{Error, Result};

/// Produces poses on demand.
pub trait CoordinateSampler: Send + fmt::Debug {
    fn sample(&mut self) -> Coordinates;
}

/// Endless, restartable sequence of poses.
pub trait Trajectory: Send + fmt::Debug {
    fn next(&mut self) -> Coordinates;
    fn reset(&mut self);
}

/// How an entity gets its starting pose.
#[derive(Debug)]
pub enum InitialCoordinates {
    Fixed(Coordinates),
    Sampler(Box<dyn CoordinateSampler>),
    Trajectory(Box<dyn Trajectory>),
}

impl InitialCoordinates {
    /// Validate a literal pose.
    pub fn fixed(coordinates: Coordinates) -> Result<Self> {
        if coordinates.is_finite() {
            Ok(Self::Fixed(coordinates))
        } else {
            Err(Error::InvalidCoordinates(format!("non-finite pose {coordinates:?}")))
        }
    }

    /// Pose to place the entity at. Samplers draw a new sample on every call.
    pub fn resolve(&mut self) -> Coordinates {
        match self {
            InitialCoordinates::Fixed(coordinates) => *coordinates,
            InitialCoordinates::Sampler(sampler) => sampler.sample(),
            InitialCoordinates::Trajectory(trajectory) => {
                trajectory.reset();
                trajectory.next()
            }
        }
    }
}

impl From<Coordinates> for InitialCoordinates {
    fn from(coordinates: Coordinates) -> Self {
        InitialCoordinates::Fixed(coordinates)
    }
}

// ---------------------------------------------------------------------------
// Samplers
// ---------------------------------------------------------------------------

/// Area a sampler draws positions from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "area", rename_all = "lowercase")]
pub enum Area {
    Rectangle { center: [f64; 2], width: f64, height: f64 },
    Circle { center: [f64; 2], radius: f64 },
}

/// Uniform positions over an area, angle uniform over `[0, 2pi)` unless fixed.
#[derive(Debug)]
pub struct AreaSampler {
    area: Area,
    angle: Option<f64>,
    rng: StdRng,
}

impl AreaSampler {
    pub fn new(area: Area, angle: Option<f64>, seed: u64) -> Result<Self> {
        let valid = match area {
            Area::Rectangle { center, width, height } => {
                finite2(center) && width.is_finite() && height.is_finite() && width >= 0.0 && height >= 0.0
            }
            Area::Circle { center, radius } => finite2(center) && radius.is_finite() && radius >= 0.0,
        };
        if !valid || angle.map_or(false, |a| !a.is_finite()) {
            return Err(Error::InvalidCoordinates(format!("invalid sampling area {area:?}")));
        }
        Ok(Self {
            area,
            angle,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn area(&self) -> Area {
        self.area
    }
}

impl CoordinateSampler for AreaSampler {
    fn sample(&mut self) -> Coordinates {
        let position = match self.area {
            Area::Rectangle { center, width, height } => Vector2::new(
                center[0] + (self.rng.gen::<f64>() - 0.5) * width,
                center[1] + (self.rng.gen::<f64>() - 0.5) * height,
            ),
            Area::Circle { center, radius } => {
                // sqrt keeps the density uniform over the disc
                let r = radius * self.rng.gen::<f64>().sqrt();
                let theta = self.rng.gen_range(0.0..2.0 * PI);
                Vector2::new(center[0] + r * theta.cos(), center[1] + r * theta.sin())
            }
        };
        let angle = self.angle.unwrap_or_else(|| self.rng.gen_range(0.0..2.0 * PI));
        Coordinates { position, angle }
    }
}

// ---------------------------------------------------------------------------
// Trajectories
// ---------------------------------------------------------------------------

/// Loops through waypoints in straight segments, facing the direction of travel.
#[derive(Debug, Clone)]
pub struct WaypointTrajectory {
    waypoints: Vec<Vector2<f64>>,
    steps_per_segment: usize,
    tick: usize,
}

impl WaypointTrajectory {
    pub fn new(waypoints: Vec<Vector2<f64>>, steps_per_segment: usize) -> Result<Self> {
        if waypoints.len() < 2 || steps_per_segment == 0 {
            return Err(Error::InvalidCoordinates(
                "a waypoint trajectory needs two waypoints and at least one step per segment".into(),
            ));
        }
        if waypoints.iter().any(|w| !w.x.is_finite() || !w.y.is_finite()) {
            return Err(Error::InvalidCoordinates("non-finite waypoint".into()));
        }
        Ok(Self {
            waypoints,
            steps_per_segment,
            tick: 0,
        })
    }
}

impl Trajectory for WaypointTrajectory {
    fn next(&mut self) -> Coordinates {
        let segments = self.waypoints.len();
        let segment = (self.tick / self.steps_per_segment) % segments;
        let t = (self.tick % self.steps_per_segment) as f64 / self.steps_per_segment as f64;
        self.tick = (self.tick + 1) % (segments * self.steps_per_segment);

        let from = self.waypoints[segment];
        let to = self.waypoints[(segment + 1) % segments];
        let direction = to - from;
        Coordinates {
            position: from + direction * t,
            angle: direction.y.atan2(direction.x),
        }
    }

    fn reset(&mut self) {
        self.tick = 0;
    }
}

/// Orbit around a centre, optionally spinning on itself.
#[derive(Debug, Clone)]
pub struct CircularTrajectory {
    center: Vector2<f64>,
    radius: f64,
    period: usize,
    rotations: f64,
    tick: usize,
}

impl CircularTrajectory {
    /// `period` steps per revolution; the entity turns `rotations` times on itself per revolution.
    pub fn new(center: Vector2<f64>, radius: f64, period: usize, rotations: f64) -> Result<Self> {
        if period == 0 || !radius.is_finite() || radius < 0.0 || !rotations.is_finite() {
            return Err(Error::InvalidCoordinates("invalid circular trajectory".into()));
        }
        Ok(Self {
            center,
            radius,
            period,
            rotations,
            tick: 0,
        })
    }
}

impl Trajectory for CircularTrajectory {
    fn next(&mut self) -> Coordinates {
        let phase = 2.0 * PI * self.tick as f64 / self.period as f64;
        self.tick = (self.tick + 1) % self.period;
        Coordinates {
            position: self.center + Vector2::new(phase.cos(), phase.sin()) * self.radius,
            angle: (phase * self.rotations).rem_euclid(2.0 * PI),
        }
    }

    fn reset(&mut self) {
        self.tick = 0;
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Serializable description of initial coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinatesConfig {
    Fixed { position: [f64; 2], angle: f64 },
    Sampler {
        sampler: Area,
        #[serde(default)]
        angle: Option<f64>,
        #[serde(default)]
        seed: u64,
    },
    Waypoints { waypoints: Vec<[f64; 2]>, steps_per_segment: usize },
    Orbit { center: [f64; 2], radius: f64, period: usize, #[serde(default)] rotations: f64 },
}

impl CoordinatesConfig {
    /// Parse JSON; anything that is not one of the known layouts is rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidCoordinates(e.to_string()))
    }

    pub fn build(&self) -> Result<InitialCoordinates> {
        match self {
            CoordinatesConfig::Fixed { position, angle } => {
                InitialCoordinates::fixed(Coordinates::new(position[0], position[1], *angle))
            }
            CoordinatesConfig::Sampler { sampler, angle, seed } => Ok(InitialCoordinates::Sampler(Box::new(
                AreaSampler::new(*sampler, *angle, *seed)?,
            ))),
            CoordinatesConfig::Waypoints { waypoints, steps_per_segment } => {
                let waypoints = waypoints.iter().map(|w| Vector2::new(w[0], w[1])).collect();
                Ok(InitialCoordinates::Trajectory(Box::new(WaypointTrajectory::new(
                    waypoints,
                    *steps_per_segment,
                )?)))
            }
            CoordinatesConfig::Orbit { center, radius, period, rotations } => Ok(InitialCoordinates::Trajectory(
                Box::new(CircularTrajectory::new(Vector2::new(center[0], center[1]), *radius, *period, *rotations)?),
            )),
        }
    }
}

fn finite2(v: [f64; 2]) -> bool {
    v[0].is_finite() && v[1].is_finite()
}
