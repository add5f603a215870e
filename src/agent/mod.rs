// src/agent/mod.rs
//! Agents: a tree of parts rooted at a mobile base, driven by per-part controllers.
//!
//! Part `0` is always the base. Every other part hangs on a part created before it, so
//! iterating parts in index order visits anchors before the parts they carry.

pub mod controller;
pub mod part;

use std::collections::BTreeSet;
use std::fmt;

use log::debug;
use nalgebra::{Rotation2, Vector2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::appearance::Surface;
use crate::collision::CollisionType;
use crate::components::transform::wrap_angle;
use crate::components::Coordinates;
use crate::config::PlaygroundConfig;
use crate::coordinates::InitialCoordinates;
use crate::entity::{Behavior, Entity, EntityId, IdAllocator};
use crate::physics::PhysicsWorld;
use crate::{Error, Result};

pub use controller::{CommandValue, Controller, ControllerClass, ControllerKind};
pub use part::{BaseOptions, Grasp, Joint, LimbOptions, Part, PartId, PartRole, SensorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Controller names.
pub const FORWARD: &str = "forward";
pub const ROTATION: &str = "rotation";
pub const GRASP: &str = "grasp";
pub const ACTIVATE: &str = "activate";

#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    name: String,
    parts: Vec<Part>,
    reward: f64,
    done: bool,
    initial: Option<InitialCoordinates>,
    teams: BTreeSet<String>,
    in_playground: bool,
}

impl Agent {
    /// The base part.
    pub const BASE: PartId = PartId(0);

    /// Agent made of a base only, with `forward` and `rotation` controllers.
    pub fn new(ids: &mut IdAllocator, options: &BaseOptions) -> Result<Self> {
        let id = ids.next_agent();
        let mut entity = Entity::part(ids, id, &options.entity_options())?;
        for team in &options.teams {
            entity.join_team(team);
        }
        let base = Part {
            id: Self::BASE,
            entity,
            role: PartRole::Base,
            controllers: vec![
                Controller::continuous(FORWARD, -1.0, 1.0, 0.0)?,
                Controller::continuous(ROTATION, -1.0, 1.0, 0.0)?,
            ],
            grasp: None,
        };
        Ok(Self {
            id,
            name: options.name.clone().unwrap_or_else(|| format!("agent_{}", id.0)),
            parts: vec![base],
            reward: 0.0,
            done: false,
            initial: None,
            teams: options.teams.iter().cloned().collect(),
            in_playground: false,
        })
    }

    // -- assembly -----------------------------------------------------------

    fn check_unlocked(&self) -> Result<()> {
        if self.in_playground {
            Err(Error::AgentLocked(self.id))
        } else {
            Ok(())
        }
    }

    fn push_part(&mut self, mut entity: Entity, role: PartRole, controllers: Vec<Controller>) -> PartId {
        for team in &self.teams {
            entity.join_team(team);
        }
        let id = PartId(self.parts.len());
        self.parts.push(Part {
            id,
            entity,
            role,
            controllers,
            grasp: None,
        });
        id
    }

    /// Add a jointed limb with a `rotation` controller.
    pub fn add_limb(&mut self, ids: &mut IdAllocator, anchor: PartId, options: &LimbOptions) -> Result<PartId> {
        self.check_unlocked()?;
        let anchor_part = self.part(anchor)?;
        if anchor_part.entity.body().is_none() {
            return Err(Error::InvalidOption(format!(
                "limbs hang on bodies; part {anchor} is a sensor"
            )));
        }
        let joint = options.joint(anchor)?;
        let entity = Entity::part(ids, self.id, &options.entity_options())?;
        let controllers = vec![Controller::continuous(ROTATION, -1.0, 1.0, 0.0)?];
        let id = self.push_part(entity, PartRole::Limb(joint), controllers);
        self.move_to(self.parts[0].entity.coordinates());
        Ok(id)
    }

    /// Add a sensor part around `anchor`, reaching `range` beyond its outline.
    pub fn add_sensor(&mut self, ids: &mut IdAllocator, anchor: PartId, kind: SensorKind, range: f64) -> Result<PartId> {
        self.check_unlocked()?;
        let anchor_part = self.part(anchor)?;
        if anchor_part.entity.body().is_none() {
            return Err(Error::InvalidOption(format!("part {anchor} cannot carry a sensor")));
        }
        let contour = anchor_part.entity.contour().clone();
        let (collision_type, controllers) = match kind {
            SensorKind::Grasper => (CollisionType::Grasper, vec![Controller::boolean(GRASP, false)]),
            SensorKind::Activator => (CollisionType::Activator, vec![Controller::boolean(ACTIVATE, false)]),
            SensorKind::Halo => (CollisionType::Trigger, Vec::new()),
        };
        let mut entity = Entity::sensor_part(ids, self.id, &contour, range, collision_type)?;
        if kind == SensorKind::Halo {
            *entity.behavior_mut() = Behavior::Trigger { activated: false };
        }
        entity.transform = self.parts[anchor.0].entity.transform;
        Ok(self.push_part(entity, PartRole::Sensor { anchor, kind }, controllers))
    }

    // -- accessors ----------------------------------------------------------

    #[inline]
    pub fn id(&self) -> AgentId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn base(&self) -> &Part {
        &self.parts[0]
    }

    #[inline]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub(crate) fn parts_mut(&mut self) -> &mut [Part] {
        &mut self.parts
    }

    pub fn part(&self, id: PartId) -> Result<&Part> {
        self.parts.get(id.0).ok_or(Error::UnknownPart(id.0))
    }

    pub(crate) fn part_mut(&mut self, id: PartId) -> Result<&mut Part> {
        self.parts.get_mut(id.0).ok_or(Error::UnknownPart(id.0))
    }

    /// Every `(part, controller)` pair, in part order.
    pub fn controllers(&self) -> impl Iterator<Item = (PartId, &Controller)> {
        self.parts
            .iter()
            .flat_map(|part| part.controllers.iter().map(move |c| (part.id, c)))
    }

    #[inline]
    pub fn teams(&self) -> &BTreeSet<String> {
        &self.teams
    }

    pub(crate) fn join_team(&mut self, team: &str) {
        self.teams.insert(team.to_string());
        for part in &mut self.parts {
            part.entity.join_team(team);
        }
    }

    #[inline]
    pub fn in_playground(&self) -> bool {
        self.in_playground
    }

    pub(crate) fn set_in_playground(&mut self, in_playground: bool) {
        self.in_playground = in_playground;
    }

    #[inline]
    pub fn position(&self) -> Vector2<f64> {
        self.parts[0].entity.position()
    }

    #[inline]
    pub fn angle(&self) -> f64 {
        self.parts[0].entity.angle()
    }

    pub fn initial_coordinates(&self) -> Option<&InitialCoordinates> {
        self.initial.as_ref()
    }

    pub fn set_initial_coordinates(&mut self, coordinates: impl Into<InitialCoordinates>) {
        self.initial = Some(coordinates.into());
    }

    // -- rewards ------------------------------------------------------------

    /// Reward accumulated since the last `take_reward` or reset.
    #[inline]
    pub fn reward(&self) -> f64 {
        self.reward
    }

    pub fn take_reward(&mut self) -> f64 {
        std::mem::take(&mut self.reward)
    }

    pub(crate) fn add_reward(&mut self, reward: f64) {
        self.reward += reward;
    }

    /// True once the agent reached a terminating zone.
    #[inline]
    pub fn done(&self) -> bool {
        self.done
    }

    pub(crate) fn terminate(&mut self) {
        self.done = true;
    }

    // -- commands -----------------------------------------------------------

    pub fn set_command(&mut self, part: PartId, controller: &str, value: impl Into<CommandValue>) -> Result<()> {
        self.part_mut(part)?.controller_mut(controller)?.set(value.into())
    }

    pub fn command(&self, part: PartId, controller: &str) -> Result<CommandValue> {
        Ok(self.part(part)?.controller(controller)?.value())
    }

    /// Set every controller to a random valid command.
    pub fn random_commands<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        for controller in self.parts.iter_mut().flat_map(|p| p.controllers.iter_mut()) {
            let value = controller.random(rng);
            controller.set(value)?;
        }
        Ok(())
    }

    /// Controllers of `class`, or all of them, read as default during the next step.
    pub(crate) fn disable_controllers(&mut self, class: Option<ControllerClass>) {
        for controller in self.parts.iter_mut().flat_map(|p| p.controllers.iter_mut()) {
            if class.map_or(true, |c| controller.kind().class() == c) {
                controller.disable_next_step();
            }
        }
    }

    pub fn is_disabled(&self, part: PartId, controller: &str) -> Result<bool> {
        Ok(self.part(part)?.controller(controller)?.is_disabled())
    }

    /// Whether sensor `part` currently wants to act (`grasp` or `activate` on).
    pub(crate) fn sensor_on(&self, part: PartId, controller: &str) -> bool {
        self.parts.get(part.0).map_or(false, |p| p.is_on(controller))
    }

    /// Angle of `part` relative to its anchor at rest, in `(-pi, pi]`. Zero for the base.
    pub fn relative_angle(&self, part: PartId) -> Result<f64> {
        let p = self.part(part)?;
        Ok(match &p.role {
            PartRole::Limb(joint) => {
                let anchor = &self.parts[joint.anchor.0].entity;
                wrap_angle(p.entity.angle() - (anchor.angle() + joint.rest_angle))
            }
            PartRole::Base | PartRole::Sensor { .. } => 0.0,
        })
    }

    /// Turn commands into forces, angular velocities and motor rates.
    pub(crate) fn apply_commands(&mut self, physics: &mut PhysicsWorld, config: &PlaygroundConfig) {
        for index in 0..self.parts.len() {
            let relative = self.relative_angle(PartId(index)).unwrap_or(0.0);
            let part = &mut self.parts[index];
            match &mut part.role {
                PartRole::Base => {
                    let Some(handle) = part.entity.body_handle() else { continue };
                    let forward = part.command(FORWARD) * config.linear_force;
                    let force = Rotation2::new(part.entity.angle()) * Vector2::new(forward, 0.0);
                    let spin = part.command(ROTATION) * config.angular_velocity;
                    physics.drive(handle, force, spin);
                }
                PartRole::Limb(joint) => {
                    let command = part.controllers.first().map_or(0.0, Controller::as_f64);
                    let limit = joint.rotation_range / 2.0 - config.joint_limit_margin;
                    let mut rate = -command * config.angular_velocity;
                    if (relative >= limit && rate < 0.0) || (relative <= -limit && rate > 0.0) {
                        rate = 0.0;
                    }
                    joint.motor_rate = rate;
                    if let Some(handle) = joint.handle {
                        physics.set_motor(handle, -rate, config.motor_damping);
                    }
                }
                PartRole::Sensor { kind: SensorKind::Grasper, .. } => {
                    if !part.is_on(GRASP) {
                        if let Some(grasp) = part.grasp.take() {
                            debug!("{} releases entity {}", part.entity.name(), grasp.target);
                            physics.remove_joint(grasp.joint);
                        }
                    }
                }
                PartRole::Sensor { .. } => {}
            }
        }
    }

    /// Forget grasps on `target`; its joints went away with its body.
    pub(crate) fn drop_grasps_on(&mut self, target: EntityId) {
        for part in &mut self.parts {
            if part.grasped() == Some(target) {
                part.grasp = None;
            }
        }
    }

    /// Release every grasp, removing the joints.
    pub(crate) fn release_all(&mut self, physics: &mut PhysicsWorld) {
        for part in &mut self.parts {
            if let Some(grasp) = part.grasp.take() {
                physics.remove_joint(grasp.joint);
            }
        }
    }

    // -- placement ----------------------------------------------------------

    /// Kinematic reposition of the whole tree, velocities zeroed.
    ///
    /// Each limb is placed so its pivot coincides with its anchor's pivot and its angle is
    /// the anchor angle plus the rest angle. Anchors are always placed before their parts.
    pub fn move_to(&mut self, coordinates: Coordinates) {
        self.parts[0].entity.set_coordinates(coordinates);
        for index in 1..self.parts.len() {
            let (placed, rest) = self.parts.split_at_mut(index);
            let part = &mut rest[0];
            let pose = match &part.role {
                PartRole::Limb(joint) => {
                    let anchor = placed[joint.anchor.0].entity.transform();
                    let angle = anchor.angle + joint.rest_angle;
                    let position = anchor.position + Rotation2::new(anchor.angle) * joint.pivot_on_anchor
                        - Rotation2::new(angle) * joint.pivot_on_part;
                    Coordinates { position, angle }
                }
                PartRole::Sensor { anchor, .. } => placed[anchor.0].entity.coordinates(),
                PartRole::Base => continue,
            };
            part.entity.set_coordinates(pose);
        }
    }

    /// Copy each sensor part's anchor transform.
    pub(crate) fn follow_sensor_anchors(&mut self) {
        for index in 1..self.parts.len() {
            let (placed, rest) = self.parts.split_at_mut(index);
            if let PartRole::Sensor { anchor, .. } = rest[0].role {
                rest[0].entity.transform = placed[anchor.0].entity.transform;
            }
        }
    }

    /// Resolve the starting pose and move there.
    pub(crate) fn place(&mut self) -> Result<Coordinates> {
        let initial = self.initial.as_mut().ok_or_else(|| {
            Error::InvalidCoordinates(format!("{} has no initial coordinates", self.name))
        })?;
        let coordinates = initial.resolve();
        if !coordinates.is_finite() {
            return Err(Error::InvalidCoordinates(format!(
                "{} resolved to a non-finite pose {coordinates:?}",
                self.name
            )));
        }
        self.move_to(coordinates);
        Ok(coordinates)
    }

    // -- lifecycle ----------------------------------------------------------

    pub(crate) fn pre_step(&mut self) {
        for part in &mut self.parts {
            part.entity.pre_step();
            for controller in &mut part.controllers {
                controller.advance();
            }
        }
    }

    pub(crate) fn post_step(&mut self) {
        for part in &mut self.parts {
            part.entity.post_step();
        }
    }

    /// Commands back to defaults, reward cleared, tree moved back to its starting pose.
    pub fn reset(&mut self) -> Result<()> {
        for part in &mut self.parts {
            for controller in &mut part.controllers {
                controller.reset();
            }
            if let PartRole::Limb(joint) = &mut part.role {
                joint.motor_rate = 0.0;
            }
            part.entity.reset()?;
        }
        self.reward = 0.0;
        self.done = false;
        if self.initial.is_some() {
            self.place()?;
        }
        Ok(())
    }

    pub fn draw(&mut self, surface: &mut dyn Surface, draw_invisible: bool, force_recompute: bool) {
        for part in &mut self.parts {
            part.entity.draw(surface, draw_invisible, force_recompute);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::PhysicalShape;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::f64::consts::PI;

    fn agent_with_limb(ids: &mut IdAllocator) -> (Agent, PartId) {
        let mut agent = Agent::new(ids, &BaseOptions::default()).unwrap();
        let limb = LimbOptions {
            physical_shape: PhysicalShape::Circle,
            radius: Some(5.0),
            size: None,
            pivot_on_part: [10.0, 10.0],
            pivot_on_anchor: [10.0, -10.0],
            ..LimbOptions::default()
        };
        let id = agent.add_limb(ids, Agent::BASE, &limb).unwrap();
        (agent, id)
    }

    #[test]
    fn random_commands_stay_in_range() {
        let mut ids = IdAllocator::new();
        let (mut agent, limb) = agent_with_limb(&mut ids);
        let grasper = agent.add_sensor(&mut ids, Agent::BASE, SensorKind::Grasper, 5.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            agent.random_commands(&mut rng).unwrap();
            for (_, controller) in agent.controllers() {
                assert!(controller.as_f64().abs() <= 1.0);
            }
            assert!(matches!(agent.command(grasper, GRASP).unwrap(), CommandValue::Boolean(_)));
            assert!(matches!(agent.command(limb, ROTATION).unwrap(), CommandValue::Continuous(_)));
        }
    }

    #[test]
    fn limb_hangs_on_its_pivot() {
        let mut ids = IdAllocator::new();
        let (mut agent, limb) = agent_with_limb(&mut ids);
        agent.move_to(Coordinates::new(0.0, 0.0, 0.0));
        let position = agent.part(limb).unwrap().entity().position();
        assert!((position - Vector2::new(0.0, -20.0)).norm() < 1e-12);

        agent.move_to(Coordinates::new(5.0, 0.0, PI / 2.0));
        let part = agent.part(limb).unwrap().entity();
        assert!((part.position() - Vector2::new(25.0, 0.0)).norm() < 1e-9);
        assert!((part.angle() - PI / 2.0).abs() < 1e-12);
        assert!(agent.relative_angle(limb).unwrap().abs() < 1e-12);
    }

    #[test]
    fn controllers_are_listed_per_part() {
        let mut ids = IdAllocator::new();
        let (mut agent, limb) = agent_with_limb(&mut ids);
        let grasper = agent.add_sensor(&mut ids, Agent::BASE, SensorKind::Grasper, 5.0).unwrap();

        let names: Vec<_> = agent.controllers().map(|(p, c)| (p, c.name().to_string())).collect();
        assert_eq!(
            names,
            vec![
                (Agent::BASE, FORWARD.to_string()),
                (Agent::BASE, ROTATION.to_string()),
                (limb, ROTATION.to_string()),
                (grasper, GRASP.to_string()),
            ]
        );
    }

    #[test]
    fn command_errors() {
        let mut ids = IdAllocator::new();
        let (mut agent, limb) = agent_with_limb(&mut ids);
        assert!(matches!(agent.set_command(PartId(7), ROTATION, 1.0), Err(Error::UnknownPart(7))));
        assert!(matches!(
            agent.set_command(limb, FORWARD, 1.0),
            Err(Error::UnknownController { .. })
        ));
        assert!(matches!(
            agent.set_command(limb, ROTATION, true),
            Err(Error::InvalidCommand { .. })
        ));
        agent.set_command(limb, ROTATION, 3.0).unwrap();
        assert_eq!(agent.command(limb, ROTATION).unwrap(), CommandValue::Continuous(1.0));
    }

    #[test]
    fn locked_agents_keep_their_parts() {
        let mut ids = IdAllocator::new();
        let (mut agent, _) = agent_with_limb(&mut ids);
        agent.set_in_playground(true);
        let err = agent.add_sensor(&mut ids, Agent::BASE, SensorKind::Halo, 5.0).unwrap_err();
        assert!(matches!(err, Error::AgentLocked(_)));
        assert!(err.is_lifecycle());
    }

    #[test]
    fn limbs_cannot_hang_on_sensors() {
        let mut ids = IdAllocator::new();
        let (mut agent, _) = agent_with_limb(&mut ids);
        let halo = agent.add_sensor(&mut ids, Agent::BASE, SensorKind::Halo, 5.0).unwrap();
        assert!(agent.add_limb(&mut ids, halo, &LimbOptions::default()).is_err());
        assert!(agent.add_limb(&mut ids, PartId(42), &LimbOptions::default()).is_err());
    }

    #[test]
    fn reset_restores_commands_and_pose() {
        let mut ids = IdAllocator::new();
        let (mut agent, limb) = agent_with_limb(&mut ids);
        agent.set_initial_coordinates(Coordinates::new(1.0, 2.0, 0.0));
        agent.place().unwrap();
        agent.set_command(Agent::BASE, FORWARD, 1.0).unwrap();
        agent.add_reward(3.0);
        agent.move_to(Coordinates::new(50.0, 50.0, 1.0));

        agent.reset().unwrap();
        assert_eq!(agent.reward(), 0.0);
        assert_eq!(agent.command(Agent::BASE, FORWARD).unwrap(), CommandValue::Continuous(0.0));
        assert_eq!(agent.position(), Vector2::new(1.0, 2.0));
        assert!(agent.relative_angle(limb).unwrap().abs() < 1e-12);
    }
}
