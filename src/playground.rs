// src/playground.rs
//! The playground: owner of the physics world, the scene and the agents.
//!
//! One `step()` runs, in order: per-entity `pre_step`, scene-to-physics sync, agent
//! commands, integration with collision dispatch, physics-to-scene sync, deferred world
//! commands and finally `post_step`.

use std::collections::BTreeMap;

use log::{debug, warn};
use nalgebra::{Rotation2, Vector2};
use rapier2d::prelude::{Collider, ColliderHandle, RigidBodyHandle};

use crate::agent::{Agent, AgentId, Grasp, PartId, PartRole};
use crate::appearance::Surface;
use crate::collision::{CollisionRegistry, DispatchHooks, WorldContext};
use crate::command_buffer::{CommandBuffer, CommandMetrics, Traveller, WorldCommand};
use crate::components::Coordinates;
use crate::config::PlaygroundConfig;
use crate::coordinates::{CoordinateSampler, InitialCoordinates};
use crate::entity::{Behavior, Entity, EntityId, IdAllocator, ShapeRole};
use crate::physics::PhysicsWorld;
use crate::physics_integration::{push_transform, sync_physics_to_scene, sync_scene_to_physics, ShapeMap, ShapeOwner};
use crate::filter::TeamTable;
use crate::{Error, Result};

/// Samples drawn for a sampled pose before giving up on finding a free spot.
pub const MAX_PLACEMENT_ATTEMPTS: usize = 100;

pub struct Playground {
    config: PlaygroundConfig,
    physics: PhysicsWorld,
    elements: BTreeMap<EntityId, Entity>,
    agents: BTreeMap<AgentId, Agent>,
    shapes: ShapeMap,
    teams: TeamTable,
    ids: IdAllocator,
    registry: CollisionRegistry,
    commands: CommandBuffer,
    /// Entities removed by world commands; they come back on reset.
    disappeared: Vec<Entity>,
    steps: u64,
}

impl Playground {
    /// Playground with the built-in scene-element interactions.
    pub fn new(config: PlaygroundConfig) -> Self {
        Self::with_registry(config, CollisionRegistry::with_defaults())
    }

    pub fn with_registry(config: PlaygroundConfig, registry: CollisionRegistry) -> Self {
        Self {
            physics: PhysicsWorld::new(&config),
            config,
            elements: BTreeMap::new(),
            agents: BTreeMap::new(),
            shapes: ShapeMap::new(),
            teams: TeamTable::new(),
            ids: IdAllocator::new(),
            registry,
            commands: CommandBuffer::default(),
            disappeared: Vec::new(),
            steps: 0,
        }
    }

    /// Identity source for entities and agents meant for this playground.
    #[inline]
    pub fn ids(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    #[inline]
    pub fn config(&self) -> &PlaygroundConfig {
        &self.config
    }

    #[inline]
    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    #[inline]
    pub fn shape_map(&self) -> &ShapeMap {
        &self.shapes
    }

    #[inline]
    pub fn teams(&self) -> &TeamTable {
        &self.teams
    }

    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    #[inline]
    pub fn command_metrics(&self) -> CommandMetrics {
        self.commands.metrics()
    }

    // -- scene access ---------------------------------------------------------

    #[inline]
    pub fn element(&self, id: EntityId) -> Option<&Entity> {
        self.elements.get(&id)
    }

    /// Changes to the transform are pushed to the body before the next integration.
    #[inline]
    pub fn element_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.elements.get_mut(&id)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Entity> {
        self.elements.values()
    }

    #[inline]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    #[inline]
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Scene element or agent part with this id.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        find_entity(&self.elements, &self.agents, id)
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entity(id).is_some()
    }

    // -- teams ----------------------------------------------------------------

    /// Register a team, returning its category index.
    pub fn add_team(&mut self, name: &str) -> Result<u32> {
        let index = self.teams.add(name)?;
        self.refresh_filters()?;
        Ok(index)
    }

    /// Make an element a member of `team`.
    pub fn assign_team(&mut self, id: EntityId, team: &str) -> Result<()> {
        if !self.teams.contains(team) {
            return Err(Error::UnknownTeam(team.to_string()));
        }
        let entity = self.elements.get_mut(&id).ok_or(Error::NotInPlayground(id))?;
        entity.join_team(team);
        entity.refresh_filters(&self.teams)?;
        apply_filters(&mut self.physics, entity);
        Ok(())
    }

    /// Make every part of an agent a member of `team`.
    pub fn assign_agent_team(&mut self, id: AgentId, team: &str) -> Result<()> {
        if !self.teams.contains(team) {
            return Err(Error::UnknownTeam(team.to_string()));
        }
        let agent = self.agents.get_mut(&id).ok_or(Error::AgentNotInPlayground(id))?;
        agent.join_team(team);
        for part in agent.parts_mut() {
            part.entity_mut().refresh_filters(&self.teams)?;
            apply_filters(&mut self.physics, part.entity_mut());
        }
        Ok(())
    }

    /// Toggle one category bit in the masks of an entity's shapes.
    pub fn assign_shape_filter(&mut self, id: EntityId, category_index: u32) -> Result<()> {
        let entity = find_entity_mut(&mut self.elements, &mut self.agents, id).ok_or(Error::NotInPlayground(id))?;
        entity.assign_shape_filter(category_index)?;
        entity.refresh_filters(&self.teams)?;
        apply_filters(&mut self.physics, entity);
        Ok(())
    }

    /// Recompute every shape filter, after team or door changes.
    fn refresh_filters(&mut self) -> Result<()> {
        for entity in self.elements.values_mut() {
            entity.refresh_filters(&self.teams)?;
            apply_filters(&mut self.physics, entity);
        }
        for agent in self.agents.values_mut() {
            for part in agent.parts_mut() {
                part.entity_mut().refresh_filters(&self.teams)?;
                apply_filters(&mut self.physics, part.entity_mut());
            }
        }
        Ok(())
    }

    // -- entities -------------------------------------------------------------

    /// Add a scene element, placed at `coordinates` or at its own initial coordinates.
    ///
    /// Sampled coordinates are redrawn until the solid outline is clear of other solids.
    /// Anchored entities are placed on their anchor. On error nothing was added.
    pub fn add(&mut self, mut entity: Entity, coordinates: Option<InitialCoordinates>) -> Result<EntityId> {
        let id = entity.id();
        if self.contains(id) {
            return Err(Error::AlreadyAdded(id));
        }
        if let Some(coordinates) = coordinates {
            entity.set_initial_coordinates(coordinates);
        }

        let carrier = match entity.anchor() {
            Some(anchor) => {
                let (handle, transform) = self
                    .elements
                    .get(&anchor)
                    .and_then(|a| a.body_handle().map(|h| (h, *a.transform())))
                    .ok_or(Error::AnchorNotInPlayground { entity: id, anchor })?;
                entity.transform = transform;
                Some(handle)
            }
            None if entity.body().is_none() => {
                return Err(Error::InvalidOption(format!("{} has neither a body nor an anchor", entity.name())));
            }
            None => None,
        };

        entity.refresh_filters(&self.teams)?;
        let colliders = entity.build_colliders(&self.config)?;
        if carrier.is_none() {
            self.place_clear(&mut entity, &colliders)?;
        }

        let parent = match carrier {
            Some(handle) => handle,
            None => self.insert_body(&mut entity)?,
        };
        entity.transform_dirty = false;
        self.insert_colliders(&mut entity, colliders, parent, None);

        debug!("added {} ({id}) at {:?}", entity.name(), entity.coordinates());
        self.elements.insert(id, entity);
        Ok(id)
    }

    fn insert_body(&mut self, entity: &mut Entity) -> Result<RigidBodyHandle> {
        let body = entity
            .body()
            .map(|b| b.build(&entity.transform, &self.config, false))
            .ok_or_else(|| Error::InvalidOption(format!("{} has no body", entity.name())))?;
        let handle = self.physics.insert_body(body);
        if let Some(body) = entity.body_mut() {
            body.set_handle(Some(handle));
        }
        Ok(handle)
    }

    fn insert_colliders(
        &mut self,
        entity: &mut Entity,
        colliders: Vec<Collider>,
        parent: RigidBodyHandle,
        part: Option<(AgentId, PartId)>,
    ) {
        let id = entity.id();
        for (shape, collider) in entity.shapes_mut().iter_mut().zip(colliders) {
            let handle = self.physics.insert_collider(collider, parent);
            shape.handle = Some(handle);
            self.shapes.register(
                handle,
                ShapeOwner {
                    entity: id,
                    agent: part.map(|(agent, _)| agent),
                    part: part.map(|(_, part)| part),
                    role: shape.role(),
                    collision_type: shape.collision_type(),
                },
            );
        }
    }

    /// Resolve the entity's pose; sampled poses are redrawn while they overlap a solid.
    fn place_clear(&self, entity: &mut Entity, colliders: &[Collider]) -> Result<()> {
        entity.place()?;
        if !matches!(entity.initial_coordinates(), Some(InitialCoordinates::Sampler(_))) {
            return Ok(());
        }
        for _ in 1..MAX_PLACEMENT_ATTEMPTS {
            if !self.blocked(entity, colliders) {
                return Ok(());
            }
            entity.place()?;
        }
        if self.blocked(entity, colliders) {
            return Err(Error::InvalidCoordinates(format!(
                "no free spot for {} after {MAX_PLACEMENT_ATTEMPTS} samples",
                entity.name()
            )));
        }
        Ok(())
    }

    /// Whether the entity's solid shapes, at its current pose, overlap a solid in the world.
    fn blocked(&self, entity: &Entity, colliders: &[Collider]) -> bool {
        let pose = entity.transform().isometry();
        let others = self
            .elements
            .values()
            .chain(self.agents.values().flat_map(|a| a.parts().iter().map(|p| p.entity())));
        let solids: Vec<_> = entity
            .shapes()
            .iter()
            .zip(colliders)
            .filter(|(shape, _)| shape.role() == ShapeRole::Visible)
            .collect();

        others.into_iter().any(|other| {
            let other_pose = other.transform().isometry();
            other
                .shapes()
                .iter()
                .filter(|s| s.role() == ShapeRole::Visible)
                .any(|theirs| {
                    let Some(handle) = theirs.handle() else { return false };
                    solids.iter().any(|(ours, collider)| {
                        ours.filter().interacts_with(&theirs.filter())
                            && self.physics.shape_overlaps(collider.shape(), &pose, handle, &other_pose)
                    })
                })
        })
    }

    /// Remove a scene element and every entity anchored on it.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity> {
        if !self.elements.contains_key(&id) {
            return Err(Error::NotInPlayground(id));
        }
        let carried: Vec<EntityId> = self
            .elements
            .values()
            .filter(|e| e.anchor() == Some(id))
            .map(Entity::id)
            .collect();
        for child in carried {
            self.remove(child)?;
        }

        let mut entity = self.elements.remove(&id).ok_or(Error::NotInPlayground(id))?;
        for agent in self.agents.values_mut() {
            agent.drop_grasps_on(id);
        }
        for handle in self.shapes.unregister(id) {
            self.physics.remove_collider(handle);
        }
        if let Some(handle) = entity.body_handle() {
            self.physics.remove_body(handle);
        }
        entity.detach();
        debug!("removed {} ({id})", entity.name());
        Ok(entity)
    }

    /// Teleport a scene element. Entities anchored on it follow at the next step.
    pub fn move_entity(&mut self, id: EntityId, coordinates: Coordinates) -> Result<()> {
        if !coordinates.is_finite() {
            return Err(Error::InvalidCoordinates(format!("{coordinates:?}")));
        }
        let entity = self.elements.get_mut(&id).ok_or(Error::NotInPlayground(id))?;
        if let Some(anchor) = entity.anchor() {
            return Err(Error::InvalidOption(format!("{} follows entity {anchor}", entity.name())));
        }
        entity.set_coordinates(coordinates);
        push_transform(&mut self.physics, entity);
        Ok(())
    }

    /// Exact overlap of the solid outlines of two entities at their current poses.
    pub fn overlaps(&self, a: EntityId, b: EntityId) -> Result<bool> {
        let first = self.entity(a).ok_or(Error::NotInPlayground(a))?;
        let second = self.entity(b).ok_or(Error::NotInPlayground(b))?;
        let (pose1, pose2) = (first.transform().isometry(), second.transform().isometry());
        let solid = |e: &Entity| -> Vec<ColliderHandle> {
            e.shapes()
                .iter()
                .filter(|s| s.role() == ShapeRole::Visible)
                .filter_map(|s| s.handle())
                .collect()
        };
        let theirs = solid(second);
        Ok(solid(first).into_iter().any(|ours| {
            theirs
                .iter()
                .any(|t| self.physics.colliders_overlap(ours, &pose1, *t, &pose2))
        }))
    }

    // -- agents ---------------------------------------------------------------

    /// Add an agent with its bodies, sensors and joints. Its parts are locked from then on.
    pub fn add_agent(&mut self, mut agent: Agent, coordinates: Option<InitialCoordinates>) -> Result<AgentId> {
        let id = agent.id();
        if self.agents.contains_key(&id) {
            return Err(Error::AgentAlreadyAdded(id));
        }
        if let Some(coordinates) = coordinates {
            agent.set_initial_coordinates(coordinates);
        }
        for part in agent.parts_mut() {
            part.entity_mut().refresh_filters(&self.teams)?;
        }
        agent.place()?;
        let colliders = agent
            .parts()
            .iter()
            .map(|p| p.entity().build_colliders(&self.config))
            .collect::<Result<Vec<_>>>()?;

        let mut bodies = Vec::with_capacity(agent.parts().len());
        for part in agent.parts_mut() {
            let entity = part.entity_mut();
            let handle = if entity.body().is_some() {
                Some(self.insert_body(entity)?)
            } else {
                None
            };
            entity.transform_dirty = false;
            bodies.push(handle);
        }

        for (index, colliders) in colliders.into_iter().enumerate() {
            let part = &mut agent.parts_mut()[index];
            let carrier = match part.role() {
                PartRole::Sensor { anchor, .. } => bodies[anchor.0],
                PartRole::Base | PartRole::Limb(_) => bodies[index],
            };
            let Some(parent) = carrier else { continue };
            let owner = (id, part.id());
            self.insert_colliders(part.entity_mut(), colliders, parent, Some(owner));
        }

        for (index, part) in agent.parts_mut().iter_mut().enumerate() {
            if let PartRole::Limb(joint) = &mut part.role {
                if let (Some(anchor), Some(body)) = (bodies[joint.anchor.0], bodies[index]) {
                    joint.handle = Some(self.physics.add_revolute_joint(
                        anchor,
                        body,
                        joint.pivot_on_anchor,
                        joint.pivot_on_part,
                        joint.rest_angle,
                        self.config.motor_damping,
                    ));
                }
            }
        }

        agent.set_in_playground(true);
        debug!("added agent {} ({id}) with {} parts", agent.name(), agent.parts().len());
        self.agents.insert(id, agent);
        Ok(id)
    }

    /// Remove an agent, releasing its grasps. The agent can be modified and added again.
    pub fn remove_agent(&mut self, id: AgentId) -> Result<Agent> {
        let mut agent = self.agents.remove(&id).ok_or(Error::AgentNotInPlayground(id))?;
        agent.release_all(&mut self.physics);
        for part in agent.parts_mut() {
            for handle in self.shapes.unregister(part.entity().id()) {
                self.physics.remove_collider(handle);
            }
        }
        for part in agent.parts_mut() {
            if let Some(handle) = part.entity().body_handle() {
                self.physics.remove_body(handle);
            }
            if let PartRole::Limb(joint) = &mut part.role {
                joint.handle = None;
            }
            part.entity_mut().detach();
        }
        agent.set_in_playground(false);
        debug!("removed agent {} ({id})", agent.name());
        Ok(agent)
    }

    /// Kinematic move of a whole agent.
    pub fn move_agent(&mut self, id: AgentId, coordinates: Coordinates) -> Result<()> {
        if !coordinates.is_finite() {
            return Err(Error::InvalidCoordinates(format!("{coordinates:?}")));
        }
        let agent = self.agents.get_mut(&id).ok_or(Error::AgentNotInPlayground(id))?;
        agent.move_to(coordinates);
        for part in agent.parts_mut() {
            push_transform(&mut self.physics, part.entity_mut());
        }
        Ok(())
    }

    // -- stepping -------------------------------------------------------------

    pub fn step(&mut self) {
        for entity in self.elements.values_mut() {
            entity.pre_step();
        }
        for agent in self.agents.values_mut() {
            agent.pre_step();
        }
        sync_scene_to_physics(&mut self.physics, &mut self.elements, &mut self.agents);
        for agent in self.agents.values_mut() {
            agent.apply_commands(&mut self.physics, &self.config);
        }

        {
            let context = WorldContext::new(&mut self.elements, &mut self.agents, &self.teams, &mut self.commands);
            let hooks = DispatchHooks::new(&self.registry, &self.shapes, context);
            self.physics.step(&hooks);
            hooks.dispatch_resting(&self.physics);
        }

        sync_physics_to_scene(&self.physics, &mut self.elements, &mut self.agents);
        self.run_commands();

        for entity in self.elements.values_mut() {
            entity.post_step();
        }
        for agent in self.agents.values_mut() {
            agent.post_step();
        }
        self.steps += 1;
    }

    fn run_commands(&mut self) {
        for command in self.commands.drain() {
            debug!("step {}: {command:?}", self.steps);
            if let Err(err) = self.run_command(&command) {
                warn!("skipped {command:?}: {err}");
            }
        }
    }

    fn run_command(&mut self, command: &WorldCommand) -> Result<()> {
        match *command {
            WorldCommand::Grasp { agent, part, target } => self.grasp(agent, part, target),
            WorldCommand::Teleport { traveller, destination } => match traveller {
                Traveller::Agent(agent) => self.move_agent(agent, destination),
                Traveller::Entity(entity) => self.move_entity(entity, destination),
            },
            WorldCommand::SetDoor { door, open } => {
                let entity = self.elements.get_mut(&door).ok_or(Error::NotInPlayground(door))?;
                if let Behavior::Door { open: state, .. } = entity.behavior_mut() {
                    *state = open;
                }
                entity.refresh_filters(&self.teams)?;
                apply_filters(&mut self.physics, entity);
                Ok(())
            }
            WorldCommand::Dispense { dispenser } => self.dispense(dispenser),
            WorldCommand::OpenChest { chest } => self.open_chest(chest),
        }
    }

    fn grasp(&mut self, agent_id: AgentId, part: PartId, target: EntityId) -> Result<()> {
        let target_body = self
            .elements
            .get(&target)
            .and_then(Entity::body_handle)
            .ok_or(Error::NotInPlayground(target))?;
        let agent = self.agents.get_mut(&agent_id).ok_or(Error::AgentNotInPlayground(agent_id))?;
        let carrier = agent
            .part(part)?
            .anchor()
            .and_then(|anchor| agent.part(anchor).ok())
            .and_then(|anchor| anchor.entity().body_handle())
            .ok_or(Error::UnknownPart(part.0))?;

        let grasper = agent.part_mut(part)?;
        if grasper.grasp.is_some() {
            return Ok(());
        }
        let joint = self
            .physics
            .add_fixed_joint(carrier, target_body)
            .ok_or(Error::NotInPlayground(target))?;
        grasper.grasp = Some(Grasp { target, joint });
        Ok(())
    }

    fn dispense(&mut self, id: EntityId) -> Result<()> {
        let dispenser = self.elements.get_mut(&id).ok_or(Error::NotInPlayground(id))?;
        let origin = dispenser.coordinates();
        let reach = dispenser.contour().bounding_radius();
        let Behavior::Dispenser {
            template,
            sampler,
            limit,
            produced,
        } = dispenser.behavior_mut()
        else {
            return Ok(());
        };
        if *produced >= *limit {
            return Ok(());
        }
        *produced += 1;
        let options = (**template).clone();
        let coordinates = match sampler {
            Some(sampler) => sampler.sample(),
            None => {
                let offset = reach + options.contour()?.bounding_radius() + 1.0;
                Coordinates {
                    position: origin.position + Rotation2::new(origin.angle) * Vector2::new(offset, 0.0),
                    angle: origin.angle,
                }
            }
        };

        let mut entity = Entity::physical(&mut self.ids, &options)?;
        entity.mark_temporary();
        self.add(entity, Some(InitialCoordinates::fixed(coordinates)?))?;
        Ok(())
    }

    fn open_chest(&mut self, id: EntityId) -> Result<()> {
        let chest = self.elements.get(&id).ok_or(Error::NotInPlayground(id))?;
        let Behavior::Chest { key, treasure, .. } = chest.behavior() else {
            return Ok(());
        };
        let (key, treasure, coordinates) = (*key, (**treasure).clone(), chest.coordinates());

        let chest = self.remove(id)?;
        self.disappeared.push(chest);
        if self.elements.contains_key(&key) {
            let key = self.remove(key)?;
            self.disappeared.push(key);
        }

        let mut treasure = Entity::physical(&mut self.ids, &treasure)?;
        treasure.mark_temporary();
        self.add(treasure, Some(InitialCoordinates::fixed(coordinates)?))?;
        Ok(())
    }

    // -- episode --------------------------------------------------------------

    /// Back to the starting state: temporary entities removed, removed entities restored,
    /// grasps released, every entity and agent reset.
    pub fn reset(&mut self) -> Result<()> {
        self.commands.clear();
        for agent in self.agents.values_mut() {
            agent.release_all(&mut self.physics);
        }

        let temporary: Vec<EntityId> = self
            .elements
            .values()
            .filter(|e| e.is_temporary())
            .map(Entity::id)
            .collect();
        for id in temporary {
            if self.elements.contains_key(&id) {
                self.remove(id)?;
            }
        }
        for entity in std::mem::take(&mut self.disappeared) {
            self.add(entity, None)?;
        }

        for entity in self.elements.values_mut() {
            entity.reset()?;
        }
        for agent in self.agents.values_mut() {
            agent.reset()?;
        }
        self.refresh_filters()?;
        sync_scene_to_physics(&mut self.physics, &mut self.elements, &mut self.agents);
        for agent in self.agents.values_mut() {
            agent.follow_sensor_anchors();
        }

        self.steps = 0;
        debug!(
            "reset: {} elements, {} agents",
            self.elements.len(),
            self.agents.len()
        );
        Ok(())
    }

    /// Draw every element, then every agent.
    pub fn draw(&mut self, surface: &mut dyn Surface, draw_invisible: bool, force_recompute: bool) {
        for entity in self.elements.values_mut() {
            entity.draw(surface, draw_invisible, force_recompute);
        }
        for agent in self.agents.values_mut() {
            agent.draw(surface, draw_invisible, force_recompute);
        }
    }
}

/// Push an entity's shape filters to its colliders.
fn apply_filters(physics: &mut PhysicsWorld, entity: &Entity) {
    for shape in entity.shapes() {
        if let Some(handle) = shape.handle() {
            physics.set_collision_groups(handle, shape.filter().groups());
        }
    }
}

fn find_entity<'a>(
    elements: &'a BTreeMap<EntityId, Entity>,
    agents: &'a BTreeMap<AgentId, Agent>,
    id: EntityId,
) -> Option<&'a Entity> {
    elements.get(&id).or_else(|| {
        agents
            .values()
            .flat_map(|a| a.parts())
            .map(|p| p.entity())
            .find(|e| e.id() == id)
    })
}

fn find_entity_mut<'a>(
    elements: &'a mut BTreeMap<EntityId, Entity>,
    agents: &'a mut BTreeMap<AgentId, Agent>,
    id: EntityId,
) -> Option<&'a mut Entity> {
    if let Some(entity) = elements.get_mut(&id) {
        return Some(entity);
    }
    agents
        .values_mut()
        .flat_map(|a| a.parts_mut().iter_mut())
        .map(|p| p.entity_mut())
        .find(|e| e.id() == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{
        BaseOptions, CommandValue, ControllerClass, LimbOptions, PartId, SensorKind, ACTIVATE, FORWARD, GRASP, ROTATION,
    };
    use crate::appearance::CountingSurface;
    use crate::coordinates::{Area, AreaSampler};
    use crate::elements;
    use crate::entity::EntityOptions;
    use anyhow::Context;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn playground() -> Playground {
        init_logger();
        Playground::new(PlaygroundConfig::default())
    }

    fn at(x: f64, y: f64) -> Option<InitialCoordinates> {
        Some(Coordinates::new(x, y, 0.0).into())
    }

    fn add_ball(pg: &mut Playground, options: EntityOptions, x: f64, y: f64) -> anyhow::Result<EntityId> {
        let entity = Entity::physical(pg.ids(), &options)?;
        Ok(pg.add(entity, at(x, y))?)
    }

    fn position(pg: &Playground, id: EntityId) -> Vector2<f64> {
        pg.element(id).map(Entity::position).unwrap_or_else(Vector2::zeros)
    }

    fn agent_with(pg: &mut Playground, sensor: Option<SensorKind>) -> anyhow::Result<(AgentId, Option<PartId>)> {
        let mut agent = Agent::new(pg.ids(), &BaseOptions::default())?;
        let sensor = match sensor {
            Some(kind) => Some(agent.add_sensor(pg.ids(), Agent::BASE, kind, 10.0)?),
            None => None,
        };
        Ok((pg.add_agent(agent, at(0.0, 0.0))?, sensor))
    }

    fn counts(pg: &Playground) -> (usize, usize, usize, usize) {
        (
            pg.physics().body_count(),
            pg.physics().collider_count(),
            pg.physics().joint_count(),
            pg.shape_map().len(),
        )
    }

    #[test]
    fn untouched_entities_do_not_drift() -> anyhow::Result<()> {
        let mut pg = playground();
        let resting = add_ball(&mut pg, EntityOptions::circle(10.0).movable(1.0), 0.0, 0.0)?;
        let moving = add_ball(&mut pg, EntityOptions::circle(10.0).movable(1.0), 0.0, 100.0)?;
        pg.element_mut(moving).context("moving ball")?.set_velocity(Vector2::new(30.0, 0.0), 0.0);

        let mut alone = playground();
        let reference = add_ball(&mut alone, EntityOptions::circle(10.0).movable(1.0), 0.0, 100.0)?;
        alone.element_mut(reference).context("reference ball")?.set_velocity(Vector2::new(30.0, 0.0), 0.0);

        for _ in 0..120 {
            pg.step();
            alone.step();
        }
        assert_eq!(position(&pg, resting), Vector2::zeros());
        assert_eq!(pg.element(resting).context("resting")?.angle(), 0.0);
        assert!((position(&pg, moving) - position(&alone, reference)).norm() < 1e-9);
        assert!((position(&pg, moving).x - 60.0).abs() < 1e-6);
        assert_eq!(position(&pg, moving).y, 100.0);
        Ok(())
    }

    #[test]
    fn add_then_remove_restores_the_world() -> anyhow::Result<()> {
        let mut pg = playground();
        add_ball(&mut pg, EntityOptions::circle(5.0), 50.0, 50.0)?;
        let before = counts(&pg);

        let options = EntityOptions {
            graspable: true,
            ..EntityOptions::circle(8.0).movable(2.0)
        };
        let trigger = elements::trigger(pg.ids(), &options)?;
        let halo = elements::halo(pg.ids(), &trigger, 6.0)?;
        let trigger = pg.add(trigger, at(0.0, 0.0))?;
        let halo = pg.add(halo, None)?;
        assert_eq!(pg.shape_map().colliders_of(trigger).len(), 3);
        assert_ne!(counts(&pg), before);

        pg.remove(trigger)?;
        assert!(!pg.contains(halo));
        assert_eq!(counts(&pg), before);

        let err = pg.remove(trigger).unwrap_err();
        assert!(err.is_lifecycle());

        let (agent, _) = {
            let mut agent = Agent::new(pg.ids(), &BaseOptions::default())?;
            let limb = agent.add_limb(pg.ids(), Agent::BASE, &LimbOptions::default())?;
            agent.add_sensor(pg.ids(), limb, SensorKind::Grasper, 4.0)?;
            (pg.add_agent(agent, at(-100.0, 0.0))?, limb)
        };
        assert_eq!(pg.physics().joint_count(), before.2 + 1);
        let agent = pg.remove_agent(agent)?;
        assert!(!agent.in_playground());
        assert_eq!(counts(&pg), before);
        Ok(())
    }

    #[test]
    fn failed_adds_leave_the_world_unchanged() -> anyhow::Result<()> {
        let mut pg = playground();
        let anchor = Entity::physical(pg.ids(), &EntityOptions::circle(5.0))?;
        let halo = elements::halo(pg.ids(), &anchor, 3.0)?;
        let before = counts(&pg);

        let err = pg.add(halo, None).unwrap_err();
        assert!(matches!(err, Error::AnchorNotInPlayground { .. }));

        let stranger = Entity::physical(
            pg.ids(),
            &EntityOptions {
                teams: vec!["red".into()],
                ..EntityOptions::circle(5.0)
            },
        )?;
        assert!(matches!(pg.add(stranger, at(0.0, 0.0)), Err(Error::UnknownTeam(_))));

        let nowhere = Entity::physical(pg.ids(), &EntityOptions::circle(5.0))?;
        assert!(matches!(pg.add(nowhere, None), Err(Error::InvalidCoordinates(_))));

        let id = pg.add(anchor, at(0.0, 0.0))?;
        // a second allocator hands out the same ids
        let again = Entity::physical(&mut IdAllocator::new(), &EntityOptions::circle(5.0))?;
        assert_eq!(again.id(), id);
        assert!(matches!(pg.add(again, at(9.0, 9.0)), Err(Error::AlreadyAdded(_))));
        assert_eq!(counts(&pg).0, before.0 + 1);
        Ok(())
    }

    #[test]
    fn sampled_placement_avoids_solids() -> anyhow::Result<()> {
        let mut pg = playground();
        let wall = Entity::physical(pg.ids(), &EntityOptions::rectangle(40.0, 100.0))?;
        let wall = pg.add(wall, at(-20.0, 0.0))?;

        let area = Area::Rectangle {
            center: [0.0, 0.0],
            width: 80.0,
            height: 80.0,
        };
        for seed in 0..5 {
            let sampler = AreaSampler::new(area, Some(0.0), seed)?;
            let ball = Entity::physical(pg.ids(), &EntityOptions::circle(2.0).movable(1.0))?;
            let ball = pg.add(ball, Some(InitialCoordinates::Sampler(Box::new(sampler))))?;
            assert!(!pg.overlaps(ball, wall)?);
            assert!(position(&pg, ball).x > 0.0);
        }
        Ok(())
    }

    #[test]
    fn traversable_pairs_never_collide() -> anyhow::Result<()> {
        let mut pg = playground();
        let traversable = |pg: &mut Playground, x: f64| {
            let options = EntityOptions {
                traversable: true,
                ..EntityOptions::circle(10.0).movable(1.0)
            };
            add_ball(pg, options, x, 0.0)
        };
        let solid = |pg: &mut Playground, x: f64, y: f64| add_ball(pg, EntityOptions::circle(10.0).movable(1.0), x, y);

        let t1 = traversable(&mut pg, 0.0)?;
        let t2 = traversable(&mut pg, 5.0)?;
        let t3 = traversable(&mut pg, 200.0)?;
        let s1 = solid(&mut pg, 205.0, 0.0)?;
        let s2 = solid(&mut pg, 400.0, 0.0)?;
        let s3 = solid(&mut pg, 405.0, 0.0)?;
        assert!(pg.overlaps(t1, t2)?);

        for _ in 0..5 {
            pg.step();
        }
        assert_eq!(position(&pg, t1), Vector2::new(0.0, 0.0));
        assert_eq!(position(&pg, t2), Vector2::new(5.0, 0.0));
        assert_eq!(position(&pg, t3), Vector2::new(200.0, 0.0));
        assert_eq!(position(&pg, s1), Vector2::new(205.0, 0.0));
        assert!(position(&pg, s2).x < 400.0);
        assert!(position(&pg, s3).x > 405.0);
        Ok(())
    }

    #[test]
    fn joint_stays_within_its_range() -> anyhow::Result<()> {
        let mut pg = playground();
        let mut agent = Agent::new(pg.ids(), &BaseOptions::default())?;
        let range = FRAC_PI_2;
        let limb = agent.add_limb(
            pg.ids(),
            Agent::BASE,
            &LimbOptions {
                rotation_range: range,
                ..LimbOptions::default()
            },
        )?;
        let id = pg.add_agent(agent, at(0.0, 0.0))?;

        for command in [1.0, -1.0] {
            pg.agent_mut(id).context("agent")?.set_command(limb, ROTATION, command)?;
            let mut furthest = 0.0f64;
            for _ in 0..1000 {
                pg.step();
                let relative = pg.agent(id).context("agent")?.relative_angle(limb)?;
                assert!(relative.abs() <= range / 2.0, "relative angle {relative} out of range");
                furthest = furthest.max(relative.abs());
            }
            let gate = range / 2.0 - pg.config().joint_limit_margin;
            assert!(furthest >= gate - 0.02, "limb stalled at {furthest}, gate at {gate}");
        }
        Ok(())
    }

    #[test]
    fn move_agent_places_parts_on_their_pivots() -> anyhow::Result<()> {
        let mut pg = playground();
        let mut agent = Agent::new(pg.ids(), &BaseOptions::default())?;
        let arm = agent.add_limb(
            pg.ids(),
            Agent::BASE,
            &LimbOptions {
                pivot_on_part: [10.0, 10.0],
                pivot_on_anchor: [10.0, -10.0],
                ..LimbOptions::default()
            },
        )?;
        let hand = agent.add_limb(
            pg.ids(),
            arm,
            &LimbOptions {
                rest_angle: 0.4,
                ..LimbOptions::default()
            },
        )?;
        let id = pg.add_agent(agent, at(0.0, 0.0))?;

        let agent = pg.agent(id).context("agent")?;
        let part = agent.part(arm)?.entity().position();
        assert!((part - Vector2::new(0.0, -20.0)).norm() < 1e-9);

        for coordinates in [Coordinates::new(5.0, 0.0, PI / 2.0), Coordinates::new(-30.0, 12.0, -2.5)] {
            pg.move_agent(id, coordinates)?;
            let agent = pg.agent(id).context("agent")?;
            for limb in [arm, hand] {
                let part = agent.part(limb)?;
                let joint = part.joint().context("joint")?;
                let anchor = agent.part(joint.anchor())?.entity();
                let angle = anchor.angle() + joint.rest_angle();
                let expected = anchor.position() + Rotation2::new(anchor.angle()) * joint.pivot_on_anchor()
                    - Rotation2::new(angle) * joint.pivot_on_part();
                assert!((part.entity().position() - expected).norm() < 1e-9);
                assert!((part.entity().angle() - angle).abs() < 1e-9);
            }
        }
        let arm_pose = pg.agent(id).context("agent")?.part(arm)?.entity().position();
        assert!((arm_pose - Vector2::new(-30.0, 12.0)).norm() > 1.0);
        Ok(())
    }

    #[test]
    fn trigger_activation_lasts_one_step() -> anyhow::Result<()> {
        let mut pg = playground();
        let options = EntityOptions {
            interaction_range: Some(10.0),
            ..EntityOptions::circle(10.0).movable(1.0)
        };
        let trigger = elements::trigger(pg.ids(), &options)?;
        let triggered = elements::triggered(pg.ids(), &options)?;
        let trigger = pg.add(trigger, at(0.0, 0.0))?;
        let triggered = pg.add(triggered, at(25.0, 0.0))?;

        pg.step();
        assert!(pg.element(trigger).context("trigger")?.activated());
        assert!(pg.element(triggered).context("triggered")?.activated());

        pg.move_entity(triggered, Coordinates::new(300.0, 0.0, 0.0))?;
        pg.step();
        assert!(!pg.element(trigger).context("trigger")?.activated());
        assert!(!pg.element(triggered).context("triggered")?.activated());
        Ok(())
    }

    #[test]
    fn static_triggers_stay_activated_while_overlapping() -> anyhow::Result<()> {
        let mut pg = playground();
        let options = EntityOptions {
            interaction_range: Some(10.0),
            ..EntityOptions::circle(10.0)
        };
        let trigger = elements::trigger(pg.ids(), &options)?;
        let triggered = elements::triggered(pg.ids(), &options)?;
        let trigger = pg.add(trigger, at(0.0, 0.0))?;
        let triggered = pg.add(triggered, at(25.0, 0.0))?;

        for step in 0..4 {
            pg.step();
            assert!(pg.element(trigger).context("trigger")?.activated(), "trigger idle at step {step}");
            assert!(pg.element(triggered).context("triggered")?.activated(), "triggered idle at step {step}");
        }
        Ok(())
    }

    #[test]
    fn barriers_only_let_their_team_through() -> anyhow::Result<()> {
        let mut pg = playground();
        pg.add_team("red")?;
        pg.add_team("blue")?;
        let barrier = elements::barrier(pg.ids(), &EntityOptions::rectangle(10.0, 200.0), &["red"])?;
        pg.add(barrier, at(0.0, 0.0))?;

        let ball = |team: Option<&str>| EntityOptions {
            teams: team.map(|t| vec![t.to_string()]).unwrap_or_default(),
            ..EntityOptions::circle(5.0).movable(1.0)
        };
        let red = add_ball(&mut pg, ball(Some("red")), -8.0, -60.0)?;
        let neutral = add_ball(&mut pg, ball(None), -8.0, 0.0)?;
        let blue = add_ball(&mut pg, ball(None), -8.0, 60.0)?;
        pg.assign_team(blue, "blue")?;
        assert!(pg.assign_team(blue, "green").is_err());

        for _ in 0..5 {
            pg.step();
        }
        assert_eq!(position(&pg, red), Vector2::new(-8.0, -60.0));
        assert_eq!(position(&pg, neutral), Vector2::new(-8.0, 0.0));
        assert!((position(&pg, blue) - Vector2::new(-8.0, 60.0)).norm() > 1e-6);
        Ok(())
    }

    #[test]
    fn shape_filter_toggle_disables_collisions() -> anyhow::Result<()> {
        let mut pg = playground();
        let a = add_ball(&mut pg, EntityOptions::circle(10.0).movable(1.0), 0.0, 0.0)?;
        let b = add_ball(&mut pg, EntityOptions::circle(10.0).movable(1.0), 5.0, 0.0)?;
        // drop DEFAULT from a's mask: the two solids stop colliding
        pg.assign_shape_filter(a, 0)?;
        pg.step();
        assert_eq!(position(&pg, a), Vector2::new(0.0, 0.0));
        assert_eq!(position(&pg, b), Vector2::new(5.0, 0.0));

        pg.assign_shape_filter(a, 0)?;
        for _ in 0..5 {
            pg.step();
        }
        assert!(position(&pg, a).x < 0.0);
        assert!(pg.assign_shape_filter(EntityId(999), 0).is_err());
        Ok(())
    }

    #[test]
    fn grasping_carries_and_releases() -> anyhow::Result<()> {
        let mut pg = playground();
        let (agent, grasper) = agent_with(&mut pg, Some(SensorKind::Grasper))?;
        let grasper = grasper.context("grasper")?;
        let options = EntityOptions {
            graspable: true,
            ..EntityOptions::circle(5.0).movable(1.0)
        };
        let ball = add_ball(&mut pg, options, 22.0, 0.0)?;
        let joints = pg.physics().joint_count();

        pg.step();
        assert_eq!(pg.agent(agent).context("agent")?.part(grasper)?.grasped(), None);

        pg.agent_mut(agent).context("agent")?.set_command(grasper, GRASP, true)?;
        pg.step();
        assert_eq!(pg.agent(agent).context("agent")?.part(grasper)?.grasped(), Some(ball));
        assert_eq!(pg.physics().joint_count(), joints + 1);

        pg.agent_mut(agent).context("agent")?.set_command(Agent::BASE, FORWARD, 1.0)?;
        for _ in 0..60 {
            pg.step();
        }
        let carrier = pg.agent(agent).context("agent")?.position();
        assert!(carrier.x > 1.0);
        assert!(((position(&pg, ball) - carrier).norm() - 22.0).abs() < 0.5);

        pg.agent_mut(agent).context("agent")?.set_command(grasper, GRASP, false)?;
        pg.step();
        assert_eq!(pg.agent(agent).context("agent")?.part(grasper)?.grasped(), None);
        assert_eq!(pg.physics().joint_count(), joints);

        pg.agent_mut(agent).context("agent")?.set_command(grasper, GRASP, true)?;
        pg.step();
        pg.remove(ball)?;
        assert_eq!(pg.agent(agent).context("agent")?.part(grasper)?.grasped(), None);
        assert_eq!(pg.physics().joint_count(), joints);
        Ok(())
    }

    #[test]
    fn each_grasper_answers_to_its_own_command() -> anyhow::Result<()> {
        let mut pg = playground();
        let mut agent = Agent::new(pg.ids(), &BaseOptions::default())?;
        let holding = agent.add_sensor(pg.ids(), Agent::BASE, SensorKind::Grasper, 10.0)?;
        let idle = agent.add_sensor(pg.ids(), Agent::BASE, SensorKind::Grasper, 10.0)?;
        let agent = pg.add_agent(agent, at(0.0, 0.0))?;
        let options = EntityOptions {
            graspable: true,
            ..EntityOptions::circle(5.0).movable(1.0)
        };
        let ball = add_ball(&mut pg, options, 22.0, 0.0)?;

        pg.agent_mut(agent).context("agent")?.set_command(holding, GRASP, true)?;
        for _ in 0..5 {
            pg.step();
        }
        let agent_ref = pg.agent(agent).context("agent")?;
        assert_eq!(agent_ref.part(holding)?.grasped(), Some(ball));
        assert_eq!(agent_ref.part(idle)?.grasped(), None);
        Ok(())
    }

    #[test]
    fn disablers_neutralise_matching_controllers() -> anyhow::Result<()> {
        let mut pg = playground();
        let (agent, grasper) = agent_with(&mut pg, Some(SensorKind::Grasper))?;
        let grasper = grasper.context("grasper")?;
        let options = EntityOptions {
            graspable: true,
            ..EntityOptions::circle(5.0).movable(1.0)
        };
        let ball = add_ball(&mut pg, options, -22.0, 0.0)?;
        let disabler =
            elements::controller_disabler(pg.ids(), &EntityOptions::circle(10.0), Some(ControllerClass::Boolean))?;
        let disabler = pg.add(disabler, at(22.0, 0.0))?;

        pg.step();
        pg.agent_mut(agent).context("agent")?.set_command(grasper, GRASP, true)?;
        for _ in 0..3 {
            pg.step();
            let agent_ref = pg.agent(agent).context("agent")?;
            assert!(agent_ref.is_disabled(grasper, GRASP)?);
            assert!(!agent_ref.is_disabled(Agent::BASE, FORWARD)?);
            assert_eq!(agent_ref.part(grasper)?.grasped(), None);
        }

        pg.remove(disabler)?;
        pg.step();
        pg.step();
        let agent_ref = pg.agent(agent).context("agent")?;
        assert!(!agent_ref.is_disabled(grasper, GRASP)?);
        assert_eq!(agent_ref.part(grasper)?.grasped(), Some(ball));

        let disabler = elements::controller_disabler(pg.ids(), &EntityOptions::circle(10.0), None)?;
        pg.add(disabler, at(0.0, 22.0))?;
        pg.step();
        pg.step();
        assert!(pg.agent(agent).context("agent")?.is_disabled(Agent::BASE, FORWARD)?);
        Ok(())
    }

    #[test]
    fn reward_zones_pay_from_their_budget() -> anyhow::Result<()> {
        let mut pg = playground();
        let (agent, _) = agent_with(&mut pg, None)?;
        let zone = elements::reward_zone(pg.ids(), &EntityOptions::circle(30.0), 1.0, Some(2.5), false)?;
        pg.add(zone, at(0.0, 0.0))?;

        for _ in 0..5 {
            pg.step();
        }
        let agent_ref = pg.agent_mut(agent).context("agent")?;
        assert!((agent_ref.take_reward() - 2.5).abs() < 1e-12);
        assert_eq!(agent_ref.reward(), 0.0);
        assert!(!agent_ref.done());

        pg.reset()?;
        pg.step();
        assert!((pg.agent(agent).context("agent")?.reward() - 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn agents_are_paid_once_whatever_parts_touch_the_zone() -> anyhow::Result<()> {
        let mut pg = playground();
        let mut agent = Agent::new(pg.ids(), &BaseOptions::default())?;
        agent.add_limb(pg.ids(), Agent::BASE, &LimbOptions::default())?;
        let agent = pg.add_agent(agent, at(0.0, 0.0))?;
        let zone = elements::reward_zone(pg.ids(), &EntityOptions::circle(30.0), 1.0, None, false)?;
        pg.add(zone, at(0.0, 0.0))?;

        pg.step();
        assert!((pg.agent(agent).context("agent")?.reward() - 1.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn end_zone_terminates_the_agent() -> anyhow::Result<()> {
        let mut pg = playground();
        let (agent, _) = agent_with(&mut pg, None)?;
        let goal = elements::reward_zone(pg.ids(), &EntityOptions::rectangle(20.0, 20.0), -1.0, None, true)?;
        pg.add(goal, at(15.0, 0.0))?;

        pg.step();
        let agent_ref = pg.agent(agent).context("agent")?;
        assert!(agent_ref.done());
        assert_eq!(agent_ref.reward(), -1.0);

        pg.reset()?;
        assert!(!pg.agent(agent).context("agent")?.done());
        Ok(())
    }

    #[test]
    fn teleports_move_agents_and_entities() -> anyhow::Result<()> {
        let mut pg = playground();
        let destination = Coordinates::new(300.0, 0.0, 1.0);
        let portal = elements::teleport(pg.ids(), &EntityOptions::circle(15.0), destination)?;
        pg.add(portal, at(100.0, 0.0))?;
        let ball = add_ball(&mut pg, EntityOptions::circle(5.0).movable(1.0), 100.0, 0.0)?;
        let (agent, _) = agent_with(&mut pg, None)?;

        pg.step();
        assert_eq!(pg.element(ball).context("ball")?.coordinates(), destination);
        assert_eq!(pg.agent(agent).context("agent")?.position(), Vector2::new(0.0, 0.0));

        pg.move_agent(agent, Coordinates::new(100.0, 0.0, 0.0))?;
        pg.move_entity(ball, Coordinates::new(-200.0, 0.0, 0.0))?;
        pg.step();
        assert_eq!(pg.agent(agent).context("agent")?.position(), destination.position);
        Ok(())
    }

    #[test]
    fn switch_toggles_its_door_with_cooldown() -> anyhow::Result<()> {
        let mut pg = playground();
        let (agent, activator) = agent_with(&mut pg, Some(SensorKind::Activator))?;
        let activator = activator.context("activator")?;
        let (switch, door) = elements::switch_and_door(
            pg.ids(),
            &EntityOptions::circle(5.0),
            &EntityOptions::rectangle(40.0, 4.0),
        )?;
        pg.add(switch, at(22.0, 0.0))?;
        let door = pg.add(door, at(100.0, 0.0))?;
        let is_open = |pg: &Playground| matches!(pg.element(door).map(Entity::behavior), Some(Behavior::Door { open: true, .. }));

        pg.step();
        assert!(!is_open(&pg));

        pg.agent_mut(agent).context("agent")?.set_command(activator, ACTIVATE, true)?;
        pg.step();
        assert!(is_open(&pg));
        let visible = pg.element(door).context("door")?.shape(ShapeRole::Visible).context("shape")?;
        assert_eq!(visible.filter().categories, 0);

        for _ in 0..crate::entity::ACTIVATION_COOLDOWN - 1 {
            pg.step();
        }
        assert!(is_open(&pg));
        pg.step();
        assert!(!is_open(&pg));

        pg.agent_mut(agent).context("agent")?.set_command(activator, ACTIVATE, false)?;
        for _ in 0..crate::entity::ACTIVATION_COOLDOWN {
            pg.step();
        }
        pg.agent_mut(agent).context("agent")?.set_command(activator, ACTIVATE, true)?;
        pg.step();
        assert!(is_open(&pg));
        pg.reset()?;
        assert!(!is_open(&pg));
        assert_eq!(
            pg.agent(agent).context("agent")?.command(activator, ACTIVATE)?,
            CommandValue::Boolean(false)
        );
        Ok(())
    }

    #[test]
    fn key_opens_its_chest() -> anyhow::Result<()> {
        let mut pg = playground();
        let (chest, key) = elements::chest_and_key(
            pg.ids(),
            &EntityOptions::circle(10.0),
            &EntityOptions::circle(3.0).movable(1.0),
            EntityOptions::shaped(crate::contour::PhysicalShape::Pentagon, 6.0),
        )?;
        let chest = pg.add(chest, at(0.0, 0.0))?;
        let key = pg.add(key, at(100.0, 0.0))?;

        pg.step();
        assert!(pg.contains(chest));

        pg.move_entity(key, Coordinates::new(14.0, 0.0, 0.0))?;
        pg.step();
        assert!(!pg.contains(chest));
        assert!(!pg.contains(key));
        let treasure: Vec<_> = pg.elements().filter(|e| e.is_temporary()).collect();
        assert_eq!(treasure.len(), 1);
        assert_eq!(treasure[0].position(), Vector2::new(0.0, 0.0));

        pg.reset()?;
        assert!(pg.contains(chest));
        assert!(pg.contains(key));
        assert_eq!(position(&pg, key), Vector2::new(100.0, 0.0));
        assert_eq!(pg.elements().filter(|e| e.is_temporary()).count(), 0);
        assert!(matches!(
            pg.element(chest).map(Entity::behavior),
            Some(Behavior::Chest { opened: false, .. })
        ));
        Ok(())
    }

    #[test]
    fn dispenser_produces_up_to_its_limit() -> anyhow::Result<()> {
        let mut pg = playground();
        let (agent, activator) = agent_with(&mut pg, Some(SensorKind::Activator))?;
        let activator = activator.context("activator")?;
        let area = Area::Circle {
            center: [-200.0, 0.0],
            radius: 30.0,
        };
        let dispenser = elements::dispenser(
            pg.ids(),
            &EntityOptions::circle(5.0),
            EntityOptions::circle(2.0).movable(1.0),
            Some(area),
            2,
            7,
        )?;
        pg.add(dispenser, at(22.0, 0.0))?;
        pg.agent_mut(agent).context("agent")?.set_command(activator, ACTIVATE, true)?;

        let produced = |pg: &Playground| pg.elements().filter(|e| e.is_temporary()).count();
        pg.step();
        assert_eq!(produced(&pg), 1);
        for _ in 0..40 {
            pg.step();
        }
        assert_eq!(produced(&pg), 2);
        for made in pg.elements().filter(|e| e.is_temporary()) {
            assert!((made.position() - Vector2::new(-200.0, 0.0)).norm() < 40.0);
        }

        pg.reset()?;
        assert_eq!(produced(&pg), 0);
        Ok(())
    }

    #[test]
    fn draw_visits_elements_and_agents() -> anyhow::Result<()> {
        let mut pg = playground();
        let (_agent, _) = agent_with(&mut pg, Some(SensorKind::Grasper))?;
        let zone = elements::reward_zone(pg.ids(), &EntityOptions::circle(5.0), 1.0, None, false)?;
        pg.add(zone, at(100.0, 100.0))?;

        let mut surface = CountingSurface::default();
        pg.draw(&mut surface, true, false);
        assert_eq!(surface.visible, 1);
        assert_eq!(surface.invisible, 2);

        pg.draw(&mut surface, true, false);
        assert_eq!(surface.visible, 1);
        pg.step();
        pg.draw(&mut surface, false, false);
        assert_eq!(surface.visible, 2);
        Ok(())
    }
}
