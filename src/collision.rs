// src/collision.rs
//! Collision dispatch.
//!
//! Every shape carries a [`CollisionType`]. The [`CollisionRegistry`] maps ordered pairs of
//! types to handlers, and [`DispatchHooks`] plugs the registry into rapier's pair filtering
//! so handlers run synchronously inside the physics step with an explicit [`WorldContext`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use log::trace;
use parking_lot::Mutex;
use rapier2d::parry::query;
use rapier2d::prelude::*;

use crate::agent::{Agent, AgentId};
use crate::command_buffer::{CommandBuffer, WorldCommand};
use crate::entity::{Entity, EntityId};
use crate::filter::TeamTable;
use crate::handlers;
use crate::physics::PhysicsWorld;
use crate::physics_integration::{ShapeMap, ShapeOwner};

/// Logical interaction class of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollisionType {
    /// Plain solid.
    Default,
    /// Solid part of an agent.
    Agent,
    Grasper,
    Graspable,
    Activator,
    Activable,
    Trigger,
    Triggered,
    Teleport,
    RewardZone,
    Key,
    Chest,
    Barrier,
    ControllerDisabler,
}

/// Reaction to a colliding pair. Returning `false` turns a solid contact into a sensor-only one.
pub type Handler = fn(&mut WorldContext<'_>, ShapeOwner, ShapeOwner) -> bool;

/// Ordered `(type, type)` to handler map. Built with the playground, read-only while stepping.
#[derive(Clone, Default)]
pub struct CollisionRegistry {
    handlers: HashMap<(CollisionType, CollisionType), Handler>,
}

impl fmt::Debug for CollisionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pairs: Vec<_> = self.handlers.keys().collect();
        pairs.sort();
        f.debug_struct("CollisionRegistry").field("pairs", &pairs).finish()
    }
}

impl CollisionRegistry {
    /// Registry without any handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in scene-element interactions.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        handlers::register_defaults(&mut registry);
        registry
    }

    /// Register `handler` for `(first, second)`, returning the one it replaces.
    pub fn register(&mut self, first: CollisionType, second: CollisionType, handler: Handler) -> Option<Handler> {
        self.handlers.insert((first, second), handler)
    }

    pub fn unregister(&mut self, first: CollisionType, second: CollisionType) -> Option<Handler> {
        self.handlers.remove(&(first, second))
    }

    pub fn contains(&self, first: CollisionType, second: CollisionType) -> bool {
        self.handlers.contains_key(&(first, second))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler for a pair in either order, with the owners swapped to match its signature.
    pub fn resolve(&self, a: ShapeOwner, b: ShapeOwner) -> Option<(Handler, ShapeOwner, ShapeOwner)> {
        if let Some(handler) = self.handlers.get(&(a.collision_type, b.collision_type)) {
            return Some((*handler, a, b));
        }
        self.handlers
            .get(&(b.collision_type, a.collision_type))
            .map(|handler| (*handler, b, a))
    }
}

// ---------------------------------------------------------------------------
// World context
// ---------------------------------------------------------------------------

type DispatchKey = (EntityId, EntityId, CollisionType, CollisionType);

/// Everything a handler may read or change during a step.
///
/// Structural changes (joints, removals, spawns, teleports) are queued as
/// [`WorldCommand`]s and run after integration.
pub struct WorldContext<'w> {
    elements: &'w mut BTreeMap<EntityId, Entity>,
    agents: &'w mut BTreeMap<AgentId, Agent>,
    teams: &'w TeamTable,
    commands: &'w mut CommandBuffer,
    dispatched: HashMap<DispatchKey, bool>,
    visits: HashSet<(AgentId, EntityId)>,
}

impl<'w> WorldContext<'w> {
    pub(crate) fn new(
        elements: &'w mut BTreeMap<EntityId, Entity>,
        agents: &'w mut BTreeMap<AgentId, Agent>,
        teams: &'w TeamTable,
        commands: &'w mut CommandBuffer,
    ) -> Self {
        Self {
            elements,
            agents,
            teams,
            commands,
            dispatched: HashMap::new(),
            visits: HashSet::new(),
        }
    }

    #[inline]
    pub fn element(&self, id: EntityId) -> Option<&Entity> {
        self.elements.get(&id)
    }

    #[inline]
    pub fn element_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.elements.get_mut(&id)
    }

    #[inline]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    #[inline]
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Entity behind a shape, scene element or agent part.
    pub fn entity_mut(&mut self, owner: &ShapeOwner) -> Option<&mut Entity> {
        match (owner.agent, owner.part) {
            (Some(agent), Some(part)) => self
                .agents
                .get_mut(&agent)
                .and_then(|a| a.part_mut(part).ok())
                .map(|p| p.entity_mut()),
            _ => self.elements.get_mut(&owner.entity),
        }
    }

    /// False once the owner left the playground.
    pub fn is_live(&self, owner: &ShapeOwner) -> bool {
        match owner.agent {
            Some(agent) => self.agents.contains_key(&agent),
            None => self.elements.contains_key(&owner.entity),
        }
    }

    #[inline]
    pub fn teams(&self) -> &TeamTable {
        self.teams
    }

    /// True the first time `agent` meets `entity` in this step, whichever parts touch it.
    pub fn first_visit(&mut self, agent: AgentId, entity: EntityId) -> bool {
        self.visits.insert((agent, entity))
    }

    /// Queue a structural change for after the integration.
    #[inline]
    pub fn emit(&mut self, command: WorldCommand) {
        self.commands.emit(command);
    }
}

// ---------------------------------------------------------------------------
// Physics hooks
// ---------------------------------------------------------------------------

enum Outcome {
    /// No handler for this pair, the engine decides.
    Unhandled,
    /// Two shapes of the same agent.
    SameAgent,
    Handled(bool),
}

/// Rapier hooks resolving collider pairs to owners and running their handler.
pub struct DispatchHooks<'w> {
    registry: &'w CollisionRegistry,
    shapes: &'w ShapeMap,
    context: Mutex<WorldContext<'w>>,
}

impl<'w> DispatchHooks<'w> {
    pub(crate) fn new(registry: &'w CollisionRegistry, shapes: &'w ShapeMap, context: WorldContext<'w>) -> Self {
        Self {
            registry,
            shapes,
            context: Mutex::new(context),
        }
    }

    fn dispatch(&self, collider1: ColliderHandle, collider2: ColliderHandle, colliders: &ColliderSet) -> Outcome {
        let (Some(a), Some(b)) = (self.shapes.get(collider1), self.shapes.get(collider2)) else {
            trace!("unmapped collider pair {collider1:?} / {collider2:?}");
            return Outcome::Unhandled;
        };
        if a.agent.is_some() && a.agent == b.agent {
            return Outcome::SameAgent;
        }
        let Some((handler, first, second)) = self.registry.resolve(a, b) else {
            return Outcome::Unhandled;
        };
        if !overlapping(colliders, collider1, collider2) {
            return Outcome::Unhandled;
        }

        let mut world = self.context.lock();
        let key = (first.entity, second.entity, first.collision_type, second.collision_type);
        if let Some(response) = world.dispatched.get(&key) {
            return Outcome::Handled(*response);
        }
        if !world.is_live(&first) || !world.is_live(&second) {
            trace!("stale pair {} / {}, ignored", first.entity, second.entity);
            return Outcome::Handled(true);
        }

        let response = handler(&mut *world, first, second);
        world.dispatched.insert(key, response);
        Outcome::Handled(response)
    }

    /// Dispatch the pairs the engine left alone this step.
    ///
    /// Rapier only revisits a pair when one of its colliders moved or belongs to a dynamic
    /// body, so two overlapping static or idle kinematic shapes reach the hooks once. Pairs
    /// already dispatched during the step hit the per-step cache.
    pub(crate) fn dispatch_resting(&self, physics: &PhysicsWorld) {
        for (collider1, collider2) in physics.resting_pairs() {
            self.dispatch(collider1, collider2, physics.colliders());
        }
    }
}

impl PhysicsHooks for DispatchHooks<'_> {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        match self.dispatch(context.collider1, context.collider2, context.colliders) {
            Outcome::SameAgent | Outcome::Handled(false) => None,
            Outcome::Unhandled | Outcome::Handled(true) => Some(SolverFlags::COMPUTE_IMPULSES),
        }
    }

    fn filter_intersection_pair(&self, context: &PairFilterContext) -> bool {
        !matches!(
            self.dispatch(context.collider1, context.collider2, context.colliders),
            Outcome::SameAgent
        )
    }
}

/// Exact overlap of the two colliders. The engine calls the hooks on bounding-box overlap.
fn overlapping(colliders: &ColliderSet, collider1: ColliderHandle, collider2: ColliderHandle) -> bool {
    let (Some(c1), Some(c2)) = (colliders.get(collider1), colliders.get(collider2)) else {
        return false;
    };
    query::intersection_test(c1.position(), c1.shape(), c2.position(), c2.shape()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ShapeRole;

    fn owner(entity: u32, collision_type: CollisionType) -> ShapeOwner {
        ShapeOwner {
            entity: EntityId(entity),
            agent: None,
            part: None,
            role: ShapeRole::Invisible,
            collision_type,
        }
    }

    fn always_false(_: &mut WorldContext<'_>, _: ShapeOwner, _: ShapeOwner) -> bool {
        false
    }

    #[test]
    fn resolve_tries_both_orders() {
        let mut registry = CollisionRegistry::new();
        registry.register(CollisionType::Key, CollisionType::Chest, always_false);

        let key = owner(1, CollisionType::Key);
        let chest = owner(2, CollisionType::Chest);

        let (_, first, second) = registry.resolve(chest, key).unwrap();
        assert_eq!(first.entity, EntityId(1));
        assert_eq!(second.entity, EntityId(2));
        assert!(registry.resolve(key, owner(3, CollisionType::Default)).is_none());
    }

    #[test]
    fn defaults_cover_scene_elements() {
        let registry = CollisionRegistry::with_defaults();
        assert!(registry.contains(CollisionType::Trigger, CollisionType::Triggered));
        assert!(registry.contains(CollisionType::Grasper, CollisionType::Graspable));
        assert!(!registry.contains(CollisionType::Default, CollisionType::Default));
    }

    #[test]
    fn handlers_see_the_world_context() {
        let mut elements = BTreeMap::new();
        let mut agents = BTreeMap::new();
        let teams = TeamTable::new();
        let mut commands = CommandBuffer::default();
        let mut world = WorldContext::new(&mut elements, &mut agents, &teams, &mut commands);

        let ghost = owner(9, CollisionType::Triggered);
        assert!(!world.is_live(&ghost));
        assert!(world.entity_mut(&ghost).is_none());
        assert!(world.first_visit(AgentId(1), EntityId(9)));
        assert!(!world.first_visit(AgentId(1), EntityId(9)));
        assert!(world.first_visit(AgentId(2), EntityId(9)));
        world.emit(WorldCommand::Dispense { dispenser: EntityId(9) });
        drop(world);
        assert_eq!(commands.len(), 1);
    }
}
