// src/physics_integration.rs
//! Glue between the logical scene and the rapier world.
//!
//! - `ShapeMap`: reverse lookup from collider handle to the shape's owner, used by the
//!   collision hooks. Every collider in the world has exactly one entry.
//! - Transform sync: dirty entity transforms are written before integration, every body is
//!   read back right after it.

use std::collections::{BTreeMap, HashMap};

use rapier2d::prelude::ColliderHandle;

use crate::agent::{Agent, AgentId, PartId};
use crate::collision::CollisionType;
use crate::entity::{Entity, EntityId, ShapeRole};
use crate::physics::PhysicsWorld;

/// Logical owner of one collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeOwner {
    pub entity: EntityId,
    pub agent: Option<AgentId>,
    pub part: Option<PartId>,
    pub role: ShapeRole,
    pub collision_type: CollisionType,
}

/// Collider handle to owner map, with a forward index per entity.
#[derive(Debug, Default)]
pub struct ShapeMap {
    reverse: HashMap<ColliderHandle, ShapeOwner>,
    by_entity: HashMap<EntityId, Vec<ColliderHandle>>,
}

impl ShapeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: ColliderHandle, owner: ShapeOwner) {
        self.reverse.insert(handle, owner);
        self.by_entity.entry(owner.entity).or_default().push(handle);
    }

    /// Drop every entry of `entity`, returning its collider handles.
    pub fn unregister(&mut self, entity: EntityId) -> Vec<ColliderHandle> {
        let handles = self.by_entity.remove(&entity).unwrap_or_default();
        for handle in &handles {
            self.reverse.remove(handle);
        }
        handles
    }

    #[inline]
    pub fn get(&self, handle: ColliderHandle) -> Option<ShapeOwner> {
        self.reverse.get(&handle).copied()
    }

    pub fn colliders_of(&self, entity: EntityId) -> &[ColliderHandle] {
        self.by_entity.get(&entity).map_or(&[], Vec::as_slice)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Transform sync
// ---------------------------------------------------------------------------

/// Write one dirty transform to its body.
pub(crate) fn push_transform(physics: &mut PhysicsWorld, entity: &mut Entity) {
    if !entity.transform_dirty {
        return;
    }
    if let Some(handle) = entity.body_handle() {
        physics.write_transform(handle, &entity.transform);
    }
    entity.transform_dirty = false;
}

/// Sync scene transforms into rapier, anchored entities first following their anchor.
pub(crate) fn sync_scene_to_physics(
    physics: &mut PhysicsWorld,
    elements: &mut BTreeMap<EntityId, Entity>,
    agents: &mut BTreeMap<AgentId, Agent>,
) {
    follow_anchors(elements);
    for entity in elements.values_mut() {
        push_transform(physics, entity);
    }
    for agent in agents.values_mut() {
        for part in agent.parts_mut() {
            push_transform(physics, part.entity_mut());
        }
    }
}

/// Sync rapier body poses and velocities back into the scene.
pub(crate) fn sync_physics_to_scene(
    physics: &PhysicsWorld,
    elements: &mut BTreeMap<EntityId, Entity>,
    agents: &mut BTreeMap<AgentId, Agent>,
) {
    for entity in elements.values_mut() {
        pull_transform(physics, entity);
    }
    follow_anchors(elements);
    for agent in agents.values_mut() {
        for part in agent.parts_mut() {
            pull_transform(physics, part.entity_mut());
        }
        agent.follow_sensor_anchors();
    }
}

fn pull_transform(physics: &PhysicsWorld, entity: &mut Entity) {
    if let Some(transform) = entity.body_handle().and_then(|h| physics.read_transform(h)) {
        entity.transform = transform;
        entity.transform_dirty = false;
    }
}

/// Copy each anchor's transform onto the entities it carries.
fn follow_anchors(elements: &mut BTreeMap<EntityId, Entity>) {
    let anchored: Vec<(EntityId, EntityId)> = elements
        .values()
        .filter_map(|e| e.anchor().map(|anchor| (e.id(), anchor)))
        .collect();
    for (id, anchor) in anchored {
        let Some(transform) = elements.get(&anchor).map(|a| *a.transform()) else {
            continue;
        };
        if let Some(entity) = elements.get_mut(&id) {
            entity.transform = transform;
            entity.transform_dirty = false;
        }
    }
}
