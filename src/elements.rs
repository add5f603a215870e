// src/elements.rs
//! Ready-made scene elements built from [`Entity`] capabilities.

use nalgebra::Vector2;

use crate::agent::ControllerClass;
use crate::collision::CollisionType;
use crate::components::Coordinates;
use crate::coordinates::{Area, AreaSampler};
use crate::entity::{Behavior, Entity, EntityOptions, IdAllocator};
use crate::{Error, Result};

/// Static rectangle from `start` to `end`.
pub fn wall(ids: &mut IdAllocator, start: Vector2<f64>, end: Vector2<f64>, thickness: f64) -> Result<Entity> {
    let along = end - start;
    let length = along.norm();
    if length == 0.0 || !length.is_finite() {
        return Err(Error::InvalidShape("a wall needs two distinct finite end points".into()));
    }
    let options = EntityOptions {
        background: true,
        ..EntityOptions::rectangle(length + thickness, thickness)
    };
    let middle = (start + end) / 2.0;
    Ok(Entity::physical(ids, &options)?.at(Coordinates {
        position: middle,
        angle: along.y.atan2(along.x),
    }))
}

/// Solid that only members of `teams` go through.
pub fn barrier(ids: &mut IdAllocator, options: &EntityOptions, teams: &[&str]) -> Result<Entity> {
    let options = EntityOptions {
        movable: false,
        traversable: false,
        teams: teams.iter().map(|t| t.to_string()).collect(),
        ..options.clone()
    };
    Ok(Entity::physical(ids, &options)?.as_barrier())
}

/// Entity whose interaction area activates `Triggered` entities.
pub fn trigger(ids: &mut IdAllocator, options: &EntityOptions) -> Result<Entity> {
    Entity::physical(ids, options)?
        .with_sensor(CollisionType::Trigger)
        .map(|e| e.with_behavior(Behavior::Trigger { activated: false }))
}

/// Entity activated while a trigger overlaps its interaction area.
pub fn triggered(ids: &mut IdAllocator, options: &EntityOptions) -> Result<Entity> {
    Entity::physical(ids, options)?
        .with_sensor(CollisionType::Triggered)
        .map(|e| e.with_behavior(Behavior::Triggered { activated: false }))
}

/// Trigger area following `anchor`.
pub fn halo(ids: &mut IdAllocator, anchor: &Entity, range: f64) -> Result<Entity> {
    Entity::anchored(
        ids,
        anchor,
        range,
        Behavior::Triggered { activated: false },
        CollisionType::Triggered,
    )
}

/// Zone paying `reward` per step to agents inside it.
///
/// With a `budget`, the total paid out is capped until the next reset. A terminating zone
/// also marks the agent as done.
pub fn reward_zone(
    ids: &mut IdAllocator,
    options: &EntityOptions,
    reward: f64,
    budget: Option<f64>,
    terminate: bool,
) -> Result<Entity> {
    if !reward.is_finite() || budget.map_or(false, |b| !b.is_finite() || b < 0.0) {
        return Err(Error::InvalidOption("reward and budget must be finite, budget non-negative".into()));
    }
    Entity::zone(
        ids,
        options,
        Behavior::reward_zone(reward, budget, terminate),
        CollisionType::RewardZone,
    )
}

/// Zone moving whatever enters it to `destination`.
pub fn teleport(ids: &mut IdAllocator, options: &EntityOptions, destination: Coordinates) -> Result<Entity> {
    if !destination.is_finite() {
        return Err(Error::InvalidCoordinates(format!("teleport destination {destination:?}")));
    }
    Entity::zone(ids, options, Behavior::Teleport { destination }, CollisionType::Teleport)
}

/// Switch and the door it opens and closes. The door starts closed.
pub fn switch_and_door(
    ids: &mut IdAllocator,
    switch: &EntityOptions,
    door: &EntityOptions,
) -> Result<(Entity, Entity)> {
    let door = Entity::physical(ids, &EntityOptions { movable: false, ..door.clone() })?.with_behavior(Behavior::door(false));
    let switch = Entity::physical(ids, switch)?
        .with_sensor(CollisionType::Activable)?
        .with_behavior(Behavior::Switch { door: door.id() });
    Ok((switch, door))
}

/// Chest opened by its key. Opening removes both and spawns `treasure` in place of the chest.
pub fn chest_and_key(
    ids: &mut IdAllocator,
    chest: &EntityOptions,
    key: &EntityOptions,
    treasure: EntityOptions,
) -> Result<(Entity, Entity)> {
    treasure.contour()?;
    let key = Entity::physical(ids, key)?.with_collision_type(CollisionType::Key);
    let chest = Entity::physical(ids, chest)?
        .with_sensor(CollisionType::Chest)?
        .with_behavior(Behavior::Chest {
            key: key.id(),
            treasure: Box::new(treasure),
            opened: false,
        });
    Ok((chest, key))
}

/// Produces entities from `template` when activated, at most `limit` per episode.
///
/// New entities are placed in `area` when given, else right next to the dispenser.
pub fn dispenser(
    ids: &mut IdAllocator,
    options: &EntityOptions,
    template: EntityOptions,
    area: Option<Area>,
    limit: usize,
    seed: u64,
) -> Result<Entity> {
    template.contour()?;
    let sampler = area.map(|a| AreaSampler::new(a, None, seed)).transpose()?;
    Entity::physical(ids, options)?
        .with_sensor(CollisionType::Activable)
        .map(|e| {
            e.with_behavior(Behavior::Dispenser {
                template: Box::new(template),
                sampler,
                limit,
                produced: 0,
            })
        })
}

/// Solid whose interaction area disables the controllers of agents touching it.
///
/// With a `class`, only controllers of that class are disabled.
pub fn controller_disabler(
    ids: &mut IdAllocator,
    options: &EntityOptions,
    class: Option<ControllerClass>,
) -> Result<Entity> {
    Entity::physical(ids, options)?
        .with_sensor(CollisionType::ControllerDisabler)
        .map(|e| e.with_behavior(Behavior::ControllerDisabler { class }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ShapeRole;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn wall_is_centred_and_oriented() {
        let mut ids = IdAllocator::new();
        let mut wall = wall(&mut ids, Vector2::new(0.0, 0.0), Vector2::new(0.0, 100.0), 4.0).unwrap();
        wall.place().unwrap();
        assert_eq!(wall.position(), Vector2::new(0.0, 50.0));
        assert!((wall.angle() - FRAC_PI_2).abs() < 1e-12);
        assert_eq!(wall.contour().size(), (104.0, 4.0));
        assert!(wall.is_background());
    }

    #[test]
    fn zones_only_have_a_sensor() {
        let mut ids = IdAllocator::new();
        let zone = reward_zone(&mut ids, &EntityOptions::circle(20.0), 1.0, None, false).unwrap();
        assert_eq!(zone.shapes().len(), 1);
        assert_eq!(zone.shapes()[0].role(), ShapeRole::Invisible);
        assert!(!zone.movable());
        assert!(reward_zone(&mut ids, &EntityOptions::circle(20.0), 1.0, Some(-1.0), false).is_err());
    }

    #[test]
    fn switch_points_at_its_door() {
        let mut ids = IdAllocator::new();
        let (switch, door) =
            switch_and_door(&mut ids, &EntityOptions::circle(5.0), &EntityOptions::rectangle(40.0, 4.0)).unwrap();
        assert!(matches!(switch.behavior(), Behavior::Switch { door: d } if *d == door.id()));
        assert!(matches!(door.behavior(), Behavior::Door { open: false, .. }));
        assert_eq!(switch.shape(ShapeRole::Invisible).unwrap().collision_type(), CollisionType::Activable);
    }

    #[test]
    fn bad_templates_fail_early() {
        let mut ids = IdAllocator::new();
        let bad = EntityOptions::default();
        assert!(dispenser(&mut ids, &EntityOptions::circle(5.0), bad.clone(), None, 3, 0).is_err());
        assert!(chest_and_key(&mut ids, &EntityOptions::circle(5.0), &EntityOptions::circle(2.0), bad).is_err());
    }
}
