// src/handlers.rs
//! Built-in interactions between agents and scene elements.
//!
//! Handlers only flip logical state or queue [`WorldCommand`]s; joints, removals and
//! teleports happen after the step.

use log::debug;

use crate::agent::{ACTIVATE, GRASP};
use crate::collision::{CollisionRegistry, CollisionType, WorldContext};
use crate::command_buffer::{Traveller, WorldCommand};
use crate::entity::Behavior;
use crate::physics_integration::ShapeOwner;

pub(crate) fn register_defaults(registry: &mut CollisionRegistry) {
    registry.register(CollisionType::Trigger, CollisionType::Triggered, trigger);
    registry.register(CollisionType::Agent, CollisionType::RewardZone, reward_zone);
    registry.register(CollisionType::Agent, CollisionType::Teleport, teleport);
    registry.register(CollisionType::Default, CollisionType::Teleport, teleport);
    registry.register(CollisionType::Grasper, CollisionType::Graspable, grasp);
    registry.register(CollisionType::Activator, CollisionType::Activable, activate);
    registry.register(CollisionType::Key, CollisionType::Chest, open_chest);
    registry.register(CollisionType::Agent, CollisionType::ControllerDisabler, disable_controllers);
}

/// Both sides of a trigger pair become activated for this step.
pub fn trigger(world: &mut WorldContext<'_>, trigger: ShapeOwner, triggered: ShapeOwner) -> bool {
    for owner in [trigger, triggered] {
        if let Some(entity) = world.entity_mut(&owner) {
            entity.behavior_mut().set_activated();
        }
    }
    true
}

/// Pay the zone's reward, from its budget if it has one. Agents are paid once per step.
pub fn reward_zone(world: &mut WorldContext<'_>, agent: ShapeOwner, zone: ShapeOwner) -> bool {
    let Some(agent_id) = agent.agent else { return true };
    if !world.first_visit(agent_id, zone.entity) {
        return true;
    }
    let Some(Behavior::RewardZone {
        reward,
        remaining,
        terminate,
        ..
    }) = world.element_mut(zone.entity).map(|z| z.behavior_mut())
    else {
        return true;
    };

    let granted = match remaining {
        Some(left) => {
            let granted = reward.signum() * reward.abs().min(*left);
            *left -= granted.abs();
            granted
        }
        None => *reward,
    };
    let terminate = *terminate;

    if let Some(agent) = world.agent_mut(agent_id) {
        agent.add_reward(granted);
        if terminate {
            agent.terminate();
        }
    }
    true
}

pub fn teleport(world: &mut WorldContext<'_>, traveller: ShapeOwner, portal: ShapeOwner) -> bool {
    let Some(Behavior::Teleport { destination }) = world.element(portal.entity).map(|p| p.behavior()) else {
        return true;
    };
    let destination = *destination;
    let traveller = match traveller.agent {
        Some(agent) if !world.first_visit(agent, portal.entity) => return true,
        Some(agent) => Traveller::Agent(agent),
        None if world.element(traveller.entity).map_or(false, |e| e.movable()) => Traveller::Entity(traveller.entity),
        None => return true,
    };
    world.emit(WorldCommand::Teleport { traveller, destination });
    true
}

/// Weld the graspable entity to the grasper while its `grasp` command is on.
pub fn grasp(world: &mut WorldContext<'_>, grasper: ShapeOwner, graspable: ShapeOwner) -> bool {
    let (Some(agent_id), Some(part)) = (grasper.agent, grasper.part) else {
        return true;
    };
    let Some(agent) = world.agent(agent_id) else { return true };
    let free = agent.part(part).map_or(false, |p| p.grasped().is_none());
    if free && agent.sensor_on(part, GRASP) {
        world.emit(WorldCommand::Grasp {
            agent: agent_id,
            part,
            target: graspable.entity,
        });
    }
    true
}

/// Switches toggle their door, dispensers produce. Both then cool down.
pub fn activate(world: &mut WorldContext<'_>, activator: ShapeOwner, activable: ShapeOwner) -> bool {
    let (Some(agent_id), Some(part)) = (activator.agent, activator.part) else {
        return true;
    };
    if !world.agent(agent_id).map_or(false, |a| a.sensor_on(part, ACTIVATE)) {
        return true;
    }
    let Some(element) = world.element_mut(activable.entity) else { return true };
    let command = match element.behavior() {
        Behavior::Switch { door } => Some(WorldCommand::SetDoor {
            door: *door,
            open: false,
        }),
        Behavior::Dispenser { .. } => Some(WorldCommand::Dispense {
            dispenser: activable.entity,
        }),
        _ => None,
    };
    let Some(mut command) = command else { return true };
    if !element.try_activate() {
        return true;
    }

    if let WorldCommand::SetDoor { door, open } = &mut command {
        match world.element(*door).map(|d| d.behavior()) {
            Some(Behavior::Door { open: is_open, .. }) => *open = !is_open,
            _ => return true,
        }
    }
    debug!("agent {agent_id} activates {}: {command:?}", activable.entity);
    world.emit(command);
    true
}

/// A key touching its own chest opens it.
pub fn open_chest(world: &mut WorldContext<'_>, key: ShapeOwner, chest: ShapeOwner) -> bool {
    let Some(entity) = world.element_mut(chest.entity) else { return true };
    if let Behavior::Chest { key: expected, opened, .. } = entity.behavior_mut() {
        if *expected == key.entity && !*opened {
            *opened = true;
            world.emit(WorldCommand::OpenChest { chest: chest.entity });
        }
    }
    true
}

/// Controllers of an agent touching a disabler read as default during the next step.
pub fn disable_controllers(world: &mut WorldContext<'_>, agent: ShapeOwner, disabler: ShapeOwner) -> bool {
    let Some(agent_id) = agent.agent else { return true };
    let Some(Behavior::ControllerDisabler { class }) = world.element(disabler.entity).map(|d| d.behavior()) else {
        return true;
    };
    let class = *class;
    if let Some(agent) = world.agent_mut(agent_id) {
        agent.disable_controllers(class);
    }
    true
}
