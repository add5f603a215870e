// src/lib.rs
//! 2D physics playground for reinforcement-learning agents.
//!
//! A [`Playground`] owns a rapier world, scene elements and agents. Agents are trees of
//! parts (a mobile base, jointed limbs, sensors) driven through named controllers; scene
//! elements react to them through collision handlers registered per pair of
//! [`CollisionType`]s.
//!
//! ```
//! use playground_engine::{elements, Agent, BaseOptions, Coordinates, EntityOptions, Playground, PlaygroundConfig};
//!
//! let mut playground = Playground::new(PlaygroundConfig::default());
//! let agent = Agent::new(playground.ids(), &BaseOptions::default()).unwrap();
//! let agent = playground.add_agent(agent, Some(Coordinates::new(0.0, 0.0, 0.0).into())).unwrap();
//!
//! let zone = elements::reward_zone(playground.ids(), &EntityOptions::circle(30.0), 1.0, None, false).unwrap();
//! playground.add(zone, Some(Coordinates::new(0.0, 0.0, 0.0).into())).unwrap();
//!
//! playground.step();
//! assert_eq!(playground.agent(agent).unwrap().reward(), 1.0);
//! ```

pub mod agent;
pub mod appearance;
pub mod body;
pub mod collision;
pub mod command_buffer;
pub mod components;
pub mod config;
pub mod contour;
pub mod coordinates;
pub mod elements;
pub mod entity;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod physics;
pub mod physics_integration;
pub mod playground;

pub use agent::{Agent, AgentId, BaseOptions, CommandValue, ControllerClass, LimbOptions, PartId, SensorKind};
pub use appearance::{DrawCall, Surface};
pub use collision::{CollisionRegistry, CollisionType, WorldContext};
pub use components::{Coordinates, Transform};
pub use config::PlaygroundConfig;
pub use contour::{Contour, PhysicalShape};
pub use coordinates::{Area, AreaSampler, CoordinateSampler, InitialCoordinates, Trajectory};
pub use entity::{Behavior, Entity, EntityId, EntityOptions, IdAllocator};
pub use error::{Error, Result};
pub use playground::Playground;
