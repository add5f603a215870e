// src/entity.rs
//! Scene entities.
//!
//! An entity is plain data: identity, a closed [`EntityKind`], an optional rigid body, one to
//! three typed shapes, lifecycle flags and a [`Behavior`] carrying scene-element state. The
//! playground owns live entities and moves them between the physics world and this
//! representation once per step.

use std::collections::BTreeSet;
use std::fmt;

use nalgebra::{Point2, Vector2};
use rapier2d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, ControllerClass};
use crate::appearance::{DrawCall, Surface};
use crate::body::PhysicalBody;
use crate::collision::CollisionType;
use crate::components::{Coordinates, Transform};
use crate::config::PlaygroundConfig;
use crate::contour::{Contour, PhysicalShape, DEFAULT_INVISIBLE_RANGE};
use crate::coordinates::{AreaSampler, InitialCoordinates};
use crate::filter::{ShapeFilter, TeamTable};
use crate::{Error, Result};

/// Steps an activable element ignores further activations after firing.
pub const ACTIVATION_COOLDOWN: u32 = 10;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic identity source of one playground.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    next_entity: u32,
    next_agent: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn next_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }

    #[inline]
    pub fn next_agent(&mut self) -> AgentId {
        let id = AgentId(self.next_agent);
        self.next_agent += 1;
        id
    }
}

// ---------------------------------------------------------------------------
// Kinds, shapes and options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Free-standing body with a visible shape.
    Physical,
    /// Static interaction area without a visible shape (zones).
    InteractiveStandalone,
    /// Interaction area carried by another entity's body.
    InteractiveAnchored { anchor: EntityId },
    /// Part of an agent.
    Part { agent: AgentId },
}

impl EntityKind {
    fn label(self) -> &'static str {
        match self {
            EntityKind::Physical => "entity",
            EntityKind::InteractiveStandalone => "zone",
            EntityKind::InteractiveAnchored { .. } => "halo",
            EntityKind::Part { .. } => "part",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeRole {
    /// Solid outline.
    Visible,
    /// Interaction area around the body.
    Invisible,
    /// Sensor copy of the outline, seen by graspers.
    Grasp,
}

impl ShapeRole {
    #[inline]
    pub fn is_sensor(self) -> bool {
        !matches!(self, ShapeRole::Visible)
    }
}

/// One collider of an entity.
#[derive(Debug, Clone)]
pub struct EntityShape {
    pub(crate) role: ShapeRole,
    pub(crate) collision_type: CollisionType,
    pub(crate) filter: ShapeFilter,
    pub(crate) handle: Option<ColliderHandle>,
}

impl EntityShape {
    fn new(role: ShapeRole, collision_type: CollisionType) -> Self {
        let filter = if role.is_sensor() {
            ShapeFilter::sensor()
        } else {
            ShapeFilter::solid(0)
        };
        Self {
            role,
            collision_type,
            filter,
            handle: None,
        }
    }

    #[inline]
    pub fn role(&self) -> ShapeRole {
        self.role
    }

    #[inline]
    pub fn collision_type(&self) -> CollisionType {
        self.collision_type
    }

    #[inline]
    pub fn filter(&self) -> ShapeFilter {
        self.filter
    }

    #[inline]
    pub fn handle(&self) -> Option<ColliderHandle> {
        self.handle
    }
}

/// Flat construction options.
///
/// Exactly one of `radius` or `size` is required. `graspable` implies `movable`, and movable
/// entities need a positive `mass`. `interaction_range` pads the interaction area and
/// defaults to `invisible_range`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityOptions {
    pub physical_shape: PhysicalShape,
    pub radius: Option<f64>,
    pub size: Option<[f64; 2]>,
    pub mass: Option<f64>,
    pub movable: bool,
    pub graspable: bool,
    pub traversable: bool,
    pub temporary: bool,
    pub background: bool,
    pub invisible_range: f64,
    pub interaction_range: Option<f64>,
    pub name: Option<String>,
    pub appearance: Option<String>,
    pub teams: Vec<String>,
}

impl Default for EntityOptions {
    fn default() -> Self {
        Self {
            physical_shape: PhysicalShape::Circle,
            radius: None,
            size: None,
            mass: None,
            movable: false,
            graspable: false,
            traversable: false,
            temporary: false,
            background: false,
            invisible_range: DEFAULT_INVISIBLE_RANGE,
            interaction_range: None,
            name: None,
            appearance: None,
            teams: Vec::new(),
        }
    }
}

impl EntityOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Circle of the given radius.
    pub fn circle(radius: f64) -> Self {
        Self {
            radius: Some(radius),
            ..Self::default()
        }
    }

    /// Shape described by a radius (circle or regular polygon).
    pub fn shaped(physical_shape: PhysicalShape, radius: f64) -> Self {
        Self {
            physical_shape,
            radius: Some(radius),
            ..Self::default()
        }
    }

    pub fn rectangle(width: f64, height: f64) -> Self {
        Self {
            physical_shape: PhysicalShape::Rectangle,
            size: Some([width, height]),
            ..Self::default()
        }
    }

    /// Make the entity movable with the given mass.
    pub fn movable(mut self, mass: f64) -> Self {
        self.movable = true;
        self.mass = Some(mass);
        self
    }

    pub fn contour(&self) -> Result<Contour> {
        Contour::new(
            self.physical_shape,
            self.radius,
            self.size.map(|[w, h]| (w, h)),
            self.invisible_range,
        )
    }
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Scene-element logic attached to an entity.
#[derive(Debug)]
pub enum Behavior {
    Inert,
    /// Activates the `Triggered` entities it overlaps.
    Trigger { activated: bool },
    Triggered { activated: bool },
    /// Rewards agents standing in it, optionally from a limited budget.
    RewardZone {
        reward: f64,
        budget: Option<f64>,
        remaining: Option<f64>,
        terminate: bool,
    },
    Teleport { destination: Coordinates },
    /// Opens or closes `door` when activated.
    Switch { door: EntityId },
    Door { open: bool, initially_open: bool },
    /// Opened by `key`; `treasure` is spawned where the chest stood.
    Chest {
        key: EntityId,
        treasure: Box<EntityOptions>,
        opened: bool,
    },
    /// Produces entities from `template` when activated, at most `limit` per episode.
    Dispenser {
        template: Box<EntityOptions>,
        sampler: Option<AreaSampler>,
        limit: usize,
        produced: usize,
    },
    /// Agents touching it have their controllers of `class`, or all of them, disabled.
    ControllerDisabler { class: Option<ControllerClass> },
}

impl Behavior {
    pub fn reward_zone(reward: f64, budget: Option<f64>, terminate: bool) -> Self {
        Behavior::RewardZone {
            reward,
            budget,
            remaining: budget,
            terminate,
        }
    }

    pub fn door(open: bool) -> Self {
        Behavior::Door {
            open,
            initially_open: open,
        }
    }

    /// Trigger state, `None` for behaviors without one.
    #[inline]
    pub fn activated(&self) -> Option<bool> {
        match self {
            Behavior::Trigger { activated } | Behavior::Triggered { activated } => Some(*activated),
            _ => None,
        }
    }

    pub(crate) fn set_activated(&mut self) {
        if let Behavior::Trigger { activated } | Behavior::Triggered { activated } = self {
            *activated = true;
        }
    }

    fn clear_activation(&mut self) {
        if let Behavior::Trigger { activated } | Behavior::Triggered { activated } = self {
            *activated = false;
        }
    }

    fn reset(&mut self) {
        match self {
            Behavior::Trigger { activated } | Behavior::Triggered { activated } => *activated = false,
            Behavior::RewardZone { budget, remaining, .. } => *remaining = *budget,
            Behavior::Door { open, initially_open } => *open = *initially_open,
            Behavior::Chest { opened, .. } => *opened = false,
            Behavior::Dispenser { produced, .. } => *produced = 0,
            Behavior::Inert
            | Behavior::Teleport { .. }
            | Behavior::Switch { .. }
            | Behavior::ControllerDisabler { .. } => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    name: String,
    kind: EntityKind,
    contour: Contour,
    interaction: Contour,
    body: Option<PhysicalBody>,
    shapes: Vec<EntityShape>,
    appearance: Option<String>,
    pub(crate) transform: Transform,
    pub(crate) transform_dirty: bool,
    initial: Option<InitialCoordinates>,
    behavior: Behavior,
    teams: BTreeSet<String>,
    toggles: u32,
    background: bool,
    drawn: bool,
    temporary: bool,
    traversable: bool,
    graspable: bool,
    barrier: bool,
    cooldown: u32,
}

impl Entity {
    /// Free-standing entity with a visible solid shape.
    pub fn physical(ids: &mut IdAllocator, options: &EntityOptions) -> Result<Self> {
        Self::build(ids.next_entity(), EntityKind::Physical, options, CollisionType::Default)
    }

    /// Static interaction area. Its sensor covers the outline padded by `interaction_range`
    /// (default none).
    pub fn zone(
        ids: &mut IdAllocator,
        options: &EntityOptions,
        behavior: Behavior,
        collision_type: CollisionType,
    ) -> Result<Self> {
        let options = EntityOptions {
            movable: false,
            graspable: false,
            mass: None,
            interaction_range: Some(options.interaction_range.unwrap_or(0.0)),
            ..options.clone()
        };
        let mut zone = Self::build(
            ids.next_entity(),
            EntityKind::InteractiveStandalone,
            &options,
            CollisionType::Default,
        )?;
        zone.shapes = vec![EntityShape::new(ShapeRole::Invisible, collision_type)];
        zone.behavior = behavior;
        Ok(zone)
    }

    /// Interaction area around `anchor`, following it everywhere.
    pub fn anchored(
        ids: &mut IdAllocator,
        anchor: &Entity,
        range: f64,
        behavior: Behavior,
        collision_type: CollisionType,
    ) -> Result<Self> {
        let id = ids.next_entity();
        let mut halo = Self::bodiless(id, EntityKind::InteractiveAnchored { anchor: anchor.id }, &anchor.contour, range)?;
        halo.shapes.push(EntityShape::new(ShapeRole::Invisible, collision_type));
        halo.behavior = behavior;
        halo.transform = anchor.transform;
        Ok(halo)
    }

    /// Body of an agent part.
    pub(crate) fn part(ids: &mut IdAllocator, agent: AgentId, options: &EntityOptions) -> Result<Self> {
        let options = EntityOptions {
            movable: true,
            ..options.clone()
        };
        Self::build(ids.next_entity(), EntityKind::Part { agent }, &options, CollisionType::Agent)
    }

    /// Sensor of an agent part, carried by the anchor part's body.
    pub(crate) fn sensor_part(
        ids: &mut IdAllocator,
        agent: AgentId,
        anchor_contour: &Contour,
        range: f64,
        collision_type: CollisionType,
    ) -> Result<Self> {
        let id = ids.next_entity();
        let mut sensor = Self::bodiless(id, EntityKind::Part { agent }, anchor_contour, range)?;
        sensor.shapes.push(EntityShape::new(ShapeRole::Invisible, collision_type));
        Ok(sensor)
    }

    fn bodiless(id: EntityId, kind: EntityKind, contour: &Contour, range: f64) -> Result<Self> {
        Ok(Self {
            id,
            name: format!("{}_{}", kind.label(), id.0),
            kind,
            contour: contour.clone(),
            interaction: contour.padded(range)?,
            body: None,
            shapes: Vec::new(),
            appearance: None,
            transform: Transform::default(),
            transform_dirty: false,
            initial: None,
            behavior: Behavior::Inert,
            teams: BTreeSet::new(),
            toggles: 0,
            background: false,
            drawn: false,
            temporary: false,
            traversable: false,
            graspable: false,
            barrier: false,
            cooldown: 0,
        })
    }

    fn build(id: EntityId, kind: EntityKind, options: &EntityOptions, visible_type: CollisionType) -> Result<Self> {
        let contour = options.contour()?;
        let interaction = contour.padded(options.interaction_range.unwrap_or(options.invisible_range))?;
        let movable = options.movable || options.graspable;
        let body = PhysicalBody::new(movable, options.mass, &contour)?;

        let mut shapes = vec![EntityShape::new(ShapeRole::Visible, visible_type)];
        if options.graspable {
            shapes.push(EntityShape::new(ShapeRole::Grasp, CollisionType::Graspable));
        }

        Ok(Self {
            id,
            name: options
                .name
                .clone()
                .unwrap_or_else(|| format!("{}_{}", kind.label(), id.0)),
            kind,
            contour,
            interaction,
            body: Some(body),
            shapes,
            appearance: options.appearance.clone(),
            transform: Transform::default(),
            transform_dirty: false,
            initial: None,
            behavior: Behavior::Inert,
            teams: options.teams.iter().cloned().collect(),
            toggles: 0,
            background: options.background,
            drawn: false,
            temporary: options.temporary,
            traversable: options.traversable,
            graspable: options.graspable,
            barrier: false,
            cooldown: 0,
        })
    }

    // -- builder ------------------------------------------------------------

    /// Add an interaction sensor around the body.
    pub fn with_sensor(mut self, collision_type: CollisionType) -> Result<Self> {
        if self.shapes.iter().any(|s| s.role == ShapeRole::Invisible) {
            return Err(Error::InvalidOption(format!("{} already has an interaction area", self.name)));
        }
        self.shapes.push(EntityShape::new(ShapeRole::Invisible, collision_type));
        Ok(self)
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Collision type of the visible shape.
    pub fn with_collision_type(mut self, collision_type: CollisionType) -> Self {
        for shape in self.shapes.iter_mut().filter(|s| s.role == ShapeRole::Visible) {
            shape.collision_type = collision_type;
        }
        self
    }

    pub fn at(mut self, coordinates: impl Into<InitialCoordinates>) -> Self {
        self.initial = Some(coordinates.into());
        self
    }

    pub(crate) fn as_barrier(mut self) -> Self {
        self.barrier = true;
        self.with_collision_type(CollisionType::Barrier)
    }

    // -- accessors ----------------------------------------------------------

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Entity whose body carries this entity's shapes.
    #[inline]
    pub fn anchor(&self) -> Option<EntityId> {
        match self.kind {
            EntityKind::InteractiveAnchored { anchor } => Some(anchor),
            _ => None,
        }
    }

    #[inline]
    pub fn contour(&self) -> &Contour {
        &self.contour
    }

    #[inline]
    pub fn body(&self) -> Option<&PhysicalBody> {
        self.body.as_ref()
    }

    pub(crate) fn body_mut(&mut self) -> Option<&mut PhysicalBody> {
        self.body.as_mut()
    }

    #[inline]
    pub fn body_handle(&self) -> Option<RigidBodyHandle> {
        self.body.as_ref().and_then(PhysicalBody::handle)
    }

    #[inline]
    pub fn movable(&self) -> bool {
        self.body.as_ref().map_or(false, PhysicalBody::movable)
    }

    #[inline]
    pub fn shapes(&self) -> &[EntityShape] {
        &self.shapes
    }

    pub(crate) fn shapes_mut(&mut self) -> &mut [EntityShape] {
        &mut self.shapes
    }

    pub fn shape(&self, role: ShapeRole) -> Option<&EntityShape> {
        self.shapes.iter().find(|s| s.role == role)
    }

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    pub fn coordinates(&self) -> Coordinates {
        self.transform.coordinates()
    }

    #[inline]
    pub fn position(&self) -> Vector2<f64> {
        self.transform.position
    }

    #[inline]
    pub fn angle(&self) -> f64 {
        self.transform.angle
    }

    #[inline]
    pub fn velocity(&self) -> Vector2<f64> {
        self.transform.velocity
    }

    /// Reposition without simulating; applied to the body before the next integration.
    pub fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.transform.set_coordinates(coordinates);
        self.transform.stop();
        self.transform_dirty = true;
    }

    pub fn set_velocity(&mut self, velocity: Vector2<f64>, angular_velocity: f64) {
        self.transform.velocity = velocity;
        self.transform.angular_velocity = angular_velocity;
        self.transform_dirty = true;
    }

    #[inline]
    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    #[inline]
    pub fn behavior_mut(&mut self) -> &mut Behavior {
        &mut self.behavior
    }

    #[inline]
    pub fn activated(&self) -> bool {
        self.behavior.activated().unwrap_or(false)
    }

    #[inline]
    pub fn appearance(&self) -> Option<&str> {
        self.appearance.as_deref()
    }

    #[inline]
    pub fn teams(&self) -> &BTreeSet<String> {
        &self.teams
    }

    pub(crate) fn join_team(&mut self, team: &str) {
        self.teams.insert(team.to_string());
    }

    #[inline]
    pub fn is_background(&self) -> bool {
        self.background
    }

    #[inline]
    pub fn is_drawn(&self) -> bool {
        self.drawn
    }

    #[inline]
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub(crate) fn mark_temporary(&mut self) {
        self.temporary = true;
    }

    #[inline]
    pub fn is_traversable(&self) -> bool {
        self.traversable
    }

    #[inline]
    pub fn is_graspable(&self) -> bool {
        self.graspable
    }

    #[inline]
    pub fn is_barrier(&self) -> bool {
        self.barrier
    }

    pub fn initial_coordinates(&self) -> Option<&InitialCoordinates> {
        self.initial.as_ref()
    }

    pub fn set_initial_coordinates(&mut self, coordinates: InitialCoordinates) {
        self.initial = Some(coordinates);
    }

    // -- filters ------------------------------------------------------------

    /// Toggle one category bit in the masks of this entity's shapes.
    ///
    /// Takes effect when the playground recomputes the entity's filters.
    pub fn assign_shape_filter(&mut self, category_index: u32) -> Result<()> {
        if category_index >= 32 {
            return Err(Error::InvalidOption(format!("no collision category {category_index}")));
        }
        self.toggles ^= 1 << category_index;
        Ok(())
    }

    fn door_open(&self) -> bool {
        matches!(self.behavior, Behavior::Door { open: true, .. })
    }

    /// Recompute the filter of every shape from flags, teams and toggles.
    pub(crate) fn refresh_filters(&mut self, teams: &TeamTable) -> Result<()> {
        let own = teams.bits(&self.teams)?;
        let door_open = self.door_open();
        for shape in &mut self.shapes {
            let base = match shape.role {
                ShapeRole::Visible if door_open => {
                    shape.filter = ShapeFilter::none();
                    continue;
                }
                ShapeRole::Visible if self.barrier => ShapeFilter::barrier(own, teams.all_bits()),
                ShapeRole::Visible if self.traversable => ShapeFilter::traversable(),
                ShapeRole::Visible => ShapeFilter::solid(own),
                ShapeRole::Invisible | ShapeRole::Grasp => ShapeFilter::sensor(),
            };
            shape.filter = base.with_toggles(self.toggles);
        }
        Ok(())
    }

    // -- physics ------------------------------------------------------------

    /// One rapier collider per shape, in shape order.
    pub(crate) fn build_colliders(&self, config: &PlaygroundConfig) -> Result<Vec<Collider>> {
        self.shapes
            .iter()
            .map(|shape| {
                let geometry = match shape.role {
                    ShapeRole::Visible | ShapeRole::Grasp => collider_shape(&self.contour, false)?,
                    ShapeRole::Invisible => collider_shape(&self.interaction, true)?,
                };
                Ok(ColliderBuilder::new(geometry)
                    .sensor(shape.role.is_sensor())
                    .density(0.0)
                    .friction(config.friction)
                    .restitution(config.restitution)
                    .collision_groups(shape.filter.groups())
                    .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::FILTER_INTERSECTION_PAIR)
                    .active_collision_types(ActiveCollisionTypes::all())
                    .build())
            })
            .collect()
    }

    /// Drop every physics handle after removal from a world.
    pub(crate) fn detach(&mut self) {
        if let Some(body) = &mut self.body {
            body.set_handle(None);
        }
        for shape in &mut self.shapes {
            shape.handle = None;
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Resolve the starting pose. Samplers draw a new pose on every call.
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
        self.set_coordinates(coordinates);
        Ok(coordinates)
    }

    /// Per-step bookkeeping before commands and integration.
    pub fn pre_step(&mut self) {
        if let Some(InitialCoordinates::Trajectory(trajectory)) = &mut self.initial {
            let coordinates = trajectory.next();
            self.set_coordinates(coordinates);
        }
        if !self.background {
            self.drawn = false;
        }
        self.behavior.clear_activation();
    }

    /// Per-step bookkeeping after the world commands ran.
    pub fn post_step(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
    }

    /// Back to the starting state. Anchored entities keep their pose; the playground
    /// re-attaches them to their anchor.
    pub fn reset(&mut self) -> Result<()> {
        self.transform.stop();
        self.transform_dirty = true;
        if let Some(InitialCoordinates::Trajectory(trajectory)) = &mut self.initial {
            trajectory.reset();
        }
        if self.initial.is_some() {
            self.place()?;
        }
        self.behavior.reset();
        self.drawn = false;
        self.cooldown = 0;
        Ok(())
    }

    /// Consume an activation; false while cooling down.
    pub(crate) fn try_activate(&mut self) -> bool {
        if self.cooldown > 0 {
            return false;
        }
        self.cooldown = ACTIVATION_COOLDOWN;
        true
    }

    /// Hand the outlines to `surface`. Skipped when already drawn this step unless forced.
    pub fn draw(&mut self, surface: &mut dyn Surface, draw_invisible: bool, force_recompute: bool) {
        if self.drawn && !force_recompute {
            return;
        }
        for shape in &self.shapes {
            let invisible = match shape.role {
                ShapeRole::Visible => false,
                ShapeRole::Invisible if draw_invisible => true,
                _ => continue,
            };
            let contour = if invisible { &self.interaction } else { &self.contour };
            let vertices = contour
                .vertices(self.transform.angle, invisible)
                .into_iter()
                .map(|v| v + self.transform.position)
                .collect();
            surface.draw(&DrawCall {
                entity: self.id,
                contour,
                vertices,
                position: self.transform.position,
                angle: self.transform.angle,
                radius: if invisible { contour.invisible_radius() } else { contour.radius() },
                invisible,
                appearance: self.appearance.as_deref(),
            });
        }
        self.drawn = true;
    }
}

/// Rapier geometry of a contour footprint.
fn collider_shape(contour: &Contour, invisible: bool) -> Result<SharedShape> {
    match contour.shape() {
        PhysicalShape::Circle => Ok(SharedShape::ball(if invisible {
            contour.invisible_radius()
        } else {
            contour.radius()
        })),
        PhysicalShape::Rectangle => {
            let (width, height) = if invisible { contour.invisible_size() } else { contour.size() };
            Ok(SharedShape::cuboid(width / 2.0, height / 2.0))
        }
        _ => {
            let points: Vec<Point2<f64>> = contour.vertices(0.0, invisible).into_iter().map(Point2::from).collect();
            SharedShape::convex_polyline(points)
                .ok_or_else(|| Error::InvalidShape(format!("{} outline is not convex", contour.shape())))
        }
    }
}
