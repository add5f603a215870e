// src/filter.rs
//! Collision categories, shape filters and the team table.
//!
//! A shape pair is only tested by the physics engine when each shape's categories
//! intersect the other shape's mask.

use std::collections::BTreeMap;

use bitflags::bitflags;
use rapier2d::prelude::{Group, InteractionGroups};

use crate::{Error, Result};

bitflags! {
    /// Fixed category bits. Team bits live above them, starting at [`TEAM_BASE_BIT`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Categories: u32 {
        /// Solid, non-traversable shapes.
        const DEFAULT = 1 << 0;
        /// Sensor shapes (invisible interaction areas, grasp areas).
        const SENSOR = 1 << 1;
        /// Solid shapes that other solids go through.
        const TRAVERSABLE = 1 << 2;
        /// Team barriers.
        const BARRIER = 1 << 3;
    }
}

/// Index of the first team bit.
pub const TEAM_BASE_BIT: u32 = 8;

/// Maximum number of teams a playground can register.
pub const MAX_TEAMS: usize = (32 - TEAM_BASE_BIT) as usize;

const ALL: u32 = u32::MAX;

/// Category/mask pair of one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeFilter {
    pub categories: u32,
    pub mask: u32,
}

impl ShapeFilter {
    /// Solid shape, optionally member of some teams.
    #[inline]
    pub fn solid(team_bits: u32) -> Self {
        Self {
            categories: Categories::DEFAULT.bits() | team_bits,
            mask: ALL & !Categories::TRAVERSABLE.bits(),
        }
    }

    /// Solid shape that does not collide with other solids, but is still seen by sensors.
    #[inline]
    pub fn traversable() -> Self {
        Self {
            categories: Categories::TRAVERSABLE.bits(),
            mask: ALL & !(Categories::DEFAULT | Categories::TRAVERSABLE | Categories::BARRIER).bits(),
        }
    }

    /// Sensor shape, sees everything.
    #[inline]
    pub fn sensor() -> Self {
        Self {
            categories: Categories::SENSOR.bits(),
            mask: ALL,
        }
    }

    /// Barrier stopping members of every registered team except its own.
    #[inline]
    pub fn barrier(own_team_bits: u32, all_team_bits: u32) -> Self {
        Self {
            categories: Categories::BARRIER.bits(),
            mask: all_team_bits & !own_team_bits,
        }
    }

    /// Shape taken out of every interaction (open doors).
    #[inline]
    pub fn none() -> Self {
        Self { categories: 0, mask: 0 }
    }

    /// Flip one category bit in the mask. Applying the same toggle twice is a no-op.
    #[inline]
    pub fn toggle(&mut self, category_index: u32) {
        self.mask ^= 1u32 << category_index;
    }

    /// Apply a set of toggles (xor mask).
    #[inline]
    pub fn with_toggles(mut self, toggles: u32) -> Self {
        self.mask ^= toggles;
        self
    }

    /// Same test the physics engine performs.
    #[inline]
    pub fn interacts_with(&self, other: &ShapeFilter) -> bool {
        (self.categories & other.mask) != 0 && (other.categories & self.mask) != 0
    }

    #[inline]
    pub fn groups(&self) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(self.categories),
            Group::from_bits_truncate(self.mask),
        )
    }
}

/// Team name to category bit mapping of one playground.
#[derive(Debug, Clone, Default)]
pub struct TeamTable {
    teams: BTreeMap<String, u32>,
}

impl TeamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a team and return its category index. Registering twice is a no-op.
    pub fn add(&mut self, name: &str) -> Result<u32> {
        if let Some(index) = self.teams.get(name) {
            return Ok(*index);
        }
        if self.teams.len() >= MAX_TEAMS {
            return Err(Error::TooManyTeams(MAX_TEAMS));
        }
        let index = TEAM_BASE_BIT + self.teams.len() as u32;
        self.teams.insert(name.to_string(), index);
        Ok(index)
    }

    /// Category index of a team.
    pub fn index(&self, name: &str) -> Option<u32> {
        self.teams.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.teams.contains_key(name)
    }

    /// Union of the bits of the given teams. Unknown names fail.
    pub fn bits<'a, I>(&self, names: I) -> Result<u32>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names.into_iter().try_fold(0u32, |acc, name| {
            self.index(name)
                .map(|index| acc | (1 << index))
                .ok_or_else(|| Error::UnknownTeam(name.clone()))
        })
    }

    /// Bits of every registered team.
    pub fn all_bits(&self) -> u32 {
        self.teams.values().fold(0, |acc, index| acc | (1 << index))
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}
