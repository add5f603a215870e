// src/command_buffer.rs
//! Deferred world commands.
//!
//! Collision handlers run inside the physics step, while rapier holds the world. Anything
//! that changes the world's structure is queued here and flushed right after integration.

use std::collections::VecDeque;

use log::warn;

use crate::agent::{AgentId, PartId};
use crate::components::Coordinates;
use crate::entity::EntityId;

// ============================================================================
// 1. COMMANDS
// ============================================================================

/// Who a teleport moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traveller {
    Agent(AgentId),
    Entity(EntityId),
}

/// A structural change to apply after the step.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldCommand {
    /// Weld `target` to the body carrying the grasper `part`.
    Grasp { agent: AgentId, part: PartId, target: EntityId },
    Teleport { traveller: Traveller, destination: Coordinates },
    SetDoor { door: EntityId, open: bool },
    Dispense { dispenser: EntityId },
    /// Remove the chest and its key and spawn the treasure.
    OpenChest { chest: EntityId },
}

// ============================================================================
// 2. THE BUFFER
// ============================================================================

/// Running totals, kept for the lifetime of the playground.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommandMetrics {
    pub emitted: usize,
    pub processed: usize,
    /// Commands dropped because the buffer was full.
    pub dropped: usize,
}

/// Bounded FIFO of world commands.
#[derive(Debug)]
pub struct CommandBuffer {
    queue: VecDeque<WorldCommand>,
    capacity: usize,
    metrics: CommandMetrics,
}

/// Handlers fire once per pair per step, so a step never gets near this.
pub const DEFAULT_CAPACITY: usize = 4096;

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl CommandBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
            metrics: CommandMetrics::default(),
        }
    }

    /// Queue one command. Dropped, with a warning, when the buffer is full.
    #[inline]
    pub fn emit(&mut self, command: WorldCommand) {
        if self.queue.len() >= self.capacity {
            warn!("command buffer full, dropping {command:?}");
            self.metrics.dropped += 1;
            return;
        }
        self.queue.push_back(command);
        self.metrics.emitted += 1;
    }

    /// Take every queued command, oldest first.
    pub fn drain(&mut self) -> Vec<WorldCommand> {
        let batch: Vec<_> = self.queue.drain(..).collect();
        self.metrics.processed += batch.len();
        batch
    }

    /// Forget pending commands without running them.
    pub fn clear(&mut self) {
        self.metrics.dropped += self.queue.len();
        self.queue.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn metrics(&self) -> CommandMetrics {
        self.metrics
    }
}
