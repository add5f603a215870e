// src/error.rs
//! Error handling for the whole crate.
//!
//! Errors fall in three families: construction errors (bad shape or option values, nothing
//! was built), lifecycle errors (add/remove/placement misuse, the playground is left as it
//! was) and control errors (unknown parts/controllers, wrong command kinds). Collision
//! handlers never produce errors.

use thiserror::Error;

use crate::agent::AgentId;
use crate::entity::EntityId;

/// Main error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Contradictory or non-positive shape parameters.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Shape kind this crate cannot build a body or collider for.
    #[error("unsupported physical shape `{0}`")]
    UnsupportedShape(String),

    /// Option value rejected at construction time.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// Coordinates that cannot be used to place an entity.
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("entity {0} is already in the playground")]
    AlreadyAdded(EntityId),

    #[error("entity {0} is not in the playground")]
    NotInPlayground(EntityId),

    #[error("agent {0} is already in the playground")]
    AgentAlreadyAdded(AgentId),

    #[error("agent {0} is not in the playground")]
    AgentNotInPlayground(AgentId),

    /// An anchored entity was added before the entity it hangs on.
    #[error("anchor {anchor} of entity {entity} is not in the playground")]
    AnchorNotInPlayground { entity: EntityId, anchor: EntityId },

    /// The agent's part tree can only change before it is added to a playground.
    #[error("agent {0} is in a playground; its parts can no longer change")]
    AgentLocked(AgentId),

    #[error("agent has no part {0}")]
    UnknownPart(usize),

    #[error("part `{part}` has no controller `{controller}`")]
    UnknownController { part: String, controller: String },

    #[error("invalid command for controller `{controller}`: {reason}")]
    InvalidCommand { controller: String, reason: String },

    #[error("unknown team `{0}`")]
    UnknownTeam(String),

    #[error("too many teams (at most {0})")]
    TooManyTeams(usize),

    /// Configuration parsing.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Context chaining.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Add context to any error (chainable, like `.context()` in anyhow).
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for errors raised while building shapes, bodies or entities.
    #[inline]
    pub fn is_construction(&self) -> bool {
        matches!(
            self.root(),
            Error::InvalidShape(_) | Error::UnsupportedShape(_) | Error::InvalidOption(_) | Error::Config(_)
        )
    }

    /// True for errors raised by add/remove/placement operations.
    #[inline]
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self.root(),
            Error::AlreadyAdded(_)
                | Error::NotInPlayground(_)
                | Error::AgentAlreadyAdded(_)
                | Error::AgentNotInPlayground(_)
                | Error::AnchorNotInPlayground { .. }
                | Error::AgentLocked(_)
                | Error::InvalidCoordinates(_)
        )
    }
}

/// Convenient `Result` alias, use `crate::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, Error>;
