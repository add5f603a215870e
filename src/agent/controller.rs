// src/agent/controller.rs
//! Named command channels bound to agent parts.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A command value as set by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandValue {
    Continuous(f64),
    Boolean(bool),
}

impl From<f64> for CommandValue {
    fn from(value: f64) -> Self {
        CommandValue::Continuous(value)
    }
}

impl From<bool> for CommandValue {
    fn from(value: bool) -> Self {
        CommandValue::Boolean(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerKind {
    Continuous { min: f64, max: f64, default: f64 },
    Boolean { default: bool },
}

/// Kind of a controller without its bounds, used to select controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerClass {
    Continuous,
    Boolean,
}

impl ControllerKind {
    #[inline]
    pub fn class(&self) -> ControllerClass {
        match self {
            ControllerKind::Continuous { .. } => ControllerClass::Continuous,
            ControllerKind::Boolean { .. } => ControllerClass::Boolean,
        }
    }
}

/// One command channel. The value persists until set again.
///
/// A disabled controller keeps its value but reads as its default for the step.
#[derive(Debug, Clone, PartialEq)]
pub struct Controller {
    name: String,
    kind: ControllerKind,
    value: CommandValue,
    disabled: bool,
    disable_next: bool,
}

impl Controller {
    pub fn continuous(name: &str, min: f64, max: f64, default: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min <= default && default <= max) {
            return Err(Error::InvalidOption(format!(
                "controller `{name}` needs min <= default <= max, got {min}, {default}, {max}"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            kind: ControllerKind::Continuous { min, max, default },
            value: CommandValue::Continuous(default),
            disabled: false,
            disable_next: false,
        })
    }

    pub fn boolean(name: &str, default: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: ControllerKind::Boolean { default },
            value: CommandValue::Boolean(default),
            disabled: false,
            disable_next: false,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    /// Last command set, disabled or not.
    #[inline]
    pub fn value(&self) -> CommandValue {
        self.value
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Read as default during the next step.
    pub(crate) fn disable_next_step(&mut self) {
        self.disable_next = true;
    }

    /// Start a step: the pending disable, if any, takes over.
    pub(crate) fn advance(&mut self) {
        self.disabled = std::mem::take(&mut self.disable_next);
    }

    fn default_value(&self) -> CommandValue {
        match self.kind {
            ControllerKind::Continuous { default, .. } => CommandValue::Continuous(default),
            ControllerKind::Boolean { default } => CommandValue::Boolean(default),
        }
    }

    fn effective(&self) -> CommandValue {
        if self.disabled {
            self.default_value()
        } else {
            self.value
        }
    }

    /// Set the command. Continuous values are clamped into range.
    pub fn set(&mut self, value: CommandValue) -> Result<()> {
        self.value = match (self.kind, value) {
            (ControllerKind::Continuous { .. }, CommandValue::Continuous(v)) if v.is_nan() => {
                return Err(self.invalid("NaN command"));
            }
            (ControllerKind::Continuous { min, max, .. }, CommandValue::Continuous(v)) => {
                CommandValue::Continuous(v.clamp(min, max))
            }
            (ControllerKind::Boolean { .. }, CommandValue::Boolean(b)) => CommandValue::Boolean(b),
            (ControllerKind::Continuous { .. }, CommandValue::Boolean(_)) => {
                return Err(self.invalid("expected a number, got a boolean"));
            }
            (ControllerKind::Boolean { .. }, CommandValue::Continuous(_)) => {
                return Err(self.invalid("expected a boolean, got a number"));
            }
        };
        Ok(())
    }

    fn invalid(&self, reason: &str) -> Error {
        Error::InvalidCommand {
            controller: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    /// Numeric view of the command in effect; booleans read as 0 or 1.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match self.effective() {
            CommandValue::Continuous(v) => v,
            CommandValue::Boolean(b) => f64::from(u8::from(b)),
        }
    }

    #[inline]
    pub fn as_bool(&self) -> bool {
        match self.effective() {
            CommandValue::Continuous(v) => v != 0.0,
            CommandValue::Boolean(b) => b,
        }
    }

    pub fn reset(&mut self) {
        self.value = self.default_value();
        self.disabled = false;
        self.disable_next = false;
    }

    /// A uniformly random valid command.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> CommandValue {
        match self.kind {
            ControllerKind::Continuous { min, max, .. } if min < max => CommandValue::Continuous(rng.gen_range(min..=max)),
            ControllerKind::Continuous { min, .. } => CommandValue::Continuous(min),
            ControllerKind::Boolean { .. } => CommandValue::Boolean(rng.gen()),
        }
    }
}
