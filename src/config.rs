// src/config.rs
//! Playground-wide simulation parameters.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Tunables for the physics world and for how agent commands turn into motion.
///
/// Every field has a default, so a JSON document only needs the keys it overrides:
///
/// ```
/// use playground_engine::PlaygroundConfig;
///
/// let config = PlaygroundConfig::from_json(r#"{ "linear_force": 250.0 }"#).unwrap();
/// assert_eq!(config.linear_force, 250.0);
/// assert_eq!(config.gravity, [0.0, 0.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaygroundConfig {
    /// Integration time step of one `step()` call, in seconds.
    pub dt: f64,
    /// Top-down playgrounds have no gravity.
    pub gravity: [f64; 2],
    /// Force applied by the base for a forward command of 1.0.
    pub linear_force: f64,
    /// Angular velocity for a rotation/joint command of 1.0, in rad/s.
    pub angular_velocity: f64,
    /// Damping factor of joint velocity motors.
    pub motor_damping: f64,
    /// Motors stop this far (radians) before the joint range boundary.
    pub joint_limit_margin: f64,
    pub linear_damping: f64,
    pub angular_damping: f64,
    pub friction: f64,
    pub restitution: f64,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            gravity: [0.0, 0.0],
            linear_force: 100.0,
            angular_velocity: 0.3,
            motor_damping: 100.0,
            joint_limit_margin: std::f64::consts::PI / 20.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            friction: 0.8,
            restitution: 0.5,
        }
    }
}

impl PlaygroundConfig {
    /// Parse a JSON document, filling missing keys with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = PlaygroundConfig::from_json("{}").unwrap();
        assert_eq!(config, PlaygroundConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PlaygroundConfig::from_json(r#"{ "gravty": [0, 1] }"#).unwrap_err();
        assert!(err.is_construction());
    }
}
