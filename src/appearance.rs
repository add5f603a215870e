// src/appearance.rs
//! Narrow rendering interface. The playground never rasterizes anything itself; it hands
//! world-space outlines to a [`Surface`] implemented by the caller.

use nalgebra::Vector2;

use crate::contour::Contour;
use crate::entity::EntityId;

/// One outline to draw.
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub entity: EntityId,
    pub contour: &'a Contour,
    /// World-space outline; empty for circles (use `position` and `radius`).
    pub vertices: Vec<Vector2<f64>>,
    pub position: Vector2<f64>,
    pub angle: f64,
    pub radius: f64,
    /// Interaction area rather than the visible body.
    pub invisible: bool,
    /// Opaque handle resolved by the renderer (texture name, colour...).
    pub appearance: Option<&'a str>,
}

/// Rendering collaborator.
pub trait Surface {
    fn draw(&mut self, call: &DrawCall<'_>);
}

/// Surface keeping a count of what it received. Handy for headless runs.
#[derive(Debug, Default, Clone)]
pub struct CountingSurface {
    pub visible: usize,
    pub invisible: usize,
    pub entities: Vec<EntityId>,
}

impl Surface for CountingSurface {
    fn draw(&mut self, call: &DrawCall<'_>) {
        if call.invisible {
            self.invisible += 1;
        } else {
            self.visible += 1;
        }
        self.entities.push(call.entity);
    }
}
