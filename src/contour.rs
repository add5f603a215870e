// src/contour.rs
//! 2D footprint of an entity and the geometry derived from it.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default padding between the visible and the invisible (interaction) footprint.
pub const DEFAULT_INVISIBLE_RANGE: f64 = 5.0;

/// Kind of footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalShape {
    Circle,
    Triangle,
    Square,
    Pentagon,
    Hexagon,
    Rectangle,
}

impl PhysicalShape {
    /// Number of sides of the regular polygons, `None` for circles and rectangles.
    #[inline]
    pub fn sides(self) -> Option<usize> {
        match self {
            PhysicalShape::Triangle => Some(3),
            PhysicalShape::Square => Some(4),
            PhysicalShape::Pentagon => Some(5),
            PhysicalShape::Hexagon => Some(6),
            PhysicalShape::Circle | PhysicalShape::Rectangle => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PhysicalShape::Circle => "circle",
            PhysicalShape::Triangle => "triangle",
            PhysicalShape::Square => "square",
            PhysicalShape::Pentagon => "pentagon",
            PhysicalShape::Hexagon => "hexagon",
            PhysicalShape::Rectangle => "rectangle",
        }
    }
}

impl fmt::Display for PhysicalShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PhysicalShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "circle" => Ok(PhysicalShape::Circle),
            "triangle" => Ok(PhysicalShape::Triangle),
            "square" => Ok(PhysicalShape::Square),
            "pentagon" => Ok(PhysicalShape::Pentagon),
            "hexagon" => Ok(PhysicalShape::Hexagon),
            "rectangle" => Ok(PhysicalShape::Rectangle),
            _ => Err(Error::UnsupportedShape(s.to_string())),
        }
    }
}

/// Immutable footprint: shape kind, visible dimensions and invisible padding.
///
/// Built from either a radius or a `(width, height)` size, never both. The missing
/// dimension is derived so every contour answers both `radius()` and `size()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    shape: PhysicalShape,
    radius: f64,
    size: (f64, f64),
    invisible_radius: f64,
    invisible_size: (f64, f64),
    invisible_range: f64,
}

impl Contour {
    /// Validate and build a contour.
    pub fn new(
        shape: PhysicalShape,
        radius: Option<f64>,
        size: Option<(f64, f64)>,
        invisible_range: f64,
    ) -> Result<Self> {
        if !invisible_range.is_finite() || invisible_range < 0.0 {
            return Err(Error::InvalidShape(format!(
                "invisible range must be a non-negative number, got {invisible_range}"
            )));
        }

        match (radius, size) {
            (Some(radius), None) => {
                check_dimension("radius", radius)?;
                let invisible_radius = radius + invisible_range;
                Ok(Self {
                    shape,
                    radius,
                    size: (radius, radius),
                    invisible_radius,
                    invisible_size: (invisible_radius, invisible_radius),
                    invisible_range,
                })
            }
            (None, Some((width, height))) => {
                check_dimension("width", width)?;
                check_dimension("height", height)?;
                let radius = ((width / 2.0).powi(2) + (height / 2.0).powi(2)).sqrt();
                Ok(Self {
                    shape,
                    radius,
                    size: (width, height),
                    invisible_radius: radius + invisible_range,
                    invisible_size: (width + invisible_range, height + invisible_range),
                    invisible_range,
                })
            }
            (None, None) => Err(Error::InvalidShape("either a radius or a size is required".into())),
            (Some(_), Some(_)) => Err(Error::InvalidShape(
                "radius and size are mutually exclusive".into(),
            )),
        }
    }

    /// Circle-like contour from a radius with the default invisible range.
    pub fn with_radius(shape: PhysicalShape, radius: f64) -> Result<Self> {
        Self::new(shape, Some(radius), None, DEFAULT_INVISIBLE_RANGE)
    }

    /// Box-like contour from a size with the default invisible range.
    pub fn with_size(shape: PhysicalShape, width: f64, height: f64) -> Result<Self> {
        Self::new(shape, None, Some((width, height)), DEFAULT_INVISIBLE_RANGE)
    }

    /// Same footprint with a different invisible padding.
    pub fn padded(&self, invisible_range: f64) -> Result<Self> {
        match self.shape {
            PhysicalShape::Rectangle => Self::new(self.shape, None, Some(self.size), invisible_range),
            _ => Self::new(self.shape, Some(self.radius), None, invisible_range),
        }
    }

    #[inline]
    pub fn shape(&self) -> PhysicalShape {
        self.shape
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn size(&self) -> (f64, f64) {
        self.size
    }

    #[inline]
    pub fn invisible_radius(&self) -> f64 {
        self.invisible_radius
    }

    #[inline]
    pub fn invisible_size(&self) -> (f64, f64) {
        self.invisible_size
    }

    #[inline]
    pub fn invisible_range(&self) -> f64 {
        self.invisible_range
    }

    /// Radius of the smallest origin-centred circle enclosing every footprint.
    #[inline]
    pub fn bounding_radius(&self) -> f64 {
        self.invisible_radius.max(self.radius)
    }

    /// Polygon outline rotated by `offset_angle`.
    ///
    /// Regular polygons emit vertex `k` at angle `k * 2pi / n + offset_angle`, so the
    /// winding is always counter-clockwise. Circles have no vertices.
    pub fn vertices(&self, offset_angle: f64, invisible: bool) -> Vec<Vector2<f64>> {
        if self.shape == PhysicalShape::Rectangle {
            let (width, height) = if invisible { self.invisible_size } else { self.size };
            let rotation = Rotation2::new(offset_angle);
            return [
                Vector2::new(width / 2.0, height / 2.0),
                Vector2::new(width / 2.0, -height / 2.0),
                Vector2::new(-width / 2.0, -height / 2.0),
                Vector2::new(-width / 2.0, height / 2.0),
            ]
            .into_iter()
            .map(|corner| rotation * corner)
            .collect();
        }

        let Some(sides) = self.shape.sides() else {
            return Vec::new();
        };
        let radius = if invisible { self.invisible_radius } else { self.radius };

        (0..sides)
            .map(|k| {
                let theta = k as f64 * 2.0 * PI / sides as f64 + offset_angle;
                Vector2::new(radius * theta.cos(), radius * theta.sin())
            })
            .collect()
    }
}

fn check_dimension(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidShape(format!("{name} must be positive, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_contour_derives_size() {
        let contour = Contour::new(PhysicalShape::Circle, Some(10.0), None, 5.0).unwrap();
        assert_eq!(contour.size(), (10.0, 10.0));
        assert_eq!(contour.invisible_radius(), 15.0);
        assert!(contour.bounding_radius() >= contour.radius());
    }

    #[test]
    fn size_contour_derives_radius() {
        let contour = Contour::with_size(PhysicalShape::Rectangle, 60.0, 80.0).unwrap();
        assert!((contour.radius() - 50.0).abs() < 1e-12);
        assert_eq!(contour.invisible_size(), (65.0, 85.0));
        assert!((contour.invisible_radius() - 55.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert!(Contour::new(PhysicalShape::Circle, None, None, 5.0).is_err());
        assert!(Contour::new(PhysicalShape::Circle, Some(0.0), None, 5.0).is_err());
        assert!(Contour::new(PhysicalShape::Square, Some(-3.0), None, 5.0).is_err());
        assert!(Contour::new(PhysicalShape::Rectangle, None, Some((10.0, f64::NAN)), 5.0).is_err());
        assert!(Contour::new(PhysicalShape::Circle, Some(4.0), Some((1.0, 1.0)), 5.0).is_err());
        assert!(Contour::new(PhysicalShape::Circle, Some(4.0), None, -1.0).is_err());
    }

    #[test]
    fn unknown_shape_name_is_unsupported() {
        assert_eq!("Hexagon".parse::<PhysicalShape>().unwrap(), PhysicalShape::Hexagon);
        let err = "star".parse::<PhysicalShape>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedShape(name) if name == "star"));
    }

    #[test]
    fn polygon_vertices_start_at_offset_and_wind_ccw() {
        let contour = Contour::with_radius(PhysicalShape::Square, 10.0).unwrap();
        let offset = 0.3;
        let vertices = contour.vertices(offset, false);
        assert_eq!(vertices.len(), 4);

        assert!((vertices[0].x - 10.0 * offset.cos()).abs() < 1e-12);
        assert!((vertices[0].y - 10.0 * offset.sin()).abs() < 1e-12);

        for pair in vertices.windows(2) {
            let cross = pair[0].x * pair[1].y - pair[0].y * pair[1].x;
            assert!(cross > 0.0);
        }
    }

    #[test]
    fn invisible_vertices_use_padded_radius() {
        let contour = Contour::new(PhysicalShape::Triangle, Some(10.0), None, 4.0).unwrap();
        for v in contour.vertices(0.0, true) {
            assert!((v.norm() - 14.0).abs() < 1e-12);
        }
        assert!(Contour::with_radius(PhysicalShape::Circle, 3.0).unwrap().vertices(0.0, false).is_empty());
    }

    #[test]
    fn rectangle_corners_rotate() {
        let contour = Contour::with_size(PhysicalShape::Rectangle, 4.0, 2.0).unwrap();
        let corners = contour.vertices(PI / 2.0, false);
        assert!((corners[0].x - -1.0).abs() < 1e-12);
        assert!((corners[0].y - 2.0).abs() < 1e-12);
    }
}
