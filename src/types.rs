//! Common types for box and panel geometry.
//!
//! This module defines the vector and rectangle primitives shared by the
//! shape analyzer, the dimension optimizer, the support generator and the
//! label packer. All lengths are millimetres.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Global numerical tolerance for floating-point comparisons.
///
/// Used for general numerical operations such as dimension and area comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Tolerance used when snapping dimensions to a manufacturing grid.
///
/// Only absorbs floating-point noise: `110.0000000001` stays on `110`, while
/// `110.00005` moves up to the next step.
pub const EPSILON_GRID: f64 = 1e-9;

/// Represents a 3D vector or point in space.
///
/// Used for positions, extents, and calculations in 3D space.
///
/// # Examples
/// ```
/// use wrap_it_now::types::Vec3;
///
/// let inner = Vec3::new(110.0, 110.0, 110.0);
/// let outer = inner + Vec3::splat(2.0 * 3.0);
/// assert_eq!(outer, Vec3::new(116.0, 116.0, 116.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    ///
    /// # Parameters
    /// * `x` - X component (length)
    /// * `y` - Y component (width)
    /// * `z` - Z component (height)
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Creates a vector with the same value on every axis.
    #[inline]
    pub const fn splat(value: f64) -> Self {
        Self::new(value, value, value)
    }

    /// Converts to array format.
    #[inline]
    pub const fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Returns the component along an axis index (0 = x, 1 = y, 2 = z).
    #[inline]
    pub fn axis(&self, index: usize) -> f64 {
        match index {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Returns a copy with the component along `index` replaced.
    #[inline]
    pub fn with_axis(mut self, index: usize, value: f64) -> Self {
        match index {
            0 => self.x = value,
            1 => self.y = value,
            _ => self.z = value,
        }
        self
    }

    /// Calculates the volume (product of all components).
    ///
    /// Useful for dimension vectors.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Surface area of a box with these dimensions.
    #[inline]
    pub fn box_surface_area(&self) -> f64 {
        2.0 * (self.x * self.y + self.y * self.z + self.x * self.z)
    }

    /// Largest component.
    #[inline]
    pub fn max_component(&self) -> f64 {
        self.x.max(self.y).max(self.z)
    }

    /// Smallest component.
    #[inline]
    pub fn min_component(&self) -> f64 {
        self.x.min(self.y).min(self.z)
    }

    /// Returns the midpoint between the origin and this point.
    #[inline]
    pub fn center(&self) -> Self {
        Self::new(self.x / 2.0, self.y / 2.0, self.z / 2.0)
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl From<[f64; 3]> for Vec3 {
    #[inline]
    fn from(values: [f64; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }
}

impl From<Vec3> for [f64; 3] {
    #[inline]
    fn from(vec: Vec3) -> Self {
        vec.to_array()
    }
}

/// Represents an Axis-Aligned Bounding Box (AABB).
///
/// Used for support primitives inside the box cavity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BoundingBox {
    /// Minimum corner (position)
    pub min: Vec3,
    /// Maximum corner (position + dimensions)
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a new bounding box.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Checks if `other` lies completely inside this box.
    #[inline]
    pub fn contains_box(&self, other: &Self, tolerance: f64) -> bool {
        other.min.x >= self.min.x - tolerance
            && other.min.y >= self.min.y - tolerance
            && other.min.z >= self.min.z - tolerance
            && other.max.x <= self.max.x + tolerance
            && other.max.y <= self.max.y + tolerance
            && other.max.z <= self.max.z + tolerance
    }

    /// Clamps this box into `bounds`, shrinking it where it sticks out.
    pub fn clamped_to(&self, bounds: &Self) -> Self {
        let min = Vec3::new(
            self.min.x.clamp(bounds.min.x, bounds.max.x),
            self.min.y.clamp(bounds.min.y, bounds.max.y),
            self.min.z.clamp(bounds.min.z, bounds.max.z),
        );
        let max = Vec3::new(
            self.max.x.clamp(min.x, bounds.max.x),
            self.max.y.clamp(min.y, bounds.max.y),
            self.max.z.clamp(min.z, bounds.max.z),
        );
        Self { min, max }
    }

    /// Returns the dimensions (length, width, height).
    #[inline]
    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Axis-aligned rectangle on a flat panel.
///
/// The origin is the panel's top-left corner, `y` grows downwards.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Checks whether a `width` × `height` block fits inside this rectangle.
    #[inline]
    pub fn can_hold(&self, width: f64, height: f64, tolerance: f64) -> bool {
        width <= self.width + tolerance && height <= self.height + tolerance
    }

    /// Shrinks the rectangle by `margin` on every side.
    ///
    /// Returns `None` when nothing usable is left.
    pub fn inset(&self, margin: f64) -> Option<Self> {
        let width = self.width - 2.0 * margin;
        let height = self.height - 2.0 * margin;
        if width <= EPSILON_GENERAL || height <= EPSILON_GENERAL {
            return None;
        }
        Some(Self::new(self.x + margin, self.y + margin, width, height))
    }
}

/// Validation functions shared by the model constructors.
pub mod validation {

    /// Validates a single dimension.
    ///
    /// # Parameters
    /// * `value` - The value to validate
    /// * `name` - Name of the dimension for error messages
    ///
    /// # Returns
    /// `Ok(())` for valid values, otherwise error text
    pub fn validate_dimension(value: f64, name: &str) -> Result<(), String> {
        if value.is_nan() {
            return Err(format!("{} must not be NaN", name));
        }
        if value.is_infinite() {
            return Err(format!("{} must not be infinite", name));
        }
        if value <= 0.0 {
            return Err(format!("{} must be positive, got: {}", name, value));
        }
        Ok(())
    }

    /// Validates a value that may be zero but not negative.
    pub fn validate_non_negative(value: f64, name: &str) -> Result<(), String> {
        if !value.is_finite() {
            return Err(format!("{} must be finite, got: {}", name, value));
        }
        if value < 0.0 {
            return Err(format!("{} must not be negative, got: {}", name, value));
        }
        Ok(())
    }

    /// Validates a value inside a closed range.
    pub fn validate_range(value: f64, min: f64, max: f64, name: &str) -> Result<(), String> {
        if !value.is_finite() || value < min || value > max {
            return Err(format!(
                "{} must be between {} and {}, got: {}",
                name, min, max, value
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(a.with_axis(1, 9.0), Vec3::new(1.0, 9.0, 3.0));
        assert_eq!(b.axis(2), 6.0);
    }

    #[test]
    fn test_vec3_volume_and_area() {
        let dims = Vec3::new(10.0, 20.0, 30.0);
        assert!((dims.volume() - 6000.0).abs() < EPSILON_GENERAL);
        assert!((dims.box_surface_area() - 2200.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_bounding_box_clamp_stays_inside() {
        let bounds = BoundingBox::new(Vec3::splat(1.0), Vec3::splat(9.0));
        let sticking_out = BoundingBox::new(Vec3::new(-5.0, 2.0, 7.0), Vec3::new(1.0, 8.0, 13.0));

        let clamped = sticking_out.clamped_to(&bounds);
        assert!(bounds.contains_box(&clamped, EPSILON_GENERAL));
        assert_eq!(clamped.min, Vec3::new(1.0, 2.0, 7.0));
        assert_eq!(clamped.max, Vec3::new(1.0, 8.0, 9.0));
    }

    #[test]
    fn test_rect_inset() {
        let panel = Rect::new(0.0, 0.0, 100.0, 50.0);
        let inner = panel.inset(2.0).unwrap();
        assert_eq!(inner, Rect::new(2.0, 2.0, 96.0, 46.0));
        assert!(Rect::new(0.0, 0.0, 3.0, 3.0).inset(2.0).is_none());
    }

    #[test]
    fn test_validation_dimension() {
        assert!(validation::validate_dimension(10.0, "Length").is_ok());
        assert!(validation::validate_dimension(0.0, "Length").is_err());
        assert!(validation::validate_dimension(-1.0, "Length").is_err());
        assert!(validation::validate_dimension(f64::NAN, "Length").is_err());
        assert!(validation::validate_dimension(f64::INFINITY, "Length").is_err());
    }

    #[test]
    fn test_validation_range() {
        assert!(validation::validate_range(0.5, 0.0, 1.0, "Score").is_ok());
        assert!(validation::validate_range(1.5, 0.0, 1.0, "Score").is_err());
        assert!(validation::validate_non_negative(0.0, "Padding").is_ok());
        assert!(validation::validate_non_negative(-0.1, "Padding").is_err());
    }
}
