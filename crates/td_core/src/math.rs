//! Fixed-point math utilities for deterministic placement.
//!
//! Grid snapping relies on floor division of world positions. Doing that in
//! floating point makes cell boundaries drift between platforms, so every
//! world coordinate in this crate is fixed-point.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all placement math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Create a vector from whole world units.
    #[must_use]
    pub fn from_units(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Create a vector from floating-point input at an API boundary.
    ///
    /// Non-finite values collapse to zero, out-of-range values saturate.
    #[must_use]
    pub fn from_f64(x: f64, y: f64) -> Self {
        Self::new(saturating_from_f64(x), saturating_from_f64(y))
    }

    /// Convert to floating point for presentation layers.
    #[must_use]
    pub fn to_f64(self) -> (f64, f64) {
        (self.x.to_num::<f64>(), self.y.to_num::<f64>())
    }

    /// Squared distance (avoids sqrt for comparisons).
    ///
    /// Saturates instead of overflowing for far-apart points.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x.saturating_sub(other.x);
        let dy = self.y.saturating_sub(other.y);
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Check whether `other` lies within `radius` of this point (inclusive).
    #[must_use]
    pub fn within(self, other: Self, radius: Fixed) -> bool {
        self.distance_squared(other) <= radius.saturating_mul(radius)
    }

    /// Midpoint between two vectors.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        let two = Fixed::from_num(2);
        Self::new((self.x + other.x) / two, (self.y + other.y) / two)
    }
}

fn saturating_from_f64(value: f64) -> Fixed {
    if value.is_finite() {
        Fixed::saturating_from_num(value)
    } else {
        Fixed::ZERO
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let one = Fixed::from_num(1);
    let mut low = Fixed::ZERO;
    let mut high = if value > one { value } else { one };

    for _ in 0..48 {
        let mid = low + (high - low) / Fixed::from_num(2);
        if mid.saturating_mul(mid) <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_squared() {
        let a = Vec2Fixed::from_units(3, 0);
        let b = Vec2Fixed::from_units(0, 4);
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_distance_saturates_far_apart() {
        let a = Vec2Fixed::from_units(-2_000_000_000, 0);
        let b = Vec2Fixed::from_units(2_000_000_000, 0);
        assert_eq!(a.distance_squared(b), Fixed::MAX);
    }

    #[test]
    fn test_distance() {
        let a = Vec2Fixed::ZERO;
        let b = Vec2Fixed::from_units(6, 8);
        let epsilon = Fixed::from_num(1) / Fixed::from_num(10000);
        assert!((a.distance(b) - Fixed::from_num(10)).abs() < epsilon);
    }

    #[test]
    fn test_within_is_inclusive() {
        let a = Vec2Fixed::ZERO;
        let b = Vec2Fixed::from_units(10, 0);
        assert!(a.within(b, Fixed::from_num(10)));
        assert!(!a.within(b, Fixed::from_num(9)));
    }

    #[test]
    fn test_midpoint() {
        let a = Vec2Fixed::from_units(0, 10);
        let b = Vec2Fixed::from_units(0, 20);
        assert_eq!(a.midpoint(b), Vec2Fixed::from_units(0, 15));
    }

    #[test]
    fn test_from_f64_rejects_nan() {
        let v = Vec2Fixed::from_f64(f64::NAN, 2.5);
        assert_eq!(v.x, Fixed::ZERO);
        assert_eq!(v.y, Fixed::from_num(2.5));
    }
}
