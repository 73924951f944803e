//! Pixel projection for pointy-top hex cells.
//!
//! The forward transform scales by `1.5 * pitch`:
//!
//! ```text
//! x = 1.5 * pitch * (sqrt(3) * q + sqrt(3) / 2 * r)
//! y = 1.5 * pitch * (1.5 * r)
//! ```
//!
//! [`HexLayout::from_pixel`] inverts it into fractional axial coordinates
//! and rounds through [`Hex::from_fractional`], so
//! `from_pixel(to_pixel(h)) == h` for every cell.

use serde::{Deserialize, Serialize};

use crate::hex::Hex;

/// Grid pitch used when none is configured.
pub const DEFAULT_GRID_PITCH: f64 = 100.0;

/// Scale between the grid pitch and the hex size used by the projection.
const SIZE_PER_PITCH: f64 = 1.5;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// A point in screen space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal pixel coordinate.
    pub x: f64,
    /// Vertical pixel coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The point a fraction `t` of the way from `self` to `other`.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            (other.x - self.x).mul_add(t, self.x),
            (other.y - self.y).mul_add(t, self.y),
        )
    }
}

/// Converts between cells and pixels for a fixed grid pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HexLayout {
    /// The grid pitch `G`.
    pub pitch: f64,
}

impl HexLayout {
    /// Create a layout for the given pitch.
    pub const fn new(pitch: f64) -> Self {
        Self { pitch }
    }

    fn size(self) -> f64 {
        self.pitch * SIZE_PER_PITCH
    }

    /// Center of `hex` in pixel space.
    pub fn to_pixel(self, hex: Hex) -> Point {
        let q = f64::from(hex.q);
        let r = f64::from(hex.r);
        let size = self.size();
        Point::new(
            size * SQRT_3.mul_add(q, SQRT_3 / 2.0 * r),
            size * (1.5 * r),
        )
    }

    /// The cell containing pixel `point`.
    pub fn from_pixel(self, point: Point) -> Hex {
        let size = self.size();
        let fq = (SQRT_3 / 3.0).mul_add(point.x, -point.y / 3.0) / size;
        let fr = (2.0 / 3.0 * point.y) / size;
        Hex::from_fractional(fq, fr)
    }
}

impl Default for HexLayout {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_PITCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn origin_projects_to_origin() {
        let p = HexLayout::default().to_pixel(Hex::ORIGIN);
        assert!(close(p.x, 0.0));
        assert!(close(p.y, 0.0));
    }

    #[test]
    fn forward_matches_formula() {
        let layout = HexLayout::new(100.0);
        let p = layout.to_pixel(Hex::new(2, -1));
        let expected_x = 100.0 * 1.5 * (3.0_f64.sqrt() * 2.0 + 3.0_f64.sqrt() / 2.0 * -1.0);
        let expected_y = 100.0 * 1.5 * (1.5 * -1.0);
        assert!(close(p.x, expected_x));
        assert!(close(p.y, expected_y));
    }

    #[test]
    fn scenario_two_minus_one_roundtrips() {
        let layout = HexLayout::new(100.0);
        let cell = Hex::new(2, -1);
        assert_eq!(layout.from_pixel(layout.to_pixel(cell)), cell);
    }

    #[test]
    fn roundtrip_is_exact_across_the_grid() {
        let layout = HexLayout::default();
        for q in -1000..=1000 {
            for r in -1000..=1000 {
                let cell = Hex::new(q, r);
                assert_eq!(layout.from_pixel(layout.to_pixel(cell)), cell, "cell {cell}");
            }
        }
    }

    #[test]
    fn roundtrip_holds_for_odd_pitches() {
        for pitch in [1.0, 17.5, 32.0, 64.25] {
            let layout = HexLayout::new(pitch);
            for cell in Hex::new(-40, 25).within(3) {
                assert_eq!(layout.from_pixel(layout.to_pixel(cell)), cell);
            }
        }
    }

    #[test]
    fn pixels_near_a_center_resolve_to_that_cell() {
        let layout = HexLayout::new(10.0);
        let cell = Hex::new(3, -2);
        let center = layout.to_pixel(cell);
        let nudged = Point::new(center.x + 2.0, center.y - 2.0);
        assert_eq!(layout.from_pixel(nudged), cell);
    }

    #[test]
    fn point_lerp_midpoint() {
        let mid = Point::new(0.0, 10.0).lerp(Point::new(10.0, 20.0), 0.5);
        assert!(close(mid.x, 5.0));
        assert!(close(mid.y, 15.0));
    }
}
