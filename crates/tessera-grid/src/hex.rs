//! Axial hex coordinates.
//!
//! A cell is stored as the axial pair `(q, r)`. The third cube component
//! `s = -q - r` is derived on demand and never stored, so the zero-sum
//! invariant `q + r + s == 0` holds for every value of [`Hex`] by
//! construction.
//!
//! All integer arithmetic saturates: coordinates near `i32::MAX` are far
//! outside any map the server will ever send.

use std::collections::HashSet;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// The six axial neighbor offsets, in the canonical order used by every
/// neighbor query in this crate.
pub const NEIGHBOR_OFFSETS: [Hex; 6] = [
    Hex::new(0, -1),
    Hex::new(1, -1),
    Hex::new(1, 0),
    Hex::new(0, 1),
    Hex::new(-1, 1),
    Hex::new(-1, 0),
];

/// Direction (index into [`NEIGHBOR_OFFSETS`]) of the corner a ring walk
/// starts from.
const RING_START: usize = 4;

/// Walk order around a ring, starting at the [`RING_START`] corner.
const RING_WALK: [usize; 6] = [2, 1, 0, 5, 4, 3];

/// Nudge applied to line samples so points exactly on a cell edge round
/// consistently.
const LINE_EPSILON: f64 = 1e-6;

/// An axial hex grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Hex {
    /// Column axis.
    pub q: i32,
    /// Row axis.
    pub r: i32,
}

impl Hex {
    /// The origin cell.
    pub const ORIGIN: Self = Self::new(0, 0);

    /// Create a cell from its axial components.
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The derived third cube component, `-q - r`.
    pub const fn s(self) -> i32 {
        self.q.saturating_neg().saturating_sub(self.r)
    }

    /// The neighbor in the given direction (taken modulo 6).
    pub fn neighbor(self, direction: usize) -> Self {
        let offset = NEIGHBOR_OFFSETS
            .get(direction.rem_euclid(6))
            .copied()
            .unwrap_or(Self::ORIGIN);
        self + offset
    }

    /// All six neighbors in [`NEIGHBOR_OFFSETS`] order.
    pub fn neighbors(self) -> [Self; 6] {
        NEIGHBOR_OFFSETS.map(|offset| self + offset)
    }

    /// Multiply both components by `factor`.
    pub const fn scale(self, factor: i32) -> Self {
        Self::new(self.q.saturating_mul(factor), self.r.saturating_mul(factor))
    }

    /// Grid distance to `other`, in steps.
    pub const fn distance(self, other: Self) -> u32 {
        let dq = self.q.saturating_sub(other.q);
        let dr = self.r.saturating_sub(other.r);
        let ds = dq.saturating_add(dr);
        dq.unsigned_abs()
            .saturating_add(dr.unsigned_abs())
            .saturating_add(ds.unsigned_abs())
            / 2
    }

    /// Distance from the origin: `max(|q|, |r|, |s|)`.
    pub fn magnitude(self) -> u32 {
        self.q
            .unsigned_abs()
            .max(self.r.unsigned_abs())
            .max(self.s().unsigned_abs())
    }

    /// Round fractional axial coordinates to the nearest cell.
    ///
    /// Each cube component is rounded independently, then the component
    /// with the largest rounding error is recomputed from the other two,
    /// which restores `q + r + s == 0` exactly.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_fractional(fq: f64, fr: f64) -> Self {
        let fs = -fq - fr;

        let mut q = fq.round();
        let mut r = fr.round();
        let s = fs.round();

        let q_err = (q - fq).abs();
        let r_err = (r - fr).abs();
        let s_err = (s - fs).abs();

        if q_err > r_err && q_err > s_err {
            q = -r - s;
        } else if r_err > s_err {
            r = -q - s;
        }
        // Otherwise s carries the largest error; it is dropped implicitly
        // because only q and r are stored.

        Self::new(q as i32, r as i32)
    }

    /// Linear interpolation between two cells, rounded to a cell.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let (fq, fr) = lerp_fractional(self, other, t);
        Self::from_fractional(fq, fr)
    }

    /// Every cell on the straight line from `self` to `other`, inclusive.
    ///
    /// The result has `distance + 1` cells and consecutive cells are
    /// neighbors.
    pub fn line_to(self, other: Self) -> Vec<Self> {
        let steps = self.distance(other);
        if steps == 0 {
            return vec![self];
        }
        let total = f64::from(steps);
        (0..=steps)
            .map(|i| {
                let (fq, fr) = lerp_fractional(self, other, f64::from(i) / total);
                Self::from_fractional(fq + LINE_EPSILON, fr + LINE_EPSILON)
            })
            .collect()
    }

    /// Every cell within `radius` steps of `self`, including `self`.
    pub fn within(self, radius: u32) -> Vec<Self> {
        let n = i32::try_from(radius).unwrap_or(i32::MAX);
        let mut cells = Vec::new();
        for dq in n.saturating_neg()..=n {
            let low = n.saturating_neg().max(dq.saturating_neg().saturating_sub(n));
            let high = n.min(dq.saturating_neg().saturating_add(n));
            for dr in low..=high {
                cells.push(self + Self::new(dq, dr));
            }
        }
        cells
    }

    /// The cells exactly `radius` steps from `self`.
    pub fn ring(self, radius: u32) -> Vec<Self> {
        if radius == 0 {
            return vec![self];
        }
        let k = i32::try_from(radius).unwrap_or(i32::MAX);
        let start = NEIGHBOR_OFFSETS
            .get(RING_START)
            .copied()
            .unwrap_or(Self::ORIGIN)
            .scale(k);
        let mut cursor = self + start;
        let mut cells = Vec::with_capacity(usize::try_from(radius).unwrap_or(0).saturating_mul(6));
        for direction in RING_WALK {
            for _ in 0..radius {
                cells.push(cursor);
                cursor = cursor.neighbor(direction);
            }
        }
        cells
    }

    /// Breadth-first flood outward from `self`: ring 0, ring 1, ... up to
    /// and including ring `limit`. Nearer cells always come first.
    pub fn flood(self, limit: u32) -> Vec<Self> {
        let mut seen = HashSet::new();
        (0..=limit)
            .flat_map(|radius| self.ring(radius))
            .filter(|cell| seen.insert(*cell))
            .collect()
    }
}

/// Fractional axial coordinates a fraction `t` of the way from `a` to `b`.
fn lerp_fractional(a: Hex, b: Hex, t: f64) -> (f64, f64) {
    let (aq, ar) = (f64::from(a.q), f64::from(a.r));
    let (bq, br) = (f64::from(b.q), f64::from(b.r));
    ((bq - aq).mul_add(t, aq), (br - ar).mul_add(t, ar))
}

impl Add for Hex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.q.saturating_add(rhs.q), self.r.saturating_add(rhs.r))
    }
}

impl Sub for Hex {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.q.saturating_sub(rhs.q), self.r.saturating_sub(rhs.r))
    }
}

/// Formats the canonical cell key, `"q,r"`.
impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.q, self.r)
    }
}

impl FromStr for Hex {
    type Err = GridError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let (q, r) = key
            .split_once(',')
            .ok_or_else(|| GridError::MalformedKey(key.to_owned()))?;
        let parse = |component: &str| {
            component
                .trim()
                .parse::<i32>()
                .map_err(|_| GridError::InvalidCoordinate {
                    key: key.to_owned(),
                    component: component.to_owned(),
                })
        };
        Ok(Self::new(parse(q)?, parse(r)?))
    }
}
