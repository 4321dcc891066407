//! Fixed-point value types used by the road geometry math
//!
//! - `Fixed1616`: signed 16.16 (road position, running height totals, road width)
//! - `Fixed88`: unsigned 8.8 progress through a height transition, 0x100..=0x1FF
//! - `isqrt`: integer square root matching the hardware routine bit-for-bit

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

// ---------------------------------------------------------------------------
// Fixed1616
// ---------------------------------------------------------------------------

/// Signed 16.16 fixed-point value. Arithmetic wraps like the 32-bit registers
/// it models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixed1616(i32);

impl Fixed1616 {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(0x1_0000);
    /// Reciprocal of three (0x5555), used to average triples of samples.
    pub const ONE_THIRD: Self = Self(0x5555);

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn from_int(whole: i16) -> Self {
        Self((whole as i32) << 16)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Signed integer part.
    pub const fn int(self) -> i16 {
        (self.0 >> 16) as i16
    }

    /// Integer part read as an unsigned table index.
    pub const fn index(self) -> u16 {
        ((self.0 as u32) >> 16) as u16
    }

    pub const fn frac(self) -> u16 {
        self.0 as u16
    }

    pub const fn wrapping_add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }

    pub const fn wrapping_sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }

    /// Multiply an integer by this value and drop the fraction.
    pub const fn mul_int(self, value: i32) -> i32 {
        ((value as i64 * self.0 as i64) >> 16) as i32
    }

    /// Convert to a 12.4 value (`(raw << 4) >> 16`), the format profile
    /// entries are stored in.
    pub const fn to_fixed124(self) -> i16 {
        (self.0.wrapping_shl(4) >> 16) as i16
    }

    pub const fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    pub const fn abs(self) -> Self {
        Self(self.0.wrapping_abs())
    }
}

impl Add for Fixed1616 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
}

impl AddAssign for Fixed1616 {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.wrapping_add(rhs);
    }
}

impl Sub for Fixed1616 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.wrapping_sub(rhs)
    }
}

impl SubAssign for Fixed1616 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = self.wrapping_sub(rhs);
    }
}

impl fmt::Display for Fixed1616 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}.{:04x}", self.0 >> 16, self.frac())
    }
}

// ---------------------------------------------------------------------------
// Fixed88
// ---------------------------------------------------------------------------

/// Unsigned 8.8 progress value. 0x100 is the start of a height transition
/// and 0x1FF is saturation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixed88(u16);

impl Fixed88 {
    pub const ZERO: Self = Self(0);
    pub const START: Self = Self(0x100);
    pub const SATURATED: Self = Self(0x1FF);
    /// Largest progress step a transition can take.
    pub const MAX_PROGRESS: u16 = 0xFF;

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Build from a progress amount, clamped to `MAX_PROGRESS`.
    pub const fn from_progress(progress: u16) -> Self {
        let p = if progress > Self::MAX_PROGRESS {
            Self::MAX_PROGRESS
        } else {
            progress
        };
        Self(0x100 + p)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Distance into the transition (`raw - 0x100`), signed because unset
    /// values sit below 0x100.
    pub const fn progress(self) -> i32 {
        self.0 as i32 - 0x100
    }

    pub const fn is_saturated(self) -> bool {
        self.0 == Self::SATURATED.0
    }
}

impl Default for Fixed88 {
    fn default() -> Self {
        Self::ZERO
    }
}

// ---------------------------------------------------------------------------
// Integer square root
// ---------------------------------------------------------------------------

/// Newton iteration square root. Starts from 1, stops once successive
/// estimates differ by at most one, then steps down until the square fits.
pub fn isqrt(number: u32) -> u32 {
    if number == 0 {
        return 0;
    }

    let number = u64::from(number);
    let next = |n: u64| (n + number / n) >> 1;

    let mut n = 1u64;
    let mut n1 = next(n);
    while n1.abs_diff(n) > 1 {
        n = n1;
        if n == 0 {
            break;
        }
        n1 = next(n);
    }
    while n1 * n1 > number {
        n1 -= 1;
    }
    n1 as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isqrt_matches_floor_sqrt() {
        for n in [0u32, 1, 2, 3, 4, 15, 16, 17, 99, 100, 10_000, 40_000, 0x7FFF_FFFF] {
            let r = isqrt(n);
            assert!(
                u64::from(r) * u64::from(r) <= u64::from(n),
                "isqrt({}) = {} is too large",
                n,
                r
            );
            assert!(
                u64::from(r + 1) * u64::from(r + 1) > u64::from(n),
                "isqrt({}) = {} is too small",
                n,
                r
            );
        }
    }

    #[test]
    fn isqrt_of_straight_chord() {
        // Two (0, 100) deltas summed.
        assert_eq!(isqrt(200 * 200), 200);
    }

    #[test]
    fn fixed1616_parts() {
        let v = Fixed1616::from_raw(0x0003_8000);
        assert_eq!(v.int(), 3);
        assert_eq!(v.frac(), 0x8000);
        assert_eq!(Fixed1616::from_int(-2).int(), -2);
        assert_eq!(Fixed1616::from_raw(-1).index(), 0xFFFF);
    }

    #[test]
    fn one_third_averages_triples() {
        assert_eq!(Fixed1616::ONE_THIRD.mul_int(300), 99);
        assert_eq!(Fixed1616::ONE_THIRD.mul_int(-300), -100);
    }

    #[test]
    fn fixed124_conversion() {
        // 0x2400 per entry for a flat 0x240 horizon
        let total = Fixed1616::from_raw(0x2400 * 16);
        assert_eq!(total.to_fixed124(), 0x24);
    }

    #[test]
    fn fixed88_progress_clamps() {
        assert_eq!(Fixed88::from_progress(0).raw(), 0x100);
        assert_eq!(Fixed88::from_progress(0x80).progress(), 0x80);
        assert!(Fixed88::from_progress(0x400).is_saturated());
        assert_eq!(Fixed88::ZERO.progress(), -0x100);
    }
}
