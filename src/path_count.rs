//! Overflow-immune shortest-path counts.
//!
//! The number of shortest paths between two nodes can grow exponentially with the graph
//! (a chain of diamonds doubles it at every step), so neither `u64` nor `f64` can hold it.
//! [`PathCount`] keeps a normalized `f64` mantissa next to an `i64` binary exponent.
//!
//! Public invariant:
//! - Counts are only ever narrowed to `f64` through [`PathCount::ratio`] or
//!   [`PathCount::to_f64`]; all accumulation happens in the scaled form.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

/// Exponent gap beyond which the smaller addend vanishes below mantissa precision.
const NEGLIGIBLE_GAP: i64 = 64;

/// A non-negative count stored as `mantissa * 2^exponent`.
///
/// `mantissa` is either `0.0` or lies in `[0.5, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathCount {
    mantissa: f64,
    exponent: i64,
}

impl PathCount {
    pub const fn zero() -> Self {
        Self { mantissa: 0.0, exponent: 0 }
    }

    pub const fn one() -> Self {
        Self { mantissa: 0.5, exponent: 1 }
    }

    fn from_parts(mantissa: f64, exponent: i64) -> Self {
        if mantissa == 0.0 {
            return Self::zero();
        }
        let (m, e) = frexp(mantissa);
        Self { mantissa: m, exponent: exponent + e }
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0.0
    }

    /// `self * factor` for a finite, non-negative `factor`.
    pub fn scaled(self, factor: f64) -> PathCount {
        if self.is_zero() || factor == 0.0 {
            return Self::zero();
        }
        Self::from_parts(self.mantissa * factor, self.exponent)
    }

    /// `self / other` narrowed to `f64`.
    ///
    /// Returns `NaN` when `other` is zero.
    pub fn ratio(&self, other: &PathCount) -> f64 {
        if other.is_zero() {
            return f64::NAN;
        }
        ldexp(self.mantissa / other.mantissa, self.exponent - other.exponent)
    }

    /// Saturates to `f64::INFINITY` for counts beyond the `f64` range.
    pub fn to_f64(&self) -> f64 {
        ldexp(self.mantissa, self.exponent)
    }

    /// Relative comparison, for checking counts produced along different summation orders.
    pub fn approx_eq(&self, other: &PathCount, rel_tol: f64) -> bool {
        match (self.is_zero(), other.is_zero()) {
            (true, true) => true,
            (false, false) => (self.ratio(other) - 1.0).abs() <= rel_tol,
            _ => false,
        }
    }
}

impl Default for PathCount {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for PathCount {
    fn from(n: u64) -> Self {
        // Exact for n < 2^53, which covers every literal count in practice.
        Self::from_parts(n as f64, 0)
    }
}

impl Add for PathCount {
    type Output = PathCount;

    fn add(self, rhs: PathCount) -> PathCount {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        let (hi, lo) = if self.exponent >= rhs.exponent { (self, rhs) } else { (rhs, self) };
        let gap = hi.exponent - lo.exponent;
        if gap > NEGLIGIBLE_GAP {
            return hi;
        }
        Self::from_parts(hi.mantissa + ldexp(lo.mantissa, -gap), hi.exponent)
    }
}

impl AddAssign for PathCount {
    fn add_assign(&mut self, rhs: PathCount) {
        *self = *self + rhs;
    }
}

impl Mul for PathCount {
    type Output = PathCount;

    fn mul(self, rhs: PathCount) -> PathCount {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        Self::from_parts(self.mantissa * rhs.mantissa, self.exponent + rhs.exponent)
    }
}

impl Sum for PathCount {
    fn sum<I: Iterator<Item = PathCount>>(iter: I) -> Self {
        iter.fold(PathCount::zero(), |acc, c| acc + c)
    }
}

impl<'a> Sum<&'a PathCount> for PathCount {
    fn sum<I: Iterator<Item = &'a PathCount>>(iter: I) -> Self {
        iter.fold(PathCount::zero(), |acc, c| acc + *c)
    }
}

impl fmt::Display for PathCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.to_f64();
        if v.is_finite() {
            write!(f, "{v}")
        } else {
            // log10(m * 2^e) = log10(m) + e * log10(2)
            let log10 = self.mantissa.log10() + self.exponent as f64 * std::f64::consts::LOG10_2;
            let exp10 = log10.floor();
            write!(f, "{:.6}e{}", 10f64.powf(log10 - exp10), exp10 as i64)
        }
    }
}

/// Split a finite, non-zero `x` into `(m, e)` with `x = m * 2^e` and `|m|` in `[0.5, 1)`.
fn frexp(x: f64) -> (f64, i64) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i64;
    if biased == 0 {
        // Subnormal: scale into the normal range first.
        let (m, e) = frexp(x * 2f64.powi(64));
        return (m, e - 64);
    }
    let m = f64::from_bits((bits & !(0x7ff_u64 << 52)) | (1022_u64 << 52));
    (m, biased - 1022)
}

/// `m * 2^e`, saturating to zero or infinity outside the `f64` range.
fn ldexp(m: f64, e: i64) -> f64 {
    if m == 0.0 {
        return m;
    }
    let e = e.clamp(-2200, 2200) as i32;
    // Two half steps keep 2^half finite while the product may still be representable.
    let half = e / 2;
    m * 2f64.powi(half) * 2f64.powi(e - half)
}
