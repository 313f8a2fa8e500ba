//! Fixed-point physical quantities
//!
//! Volumes and clearance heights are held as signed hundredths so that every
//! offset, decrement and split is exact and a plan serialises to the same
//! bytes on every run.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

macro_rules! fixed_point_unit {
    ($(#[$meta:meta])* $name:ident, $suffix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(i64);

        impl $name {
            pub const ZERO: Self = Self(0);

            /// Build from hundredths, e.g. `from_hundredths(16_50)` is 16.50.
            pub const fn from_hundredths(hundredths: i64) -> Self {
                Self(hundredths)
            }

            pub const fn from_whole(units: i64) -> Self {
                Self(units * 100)
            }

            /// Convert from a float, rounding to the nearest hundredth.
            /// Returns `None` for NaN, infinities and absurd magnitudes.
            pub fn from_f64(value: f64) -> Option<Self> {
                if !value.is_finite() {
                    return None;
                }
                let scaled = (value * 100.0).round();
                if scaled.abs() > 1.0e15 {
                    return None;
                }
                Some(Self(scaled as i64))
            }

            pub const fn hundredths(self) -> i64 {
                self.0
            }

            pub fn as_f64(self) -> f64 {
                self.0 as f64 / 100.0
            }

            pub const fn is_positive(self) -> bool {
                self.0 > 0
            }

            /// Multiply by a whole count.
            pub const fn times(self, count: i64) -> Self {
                Self(self.0 * count)
            }

            /// Divide into `parts` equal shares, rounding half away from zero.
            pub fn divided_by(self, parts: i64) -> Self {
                if parts <= 0 {
                    return Self::ZERO;
                }
                let quotient = self.0 / parts;
                let remainder = self.0 % parts;
                if 2 * remainder.abs() >= parts {
                    Self(quotient + self.0.signum())
                } else {
                    Self(quotient)
                }
            }

            /// Round up to a whole number of units.
            pub const fn ceil_whole(self) -> i64 {
                if self.0 >= 0 {
                    (self.0 + 99) / 100
                } else {
                    self.0 / 100
                }
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $name {
            type Output = Self;
            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl SubAssign for $name {
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let sign = if self.0 < 0 { "-" } else { "" };
                let abs = self.0.unsigned_abs();
                write!(f, "{}{}.{:02} {}", sign, abs / 100, abs % 100, $suffix)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_f64(self.as_f64())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = f64::deserialize(deserializer)?;
                Self::from_f64(value).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "{} is not a representable {}",
                        value,
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

fixed_point_unit!(
    /// Liquid volume in microlitres.
    Microlitres,
    "uL"
);

fixed_point_unit!(
    /// Clearance above a well's physical bottom, in millimetres.
    Millimetres,
    "mm"
);

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_float_conversion_is_exact(h in -10_000_000i64..10_000_000) {
            let v = Microlitres::from_hundredths(h);
            prop_assert_eq!(Microlitres::from_f64(v.as_f64()), Some(v));
        }

        #[test]
        fn prop_ceil_whole_bounds_value(h in 0i64..10_000_000) {
            let whole = Microlitres::from_hundredths(h).ceil_whole();
            prop_assert!(whole * 100 >= h);
            prop_assert!(whole * 100 - h < 100);
        }

        #[test]
        fn prop_equal_shares_sum_close_to_total(h in 1i64..200_000, parts in 1i64..8) {
            let total = Microlitres::from_hundredths(h);
            let share = total.divided_by(parts);
            let drift = (share.times(parts) - total).hundredths().abs();
            prop_assert!(drift <= parts);
        }
    }
}
