// src/number.rs

//! Base number requirements shared by the generic controller code.

use piddiy::Number as PiddiyNumber;

/// Custom trait to encapsulate base number requirements.
///
/// Anything `piddiy` can drive qualifies, which includes `f32`, `f64` and the
/// fixed-point types from the `fixed` crate.
pub trait Number: PiddiyNumber {
    /// Clamps generic PartialOrd values within a given range.
    fn clamp(self, min: Self, max: Self) -> Self {
        if self < min {
            min
        } else if max < self {
            max
        } else {
            self
        }
    }
}

impl<T: PiddiyNumber> Number for T {}
