//! Integer math for fixed-point fractions, ticks and liquidity.

/// Liquidity and amount conversions within a tick range.
pub mod concentrated_liquidity;
/// Fixed-point helpers.
pub mod fixed_point;
/// Tick to sqrt price conversions.
pub mod tick_math;

pub use fixed_point::{Q64, Q96, Rounding, X64, mul_div};
