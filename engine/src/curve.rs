//! Multiplier progression curves.

use jetstream_types::MULTIPLIER_ONE;

/// Maps the current multiplier to the next tick's multiplier.
pub trait MultiplierCurve: Send + Sync {
    /// Must return a value strictly greater than `current` for every
    /// `current >= 1.00x`, so any finite crash point is reached in a
    /// finite number of ticks.
    fn advance(&self, current: u64) -> u64;
}

/// Geometric growth per tick, rounded half-up to hundredths.
///
/// The default 105/100 ratio reproduces the classic 5%-per-tick climb:
/// 1.00 -> 1.05 -> 1.10 -> 1.16 -> ...
#[derive(Clone, Copy, Debug)]
pub struct GeometricCurve {
    numerator: u64,
    denominator: u64,
}

impl Default for GeometricCurve {
    fn default() -> Self {
        Self {
            numerator: 105,
            denominator: 100,
        }
    }
}

impl GeometricCurve {
    pub fn new(numerator: u64, denominator: u64) -> Result<Self, &'static str> {
        if denominator == 0 {
            return Err("denominator must be greater than zero");
        }
        if numerator <= denominator {
            return Err("growth ratio must exceed one");
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }
}

impl MultiplierCurve for GeometricCurve {
    fn advance(&self, current: u64) -> u64 {
        let scaled = current
            .saturating_mul(self.numerator)
            .saturating_add(self.denominator / 2)
            / self.denominator;
        // Every step must make progress, even for ratios close to one.
        scaled.max(current.saturating_add(1))
    }
}
