//! Background price movement. Between trades, reference prices drift: each step moves a price up
//! or down by a random percentage, rounds to cents and clamps to a floor so a stock can never
//! drift to zero and stay unbuyable forever.
//!
//! The feed only produces numbers. Applying a step to every stock, and re-quoting the exchange's
//! standing sells at the new prices, is handled by the exchange itself.
use rand::thread_rng;
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// How often the server applies a feed step to every stock.
pub const DEFAULT_PERIOD_SECS: u64 = 60;

pub struct PriceFeed {
    impact: Uniform<f64>,
    floor: f64,
}

impl PriceFeed {
    /// Steps move prices between 1% and 5% in either direction, floored at 1.0.
    pub fn new() -> Self {
        Self {
            impact: Uniform::new(0.01, 0.05),
            floor: 1.0,
        }
    }

    pub fn with_impact(low: f64, high: f64, floor: f64) -> Self {
        Self {
            impact: Uniform::new(low, high),
            floor,
        }
    }

    pub fn next_price(&self, current: f64) -> f64 {
        let mut rng = thread_rng();
        let impact = self.impact.sample(&mut rng);
        let moved = if rng.gen_bool(0.5) {
            current * (1.0 + impact)
        } else {
            current * (1.0 - impact)
        };
        ((moved * 100.0).round() / 100.0).max(self.floor)
    }
}

impl Default for PriceFeed {
    fn default() -> Self {
        Self::new()
    }
}
