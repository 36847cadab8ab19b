//! Live price simulation.
//!
//! On every tick each record's price is nudged by a uniform random delta and clamped at zero.

use crate::model::Record;
use rand::Rng;
use tracing::debug;

pub const DEFAULT_JITTER: f64 = 5.0;
pub const PRICE_PRECISION: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct PriceTicker {
    /// Half-width of the symmetric delta range.
    pub jitter: f64,
    pub precision: usize,
}

impl Default for PriceTicker {
    fn default() -> Self {
        Self {
            jitter: DEFAULT_JITTER,
            precision: PRICE_PRECISION,
        }
    }
}

impl PriceTicker {
    pub fn new(jitter: f64) -> Self {
        Self {
            jitter: jitter.abs(),
            ..Default::default()
        }
    }

    /// Draw a delta in `(-jitter, jitter]`.
    pub fn random_delta<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        (0.5 - rng.gen::<f64>()) * 2.0 * self.jitter
    }

    /// Apply one delta to a price string. Returns None when the price does not parse.
    pub fn perturb(&self, price: &str, delta: f64) -> Option<String> {
        let current: f64 = price.trim().parse().ok().filter(|v: &f64| v.is_finite())?;
        let next = current + delta;
        if next < 0.0 {
            return Some("0".to_string());
        }
        Some(format!("{:.*}", self.precision, next))
    }

    /// Nudge every record in place; returns how many prices changed.
    pub fn apply<R: Rng + ?Sized>(&self, records: &mut [Record], rng: &mut R) -> usize {
        let mut changed = 0;
        for record in records.iter_mut() {
            let delta = self.random_delta(rng);
            match self.perturb(&record.price, delta) {
                Some(next) => {
                    record.price = next;
                    changed += 1;
                }
                None => debug!(id = record.id, price = %record.price, "skipping unparseable price"),
            }
        }
        changed
    }
}
