//! Tolerance policy — how much drift in timing and sample rate a new record
//! may show from a section's running aggregate before it starts a new
//! section.
//!
//! Kept behind a trait so callers (and tests) can supply a fixed tolerance
//! without threading a whole [`Config`](crate::config::Config) through.

use crate::config::Config;

pub trait Tolerances {
    /// Maximum allowed gap/overlap, in nanoseconds, between the expected
    /// continuation time of a section and a candidate record's start time.
    /// `nominal_period_ns` is the section's current sample period
    /// (`1e9 / sample_rate`), used as the default scale when no explicit
    /// override is configured.
    fn time_tolerance_ns(&self, nominal_period_ns: f64) -> i64;

    /// Maximum allowed *relative* difference between two sample rates for
    /// them to be considered the same rate, e.g. `1e-4` for 0.01%.
    fn rate_tolerance(&self) -> f64;

    /// True if `a` and `b` differ by no more than [`rate_tolerance`].
    fn rates_match(&self, a: f64, b: f64) -> bool {
        if a == b {
            return true;
        }
        if a == 0.0 || b == 0.0 {
            return false;
        }
        ((a - b).abs() / a.abs()) <= self.rate_tolerance()
    }
}

/// The default policy: half a sample period unless overridden explicitly,
/// and a configurable relative rate tolerance.
pub struct DefaultTolerances {
    time_tolerance_ns: Option<i64>,
    rate_tolerance: f64,
}

impl DefaultTolerances {
    pub fn from_config(config: &Config) -> Self {
        Self {
            time_tolerance_ns: config.time_tolerance_ns,
            rate_tolerance: config.rate_tolerance,
        }
    }

    pub fn new(time_tolerance_ns: Option<i64>, rate_tolerance: f64) -> Self {
        Self {
            time_tolerance_ns,
            rate_tolerance,
        }
    }
}

impl Tolerances for DefaultTolerances {
    fn time_tolerance_ns(&self, nominal_period_ns: f64) -> i64 {
        match self.time_tolerance_ns {
            Some(explicit) => explicit,
            None => (nominal_period_ns / 2.0).round() as i64,
        }
    }

    fn rate_tolerance(&self) -> f64 {
        self.rate_tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_period_default() {
        let t = DefaultTolerances::new(None, 1e-4);
        // 100 Hz -> period 10_000_000 ns -> half is 5_000_000 ns
        assert_eq!(t.time_tolerance_ns(10_000_000.0), 5_000_000);
    }

    #[test]
    fn explicit_override_wins() {
        let t = DefaultTolerances::new(Some(1234), 1e-4);
        assert_eq!(t.time_tolerance_ns(10_000_000.0), 1234);
    }

    #[test]
    fn rate_match_within_tolerance() {
        let t = DefaultTolerances::new(None, 1e-4);
        assert!(t.rates_match(100.0, 100.005));
        assert!(!t.rates_match(100.0, 100.5));
    }

    #[test]
    fn rate_match_zero_handling() {
        let t = DefaultTolerances::new(None, 1e-4);
        assert!(t.rates_match(0.0, 0.0));
        assert!(!t.rates_match(0.0, 1.0));
    }
}
