//! Simulated clock.

use serde::Serialize;

use crate::error::SimulationError;

/// Single monotonically advancing time authority (minutes since t=0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Clock {
    now: f64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Advances by `delta` minutes and returns the new time.
    ///
    /// # Errors
    /// [`SimulationError::InvalidDelta`] unless `delta` is finite and > 0.
    pub fn advance(&mut self, delta: f64) -> Result<f64, SimulationError> {
        if !delta.is_finite() || delta <= 0.0 {
            return Err(SimulationError::InvalidDelta(delta));
        }
        self.now += delta;
        Ok(self.now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance() {
        let mut clock = Clock::new();
        assert_eq!(clock.advance(1.5).unwrap(), 1.5);
        assert_eq!(clock.advance(0.5).unwrap(), 2.0);
    }

    #[test]
    fn test_rejects_non_positive_delta() {
        let mut clock = Clock::new();
        for delta in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(clock.advance(delta).is_err());
        }
        assert_eq!(clock.now(), 0.0);
    }
}
