//! Simulation tuning parameters
//!
//! Everything the coordinator needs beyond the per-call arena geometry:
//! spawn ranges, cadences and shutdown budgets. Serde-derived so a host
//! application can load it from JSON.

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Tunable simulation parameters with sensible defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Minimum randomized ball mass
    pub min_mass: f64,
    /// Maximum randomized ball mass
    pub max_mass: f64,
    /// Ball diameter at spawn
    pub diameter: f64,
    /// Initial velocity components are drawn uniformly from
    /// [-max_start_speed, max_start_speed] (units/sec)
    pub max_start_speed: f64,
    /// Collision engine cadence in milliseconds
    pub collision_interval_ms: u64,
    /// How long `stop()` waits for each thread before abandoning it
    pub join_timeout_ms: u64,
    /// Bounded capacity of the event log queue; entries beyond this are
    /// dropped rather than blocking a driver
    pub event_queue_capacity: usize,
    /// RNG seed for spawn randomization; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            min_mass: 0.5,
            max_mass: 2.0,
            diameter: 10.0,
            max_start_speed: 100.0,
            collision_interval_ms: 16,
            join_timeout_ms: 3000,
            event_queue_capacity: 1024,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Validate parameter ranges; called by `Simulation::new`
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.min_mass > 0.0) || self.max_mass < self.min_mass {
            return Err(SimError::InvalidRange {
                name: "mass",
                min: self.min_mass,
                max: self.max_mass,
            });
        }
        if !(self.diameter > 0.0) {
            return Err(SimError::InvalidDiameter(self.diameter));
        }
        if !(self.max_start_speed > 0.0) {
            return Err(SimError::InvalidRange {
                name: "start speed",
                min: 0.0,
                max: self.max_start_speed,
            });
        }
        if self.collision_interval_ms == 0 {
            return Err(SimError::InvalidRange {
                name: "collision interval",
                min: 1.0,
                max: 0.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_mass_range() {
        let config = SimConfig {
            min_mass: 2.0,
            max_mass: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidRange { name: "mass", .. })
        ));
    }

    #[test]
    fn test_rejects_zero_diameter() {
        let config = SimConfig {
            diameter: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidDiameter(_))
        ));
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = SimConfig {
            seed: Some(42),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seed, Some(42));
        assert_eq!(back.diameter, config.diameter);
    }
}
