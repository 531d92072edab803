//! Simulation error taxonomy
//!
//! Only configuration and lifecycle problems surface to the caller.
//! Per-tick conditions (degenerate collision pairs, slow shutdowns) are
//! contained inside the engine and drivers and reported through `log`.

use thiserror::Error;

/// Errors surfaced by the simulation coordinator
#[derive(Debug, Error)]
pub enum SimError {
    /// Zero balls requested at start
    #[error("ball count must be at least 1")]
    ZeroBallCount,

    /// Arena dimensions must be strictly positive
    #[error("arena dimensions must be positive, got {width}x{height}")]
    InvalidArenaSize { width: f64, height: f64 },

    /// Border thickness may not be negative
    #[error("border thickness must be non-negative, got {0}")]
    InvalidBorder(f64),

    /// Arena leaves no room for a ball of the configured diameter
    #[error(
        "arena {width}x{height} with border {border} is too small for balls of diameter {diameter}"
    )]
    ArenaTooSmall {
        width: f64,
        height: f64,
        border: f64,
        diameter: f64,
    },

    /// Ball mass must be strictly positive
    #[error("ball mass must be positive, got {0}")]
    InvalidMass(f64),

    /// Ball diameter must be strictly positive
    #[error("ball diameter must be positive, got {0}")]
    InvalidDiameter(f64),

    /// A configured numeric range is empty or contains non-positive values
    #[error("invalid {name} range [{min}, {max}]")]
    InvalidRange {
        name: &'static str,
        min: f64,
        max: f64,
    },

    /// Operation invoked after `stop()`
    #[error("simulation has already been stopped")]
    AlreadyStopped,

    /// Operation that requires a running simulation invoked before `start()`
    #[error("simulation has not been started")]
    NotStarted,

    /// `start()` invoked twice
    #[error("simulation is already running")]
    AlreadyStarted,
}
