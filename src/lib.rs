//! Bounce Arena - a concurrent 2D ball simulation
//!
//! Core modules:
//! - `sim`: balls, motion drivers, quad-tree index, collision engine, coordinator
//! - `config`: tunable simulation parameters
//! - `events`: best-effort structured event log for external observers
//! - `error`: configuration and lifecycle error taxonomy

pub mod config;
pub mod error;
pub mod events;
pub mod sim;

pub use config::SimConfig;
pub use error::SimError;
pub use events::{EventKind, EventLog, EventRecord, EventSink, JsonLinesSink, NullSink};
pub use sim::{Arena, Ball, BallChange, BallId, ChangeKind, Kinematics, Simulation};

/// Simulation constants
pub mod consts {
    /// Fallback dt for a motion driver's first tick, before any elapsed
    /// time has been measured (seconds)
    pub const FIRST_TICK_DT: f64 = 0.016;

    /// Shortest motion-driver sleep, used at and above `FULL_SPEED`
    pub const MIN_REFRESH_MS: u64 = 10;
    /// Longest motion-driver sleep, used at rest
    pub const MAX_REFRESH_MS: u64 = 100;
    /// Speed (units/sec) at which the refresh interval bottoms out
    pub const FULL_SPEED: f64 = 200.0;

    /// Quad-tree node capacity before it subdivides
    pub const MAX_ITEMS_PER_NODE: usize = 4;
}
