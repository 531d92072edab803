//! Ball entity state
//!
//! Each ball owns its kinematic state behind a single mutex so that
//! position/velocity reads are always consistent snapshots and every write
//! is a whole-field atomic swap. Change notifications fire synchronously on
//! the mutating thread, after the state lock has been released; handlers
//! must not block or re-enter the ball's accessors in a way that could
//! deadlock against the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use glam::DVec2;

use crate::error::SimError;

/// Stable ball identity, unique for the simulation's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct BallId(pub u32);

impl std::fmt::Display for BallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ball#{}", self.0)
    }
}

/// Kinematic state read and written as one unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub position: DVec2,
    pub velocity: DVec2,
    /// Diameter lives here because an arena rescale may change it
    pub diameter: f64,
}

/// Which field a change notification refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Position,
    Velocity,
}

/// Payload delivered to change subscribers
#[derive(Debug, Clone, Copy)]
pub struct BallChange {
    pub kind: ChangeKind,
    /// Full snapshot taken at the moment of the write
    pub kinematics: Kinematics,
}

type Listener = Box<dyn Fn(BallId, &BallChange) + Send + Sync>;

/// One simulated ball
///
/// Mass is fixed at creation. Position, velocity and diameter are mutable
/// through synchronized accessors only; the motion driver writes position,
/// the collision engine writes velocity (and position, for de-overlap).
pub struct Ball {
    id: BallId,
    mass: f64,
    state: Mutex<Kinematics>,
    running: AtomicBool,
    listeners: RwLock<Vec<Listener>>,
}

impl Ball {
    pub fn new(
        id: BallId,
        position: DVec2,
        velocity: DVec2,
        mass: f64,
        diameter: f64,
    ) -> Result<Self, SimError> {
        if !(mass > 0.0) {
            return Err(SimError::InvalidMass(mass));
        }
        if !(diameter > 0.0) {
            return Err(SimError::InvalidDiameter(diameter));
        }
        Ok(Self {
            id,
            mass,
            state: Mutex::new(Kinematics {
                position,
                velocity,
                diameter,
            }),
            running: AtomicBool::new(true),
            listeners: RwLock::new(Vec::new()),
        })
    }

    #[inline]
    pub fn id(&self) -> BallId {
        self.id
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Consistent snapshot of position, velocity and diameter
    pub fn kinematics(&self) -> Kinematics {
        *self.state.lock().unwrap()
    }

    pub fn position(&self) -> DVec2 {
        self.state.lock().unwrap().position
    }

    pub fn velocity(&self) -> DVec2 {
        self.state.lock().unwrap().velocity
    }

    pub fn diameter(&self) -> f64 {
        self.state.lock().unwrap().diameter
    }

    /// Atomically replace the position and notify subscribers
    pub fn set_position(&self, position: DVec2) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            state.position = position;
            *state
        };
        self.notify(ChangeKind::Position, snapshot);
    }

    /// Atomically replace the velocity and notify subscribers
    pub fn set_velocity(&self, velocity: DVec2) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            state.velocity = velocity;
            *state
        };
        self.notify(ChangeKind::Velocity, snapshot);
    }

    /// Atomically apply a combined position + velocity update
    ///
    /// Used by collision resolution so that no reader can observe the new
    /// velocity paired with a stale position from the same resolution (or
    /// vice versa). Emits one notification per changed field.
    pub(crate) fn apply(&self, new: Kinematics) {
        let (changed_pos, changed_vel, snapshot) = {
            let mut state = self.state.lock().unwrap();
            let changed_pos = state.position != new.position;
            let changed_vel = state.velocity != new.velocity;
            *state = new;
            (changed_pos, changed_vel, *state)
        };
        if changed_vel {
            self.notify(ChangeKind::Velocity, snapshot);
        }
        if changed_pos {
            self.notify(ChangeKind::Position, snapshot);
        }
    }

    /// Rescale the position in place (arena resize), clamping into the
    /// given safe bounds
    pub(crate) fn rescale_position(&self, scale: DVec2, max_x: f64, max_y: f64) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            let scaled = state.position * scale;
            state.position = DVec2::new(scaled.x.clamp(0.0, max_x), scaled.y.clamp(0.0, max_y));
            *state
        };
        self.notify(ChangeKind::Position, snapshot);
    }

    /// Whether the motion driver should keep running
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Signal the motion driver to exit; idempotent
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Subscribe to position/velocity changes
    ///
    /// The callback runs synchronously on whichever thread performed the
    /// mutation, after the ball's state lock has been released.
    pub fn subscribe(&self, listener: impl Fn(BallId, &BallChange) + Send + Sync + 'static) {
        self.listeners.write().unwrap().push(Box::new(listener));
    }

    fn notify(&self, kind: ChangeKind, kinematics: Kinematics) {
        let change = BallChange { kind, kinematics };
        for listener in self.listeners.read().unwrap().iter() {
            listener(self.id, &change);
        }
    }
}

impl std::fmt::Debug for Ball {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.kinematics();
        f.debug_struct("Ball")
            .field("id", &self.id)
            .field("mass", &self.mass)
            .field("position", &state.position)
            .field("velocity", &state.velocity)
            .field("diameter", &state.diameter)
            .field("running", &self.is_running())
            .finish()
    }
}
