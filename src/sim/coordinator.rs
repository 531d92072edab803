//! Simulation coordinator
//!
//! Owns the ball registry, the arena, and the lifetime of every thread:
//! one motion driver per ball plus the collision engine cycle. The caller
//! (a rendering or view layer) drives it through `start`, `resize_arena`
//! and `stop`, and observes balls through per-ball change subscriptions
//! and the structured event log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::ball::{Ball, BallId, ChangeKind};
use super::collision::{Arena, CollisionEngine, bounce_off_walls, spawn_engine};
use super::motion::spawn_driver;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::events::{EventKind, EventLog, EventSink};

/// Wait for a thread with a bounded budget; abandons (and warns) on timeout
pub(crate) fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration, what: &str) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            log::warn!("{what} thread did not terminate within {timeout:?}, abandoning it");
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    if handle.join().is_err() {
        log::warn!("{what} thread panicked");
    }
    true
}

/// The concurrent ball simulation
///
/// Thread ownership: every motion driver and the collision engine are
/// spawned by `start` and joined (with a bounded timeout) by `stop`.
/// Arena resize takes the same exclusive lock as the collision cycle, so
/// it is safe while drivers are running.
pub struct Simulation {
    config: SimConfig,
    arena: Arc<RwLock<Arena>>,
    balls: Arc<RwLock<Vec<Arc<Ball>>>>,
    sim_lock: Arc<Mutex<()>>,
    engine_running: Arc<AtomicBool>,
    drivers: Vec<JoinHandle<()>>,
    engine: Option<JoinHandle<()>>,
    events: EventLog,
    rng: Pcg32,
    next_id: u32,
    started: bool,
    disposed: bool,
}

impl Simulation {
    /// Create an idle simulation; call `start` to populate and run it
    pub fn new(config: SimConfig, sink: Box<dyn EventSink>) -> Result<Self, SimError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_rng(&mut rand::rng()),
        };
        let events = EventLog::new(sink, config.event_queue_capacity);
        Ok(Self {
            config,
            arena: Arc::new(RwLock::new(Arena::new(0.0, 0.0, 0.0))),
            balls: Arc::new(RwLock::new(Vec::new())),
            sim_lock: Arc::new(Mutex::new(())),
            engine_running: Arc::new(AtomicBool::new(false)),
            drivers: Vec::new(),
            engine: None,
            events,
            rng,
            next_id: 1,
            started: false,
            disposed: false,
        })
    }

    /// Create `ball_count` balls with randomized position, velocity and
    /// mass, then start their motion drivers and the collision engine
    ///
    /// The callback is invoked synchronously once per ball, before its
    /// driver starts, so the caller can attach observers without missing
    /// events.
    pub fn start(
        &mut self,
        ball_count: u32,
        arena_width: f64,
        arena_height: f64,
        border_thickness: f64,
        mut on_ball_created: impl FnMut(DVec2, &Arc<Ball>),
    ) -> Result<(), SimError> {
        if self.disposed {
            return Err(SimError::AlreadyStopped);
        }
        if self.started {
            return Err(SimError::AlreadyStarted);
        }
        if ball_count == 0 {
            return Err(SimError::ZeroBallCount);
        }
        let arena = Arena::new(arena_width, arena_height, border_thickness);
        validate_arena(&arena, self.config.diameter)?;
        *self.arena.write().unwrap() = arena;

        let recorder_base = self.events.recorder();
        let mut created = Vec::with_capacity(ball_count as usize);
        for _ in 0..ball_count {
            let id = BallId(self.next_id);
            self.next_id += 1;

            let mass = self
                .rng
                .random_range(self.config.min_mass..=self.config.max_mass);
            let position = DVec2::new(
                self.rng.random_range(0.0..=arena.max_x(self.config.diameter)),
                self.rng.random_range(0.0..=arena.max_y(self.config.diameter)),
            );
            let speed = self.config.max_start_speed;
            let velocity = DVec2::new(
                self.rng.random_range(-speed..=speed),
                self.rng.random_range(-speed..=speed),
            );

            let ball = Arc::new(Ball::new(id, position, velocity, mass, self.config.diameter)?);

            let recorder = recorder_base.clone();
            ball.subscribe(move |id, change| {
                let kind = match change.kind {
                    ChangeKind::Position => EventKind::PositionChanged,
                    ChangeKind::Velocity => EventKind::VelocityChanged,
                };
                recorder.record(
                    id,
                    change.kinematics.position,
                    change.kinematics.velocity,
                    kind,
                );
            });
            recorder_base.record(id, position, velocity, EventKind::BallCreated);

            self.balls.write().unwrap().push(Arc::clone(&ball));
            on_ball_created(position, &ball);
            created.push(ball);
        }

        for ball in created {
            match spawn_driver(Arc::clone(&ball)) {
                Ok(handle) => self.drivers.push(handle),
                Err(err) => log::error!("failed to spawn motion driver for {}: {err}", ball.id()),
            }
        }

        self.engine_running.store(true, Ordering::Release);
        let engine = CollisionEngine {
            balls: Arc::clone(&self.balls),
            arena: Arc::clone(&self.arena),
            sim_lock: Arc::clone(&self.sim_lock),
        };
        match spawn_engine(
            engine,
            Arc::clone(&self.engine_running),
            Duration::from_millis(self.config.collision_interval_ms),
        ) {
            Ok(handle) => self.engine = Some(handle),
            Err(err) => log::error!("failed to spawn collision engine: {err}"),
        }

        self.started = true;
        log::info!(
            "simulation started: {ball_count} balls in {arena_width}x{arena_height} arena"
        );
        Ok(())
    }

    /// Rescale the arena; every ball's position is scaled proportionally
    /// and clamped into the new safe bounds
    ///
    /// Serialized against the collision cycle by the simulation lock, so
    /// it is safe to call while drivers are running.
    pub fn resize_arena(&mut self, new_width: f64, new_height: f64) -> Result<(), SimError> {
        if self.disposed {
            return Err(SimError::AlreadyStopped);
        }
        if !self.started {
            return Err(SimError::NotStarted);
        }

        let _guard = self.sim_lock.lock().unwrap();

        let old = *self.arena.read().unwrap();
        let next = Arena::new(new_width, new_height, old.border);
        let max_diameter = self
            .balls
            .read()
            .unwrap()
            .iter()
            .map(|b| b.diameter())
            .fold(self.config.diameter, f64::max);
        validate_arena(&next, max_diameter)?;

        let scale = DVec2::new(new_width / old.width, new_height / old.height);
        *self.arena.write().unwrap() = next;
        for ball in self.balls.read().unwrap().iter() {
            let diameter = ball.diameter();
            ball.rescale_position(scale, next.max_x(diameter), next.max_y(diameter));
        }
        log::info!("arena resized from {}x{} to {new_width}x{new_height}", old.width, old.height);
        Ok(())
    }

    /// Stop every motion driver and the collision engine, flush the event
    /// log and release the registry
    ///
    /// Threads are joined with the configured bounded timeout; a thread
    /// that fails to exit in time is abandoned with a warning, never
    /// retried. Any later mutating call returns `AlreadyStopped`.
    pub fn stop(&mut self) -> Result<(), SimError> {
        if self.disposed {
            return Err(SimError::AlreadyStopped);
        }
        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        self.engine_running.store(false, Ordering::Release);
        for ball in self.balls.read().unwrap().iter() {
            ball.stop();
        }

        let timeout = Duration::from_millis(self.config.join_timeout_ms);
        for handle in self.drivers.drain(..) {
            join_with_timeout(handle, timeout, "motion driver");
        }
        if let Some(engine) = self.engine.take() {
            join_with_timeout(engine, timeout, "collision engine");
        }

        // Leave every ball clamped in bounds for observers that still hold
        // a handle after shutdown
        {
            let _guard = self.sim_lock.lock().unwrap();
            let arena = *self.arena.read().unwrap();
            for ball in self.balls.read().unwrap().iter() {
                if let Some(corrected) = bounce_off_walls(&ball.kinematics(), &arena) {
                    ball.apply(corrected);
                }
            }
        }

        self.balls.write().unwrap().clear();
        self.events.shutdown(timeout);
        self.disposed = true;
        log::info!("simulation stopped ({} event records dropped)", self.events.dropped());
    }

    /// Number of live balls
    pub fn ball_count(&self) -> usize {
        self.balls.read().unwrap().len()
    }

    /// Handles to the live balls
    pub fn balls(&self) -> Vec<Arc<Ball>> {
        self.balls.read().unwrap().clone()
    }

    /// Current arena geometry
    pub fn arena(&self) -> Arena {
        *self.arena.read().unwrap()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Event records dropped because the queue was saturated
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if !self.disposed {
            self.shutdown();
        }
    }
}

fn validate_arena(arena: &Arena, diameter: f64) -> Result<(), SimError> {
    if arena.width <= 0.0 || arena.height <= 0.0 {
        return Err(SimError::InvalidArenaSize {
            width: arena.width,
            height: arena.height,
        });
    }
    if arena.border < 0.0 {
        return Err(SimError::InvalidBorder(arena.border));
    }
    if arena.max_x(diameter) <= 0.0 || arena.max_y(diameter) <= 0.0 {
        return Err(SimError::ArenaTooSmall {
            width: arena.width,
            height: arena.height,
            border: arena.border,
            diameter,
        });
    }
    Ok(())
}
