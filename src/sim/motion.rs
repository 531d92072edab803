//! Per-ball motion driver
//!
//! One thread per ball advances its position by velocity against measured
//! wall-clock time, then sleeps for an interval derived from the current
//! speed: the faster the ball, the more often it is sampled, bounding the
//! displacement per tick. The driver never performs collision checks;
//! detection and resolution belong to the collision engine.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::ball::Ball;
use crate::consts::{FIRST_TICK_DT, FULL_SPEED, MAX_REFRESH_MS, MIN_REFRESH_MS};

/// Sleep interval for a given speed
///
/// Pure so it can be tested without a thread: shrinks linearly from
/// `MAX_REFRESH_MS` at rest down to `MIN_REFRESH_MS` at `FULL_SPEED` and
/// above.
pub fn refresh_interval(speed: f64) -> Duration {
    let min = MIN_REFRESH_MS as f64;
    let max = MAX_REFRESH_MS as f64;
    let normalized = (speed / FULL_SPEED).clamp(0.0, 1.0);
    let ms = max - normalized * (max - min);
    Duration::from_millis(ms.round() as u64)
}

/// Spawn the motion thread for one ball
///
/// The loop exits when the ball's running flag goes false; the coordinator
/// joins the returned handle (with a bounded timeout) during shutdown.
pub(crate) fn spawn_driver(ball: Arc<Ball>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("motion-{}", ball.id()))
        .spawn(move || {
            log::debug!("{} motion driver started", ball.id());
            let mut last_tick: Option<Instant> = None;
            while ball.is_running() {
                let now = Instant::now();
                let dt = match last_tick {
                    Some(prev) => (now - prev).as_secs_f64(),
                    None => FIRST_TICK_DT,
                };
                last_tick = Some(now);

                let kin = ball.kinematics();
                ball.set_position(kin.position + kin.velocity * dt);

                thread::sleep(refresh_interval(ball.velocity().length()));
            }
            log::debug!("{} motion driver stopped", ball.id());
        })
}
