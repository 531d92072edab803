//! Bounce Arena headless demo
//!
//! Runs the simulation for a couple of seconds with the event log wired to
//! stdout as JSON lines. Tune with RUST_LOG=debug for thread lifecycle
//! messages.
//!
//! Usage: bounce-arena [BALL_COUNT]

use std::time::Duration;

use bounce_arena::{JsonLinesSink, SimConfig, Simulation};

const ARENA_WIDTH: f64 = 800.0;
const ARENA_HEIGHT: f64 = 600.0;
const BORDER: f64 = 4.0;
const RUN_FOR: Duration = Duration::from_secs(2);

fn main() {
    env_logger::init();

    let ball_count: u32 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(10);

    let sink = Box::new(JsonLinesSink::new(std::io::stdout()));
    let mut sim = match Simulation::new(SimConfig::default(), sink) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("bad configuration: {err}");
            std::process::exit(1);
        }
    };

    let result = sim.start(ball_count, ARENA_WIDTH, ARENA_HEIGHT, BORDER, |position, ball| {
        log::info!("{} created at ({:.1}, {:.1})", ball.id(), position.x, position.y);
    });
    if let Err(err) = result {
        eprintln!("failed to start: {err}");
        std::process::exit(1);
    }

    std::thread::sleep(RUN_FOR);

    let dropped = sim.dropped_events();
    if let Err(err) = sim.stop() {
        eprintln!("failed to stop: {err}");
        std::process::exit(1);
    }
    log::info!("done; {dropped} event records dropped under load");
}
