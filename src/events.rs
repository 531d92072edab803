//! Best-effort structured event log
//!
//! External collaborators (rendering, diagnostics) receive position and
//! velocity change records through a bounded queue drained by a background
//! thread. Recording never blocks a motion driver or the collision engine:
//! when the queue is saturated the entry is dropped and counted instead.
//!
//! The sink is constructor-injected rather than a process-wide singleton,
//! so tests can capture records in memory.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use glam::DVec2;
use serde::Serialize;

use crate::sim::ball::BallId;
use crate::sim::join_with_timeout;

/// What a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BallCreated,
    PositionChanged,
    VelocityChanged,
}

/// One structured simulation event
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EventRecord {
    /// Milliseconds since the event log was created
    pub timestamp_ms: u64,
    pub ball: BallId,
    pub position: DVec2,
    pub velocity: DVec2,
    pub kind: EventKind,
}

/// Destination for drained event records
pub trait EventSink: Send {
    fn write(&mut self, record: &EventRecord);
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn write(&mut self, _record: &EventRecord) {}
}

/// Sink that serializes each record as one JSON line
pub struct JsonLinesSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn write(&mut self, record: &EventRecord) {
        match serde_json::to_string(record) {
            Ok(line) => {
                let _ = writeln!(self.out, "{line}");
            }
            Err(err) => log::warn!("failed to serialize event record: {err}"),
        }
    }
}

/// Cloneable producer handle, captured by per-ball change listeners
#[derive(Clone)]
pub struct EventRecorder {
    sender: Sender<EventRecord>,
    dropped: Arc<AtomicU64>,
    epoch: Instant,
}

impl EventRecorder {
    /// Enqueue a record without blocking; drops it if the queue is full
    pub fn record(&self, ball: BallId, position: DVec2, velocity: DVec2, kind: EventKind) {
        let record = EventRecord {
            timestamp_ms: self.epoch.elapsed().as_millis() as u64,
            ball,
            position,
            velocity,
            kind,
        };
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("event queue full, record dropped");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Owner side of the event log: queue, drain thread, drop counter
pub struct EventLog {
    sender: Sender<EventRecord>,
    dropped: Arc<AtomicU64>,
    epoch: Instant,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl EventLog {
    pub fn new(sink: Box<dyn EventSink>, capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = spawn_drain(receiver, sink, Arc::clone(&shutdown));
        Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
            epoch: Instant::now(),
            shutdown,
            worker,
        }
    }

    /// Producer handle for listeners
    pub fn recorder(&self) -> EventRecorder {
        EventRecorder {
            sender: self.sender.clone(),
            dropped: Arc::clone(&self.dropped),
            epoch: self.epoch,
        }
    }

    /// How many records were dropped because the queue was saturated
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop the drain thread, waiting at most `timeout` for it to flush
    pub fn shutdown(&mut self, timeout: Duration) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            join_with_timeout(worker, timeout, "event log drain");
        }
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        self.shutdown(Duration::from_millis(500));
    }
}

fn spawn_drain(
    receiver: Receiver<EventRecord>,
    mut sink: Box<dyn EventSink>,
    shutdown: Arc<AtomicBool>,
) -> Option<JoinHandle<()>> {
    let result = thread::Builder::new().name("event-log".into()).spawn(move || {
        loop {
            match receiver.recv_timeout(Duration::from_millis(50)) {
                Ok(record) => sink.write(&record),
                Err(crossbeam::channel::RecvTimeoutError::Timeout) => {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }
                }
                Err(crossbeam::channel::RecvTimeoutError::Disconnected) => break,
            }
            if shutdown.load(Ordering::Acquire) {
                break;
            }
        }
        // Flush whatever is still queued
        while let Ok(record) = receiver.try_recv() {
            sink.write(&record);
        }
    });
    match result {
        Ok(handle) => Some(handle),
        Err(err) => {
            log::warn!("failed to spawn event log thread: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CaptureSink(Arc<Mutex<Vec<EventRecord>>>);

    impl EventSink for CaptureSink {
        fn write(&mut self, record: &EventRecord) {
            self.0.lock().unwrap().push(*record);
        }
    }

    /// Sink that never drains, for saturation tests
    struct StuckSink(Arc<AtomicBool>);

    impl EventSink for StuckSink {
        fn write(&mut self, _record: &EventRecord) {
            while !self.0.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    fn record_n(recorder: &EventRecorder, n: usize) {
        for i in 0..n {
            recorder.record(
                BallId(i as u32),
                DVec2::new(1.0, 2.0),
                DVec2::new(3.0, 4.0),
                EventKind::PositionChanged,
            );
        }
    }

    #[test]
    fn test_records_reach_the_sink() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let mut log = EventLog::new(Box::new(CaptureSink(Arc::clone(&captured))), 64);
        record_n(&log.recorder(), 5);
        log.shutdown(Duration::from_secs(1));

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 5);
        assert_eq!(captured[0].ball, BallId(0));
        assert_eq!(captured[0].kind, EventKind::PositionChanged);
    }

    #[test]
    fn test_saturated_queue_drops_and_counts() {
        let release = Arc::new(AtomicBool::new(false));
        let log = EventLog::new(Box::new(StuckSink(Arc::clone(&release))), 4);
        // Capacity 4 plus one record stuck in the sink; everything past
        // that must be dropped, not block
        record_n(&log.recorder(), 50);
        assert!(log.dropped() > 0);
        assert!(log.dropped() <= 46);
        release.store(true, Ordering::Release);
    }

    #[test]
    fn test_json_lines_sink_output() {
        let mut buffer = Vec::new();
        {
            let mut sink = JsonLinesSink::new(&mut buffer);
            sink.write(&EventRecord {
                timestamp_ms: 7,
                ball: BallId(3),
                position: DVec2::new(1.5, 2.5),
                velocity: DVec2::ZERO,
                kind: EventKind::VelocityChanged,
            });
        }
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("\"velocity_changed\""));
        assert!(text.contains("\"timestamp_ms\":7"));
        assert!(text.ends_with('\n'));
    }
}
