use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

/// Fixed cadence schedule driving the redraw loop on the calling thread.
#[derive(Debug)]
pub struct Repeater {
    interval: Duration,
    last: Option<Instant>,
    stopped: Arc<AtomicBool>,
    cycles: u64,
}

/// Stops a [`Repeater`] from anywhere, e.g. the shutdown path.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl Repeater {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            stopped: Arc::new(AtomicBool::new(false)),
            cycles: 0,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stopped.clone())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Sleeps out the rest of the current interval. Returns `false` once
    /// the schedule has been stopped, the first call returns right away.
    pub fn wait_next(&mut self) -> bool {
        if self.is_stopped() {
            return false;
        }
        if let Some(last) = self.last {
            let dur = last.elapsed();
            if dur < self.interval {
                thread::sleep(self.interval - dur);
            }
        }
        if self.is_stopped() {
            return false;
        }
        self.last = Some(Instant::now());
        self.cycles += 1;
        true
    }
}
