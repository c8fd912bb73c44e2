use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crate::session::DroneSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maneuver {
    Takeoff,
    Land,
}

/// Single slot for the takeoff/land call running in the background.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

/// Frees the slot when dropped.
#[must_use = "the slot is released as soon as the ticket is dropped"]
#[derive(Debug)]
pub struct InFlightTicket(Arc<AtomicBool>);

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn try_acquire(&self) -> Option<InFlightTicket> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightTicket(self.busy.clone()))
    }
}

/// Lands when flying, takes off otherwise. The SDK call blocks for the whole
/// maneuver so it runs on its own thread. Returns `None` when another
/// maneuver is still running.
pub fn takeoff_land<S: DroneSession>(
    session: &Arc<S>,
    in_flight: &InFlight,
) -> Option<(Maneuver, JoinHandle<()>)> {
    let method_name = "takeoff_land";
    let Some(ticket) = in_flight.try_acquire() else {
        tracing::warn!(method_name, "takeoff/land still in progress, ignoring");
        return None;
    };
    let maneuver = if session.is_flying() {
        Maneuver::Land
    } else {
        Maneuver::Takeoff
    };
    tracing::info!(method_name, ?maneuver, "dispatch");

    let session = session.clone();
    let spawned = thread::Builder::new()
        .name(format!("{maneuver:?}").to_lowercase())
        .spawn(move || {
            let _ticket = ticket;
            let r = match maneuver {
                Maneuver::Takeoff => session.takeoff(),
                Maneuver::Land => session.land(),
            };
            match r {
                Ok(()) => tracing::info!(method_name, ?maneuver, "done"),
                Err(e) => tracing::error!(method_name, ?maneuver, "failed: {e}"),
            }
        });
    match spawned {
        Ok(h) => Some((maneuver, h)),
        Err(e) => {
            tracing::error!(method_name, "can't spawn {maneuver:?} thread: {e}");
            None
        }
    }
}
