//! Request epochs
//!
//! Every page change starts a new epoch. A response may only be committed
//! while its epoch is still current, so a late answer to a superseded
//! request is dropped even if its abort did not land in time.

use futures::future::AbortHandle;
use std::fmt;

/// Generation number of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestEpoch(u64);

impl RequestEpoch {
    /// Raw generation number
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracks the current epoch and the abort handle of its request
#[derive(Debug, Default)]
pub(crate) struct EpochTracker {
    current: u64,
    in_flight: Option<AbortHandle>,
    torn_down: bool,
}

impl EpochTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Invalidate the current epoch and start the next one
    pub(crate) fn advance(&mut self) -> RequestEpoch {
        self.cancel_in_flight();
        self.current += 1;
        RequestEpoch(self.current)
    }

    pub(crate) fn current(&self) -> RequestEpoch {
        RequestEpoch(self.current)
    }

    /// Abort the in-flight request, if any
    pub(crate) fn cancel_in_flight(&mut self) -> bool {
        match self.in_flight.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Remember the abort handle for the request of `epoch`
    ///
    /// A handle for an epoch that is no longer current is aborted at once.
    pub(crate) fn track(&mut self, epoch: RequestEpoch, handle: AbortHandle) {
        if self.is_current(epoch) {
            self.in_flight = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// Mark the request of `epoch` as completed
    pub(crate) fn finish(&mut self, epoch: RequestEpoch) {
        if self.is_current(epoch) {
            self.in_flight = None;
        }
    }

    /// Whether a response for `epoch` may still be committed
    pub(crate) fn is_current(&self, epoch: RequestEpoch) -> bool {
        !self.torn_down && epoch.0 == self.current
    }

    pub(crate) fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Abort everything and refuse all further commits
    pub(crate) fn teardown(&mut self) -> bool {
        let cancelled = self.cancel_in_flight();
        self.torn_down = true;
        cancelled
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
