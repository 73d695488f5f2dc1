//! Bookkeeping for promises rejected without a handler.
//!
//! A rejection only counts as unhandled if no handler is attached before the
//! end of the microtask checkpoint in which it happened. Rejections reported as
//! unhandled are remembered so that a late handler can be noticed.

use std::collections::BTreeSet;

use core_types::Value;

use crate::promise::PromiseId;

/// A rejection that stayed unhandled through a microtask checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct UnhandledRejection {
    /// The rejected promise
    pub promise: PromiseId,
    /// The rejection reason
    pub reason: Value,
}

/// Tracks rejected promises until they are handled or reported.
///
/// At most `capacity` reported promises are remembered; once the limit is
/// reached the oldest ones are forgotten, and a late handler on them goes
/// unnoticed.
#[derive(Debug)]
pub struct RejectionTracker {
    pending: Vec<UnhandledRejection>,
    reported: BTreeSet<PromiseId>,
    capacity: usize,
}

impl RejectionTracker {
    /// Default number of reported promises remembered.
    pub const DEFAULT_CAPACITY: usize = 1_024;

    /// Creates an empty tracker with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates an empty tracker remembering at most `capacity` reported
    /// promises.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: Vec::new(),
            reported: BTreeSet::new(),
            capacity,
        }
    }

    /// Records a rejection that currently has no handler.
    pub fn track(&mut self, promise: PromiseId, reason: Value) {
        self.pending.push(UnhandledRejection { promise, reason });
    }

    /// Forgets `promise` now that a handler is attached.
    ///
    /// Returns true when the rejection had already been reported.
    pub fn handled(&mut self, promise: PromiseId) -> bool {
        self.pending.retain(|rejection| rejection.promise != promise);
        self.reported.remove(&promise)
    }

    /// Takes every rejection still unhandled and marks it reported.
    pub fn take_unhandled(&mut self) -> Vec<UnhandledRejection> {
        let unhandled = std::mem::take(&mut self.pending);
        self.reported
            .extend(unhandled.iter().map(|rejection| rejection.promise));
        // ids grow monotonically, so the first entries are the oldest promises
        while self.reported.len() > self.capacity {
            self.reported.pop_first();
        }
        unhandled
    }

    /// Returns true if rejections are waiting for the next checkpoint.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of reported promises currently remembered.
    pub fn reported_len(&self) -> usize {
        self.reported.len()
    }
}

impl Default for RejectionTracker {
    fn default() -> Self {
        Self::new()
    }
}
