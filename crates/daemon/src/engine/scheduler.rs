// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer bookkeeping for the engine loop.
//!
//! Deadlines are wall-clock instants from the engine's [`Clock`]; the
//! loop sleeps until [`Scheduler::next_deadline`] and converts due timers
//! into `timer:fired` events.

use icarus_core::{Event, TimerId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct Scheduler {
    timers: HashMap<TimerId, Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule (or reschedule) a timer to fire `duration` from `now`.
    pub fn set_timer(&mut self, id: TimerId, duration: Duration, now: Instant) {
        self.timers.insert(id, now + duration);
    }

    pub fn cancel_timer(&mut self, id: &TimerId) {
        self.timers.remove(id);
    }

    /// Remove and return events for every timer due at `now`, earliest
    /// deadline first.
    pub fn fired(&mut self, now: Instant) -> Vec<Event> {
        let mut due: Vec<(TimerId, Instant)> =
            self.timers.iter().filter(|(_, at)| **at <= now).map(|(id, at)| (id.clone(), *at)).collect();
        due.sort_by_key(|(_, at)| *at);
        for (id, _) in &due {
            self.timers.remove(id);
        }
        due.into_iter().map(|(id, _)| Event::TimerFired { id }).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().min().copied()
    }

    pub fn has_timers(&self) -> bool {
        !self.timers.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
