// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use icarus_core::{Clock, FakeClock};

#[test]
fn timer_lifecycle() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(TimerId::new("test"), Duration::from_secs(10), clock.now());
    assert!(scheduler.has_timers());
    assert!(scheduler.next_deadline().is_some());

    // Timer hasn't fired yet
    clock.advance(Duration::from_secs(5));
    assert!(scheduler.fired(clock.now()).is_empty());
    assert!(scheduler.has_timers());

    // Timer fires
    clock.advance(Duration::from_secs(10));
    let events = scheduler.fired(clock.now());
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::TimerFired { id } if id.as_str() == "test"));
    assert!(!scheduler.has_timers());
}

#[test]
fn cancel_timer() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(TimerId::new("test"), Duration::from_secs(10), clock.now());
    scheduler.cancel_timer(&TimerId::new("test"));

    clock.advance(Duration::from_secs(15));
    assert!(scheduler.fired(clock.now()).is_empty());
}

#[test]
fn fired_returns_earliest_first() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(TimerId::new("late"), Duration::from_secs(20), clock.now());
    scheduler.set_timer(TimerId::new("early"), Duration::from_secs(5), clock.now());

    clock.advance(Duration::from_secs(30));
    let events = scheduler.fired(clock.now());
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Event::TimerFired { id } if id.as_str() == "early"));
}

#[test]
fn setting_again_reschedules() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(TimerId::new("t"), Duration::from_secs(5), clock.now());
    scheduler.set_timer(TimerId::new("t"), Duration::from_secs(60), clock.now());

    clock.advance(Duration::from_secs(10));
    assert!(scheduler.fired(clock.now()).is_empty());
}
