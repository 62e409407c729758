// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 beebrx contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Timer wheel
//!
//! A virtual-time wheel of single-shot, cancellable timers. All components
//! share the same wheel so that CPU execution, FDC seek steps and disc
//! rotation advance on one clock.
//!
//! One tick is 0.5 µs of emulated time (a 2 MHz CPU cycle), so one
//! millisecond is 2000 ticks.
//!
//! # Example
//!
//! ```
//! use beebrx::core::timing::TimerWheel;
//!
//! let mut wheel = TimerWheel::new();
//! let id = wheel.register_timer("seek step");
//!
//! wheel.start_timer(id, TimerWheel::ms_to_ticks(4));
//! assert!(wheel.timer_is_running(id));
//!
//! wheel.pending_ticks = 8000;
//! let fired = wheel.run_timers();
//! assert_eq!(fired, vec![id]);
//! ```

/// Tick count type (relative time, 0.5 µs units)
pub type TickCount = u64;

/// Global tick counter type (absolute time since reset)
pub type GlobalTicks = u64;

/// Timer handle (identifier for registered timers)
pub type TimerId = usize;

/// A single registered timer
#[derive(Debug)]
struct Timer {
    /// Timer ID (handle)
    id: TimerId,

    /// Timer name (for debugging)
    name: &'static str,

    /// Absolute expiry time (global ticks)
    expiry: GlobalTicks,

    /// Whether the timer is currently counting down
    running: bool,
}

/// Timer wheel
///
/// Owns every registered timer and advances them against a shared global
/// tick counter. Timers are strictly single-shot: once fired (or stopped)
/// they stay inert until started again.
///
/// # Example
///
/// ```
/// use beebrx::core::timing::TimerWheel;
///
/// let mut wheel = TimerWheel::new();
/// let id = wheel.register_timer("post seek settle");
/// wheel.start_timer(id, 5000);
///
/// // Simulate 5000 CPU cycles
/// wheel.pending_ticks = 5000;
/// let fired = wheel.run_timers();
/// assert_eq!(fired.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct TimerWheel {
    /// Global tick counter (absolute time since reset)
    pub global_tick_counter: GlobalTicks,

    /// Pending ticks accumulated since the last `run_timers` call
    pub pending_ticks: TickCount,

    /// Registered timers, indexed by handle
    timers: Vec<Timer>,
}

impl TimerWheel {
    /// Create a new, empty timer wheel
    pub fn new() -> Self {
        Self {
            global_tick_counter: 0,
            pending_ticks: 0,
            timers: Vec::new(),
        }
    }

    /// Convert milliseconds of emulated time to wheel ticks
    ///
    /// One tick is 0.5 µs, so 1 ms = 2000 ticks.
    #[inline]
    pub fn ms_to_ticks(ms: u32) -> TickCount {
        TickCount::from(ms) * 2000
    }

    /// Register a new timer and return its handle
    ///
    /// The timer starts out stopped; arm it with [`TimerWheel::start_timer`].
    pub fn register_timer(&mut self, name: &'static str) -> TimerId {
        let id = self.timers.len();
        self.timers.push(Timer {
            id,
            name,
            expiry: 0,
            running: false,
        });
        id
    }

    /// Arm a timer to fire after `ticks` ticks from now
    ///
    /// Restarting an already-running timer replaces its expiry time.
    pub fn start_timer(&mut self, id: TimerId, ticks: TickCount) {
        let now = self.global_tick_counter + self.pending_ticks;
        let timer = &mut self.timers[id];
        timer.expiry = now + ticks;
        timer.running = true;
        log::trace!("timer '{}' armed for +{} ticks", timer.name, ticks);
    }

    /// Stop a timer
    ///
    /// Idempotent: stopping a timer that is not running is a no-op.
    pub fn stop_timer(&mut self, id: TimerId) {
        let timer = &mut self.timers[id];
        if timer.running {
            timer.running = false;
            log::trace!("timer '{}' stopped", timer.name);
        }
    }

    /// Whether a timer is currently armed
    pub fn timer_is_running(&self, id: TimerId) -> bool {
        self.timers[id].running
    }

    /// Advance global time by the pending ticks and collect expired timers
    ///
    /// Fired timers are disarmed before being returned, so a handler may
    /// safely re-arm its own timer. Handles are returned in expiry order.
    pub fn run_timers(&mut self) -> Vec<TimerId> {
        self.global_tick_counter += self.pending_ticks;
        self.pending_ticks = 0;

        let now = self.global_tick_counter;
        let mut fired: Vec<TimerId> = Vec::new();
        for timer in &mut self.timers {
            if timer.running && timer.expiry <= now {
                timer.running = false;
                let late = now - timer.expiry;
                log::trace!("timer '{}' fired ({} ticks late)", timer.name, late);
                fired.push(timer.id);
            }
        }

        fired.sort_by_key(|&id| self.timers[id].expiry);
        fired
    }

    /// Ticks until the next armed timer expires, if any
    ///
    /// The main loop uses this to bound how far the CPU may run before the
    /// wheel has to be serviced again.
    pub fn ticks_to_next_expiry(&self) -> Option<TickCount> {
        let now = self.global_tick_counter + self.pending_ticks;
        self.timers
            .iter()
            .filter(|t| t.running)
            .map(|t| t.expiry.saturating_sub(now))
            .min()
    }

    /// Reset the wheel: zero the clock and disarm every timer
    pub fn reset(&mut self) {
        self.global_tick_counter = 0;
        self.pending_ticks = 0;
        for timer in &mut self.timers {
            timer.running = false;
            timer.expiry = 0;
        }
    }
}
