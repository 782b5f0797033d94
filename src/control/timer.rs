//! Periodic control timer
//!
//! The timer callback runs in interrupt context (or, off-target, on a timer
//! task) and only ever touches the due flag and the tick counter. All real
//! work happens on the main loop after it has claimed the due flag.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct ControlTimer {
    due: AtomicBool,
    ticks: AtomicU32,
    cycles_run: AtomicU32,
}

impl ControlTimer {
    pub const fn new() -> Self {
        ControlTimer {
            due: AtomicBool::new(false),
            ticks: AtomicU32::new(0),
            cycles_run: AtomicU32::new(0),
        }
    }

    /// Timer callback: mark a cycle due and count the tick
    pub fn on_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.due.store(true, Ordering::Release);
    }

    /// Claim a pending cycle. Returns true at most once per tick burst, and
    /// counts the claimed cycle as run.
    pub fn take_due(&self) -> bool {
        let due = self.due.swap(false, Ordering::AcqRel);
        if due {
            self.cycles_run.fetch_add(1, Ordering::Relaxed);
        }
        due
    }

    /// Timer ticks seen, including ones that collapsed into a single cycle
    pub fn tick_count(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Cycles actually claimed by the main loop
    pub fn cycles_run(&self) -> u32 {
        self.cycles_run.load(Ordering::Relaxed)
    }

    /// True on every `every`-th executed cycle, used to gate slow housekeeping polls
    pub fn secondary_due(&self, every: u32) -> bool {
        let run = self.cycles_run();
        every > 0 && run > 0 && run % every == 0
    }
}
