use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct SchedulerStats {
    pub cycles_completed: u32,
    pub wraps: u32,
}

/// Round-robin slot selector: one slot per acquisition cycle, wrapping
/// after the last configured sensor.
///
/// The cursor is the scheduler's only mutable state and advances exactly
/// once per completed cycle, reading success or not. That bounds the time
/// any one sensor goes unsampled to `slot_count` cycle periods.
#[derive(Debug)]
pub struct RoundRobinScheduler {
    current: usize,
    slot_count: usize,
    stats: SchedulerStats,
}

impl RoundRobinScheduler {
    /// `slot_count` is the fixed number of configured sensors; the
    /// configuration layer guarantees it is non-zero.
    pub fn new(slot_count: usize) -> Self {
        debug_assert!(slot_count > 0, "scheduler needs at least one slot");
        Self {
            current: 0,
            slot_count,
            stats: SchedulerStats::default(),
        }
    }

    /// Reads the selected slot without mutating.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Moves the cursor to the next slot, wrapping after the last one.
    /// Called unconditionally at the end of every cycle.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slot_count;
        self.stats.cycles_completed = self.stats.cycles_completed.wrapping_add(1);
        if self.current == 0 {
            self.stats.wraps = self.stats.wraps.wrapping_add(1);
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }
}
