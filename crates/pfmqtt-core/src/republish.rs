// ── Republish session ──
//
// Counter of full announce iterations still owed, tagged with the epoch
// of the cycle that owns it. Starting a cycle bumps the epoch, so an
// older cycle that is still sleeping finds itself stale at its next
// loop-top check and exits without touching the newer counter.

/// Iteration budget of the current republish cycle.
#[derive(Debug, Default)]
pub struct RepublishSession {
    epoch: u64,
    remaining: u32,
}

impl RepublishSession {
    /// Begin a new cycle owning `iterations` announce passes, invalidating
    /// any cycle already running. Returns the new cycle's epoch.
    pub fn start(&mut self, iterations: u32) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.remaining = iterations.max(1);
        self.epoch
    }

    /// Stop whatever cycle is running after its in-flight iteration.
    pub fn halt(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.remaining = 0;
    }

    /// Whether the cycle `epoch` should run another iteration.
    pub fn should_run(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.remaining > 0
    }

    /// Record a finished iteration. No-op for stale cycles.
    pub fn complete_iteration(&mut self, epoch: u64) {
        if self.epoch == epoch {
            self.remaining = self.remaining.saturating_sub(1);
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}
