//! Commit batching policy driven by the commit worker.
//!
//! Completed writes are counted between ticks. A quiet tick after a single
//! write commits at once. A burst of writes delays the commit for up to
//! `max_delay_cycles` ticks so bursts land in fewer, larger commits.

/// Outcome of a commit worker tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    /// Nothing happened since the last commit.
    Idle,
    /// Commit now.
    Commit,
    /// Writes are still arriving; wait for another tick.
    Delay,
}

#[derive(Debug)]
pub struct CommitPolicy {
    max_delay_cycles: u32,
    activities: u64,
    delay_cycle: u32,
}

impl CommitPolicy {
    pub fn new(max_delay_cycles: u32) -> Self {
        Self {
            max_delay_cycles,
            activities: 0,
            delay_cycle: 0,
        }
    }

    /// Count one completed write.
    pub fn record_activity(&mut self) {
        self.activities += 1;
    }

    /// Writes counted since the last tick.
    pub fn activities(&self) -> u64 {
        self.activities
    }

    pub fn delay_cycle(&self) -> u32 {
        self.delay_cycle
    }

    /// Decide what the current tick does. The activity counter restarts
    /// every tick.
    pub fn tick(&mut self) -> CommitDecision {
        let activities = std::mem::take(&mut self.activities);

        if activities == 0 && self.delay_cycle == 0 {
            return CommitDecision::Idle;
        }

        if activities < 2 {
            self.delay_cycle = 0;
            return CommitDecision::Commit;
        }

        self.delay_cycle += 1;
        if self.delay_cycle >= self.max_delay_cycles {
            self.delay_cycle = 0;
            return CommitDecision::Commit;
        }
        CommitDecision::Delay
    }

    /// Forget pending work after a reopening commit.
    pub fn reset(&mut self) {
        self.activities = 0;
        self.delay_cycle = 0;
    }
}
