//! Bootstrap state machine of the clock-synchronizing overlay
//!
//! ```text
//!   Bootstrapping --tick, counter unchanged--> Bootstrapping (broadcast counter)
//!   Bootstrapping --tick, counter advanced---> Steady (timer cancelled)
//! ```

/// Lamport counter with the `max(local, remote) + 1` merge rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LamportClock {
    value: u32,
}

impl LamportClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Merge a remote counter. Returns the new value, or `None` when the
    /// result would overflow (the counter is left unchanged).
    pub fn merge(&mut self, remote: u32) -> Option<u32> {
        let merged = self.value.max(remote).checked_add(1)?;
        self.value = merged;
        Some(merged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    Bootstrapping,
    Steady,
}

/// What the overlay should do on a timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Send the counter to every known peer
    Broadcast(u32),
    /// Stop ticking
    Cancel,
}

#[derive(Debug, Clone)]
pub struct Bootstrap {
    phase: BootstrapPhase,
    clock: LamportClock,
    initial: u32,
}

impl Bootstrap {
    pub fn new() -> Self {
        let clock = LamportClock::new();
        Self {
            phase: BootstrapPhase::Bootstrapping,
            initial: clock.value(),
            clock,
        }
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.phase
    }

    pub fn clock(&self) -> u32 {
        self.clock.value()
    }

    pub fn tick(&mut self) -> TickAction {
        match self.phase {
            BootstrapPhase::Steady => TickAction::Cancel,
            BootstrapPhase::Bootstrapping if self.clock.value() > self.initial => {
                self.phase = BootstrapPhase::Steady;
                TickAction::Cancel
            }
            BootstrapPhase::Bootstrapping => TickAction::Broadcast(self.clock.value()),
        }
    }

    pub fn merge(&mut self, remote: u32) -> Option<u32> {
        self.clock.merge(remote)
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}
