//! Fan-out completion counter

/// Counts successes for a stage split into `target` independent calls
///
/// The counter only grows. It does not know which call reported, so the
/// caller must record each call's success exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutTracker {
    target: usize,
    completed: usize,
}

impl FanOutTracker {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            completed: 0,
        }
    }

    /// Record one success; returns whether the stage is now complete
    pub fn record_success(&mut self) -> bool {
        if self.completed < self.target {
            self.completed += 1;
        }
        self.is_complete()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.target
    }
}
