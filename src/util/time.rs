use std::time::{Duration, Instant};

/// Cooperative deadline checked between batches and iterations. Expiry
/// never interrupts work in progress; partially grown state is kept.
#[derive(Debug, Clone, Copy)]
pub struct TimeGuard {
    deadline: Option<Instant>,
}

impl TimeGuard {
    pub fn new(budget: Duration) -> TimeGuard {
        TimeGuard { deadline: Some(Instant::now() + budget) }
    }

    /// A guard that never expires.
    pub fn unlimited() -> TimeGuard {
        TimeGuard { deadline: None }
    }

    pub fn expired(&self) -> bool {
        match self.deadline {
            Some(d) => Instant::now() >= d,
            None => false,
        }
    }
}
