use std::time::{Duration, Instant};

/// Timestamp gate: admits an event only if `min_interval` has passed since
/// the last admitted one. Rejected events are dropped, not deferred.
#[derive(Debug, Clone)]
pub struct RateGate {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self { Self { min_interval, last: None } }

    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Lets the next event through unconditionally.
    pub fn reset(&mut self) { self.last = None; }

    pub fn set_interval(&mut self, min_interval: Duration) { self.min_interval = min_interval; }
}
