use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, monotonically increasing session counter.
///
/// The switcher bumps it on every open/confirm/cancel. Background work holds
/// a [`Ticket`] captured at issue time and can cheaply check whether its
/// episode is still current.
#[derive(Clone, Default, Debug)]
pub struct SessionTickets(Arc<AtomicU64>);

impl SessionTickets {
    pub fn new() -> Self { Self::default() }

    pub fn current(&self) -> Ticket {
        Ticket {
            value: self.0.load(Ordering::Acquire),
            source: self.clone(),
        }
    }

    /// Invalidates every outstanding ticket and returns the new current one.
    pub fn bump(&self) -> Ticket {
        let value = self.0.fetch_add(1, Ordering::AcqRel) + 1;
        Ticket { value, source: self.clone() }
    }

    pub fn is_current(&self, value: u64) -> bool { self.0.load(Ordering::Acquire) == value }
}

#[derive(Clone)]
pub struct Ticket {
    value: u64,
    source: SessionTickets,
}

impl Ticket {
    pub fn value(&self) -> u64 { self.value }

    pub fn is_stale(&self) -> bool { !self.source.is_current(self.value) }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ticket").field(&self.value).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_invalidates_outstanding_tickets() {
        let tickets = SessionTickets::new();
        let first = tickets.bump();
        assert!(!first.is_stale());

        let second = tickets.bump();
        assert!(first.is_stale());
        assert!(!second.is_stale());
        assert!(second.value() > first.value());
        assert!(tickets.is_current(second.value()));
    }
}
