use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU8, Ordering};

use strum::Display;

/// Lifecycle of the biometric login handshake.
///
/// `Idle → CheckingCapability → (NotAvailable | Ready) → Authenticating → (Success | Failed) → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, uniffi::Enum)]
#[strum(serialize_all = "snake_case")]
pub enum HandshakeState {
    /// Nothing has been checked yet, or the last attempt finished.
    Idle,
    /// Sensor and keys are being checked.
    CheckingCapability,
    /// Biometric login cannot be used on this device until the capability is checked again.
    NotAvailable,
    /// Sensor and keys are usable; a login can start immediately.
    Ready,
    /// A login attempt is in flight.
    Authenticating,
    /// The last attempt produced session credentials. Transient.
    Success,
    /// The last attempt failed. Transient.
    Failed,
}

impl HandshakeState {
    const fn tag(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::CheckingCapability => 1,
            Self::NotAvailable => 2,
            Self::Ready => 3,
            Self::Authenticating => 4,
            Self::Success => 5,
            Self::Failed => 6,
        }
    }

    const fn from_tag(tag: u8) -> Self {
        match tag {
            1 => Self::CheckingCapability,
            2 => Self::NotAvailable,
            3 => Self::Ready,
            4 => Self::Authenticating,
            5 => Self::Success,
            6 => Self::Failed,
            _ => Self::Idle,
        }
    }

    /// Whether an attempt or a capability check currently owns the handshake.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(
            self,
            Self::CheckingCapability | Self::Authenticating | Self::Success | Self::Failed
        )
    }
}

/// Lock-free holder of the current [`HandshakeState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub const fn new() -> Self {
        Self(AtomicU8::new(HandshakeState::Idle.tag()))
    }

    pub fn load(&self) -> HandshakeState {
        HandshakeState::from_tag(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: HandshakeState) {
        self.0.store(state.tag(), Ordering::Release);
    }

    /// Moves from `current` to `next` only if no one else moved first.
    pub fn transition(&self, current: HandshakeState, next: HandshakeState) -> bool {
        self.0
            .compare_exchange(
                current.tag(),
                next.tag(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Recently submitted nonces, oldest evicted first.
#[derive(Debug)]
pub(crate) struct ConsumedNonces {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl ConsumedNonces {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contains(&self, nonce: &str) -> bool {
        self.seen.contains(nonce)
    }

    pub fn record(&mut self, nonce: &str) {
        if !self.seen.insert(nonce.to_string()) {
            return;
        }
        self.order.push_back(nonce.to_string());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(HandshakeState::Idle)]
    #[test_case(HandshakeState::CheckingCapability)]
    #[test_case(HandshakeState::NotAvailable)]
    #[test_case(HandshakeState::Ready)]
    #[test_case(HandshakeState::Authenticating)]
    #[test_case(HandshakeState::Success)]
    #[test_case(HandshakeState::Failed)]
    fn test_state_cell_stores_every_state(state: HandshakeState) {
        let cell = StateCell::new();
        cell.store(state);
        assert_eq!(cell.load(), state);
    }

    #[test]
    fn test_transition_is_exclusive() {
        let cell = StateCell::new();
        assert!(cell.transition(HandshakeState::Idle, HandshakeState::Authenticating));
        assert!(!cell.transition(HandshakeState::Idle, HandshakeState::Authenticating));
        assert_eq!(cell.load(), HandshakeState::Authenticating);
    }

    #[test]
    fn test_consumed_nonces_evicts_oldest() {
        let mut consumed = ConsumedNonces::with_capacity(2);
        consumed.record("a");
        consumed.record("b");
        consumed.record("b");
        assert!(consumed.contains("a"));

        consumed.record("c");
        assert!(!consumed.contains("a"));
        assert!(consumed.contains("b"));
        assert!(consumed.contains("c"));
    }

    #[test]
    fn test_display() {
        assert_eq!(HandshakeState::NotAvailable.to_string(), "not_available");
    }
}
