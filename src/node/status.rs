//! Node cache status state machine
//!
//! One status value per node process, shared by the watch loop, the
//! registrar and the shutdown path. Transitions are single atomic writes;
//! `Dead` is terminal.

use std::sync::atomic::{AtomicI32, Ordering};

/// Availability of the node's local cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Initializing,
    Ready,
    Updating,
    Dead,
}

impl CacheStatus {
    /// Numeric code as published in the coordination service
    pub const fn code(self) -> i32 {
        match self {
            CacheStatus::Initializing => 0,
            CacheStatus::Ready => 1,
            CacheStatus::Updating => 2,
            CacheStatus::Dead => -1,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(CacheStatus::Initializing),
            1 => Some(CacheStatus::Ready),
            2 => Some(CacheStatus::Updating),
            -1 => Some(CacheStatus::Dead),
            _ => None,
        }
    }

    /// The watch loop keeps running for these states
    pub const fn is_watching(self) -> bool {
        self.code() > 0
    }

    /// The node process counts as running until the status turns terminal
    pub const fn is_running(self) -> bool {
        self.code() >= 0
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, CacheStatus::Dead)
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStatus::Initializing => write!(f, "initializing"),
            CacheStatus::Ready => write!(f, "ready"),
            CacheStatus::Updating => write!(f, "updating"),
            CacheStatus::Dead => write!(f, "dead"),
        }
    }
}

/// Atomic holder for the node status.
///
/// Every context reads and writes through this cell; no wider lock exists.
/// Once the status is `Dead` all further transitions are refused.
pub struct StatusCell(AtomicI32);

impl StatusCell {
    pub fn new(initial: CacheStatus) -> Self {
        Self(AtomicI32::new(initial.code()))
    }

    pub fn get(&self) -> CacheStatus {
        CacheStatus::from_code(self.0.load(Ordering::Acquire)).unwrap_or(CacheStatus::Dead)
    }

    /// Set the status unless it is already terminal.
    /// Returns the status that was current before the call.
    pub fn set(&self, next: CacheStatus) -> CacheStatus {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current == CacheStatus::Dead.code() {
                return CacheStatus::Dead;
            }
            match self.0.compare_exchange(
                current,
                next.code(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(prev) => return CacheStatus::from_code(prev).unwrap_or(CacheStatus::Dead),
                Err(actual) => current = actual,
            }
        }
    }

    /// Single transition from `from` to `to`; false if the status moved
    /// under the caller. Doubles as a single-flight guard for entering
    /// `Updating`.
    pub fn transition(&self, from: CacheStatus, to: CacheStatus) -> bool {
        if from.is_terminal() {
            return false;
        }
        self.0
            .compare_exchange(from.code(), to.code(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for status in [
            CacheStatus::Initializing,
            CacheStatus::Ready,
            CacheStatus::Updating,
            CacheStatus::Dead,
        ] {
            assert_eq!(CacheStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(CacheStatus::from_code(3), None);
    }

    #[test]
    fn test_watching_and_running_predicates() {
        assert!(!CacheStatus::Initializing.is_watching());
        assert!(CacheStatus::Ready.is_watching());
        assert!(CacheStatus::Updating.is_watching());
        assert!(!CacheStatus::Dead.is_watching());

        assert!(CacheStatus::Initializing.is_running());
        assert!(CacheStatus::Ready.is_running());
        assert!(!CacheStatus::Dead.is_running());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let cell = StatusCell::new(CacheStatus::Initializing);
        assert_eq!(cell.set(CacheStatus::Ready), CacheStatus::Initializing);
        assert_eq!(cell.set(CacheStatus::Updating), CacheStatus::Ready);
        assert_eq!(cell.set(CacheStatus::Ready), CacheStatus::Updating);
        assert_eq!(cell.get(), CacheStatus::Ready);
    }

    #[test]
    fn test_dead_is_terminal() {
        let cell = StatusCell::new(CacheStatus::Ready);
        cell.set(CacheStatus::Dead);
        assert_eq!(cell.set(CacheStatus::Ready), CacheStatus::Dead);
        assert_eq!(cell.get(), CacheStatus::Dead);
        assert!(!cell.transition(CacheStatus::Dead, CacheStatus::Ready));
    }

    #[test]
    fn test_transition_guard() {
        let cell = StatusCell::new(CacheStatus::Ready);
        assert!(cell.transition(CacheStatus::Ready, CacheStatus::Updating));
        // a second flight loses the race
        assert!(!cell.transition(CacheStatus::Ready, CacheStatus::Updating));
        assert_eq!(cell.get(), CacheStatus::Updating);
    }
}
