//! Hedged races between sibling tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const NO_WINNER: u64 = u64::MAX;

/// A group of tasks racing for the same content.
///
/// The first member to [`claim`](Self::claim) the group wins; every other
/// member is cancelled from then on.
#[derive(Debug)]
pub struct RaceGroup {
    winner: AtomicU64,
}

impl RaceGroup {
    /// Creates an unclaimed group.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            winner: AtomicU64::new(NO_WINNER),
        })
    }

    /// Tries to make `member` the winner. Returns true if `member` holds the group.
    pub fn claim(&self, member: u64) -> bool {
        match self
            .winner
            .compare_exchange(NO_WINNER, member, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(current) => current == member,
        }
    }

    /// The winning member, if any.
    pub fn winner(&self) -> Option<u64> {
        match self.winner.load(Ordering::Acquire) {
            NO_WINNER => None,
            member => Some(member),
        }
    }

    /// Returns true if another member has won.
    pub fn is_lost_for(&self, member: u64) -> bool {
        matches!(self.winner(), Some(w) if w != member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_claim_wins() {
        let group = RaceGroup::new();
        assert_eq!(group.winner(), None);
        assert!(!group.is_lost_for(1));

        assert!(group.claim(1));
        assert!(group.claim(1));
        assert!(!group.claim(2));
        assert_eq!(group.winner(), Some(1));
        assert!(group.is_lost_for(2));
        assert!(!group.is_lost_for(1));
    }

    #[test]
    fn test_concurrent_claims() {
        let group = RaceGroup::new();
        let handles: Vec<_> = (0..16u64)
            .map(|member| {
                let group = Arc::clone(&group);
                std::thread::spawn(move || group.claim(member))
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }
}
