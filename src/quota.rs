//! Generation quota accounting.
//!
//! The caller's remaining-generation allowance is the only state shared
//! across invocations. The pipeline reads it once before starting and
//! consumes exactly one unit per successfully produced document.

use serde::{Deserialize, Serialize};

/// A caller-owned generation allowance.
///
/// Taken as `&mut` by the generator, so in-process sequencing needs no locks.
/// Implement this over whatever the host persists (user record, billing row).
pub trait QuotaLedger {
    /// Generations still available. `None` means unlimited.
    fn remaining(&self) -> Option<u64>;

    /// Record one successful generation.
    fn consume(&mut self);

    /// Whether at least one more generation may start.
    fn has_remaining(&self) -> bool {
        self.remaining().map_or(true, |n| n > 0)
    }
}

/// A counted allowance, e.g. a user's monthly generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceLedger {
    pub generations_left: u64,
}

impl AllowanceLedger {
    pub fn new(generations_left: u64) -> Self {
        Self { generations_left }
    }
}

impl QuotaLedger for AllowanceLedger {
    fn remaining(&self) -> Option<u64> {
        Some(self.generations_left)
    }

    fn consume(&mut self) {
        self.generations_left = self.generations_left.saturating_sub(1);
    }
}

/// No limit; nothing is counted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl QuotaLedger for Unlimited {
    fn remaining(&self) -> Option<u64> {
        None
    }

    fn consume(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowance_counts_down_and_saturates() {
        let mut ledger = AllowanceLedger::new(1);
        assert!(ledger.has_remaining());
        ledger.consume();
        assert_eq!(ledger.remaining(), Some(0));
        assert!(!ledger.has_remaining());
        ledger.consume();
        assert_eq!(ledger.generations_left, 0);
    }

    #[test]
    fn test_unlimited_always_has_remaining() {
        let mut ledger = Unlimited;
        ledger.consume();
        assert!(ledger.has_remaining());
        assert_eq!(ledger.remaining(), None);
    }
}
