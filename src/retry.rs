//! Retry budgets
//!
//! Every corrective retry in the protocol draws from an explicit budget; no retry loop is
//! unbounded.

/// A bounded allowance of retry units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    limit: u32,
    used: u32,
}

impl RetryBudget {
    /// Create a budget allowing `limit` units.
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    /// Consume a single unit, returning `false` if the budget is exhausted.
    pub fn try_consume(&mut self) -> bool {
        self.try_consume_n(1)
    }

    /// Consume `units` units at once, returning `false` (and consuming nothing) if fewer remain.
    pub fn try_consume_n(&mut self, units: u32) -> bool {
        if units > self.remaining() {
            return false;
        }

        self.used += units;

        true
    }

    /// Units consumed so far.
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Units still available.
    pub fn remaining(&self) -> u32 {
        self.limit - self.used
    }

    /// Check if no units remain.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_unit_budget_allows_one_retry() {
        let mut budget = RetryBudget::new(1);

        assert!(budget.try_consume());
        assert!(!budget.try_consume());
        assert_eq!(budget.used(), 1);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn consume_n_is_all_or_nothing() {
        let mut budget = RetryBudget::new(5);

        assert!(budget.try_consume_n(3));
        assert!(!budget.try_consume_n(3));
        assert_eq!(budget.remaining(), 2);
    }
}
