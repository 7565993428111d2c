//! Compositions
//!
//! A composition is one candidate basket: a set of SKUs with quantities that together satisfy
//! a task's requirement. Compositions are enumerated up front and tested one at a time.

use std::fmt;

use smallvec::SmallVec;
use tracing::warn;

use crate::products::Sku;

/// Search steps allowed per requested candidate before enumeration gives up.
const STEPS_PER_CANDIDATE: usize = 256;

/// A SKU and quantity within a composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionLine {
    /// Product SKU
    pub sku: Sku,

    /// Quantity of the product
    pub quantity: u32,
}

/// A candidate basket composition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composition {
    lines: SmallVec<[CompositionLine; 4]>,
}

impl Composition {
    /// Build a composition from `(sku, quantity)` pairs. Zero quantities are dropped and
    /// repeated SKUs are merged.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<Sku>,
    {
        let mut composition = Self::default();

        for (sku, quantity) in lines {
            composition.push(sku.into(), quantity);
        }

        composition
    }

    fn push(&mut self, sku: Sku, quantity: u32) {
        if quantity == 0 {
            return;
        }

        match self.lines.iter_mut().find(|line| line.sku == sku) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.lines.push(CompositionLine { sku, quantity }),
        }
    }

    /// Lines in the order they are added to the basket.
    pub fn lines(&self) -> &[CompositionLine] {
        &self.lines
    }

    /// Quantity of the given SKU.
    pub fn quantity_of(&self, sku: &Sku) -> u32 {
        self.lines
            .iter()
            .find(|line| &line.sku == sku)
            .map_or(0, |line| line.quantity)
    }

    /// Check if the composition has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lines.is_empty() {
            return f.write_str("(empty)");
        }

        for (idx, line) in self.lines.iter().enumerate() {
            if idx > 0 {
                f.write_str(" + ")?;
            }

            write!(f, "{}x {}", line.quantity, line.sku)?;
        }

        Ok(())
    }
}

/// A product that contributes a fixed number of units towards a quantity requirement, e.g. a
/// 6-pack contributes 6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOption {
    /// Product SKU
    pub sku: Sku,

    /// Units contributed per item
    pub units: u32,
}

impl PackOption {
    /// Create a new pack option.
    pub fn new(sku: impl Into<Sku>, units: u32) -> Self {
        Self {
            sku: sku.into(),
            units,
        }
    }
}

/// Compositions produced by [`enumerate`].
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    /// Compositions in discovery order
    pub compositions: Vec<Composition>,

    /// Whether enumeration stopped at the candidate limit or ran out of search steps
    pub truncated: bool,
}

/// Enumerate every composition of `options` whose units sum exactly to `units`.
///
/// Options are explored depth-first in the order given, trying the largest count of each option
/// first, so `[6pk, 12pk, 24pk]` for 24 units yields `4x 6pk` before `2x 6pk + 1x 12pk`.
/// `max_quantity` caps the count of any SKU (e.g. by known stock); options with zero units and
/// repeated SKUs are ignored. At most `max_candidates` compositions are returned.
///
/// Branches whose remaining units are not a multiple of the remaining options' gcd, or exceed
/// their combined capacity, are skipped. The search itself is bounded to a fixed number of steps
/// per candidate.
pub fn enumerate<F>(
    options: &[PackOption],
    units: u32,
    max_quantity: F,
    max_candidates: usize,
) -> Enumeration
where
    F: Fn(&Sku) -> Option<u32>,
{
    let mut usable: SmallVec<[(&PackOption, u32); 8]> = SmallVec::new();

    for option in options {
        if option.units == 0 || usable.iter().any(|(seen, _)| seen.sku == option.sku) {
            warn!(sku = %option.sku, units = option.units, "ignoring pack option");
            continue;
        }

        let fit = units / option.units;
        let cap = max_quantity(&option.sku).map_or(fit, |cap| cap.min(fit));

        usable.push((option, cap));
    }

    let mut enumerator = Enumerator {
        options: &usable,
        reach: reach_by_suffix(&usable),
        current: SmallVec::new(),
        result: Enumeration::default(),
        max_candidates,
        steps_left: max_candidates.saturating_mul(STEPS_PER_CANDIDATE),
    };

    if units > 0 {
        enumerator.descend(0, units);
    }

    enumerator.result
}

/// Units reachable from an option onwards: every sum is a multiple of `gcd` and at most
/// `capacity`.
#[derive(Debug, Clone, Copy, Default)]
struct Reach {
    gcd: u32,
    capacity: u64,
}

impl Reach {
    fn admits(self, remaining: u32) -> bool {
        self.gcd > 0 && remaining % self.gcd == 0 && u64::from(remaining) <= self.capacity
    }
}

fn reach_by_suffix(options: &[(&PackOption, u32)]) -> SmallVec<[Reach; 8]> {
    let mut reach: SmallVec<[Reach; 8]> = SmallVec::from_elem(Reach::default(), options.len() + 1);
    let mut next = Reach::default();

    for (idx, (option, cap)) in options.iter().enumerate().rev() {
        if *cap > 0 {
            next = Reach {
                gcd: gcd(option.units, next.gcd),
                capacity: next
                    .capacity
                    .saturating_add(u64::from(*cap) * u64::from(option.units)),
            };
        }

        if let Some(slot) = reach.get_mut(idx) {
            *slot = next;
        }
    }

    reach
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }

    a
}

struct Enumerator<'a> {
    options: &'a [(&'a PackOption, u32)],
    reach: SmallVec<[Reach; 8]>,
    current: SmallVec<[(Sku, u32); 8]>,
    result: Enumeration,
    max_candidates: usize,
    steps_left: usize,
}

impl Enumerator<'_> {
    fn descend(&mut self, idx: usize, remaining: u32) {
        if self.result.truncated {
            return;
        }

        if remaining == 0 {
            if self.result.compositions.len() >= self.max_candidates {
                self.result.truncated = true;
                return;
            }

            self.result
                .compositions
                .push(Composition::from_lines(self.current.iter().cloned()));

            return;
        }

        let admitted = self.reach.get(idx).is_some_and(|reach| reach.admits(remaining));

        let Some(&(option, cap)) = self.options.get(idx).filter(|_| admitted) else {
            return;
        };

        if self.steps_left == 0 {
            self.result.truncated = true;
            return;
        }

        self.steps_left -= 1;

        let max_count = cap.min(remaining / option.units);

        for count in (0..=max_count).rev() {
            if count > 0 {
                self.current.push((option.sku.clone(), count));
            }

            self.descend(idx + 1, remaining - count * option.units);

            if count > 0 {
                self.current.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soda_options() -> Vec<PackOption> {
        vec![
            PackOption::new("soda-6pk", 6),
            PackOption::new("soda-12pk", 12),
            PackOption::new("soda-24pk", 24),
        ]
    }

    #[test]
    fn enumerates_every_exact_composition_in_order() {
        let enumeration = enumerate(&soda_options(), 24, |_| None, 100);

        let rendered: Vec<String> = enumeration
            .compositions
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            rendered,
            [
                "4x soda-6pk",
                "2x soda-6pk + 1x soda-12pk",
                "2x soda-12pk",
                "1x soda-24pk",
            ]
        );
        assert!(!enumeration.truncated);
    }

    #[test]
    fn quantity_caps_prune_compositions() {
        let enumeration = enumerate(
            &soda_options(),
            24,
            |sku| (sku.as_str() == "soda-6pk").then_some(2),
            100,
        );

        assert_eq!(enumeration.compositions.len(), 3);
        assert!(
            enumeration
                .compositions
                .iter()
                .all(|composition| composition.quantity_of(&Sku::from("soda-6pk")) <= 2)
        );
    }

    #[test]
    fn candidate_limit_truncates() {
        let enumeration = enumerate(&soda_options(), 24, |_| None, 2);

        assert_eq!(enumeration.compositions.len(), 2);
        assert!(enumeration.truncated);
    }

    #[test]
    fn unreachable_quantity_yields_nothing() {
        let enumeration = enumerate(&soda_options(), 10, |_| None, 100);

        assert!(enumeration.compositions.is_empty());
    }

    #[test]
    fn odd_units_from_even_packs_are_pruned_without_searching() {
        let options = [PackOption::new("cup-2pk", 2), PackOption::new("cup-4pk", 4)];

        let enumeration = enumerate(&options, 1_000_001, |_| None, 1);

        assert!(enumeration.compositions.is_empty());
        assert!(!enumeration.truncated);
    }

    #[test]
    fn units_beyond_stock_are_pruned() {
        let enumeration = enumerate(&soda_options(), 240, |_| Some(1), 1);

        assert!(enumeration.compositions.is_empty());
        assert!(!enumeration.truncated);
    }

    #[test]
    fn fruitless_search_stops_at_step_budget() {
        // 10 and 15 only reach multiples of 5 and the single 7 adds 2 mod 5, so 3 mod 5 is
        // unreachable even though the gcd is 1.
        let options = [
            PackOption::new("crate-10", 10),
            PackOption::new("crate-15", 15),
            PackOption::new("crate-7", 7),
        ];

        let enumeration = enumerate(
            &options,
            100_003,
            |sku| (sku.as_str() == "crate-7").then_some(1),
            2,
        );

        assert!(enumeration.compositions.is_empty());
        assert!(enumeration.truncated);
    }

    #[test]
    fn zero_unit_options_are_ignored() {
        let options = [PackOption::new("free-gift", 0), PackOption::new("soda-6pk", 6)];

        let enumeration = enumerate(&options, 12, |_| None, 100);

        assert_eq!(enumeration.compositions.len(), 1);
    }

    #[test]
    fn from_lines_merges_and_drops_zero() {
        let composition = Composition::from_lines([("a", 1), ("b", 0), ("a", 2)]);

        assert_eq!(composition.lines().len(), 1);
        assert_eq!(composition.quantity_of(&Sku::from("a")), 3);
    }
}
