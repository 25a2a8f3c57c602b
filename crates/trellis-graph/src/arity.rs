// Inclusive port-count ranges.

use std::fmt;

use serde::Serialize;

/// An inclusive range of admissible port counts for one side of a node.
///
/// `max: None` means unbounded above. A range whose lower bound exceeds its
/// upper bound admits no count at all; declaring a node with such a range is
/// rejected at declaration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Arity {
    min: usize,
    max: Option<usize>,
}

impl Arity {
    /// Exactly `n` ports.
    pub fn exactly(n: usize) -> Self {
        Arity { min: n, max: Some(n) }
    }

    /// `n` or more ports.
    pub fn at_least(n: usize) -> Self {
        Arity { min: n, max: None }
    }

    /// Between `min` and `max` ports, both inclusive.
    pub fn between(min: usize, max: usize) -> Self {
        Arity { min, max: Some(max) }
    }

    /// No ports at all; the shape of a pure source's inward side.
    pub fn none() -> Self {
        Arity::exactly(0)
    }

    /// Any number of ports, including zero.
    pub fn any() -> Self {
        Arity::at_least(0)
    }

    /// Lower bound.
    pub fn min(&self) -> usize {
        self.min
    }

    /// Upper bound, if bounded.
    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// Whether `count` falls inside the range.
    pub fn admits(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |m| count <= m)
    }

    /// Whether the range admits no count at all.
    pub fn is_vacant(&self) -> bool {
        self.max.map_or(false, |m| m < self.min)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "exactly {}", self.min),
            Some(max) => write!(f, "{}..={}", self.min, max),
            None => write!(f, "{}..", self.min),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_respects_bounds() {
        assert!(Arity::exactly(1).admits(1));
        assert!(!Arity::exactly(1).admits(0));
        assert!(!Arity::exactly(1).admits(2));
        assert!(Arity::at_least(2).admits(100));
        assert!(!Arity::at_least(2).admits(1));
        assert!(Arity::between(1, 3).admits(3));
        assert!(!Arity::between(1, 3).admits(4));
    }

    #[test]
    fn vacant_ranges_are_detected() {
        assert!(Arity::between(3, 1).is_vacant());
        assert!(!Arity::exactly(0).is_vacant());
        assert!(!Arity::any().is_vacant());
    }

    #[test]
    fn display_names_the_shape() {
        assert_eq!(Arity::exactly(2).to_string(), "exactly 2");
        assert_eq!(Arity::between(1, 4).to_string(), "1..=4");
        assert_eq!(Arity::at_least(0).to_string(), "0..");
    }
}
