use serde::{Deserialize, Serialize};

/// Piecewise-constant lookup table of `(breakpoint, value)` rows.
///
/// Rows are expected in ascending breakpoint order. The selected value is the
/// one of the last row whose breakpoint does not exceed the key; with adjacent
/// or repeated breakpoints the later row wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierTable {
    rows: Vec<(f64, f64)>,
}

impl TierTable {
    pub fn new(rows: Vec<(f64, f64)>) -> Self {
        Self { rows }
    }

    /// Builds a time-of-day table from `(seconds since midnight, value)` rows.
    pub fn daily(rows: &[(u32, f64)]) -> Self {
        Self::new(rows.iter().map(|&(s, v)| (f64::from(s), v)).collect())
    }

    pub fn rows(&self) -> &[(f64, f64)] {
        &self.rows
    }

    /// Value of the last row with `breakpoint <= key`, `None` below the first row.
    pub fn lookup(&self, key: f64) -> Option<f64> {
        let mut selected = None;
        for &(breakpoint, value) in &self.rows {
            if breakpoint <= key {
                selected = Some(value);
            }
        }
        selected
    }

    pub fn is_ascending(&self) -> bool {
        self.rows.windows(2).all(|w| w[0].0 <= w[1].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_largest_satisfied_breakpoint_wins() {
        let t = TierTable::new(vec![(0.0, 0.0), (600.0, 0.45), (750.0, 0.7), (900.0, 1.0)]);
        assert_eq!(t.lookup(725.0), Some(0.45));
        assert_eq!(t.lookup(750.0), Some(0.7));
        assert_eq!(t.lookup(5000.0), Some(1.0));
        assert_eq!(t.lookup(-1.0), None);
    }

    #[test]
    fn test_repeated_breakpoint_takes_later_row() {
        let t = TierTable::new(vec![(0.0, 0.0), (600.0, 0.3), (600.0, 0.6)]);
        assert_eq!(t.lookup(650.0), Some(0.6));
        assert!(t.is_ascending());
    }
}
