//! Data-driven tiered scoring.
//!
//! Every scoring ladder in the pipeline is an ordered `(threshold, score)`
//! table evaluated by one helper, best tier first.

/// Which side of a threshold is the good side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Better {
    /// Multiples: EV/EBIT of 5 beats 15.
    Lower,
    /// Yields: an FCF yield of 10% beats 2%.
    Higher,
}

/// Score `value` against `table`, ordered best tier first.
///
/// With `Better::Lower` the first tier whose threshold is >= `value` wins;
/// with `Better::Higher` the first whose threshold is <= `value`. Values
/// beyond every tier get `floor`. Non-finite values get `floor`.
pub fn tiered_score(value: f64, better: Better, table: &[(f64, f64)], floor: f64) -> f64 {
    if !value.is_finite() {
        return floor;
    }
    for (threshold, score) in table {
        let hit = match better {
            Better::Lower => value <= *threshold,
            Better::Higher => value >= *threshold,
        };
        if hit {
            return *score;
        }
    }
    floor
}
