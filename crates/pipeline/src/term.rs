//! Governance term calculation.
//!
//! Terms last one calendar year and roll over on January 1 (UTC).

use serde::{Deserialize, Serialize};

use crate::{Term, Timestamp};

/// A known (year, term) pair that anchors the term sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermReference {
    /// Calendar year in which `term` was current.
    pub year: i32,
    /// Term number current during `year`.
    pub term: u32,
}

/// Returns the governance term current at `now`.
///
/// `reference.term + (year(now) - reference.year)`. Years before the
/// reference year count backwards and clamp at term 0.
pub fn current_term(now: Timestamp, reference: TermReference) -> Term {
    let elapsed = i64::from(now.year()) - i64::from(reference.year);
    let term = i64::from(reference.term) + elapsed;
    Term::new(u32::try_from(term.max(0)).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    const ENS: TermReference = TermReference {
        year: 2025,
        term: 6,
    };

    fn at(y: i32, m: u32, d: u32, h: u32) -> Timestamp {
        Timestamp::from_utc(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    #[test]
    fn reference_year_yields_reference_term() {
        assert_eq!(current_term(at(2025, 6, 1, 12), ENS), Term::new(6));
    }

    #[test]
    fn term_rolls_over_on_january_first() {
        assert_eq!(current_term(at(2025, 12, 31, 23), ENS), Term::new(6));
        assert_eq!(current_term(at(2026, 1, 1, 0), ENS), Term::new(7));
    }

    #[test]
    fn term_never_decreases_as_time_advances() {
        let mut previous = current_term(at(2020, 1, 1, 0), ENS);
        for year in 2020..2040 {
            let term = current_term(at(year, 7, 1, 0), ENS);
            assert!(term >= previous);
            previous = term;
        }
    }

    #[test]
    fn years_long_before_reference_clamp_at_zero() {
        assert_eq!(current_term(at(2010, 1, 1, 0), ENS), Term::new(0));
    }
}
