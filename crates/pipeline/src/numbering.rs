//! Term-relative proposal numbering.
//!
//! The ordinal is derived from a snapshot of the target repository's proposal
//! directory: it is the number of files already filed under the current term,
//! plus an adjustment. Nothing here owns a counter, so two proposals numbered
//! from the same snapshot (or from a listing that changes before the commit
//! lands) receive the same ordinal. That collision surfaces later as a file
//! conflict when the document is committed; see `orchestrator::Publisher`.
//!
//! ## Corrections
//!
//! Some historical terms contain sub-numbered files (`6.6.1.mdx`,
//! `6.6.2.mdx`) that inflate the raw count. An [`OrdinalCorrection`] replaces
//! the default `+1` adjustment for one term until its expiry date, after which
//! it is ignored. Corrections are configuration, not code.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ProposalNumber, Term, Timestamp};

/// Adjustment applied to the raw count when no correction is active.
pub const DEFAULT_ADJUSTMENT: i64 = 1;

/// Errors produced while assigning a proposal number.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NumberingError {
    /// The adjusted count does not yield a positive ordinal.
    #[error("term {term}: {count} existing files with adjustment {adjustment} yield no valid ordinal")]
    NonPositiveOrdinal {
        term: Term,
        count: usize,
        adjustment: i64,
    },
}

/// Replaces the default adjustment for one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdinalCorrection {
    pub term: Term,
    /// Added to the raw count of files filed under `term`.
    pub adjustment: i64,
    /// First day on which this correction no longer applies.
    #[serde(default)]
    pub expires: Option<NaiveDate>,
}

impl OrdinalCorrection {
    fn is_active(&self, today: NaiveDate) -> bool {
        self.expires.map_or(true, |expires| today < expires)
    }
}

/// The set of per-term corrections in force for a deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingPolicy {
    corrections: Vec<OrdinalCorrection>,
}

impl NumberingPolicy {
    /// Creates a policy from correction entries.
    pub fn new(corrections: Vec<OrdinalCorrection>) -> Self {
        Self { corrections }
    }

    /// Returns the configured corrections.
    pub fn corrections(&self) -> &[OrdinalCorrection] {
        &self.corrections
    }

    /// Returns the adjustment in force for `term` on `today`.
    pub fn adjustment_for(&self, term: Term, today: NaiveDate) -> i64 {
        self.corrections
            .iter()
            .find(|c| c.term == term && c.is_active(today))
            .map_or(DEFAULT_ADJUSTMENT, |c| c.adjustment)
    }
}

/// Computes the next proposal number for `term` from an existing file listing.
///
/// Only names starting with `"{term}."` count towards the term, so `7.1.mdx`
/// belongs to term 7 and `17.1.mdx` does not.
pub fn next_number<I, S>(
    term: Term,
    existing_names: I,
    policy: &NumberingPolicy,
    now: Timestamp,
) -> Result<ProposalNumber, NumberingError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let prefix = format!("{term}.");
    let count = existing_names
        .into_iter()
        .filter(|name| name.as_ref().starts_with(&prefix))
        .count();

    let adjustment = policy.adjustment_for(term, now.date());
    let ordinal = i64::try_from(count).unwrap_or(i64::MAX).saturating_add(adjustment);

    u32::try_from(ordinal)
        .ok()
        .and_then(|ordinal| ProposalNumber::new(term, ordinal))
        .ok_or(NumberingError::NonPositiveOrdinal {
            term,
            count,
            adjustment,
        })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn now() -> Timestamp {
        Timestamp::from_utc(Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn term6_policy(expires: Option<NaiveDate>) -> NumberingPolicy {
        NumberingPolicy::new(vec![OrdinalCorrection {
            term: Term::new(6),
            adjustment: -2,
            expires,
        }])
    }

    #[test]
    fn next_ordinal_is_count_plus_one() {
        let listing = ["7.1.mdx", "7.2.mdx"];
        let number = next_number(Term::new(7), listing, &NumberingPolicy::default(), now()).unwrap();
        assert_eq!(number.to_string(), "7.3");
    }

    #[test]
    fn empty_term_starts_at_one() {
        let listing = ["6.1.mdx", "6.2.mdx", "index.mdx"];
        let number = next_number(Term::new(7), listing, &NumberingPolicy::default(), now()).unwrap();
        assert_eq!(number.to_string(), "7.1");
    }

    #[test]
    fn other_terms_and_prefix_lookalikes_are_ignored() {
        let listing = ["1.1.mdx", "11.1.mdx", "11.2.mdx", "1.2.mdx", "index.mdx"];
        let number = next_number(Term::new(1), listing, &NumberingPolicy::default(), now()).unwrap();
        assert_eq!(number.to_string(), "1.3");
    }

    #[test]
    fn active_correction_yields_count_minus_two() {
        let listing = [
            "6.1.mdx", "6.2.mdx", "6.3.mdx", "6.4.mdx", "6.5.mdx", "6.6.1.mdx", "6.6.2.mdx",
            "6.6.3.mdx",
        ];
        let policy = term6_policy(Some(date(2026, 1, 1)));
        let number = next_number(Term::new(6), listing, &policy, now()).unwrap();
        assert_eq!(number.ordinal, 8 - 2);
    }

    #[test]
    fn correction_only_applies_to_its_term() {
        let policy = term6_policy(None);
        let number = next_number(Term::new(7), ["7.1.mdx"], &policy, now()).unwrap();
        assert_eq!(number.to_string(), "7.2");
    }

    #[test]
    fn expired_correction_falls_back_to_default() {
        let policy = term6_policy(Some(date(2025, 9, 1)));
        assert_eq!(policy.adjustment_for(Term::new(6), date(2025, 8, 31)), -2);
        assert_eq!(policy.adjustment_for(Term::new(6), date(2025, 9, 1)), DEFAULT_ADJUSTMENT);

        let number = next_number(Term::new(6), ["6.1.mdx", "6.2.mdx"], &policy, now()).unwrap();
        assert_eq!(number.to_string(), "6.3");
    }

    #[test]
    fn correction_that_underflows_is_an_error() {
        let policy = term6_policy(None);
        let err = next_number(Term::new(6), ["6.1.mdx"], &policy, now()).unwrap_err();
        assert_eq!(
            err,
            NumberingError::NonPositiveOrdinal {
                term: Term::new(6),
                count: 1,
                adjustment: -2,
            }
        );
    }
}
