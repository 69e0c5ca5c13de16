//! Gate 1: input reliability.
//!
//! Rejects records whose numbers cannot be trusted enough to score:
//! missing or unit-ambiguous market cap, implausible ratios, or too many
//! absent core fields. Delegates plausibility to the central
//! [`validate_financials`] entry point.

use crate::domain::financials::{validate_financials, Financials};

#[derive(Debug, Clone, PartialEq)]
pub struct ReliabilityOutcome {
    pub passed: bool,
    pub reason: String,
}

pub fn evaluate(fin: &Financials, max_missing_core_fields: usize) -> ReliabilityOutcome {
    if let Err(issue) = validate_financials(fin) {
        return ReliabilityOutcome {
            passed: false,
            reason: issue.to_string(),
        };
    }

    let missing = fin.missing_core_fields();
    if missing > max_missing_core_fields {
        return ReliabilityOutcome {
            passed: false,
            reason: format!("missing_core_fields:{missing}"),
        };
    }

    ReliabilityOutcome {
        passed: true,
        reason: "pass".into(),
    }
}
