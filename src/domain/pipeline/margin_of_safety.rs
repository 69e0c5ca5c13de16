//! Gate 5: margin-of-safety valuation.
//!
//! Intrinsic value is a probability-weighted blend of three scenarios,
//! each a five-year projection of per-share owner earnings with its own
//! growth, discount and terminal-multiple assumptions. MoS compares that
//! blend to the lagged price; the rating needs quality and risk backing
//! before it will say BUY.

use crate::domain::snapshot::AsOfSnapshot;

pub const PROJECTION_YEARS: u32 = 5;

/// One intrinsic-value scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: &'static str,
    pub weight: f64,
    pub growth: f64,
    pub discount: f64,
    pub terminal_multiple: f64,
}

/// Conservative 30% / base 50% / optimistic 20%.
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "conservative",
            weight: 0.30,
            growth: 0.00,
            discount: 0.12,
            terminal_multiple: 10.0,
        },
        Scenario {
            name: "base",
            weight: 0.50,
            growth: 0.04,
            discount: 0.10,
            terminal_multiple: 12.0,
        },
        Scenario {
            name: "optimistic",
            weight: 0.20,
            growth: 0.08,
            discount: 0.09,
            terminal_multiple: 15.0,
        },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Rating {
    Buy,
    Watch,
    Pass,
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rating::Buy => write!(f, "BUY"),
            Rating::Watch => write!(f, "WATCH"),
            Rating::Pass => write!(f, "PASS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MosConfig {
    pub min_mos_watch: f64,
    pub min_mos_buy: f64,
    pub buy_quality_floor: u32,
    pub buy_risk_floor: f64,
    pub scenarios: Vec<Scenario>,
}

impl Default for MosConfig {
    fn default() -> Self {
        MosConfig {
            min_mos_watch: 0.10,
            min_mos_buy: 0.30,
            buy_quality_floor: 7,
            buy_risk_floor: 0.70,
            scenarios: default_scenarios(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MosOutcome {
    pub passed: bool,
    pub reason: String,
    pub margin_of_safety: f64,
    pub intrinsic_value: f64,
    pub rating: Rating,
}

/// Evaluate the gate. `soundness` and `risk_score` come from gates 2 and 3
/// and back the BUY rating.
pub fn evaluate(
    snapshot: &AsOfSnapshot,
    soundness: u32,
    risk_score: f64,
    config: &MosConfig,
) -> MosOutcome {
    let fin = &snapshot.financials;
    let price = snapshot.price.close;

    let shares = fin
        .shares_outstanding
        .or_else(|| fin.market_cap.map(|cap| cap / price));
    let base_earnings = fin.owner_earnings_or_proxy();

    let per_share = match (base_earnings, shares) {
        (Some(earnings), Some(shares)) if shares > 0.0 => earnings / shares,
        _ => {
            return MosOutcome {
                passed: false,
                reason: "no_earnings_basis".into(),
                margin_of_safety: 0.0,
                intrinsic_value: 0.0,
                rating: Rating::Pass,
            }
        }
    };

    if per_share <= 0.0 {
        return MosOutcome {
            passed: false,
            reason: "non_positive_owner_earnings".into(),
            margin_of_safety: 0.0,
            intrinsic_value: 0.0,
            rating: Rating::Pass,
        };
    }

    let intrinsic_value = weighted_intrinsic(per_share, &config.scenarios);
    if intrinsic_value <= 0.0 {
        return MosOutcome {
            passed: false,
            reason: "non_positive_intrinsic".into(),
            margin_of_safety: 0.0,
            intrinsic_value,
            rating: Rating::Pass,
        };
    }

    let margin_of_safety = (intrinsic_value - price) / intrinsic_value;

    if margin_of_safety < config.min_mos_watch {
        return MosOutcome {
            passed: false,
            reason: "insufficient_margin_of_safety".into(),
            margin_of_safety,
            intrinsic_value,
            rating: Rating::Pass,
        };
    }

    let rating = if margin_of_safety >= config.min_mos_buy
        && soundness >= config.buy_quality_floor
        && risk_score >= config.buy_risk_floor
    {
        Rating::Buy
    } else {
        Rating::Watch
    };

    MosOutcome {
        passed: true,
        reason: "pass".into(),
        margin_of_safety,
        intrinsic_value,
        rating,
    }
}

/// Probability-weighted intrinsic value per share.
pub fn weighted_intrinsic(per_share_earnings: f64, scenarios: &[Scenario]) -> f64 {
    scenarios
        .iter()
        .map(|s| s.weight * scenario_intrinsic(per_share_earnings, s))
        .sum()
}

/// Five-year discounted projection plus a discounted terminal value.
fn scenario_intrinsic(per_share_earnings: f64, scenario: &Scenario) -> f64 {
    let mut value = 0.0;
    let mut projected = per_share_earnings;
    let mut discount = 1.0;
    for _ in 0..PROJECTION_YEARS {
        projected *= 1.0 + scenario.growth;
        discount *= 1.0 + scenario.discount;
        value += projected / discount;
    }
    let terminal = projected * scenario.terminal_multiple;
    value + terminal / discount
}
