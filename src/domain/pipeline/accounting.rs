//! Gate 2: accounting quality.
//!
//! Margin floors on 5-period rolling averages, profit consistency, an
//! accruals screen, and a 9-point soundness score. History-poor records
//! fall back to the latest scalar for the margin checks; the accruals
//! screen is skipped (not failed) without two comparable periods, since
//! gate 1 already owns the missing-data budget.

use crate::domain::financials::Financials;

pub const OPERATING_MARGIN_FLOOR: f64 = 5.0;
pub const NET_MARGIN_FLOOR: f64 = 3.0;
pub const CONSISTENCY_FLOOR: f64 = 0.60;
pub const ACCRUALS_CEILING: f64 = 0.30;
pub const SOUNDNESS_FLOOR: u32 = 6;
pub const SOUNDNESS_MAX: u32 = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct AccountingOutcome {
    pub passed: bool,
    pub reason: String,
    pub soundness: u32,
    pub avg_operating_margin: Option<f64>,
    pub avg_net_margin: Option<f64>,
    pub accruals_ratio: Option<f64>,
}

pub fn evaluate(fin: &Financials) -> AccountingOutcome {
    let avg_operating_margin =
        rolling_margin(fin, |p| p.operating_margin, fin.operating_margin);
    let avg_net_margin = rolling_margin(fin, |p| p.net_margin, fin.net_margin);
    let accruals_ratio = accruals_ratio(fin);
    let soundness = soundness_score(fin);

    let mut failure: Option<String> = None;

    match avg_operating_margin {
        None => failure = Some("missing_operating_margin".into()),
        Some(m) if m < OPERATING_MARGIN_FLOOR => {
            failure = Some("low_operating_margin".into())
        }
        Some(_) => {}
    }

    if failure.is_none() {
        match avg_net_margin {
            None => failure = Some("missing_net_margin".into()),
            Some(m) if m < NET_MARGIN_FLOOR => failure = Some("low_net_margin".into()),
            Some(_) => {}
        }
    }

    if failure.is_none() {
        if let Some(consistency) = positive_period_consistency(fin) {
            if consistency < CONSISTENCY_FLOOR {
                failure = Some("low_profit_consistency".into());
            }
        }
    }

    if failure.is_none() {
        if let Some(ratio) = accruals_ratio {
            if ratio > ACCRUALS_CEILING {
                failure = Some("high_accruals_ratio".into());
            }
        }
    }

    if failure.is_none() && soundness < SOUNDNESS_FLOOR {
        failure = Some(format!("low_soundness:{soundness}/{SOUNDNESS_MAX}"));
    }

    AccountingOutcome {
        passed: failure.is_none(),
        reason: failure.unwrap_or_else(|| "pass".into()),
        soundness,
        avg_operating_margin,
        avg_net_margin,
        accruals_ratio,
    }
}

/// Mean of up to five history values, falling back to the latest scalar
/// when the history does not carry the field.
fn rolling_margin<F>(fin: &Financials, pick: F, scalar: Option<f64>) -> Option<f64>
where
    F: Fn(&crate::domain::financials::FiscalPeriod) -> Option<f64>,
{
    let values: Vec<f64> = fin.history.iter().take(5).filter_map(&pick).collect();
    if values.is_empty() {
        return scalar;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Share of history periods with positive net income. `None` without any
/// observable net income (scalar counts as a single period).
fn positive_period_consistency(fin: &Financials) -> Option<f64> {
    let values: Vec<f64> = fin
        .history
        .iter()
        .take(5)
        .filter_map(|p| p.net_income)
        .collect();
    if values.is_empty() {
        return fin.net_income.map(|ni| if ni > 0.0 { 1.0 } else { 0.0 });
    }
    let positive = values.iter().filter(|v| **v > 0.0).count();
    Some(positive as f64 / values.len() as f64)
}

/// `|Δnet_income − Δtotal_assets| / |Δtotal_assets|` over the two most
/// recent periods. `None` without two comparable periods or with a flat
/// balance sheet.
fn accruals_ratio(fin: &Financials) -> Option<f64> {
    let latest = fin.history.first()?;
    let prior = fin.history.get(1)?;
    let d_ni = latest.net_income? - prior.net_income?;
    let d_ta = latest.total_assets? - prior.total_assets?;
    if d_ta.abs() < f64::EPSILON {
        return None;
    }
    Some((d_ni - d_ta).abs() / d_ta.abs())
}

/// Nine binary checks across profitability, leverage, liquidity, margin
/// trend and growth. A check with missing inputs scores zero.
fn soundness_score(fin: &Financials) -> u32 {
    let latest = fin.history.first();
    let prior = fin.history.get(1);

    let latest_net_income = latest.and_then(|p| p.net_income).or(fin.net_income);

    let checks = [
        // profitability
        latest_net_income.map(|v| v > 0.0),
        fin.roa.map(|v| v > 0.0),
        fin.operating_cash_flow
            .map(|v| v > 0.0)
            .or(fin.operating_margin.map(|v| v > 0.0)),
        // leverage
        fin.debt_ratio.map(|v| v <= 60.0),
        pair(latest, prior, |p| p.debt_ratio).map(|(now, before)| now <= before),
        // liquidity
        fin.current_ratio.map(|v| v >= 1.5),
        pair(latest, prior, |p| p.current_ratio).map(|(now, before)| now >= before),
        // margin trend
        pair(latest, prior, |p| p.net_margin).map(|(now, before)| now >= before),
        // growth
        pair(latest, prior, |p| p.revenue).map(|(now, before)| now > before),
    ];

    checks
        .iter()
        .filter(|check| matches!(check, Some(true)))
        .count() as u32
}

fn pair<F>(
    latest: Option<&crate::domain::financials::FiscalPeriod>,
    prior: Option<&crate::domain::financials::FiscalPeriod>,
    pick: F,
) -> Option<(f64, f64)>
where
    F: Fn(&crate::domain::financials::FiscalPeriod) -> Option<f64>,
{
    Some((pick(latest?)?, pick(prior?)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::financials::FiscalPeriod;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn period(
        year: i32,
        revenue: f64,
        net_income: f64,
        op_margin: f64,
        net_margin: f64,
        total_assets: f64,
    ) -> FiscalPeriod {
        FiscalPeriod {
            fiscal_year: year,
            revenue: Some(revenue),
            net_income: Some(net_income),
            operating_margin: Some(op_margin),
            net_margin: Some(net_margin),
            total_assets: Some(total_assets),
            free_cash_flow: Some(net_income * 0.9),
            debt_ratio: Some(40.0),
            current_ratio: Some(1.8),
        }
    }

    fn sound() -> Financials {
        Financials {
            symbol: "ACME".into(),
            report_date: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
            market_cap: Some(2.0e9),
            roa: Some(8.0),
            operating_margin: Some(12.0),
            net_margin: Some(8.0),
            operating_cash_flow: Some(2.4e8),
            debt_ratio: Some(40.0),
            current_ratio: Some(1.8),
            net_income: Some(1.6e8),
            history: vec![
                period(2019, 2.0e9, 1.6e8, 12.0, 8.0, 3.00e9),
                period(2018, 1.9e9, 1.5e8, 11.5, 7.8, 2.99e9),
                period(2017, 1.8e9, 1.4e8, 11.0, 7.6, 2.98e9),
                period(2016, 1.7e9, 1.3e8, 10.5, 7.4, 2.97e9),
                period(2015, 1.6e9, 1.2e8, 10.0, 7.2, 2.96e9),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn sound_record_passes() {
        let out = evaluate(&sound());
        assert!(out.passed, "reason: {}", out.reason);
        assert!(out.soundness >= SOUNDNESS_FLOOR);
    }

    #[test]
    fn rolling_average_uses_history() {
        let out = evaluate(&sound());
        assert_relative_eq!(
            out.avg_operating_margin.unwrap(),
            (12.0 + 11.5 + 11.0 + 10.5 + 10.0) / 5.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn short_history_falls_back_to_scalar() {
        let mut fin = sound();
        fin.history.clear();
        let out = evaluate(&fin);
        assert_relative_eq!(out.avg_operating_margin.unwrap(), 12.0, epsilon = 1e-9);
        assert_relative_eq!(out.avg_net_margin.unwrap(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn thin_operating_margin_rejected() {
        let mut fin = sound();
        for p in &mut fin.history {
            p.operating_margin = Some(3.0);
        }
        let out = evaluate(&fin);
        assert!(!out.passed);
        assert_eq!(out.reason, "low_operating_margin");
    }

    #[test]
    fn thin_net_margin_rejected() {
        let mut fin = sound();
        for p in &mut fin.history {
            p.net_margin = Some(1.0);
        }
        let out = evaluate(&fin);
        assert!(!out.passed);
        assert_eq!(out.reason, "low_net_margin");
    }

    #[test]
    fn missing_margins_rejected() {
        let mut fin = sound();
        fin.operating_margin = None;
        for p in &mut fin.history {
            p.operating_margin = None;
        }
        let out = evaluate(&fin);
        assert!(!out.passed);
        assert_eq!(out.reason, "missing_operating_margin");
    }

    #[test]
    fn loss_years_break_consistency() {
        let mut fin = sound();
        // Three of five periods in the red: 40% consistency.
        fin.history[1].net_income = Some(-1.0e7);
        fin.history[2].net_income = Some(-2.0e7);
        fin.history[3].net_income = Some(-5.0e6);
        let out = evaluate(&fin);
        assert!(!out.passed);
        assert_eq!(out.reason, "low_profit_consistency");
    }

    #[test]
    fn accruals_ratio_computed_from_latest_two_periods() {
        // Fixture: Δni = 1e7 and Δta = 1e7, earnings fully asset-backed.
        let out = evaluate(&sound());
        assert_relative_eq!(out.accruals_ratio.unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn aggressive_accruals_rejected() {
        let mut fin = sound();
        // Income jumps with the balance sheet flat-ish underneath it.
        fin.history[0].net_income = Some(2.5e8);
        let out = evaluate(&fin);
        assert!(!out.passed);
        assert_eq!(out.reason, "high_accruals_ratio");
    }

    #[test]
    fn accruals_skipped_without_two_periods() {
        let mut fin = sound();
        fin.history.truncate(1);
        let out = evaluate(&fin);
        assert!(out.accruals_ratio.is_none());
    }

    #[test]
    fn weak_soundness_rejected() {
        let mut fin = sound();
        // Margin floors still met but everything trends the wrong way.
        fin.roa = Some(-1.0);
        fin.operating_cash_flow = Some(-1.0e7);
        fin.operating_margin = None;
        fin.debt_ratio = Some(80.0);
        fin.current_ratio = Some(1.0);
        fin.history[0].debt_ratio = Some(55.0);
        fin.history[1].debt_ratio = Some(40.0);
        fin.history[0].current_ratio = Some(1.0);
        fin.history[1].current_ratio = Some(1.8);
        fin.history[0].net_margin = Some(6.0);
        fin.history[1].net_margin = Some(7.8);
        fin.history[0].revenue = Some(1.5e9);
        fin.history[1].revenue = Some(1.9e9);
        let out = evaluate(&fin);
        assert!(!out.passed);
        assert!(out.reason.starts_with("low_soundness:"));
    }

    #[test]
    fn soundness_counts_missing_inputs_as_zero() {
        let fin = Financials {
            symbol: "BARE".into(),
            market_cap: Some(2.0e9),
            net_income: Some(1.0e8),
            ..Default::default()
        };
        // Only the profitability check on net income can pass.
        assert_eq!(soundness_score(&fin), 1);
    }
}
