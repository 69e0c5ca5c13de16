//! Shared fixtures for the integration suite.
//!
//! Builds CSV content for a small universe whose fundamentals clear every
//! gate, plus one over-levered symbol the risk gate must exclude.

use std::fmt::Write as _;

/// Symbols whose fundamentals clear every gate at the fixture prices.
pub const GOOD_SYMBOLS: &[(&str, &str)] = &[
    ("ACME", "Industrials"),
    ("BOLT", "Tech"),
    ("CRUX", "Industrials"),
    ("DYNE", "Health"),
    ("EBB", "Energy"),
];

/// Over-levered symbol: debt ratio 150, rejected at the risk gate.
pub const LEVERED_SYMBOL: &str = "FLUX";

pub const FINANCIALS_HEADER: &str = "symbol,report_date,sector,market_cap,shares_outstanding,roe,roa,operating_margin,net_margin,debt_ratio,debt_to_equity,current_ratio,revenue,net_income,total_assets,ebit,enterprise_value,free_cash_flow,owner_earnings,operating_cash_flow,dividends_paid,buybacks,payout_ratio,eps,eps_growth";

/// One annual report row. Fundamentals grow gently year over year with
/// net income tracking total assets so the accruals screen stays quiet.
pub fn financial_row(symbol: &str, sector: &str, year: i32, debt_ratio: f64) -> String {
    let step = (year - 2015) as f64;
    let revenue = 1.6e9 + 1.0e8 * step;
    let net_income = 1.2e8 + 1.0e7 * step;
    let total_assets = 2.96e9 + 1.0e7 * step;
    format!(
        "{symbol},{year}-12-31,{sector},1000000000,100000000,15.0,8.0,{op_margin},{net_margin},{debt_ratio},0.8,1.8,{revenue},{net_income},{total_assets},220000000,1100000000,130000000,125000000,170000000,40000000,20000000,35.0,1.6,6.0",
        op_margin = 10.0 + 0.5 * step,
        net_margin = 7.2 + 0.2 * step,
    )
}

/// Annual reports 2015..=2019 for the full universe.
pub fn financials_csv() -> String {
    let mut out = String::from(FINANCIALS_HEADER);
    out.push('\n');
    for (symbol, sector) in GOOD_SYMBOLS {
        for year in 2015..=2019 {
            let _ = writeln!(out, "{}", financial_row(symbol, sector, year, 40.0));
        }
    }
    for year in 2015..=2019 {
        let _ = writeln!(
            out,
            "{}",
            financial_row(LEVERED_SYMBOL, "Industrials", year, 150.0)
        );
    }
    out
}

/// Month-end closes from Oct 2019 through Dec 2020.
///
/// `drift` is the per-month price increment applied to ACME; all other
/// symbols stay flat at 10.0, so `drift = 0.0` makes the whole tape flat.
pub fn prices_csv(drift: f64) -> String {
    let mut out = String::from("symbol,date,close\n");
    let month_ends = [
        (2019, 10, 31),
        (2019, 11, 29),
        (2019, 12, 31),
        (2020, 1, 31),
        (2020, 2, 28),
        (2020, 3, 31),
        (2020, 4, 30),
        (2020, 5, 29),
        (2020, 6, 30),
        (2020, 7, 31),
        (2020, 8, 31),
        (2020, 9, 30),
        (2020, 10, 30),
        (2020, 11, 30),
        (2020, 12, 31),
    ];
    for (symbol, _) in GOOD_SYMBOLS {
        for (i, (y, m, d)) in month_ends.iter().enumerate() {
            let close = if *symbol == "ACME" {
                10.0 + drift * i as f64
            } else {
                10.0
            };
            let _ = writeln!(out, "{symbol},{y}-{m:02}-{d:02},{close}");
        }
    }
    for (y, m, d) in month_ends {
        let _ = writeln!(out, "{LEVERED_SYMBOL},{y}-{m:02}-{d:02},10.0");
    }
    out
}

/// INI config over the fixture universe, zero frictions by default.
pub fn config_ini(transaction_cost: f64, slippage: f64) -> String {
    format!(
        r#"
[backtest]
start_date = 2020-01-01
end_date = 2020-12-31
symbols = ACME,BOLT,CRUX,DYNE,EBB,FLUX
initial_capital = 100000
rebalance_frequency = monthly
transaction_cost = {transaction_cost}
slippage = {slippage}
financial_lag_days = 90
price_lag_days = 2

[strategy]
max_positions = 20
min_positions = 3
"#
    )
}
