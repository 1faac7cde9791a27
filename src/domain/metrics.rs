//! Performance statistics over a finished portfolio.
//!
//! Every function here is total: degenerate inputs (empty histories, zero
//! denominators, non-finite intermediates) resolve to 0 rather than raise.

use std::collections::{BTreeMap, HashMap};

use super::market::MarketDataset;
use super::portfolio::Portfolio;
use super::trade::{Side, Trade};

const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Final cash minus initial cash, after liquidation.
    pub profit_loss: f64,
    /// Compound annual growth rate over the dataset's calendar span.
    pub annualized_return: f64,
    /// Largest fractional decline of account value from its running peak.
    pub max_drawdown: f64,
    /// Fraction of closed trades sold above their average cost basis.
    pub win_probability: f64,
}

impl Metrics {
    pub fn compute(dataset: &MarketDataset, portfolio: &Portfolio) -> Self {
        let profit_loss = portfolio.cash() - portfolio.initial_cash();
        Metrics {
            profit_loss,
            annualized_return: annualized_return(dataset, profit_loss, portfolio.initial_cash()),
            max_drawdown: max_drawdown(&account_value_series(portfolio)),
            win_probability: win_probability(portfolio.trades()),
        }
    }
}

fn annualized_return(dataset: &MarketDataset, profit_loss: f64, initial_cash: f64) -> f64 {
    let (Some(first), Some(last)) = (dataset.first_date(), dataset.last_date()) else {
        return 0.0;
    };
    if initial_cash <= 0.0 {
        return 0.0;
    }

    let duration_years = (last - first).num_days() as f64 / DAYS_PER_YEAR;
    if duration_years <= 0.0 {
        // Single-day run: the exponent is undefined.
        return 0.0;
    }

    let cumulative_return = profit_loss / initial_cash;
    let annualized = (1.0 + cumulative_return).powf(1.0 / duration_years) - 1.0;
    if annualized.is_finite() { annualized } else { 0.0 }
}

/// Total account value (holdings mark-to-market plus cash) per recorded
/// date, in date order.
fn account_value_series(portfolio: &Portfolio) -> Vec<f64> {
    let mut by_date: BTreeMap<chrono::NaiveDate, f64> = portfolio
        .cash_history()
        .iter()
        .map(|point| (point.date, point.cash))
        .collect();

    for holding in portfolio.valuation_history() {
        *by_date.entry(holding.date).or_insert(0.0) += holding.value;
    }

    by_date.into_values().collect()
}

fn max_drawdown(account_values: &[f64]) -> f64 {
    let Some(&first) = account_values.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in account_values {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            let drawdown = (peak - value) / peak;
            if drawdown > max_dd {
                max_dd = drawdown;
            }
        }
    }

    if max_dd.is_finite() { max_dd } else { 0.0 }
}

#[derive(Debug, Clone, Copy)]
struct Lot {
    shares: u64,
    average_cost: f64,
}

/// Walk the ledger chronologically, tracking one weighted-average-cost lot
/// per symbol. A sell above the lot's average cost counts as a win; every
/// sell against an open lot counts as a closed trade. Sells with no open
/// lot are ignored.
fn win_probability(trades: &[Trade]) -> f64 {
    let mut lots: HashMap<&str, Lot> = HashMap::new();
    let mut wins = 0usize;
    let mut closed = 0usize;

    for trade in trades {
        match trade.side {
            Side::Buy => {
                match lots.get_mut(trade.symbol.as_str()) {
                    Some(lot) => {
                        let total_shares = lot.shares + trade.shares;
                        if total_shares > 0 {
                            lot.average_cost = (lot.shares as f64 * lot.average_cost
                                + trade.shares as f64 * trade.price)
                                / total_shares as f64;
                        }
                        lot.shares = total_shares;
                    }
                    None => {
                        lots.insert(
                            trade.symbol.as_str(),
                            Lot {
                                shares: trade.shares,
                                average_cost: trade.price,
                            },
                        );
                    }
                }
            }
            Side::Sell => {
                let Some(lot) = lots.get_mut(trade.symbol.as_str()) else {
                    continue;
                };
                closed += 1;
                if trade.price > lot.average_cost {
                    wins += 1;
                }
                lot.shares = lot.shares.saturating_sub(trade.shares);
                if lot.shares == 0 {
                    lots.remove(trade.symbol.as_str());
                }
            }
        }
    }

    if closed == 0 {
        0.0
    } else {
        wins as f64 / closed as f64
    }
}
