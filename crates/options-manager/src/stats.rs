//! Realized performance of paper trading.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use optdesk_data::{PaperPositionRecord, PaperStatus};

/// Aggregate results over settled (CLOSED or ROLLED) paper positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_trades: u32,
    pub wins: u32,
    pub losses: u32,
    /// Percent, rounded to 2 decimals.
    pub win_rate: f64,
    pub total_pnl: Decimal,
    pub average_pnl: Decimal,
    /// Gross profit over gross loss; `None` without any losing trade.
    pub profit_factor: Option<f64>,
}

impl PerformanceStats {
    /// Computes statistics, ignoring OPEN positions and any row without a realized result.
    #[must_use]
    pub fn from_positions(positions: &[PaperPositionRecord]) -> Self {
        let realized: Vec<Decimal> = positions
            .iter()
            .filter(|p| matches!(p.status, PaperStatus::Closed | PaperStatus::Rolled))
            .filter_map(|p| p.realized_pnl)
            .collect();

        let total_trades = realized.len() as u32;
        let wins = realized.iter().filter(|pnl| **pnl > Decimal::ZERO).count() as u32;
        let losses = realized.iter().filter(|pnl| **pnl < Decimal::ZERO).count() as u32;

        let total_pnl: Decimal = realized.iter().copied().sum();
        let gross_profit: Decimal = realized.iter().filter(|p| **p > Decimal::ZERO).copied().sum();
        let gross_loss: Decimal = realized
            .iter()
            .filter(|p| **p < Decimal::ZERO)
            .map(|p| -*p)
            .sum();

        let win_rate = if total_trades > 0 {
            (f64::from(wins) / f64::from(total_trades) * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };
        let average_pnl = if total_trades > 0 {
            (total_pnl / Decimal::from(total_trades)).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let profit_factor = if gross_loss > Decimal::ZERO {
            (gross_profit / gross_loss).to_f64()
        } else {
            None
        };

        Self {
            total_trades,
            wins,
            losses,
            win_rate,
            total_pnl,
            average_pnl,
            profit_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use optdesk_core::OptionType;
    use rust_decimal_macros::dec;

    fn record(id: i64, status: PaperStatus, pnl: Option<Decimal>) -> PaperPositionRecord {
        PaperPositionRecord {
            id,
            owner_id: 1,
            symbol: "XYZ".into(),
            option_type: OptionType::Put,
            strike: dec!(90),
            expiry: NaiveDate::from_ymd_opt(2025, 4, 17).unwrap(),
            entry_price: dec!(2.50),
            quantity: -1,
            status,
            opened_at: Utc::now(),
            closed_at: None,
            exit_price: None,
            realized_pnl: pnl,
            parent_position_id: None,
            tags: vec![],
        }
    }

    #[test]
    fn excludes_open_positions() {
        let stats = PerformanceStats::from_positions(&[
            record(1, PaperStatus::Closed, Some(dec!(150))),
            record(2, PaperStatus::Rolled, Some(dec!(-50))),
            record(3, PaperStatus::Closed, Some(dec!(100))),
            record(4, PaperStatus::Open, None),
        ]);
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert!((stats.win_rate - 66.67).abs() < 1e-9);
        assert_eq!(stats.total_pnl, dec!(200));
        assert_eq!(stats.average_pnl, dec!(66.67));
        assert!((stats.profit_factor.unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn no_losses_leaves_profit_factor_undefined() {
        let stats =
            PerformanceStats::from_positions(&[record(1, PaperStatus::Closed, Some(dec!(80)))]);
        assert_eq!(stats.profit_factor, None);
        assert_eq!(PerformanceStats::from_positions(&[]).win_rate, 0.0);
    }
}
