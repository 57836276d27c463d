//! Technical gate and strategy selection.
//!
//! The gate reduces a close series to the handful of readings the selector
//! needs; the selector maps them to at most one strategy, first match wins.

use serde::{Deserialize, Serialize};

use optdesk_core::config::SignalConfig;
use optdesk_core::indicators;
use optdesk_core::Strategy;

const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

/// Technical readings at the latest close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub price: f64,
    /// Annualized realized volatility over the configured window.
    pub realized_vol: f64,
    /// Rank of `realized_vol` within its own history, 0-100.
    pub vol_rank: f64,
    pub rsi: f64,
    pub sma: f64,
    pub macd_histogram: f64,
}

impl TechnicalSnapshot {
    /// Computes the snapshot from closes ordered oldest first.
    ///
    /// Returns `None` with fewer than `min_history` closes or when any
    /// indicator cannot be formed.
    #[must_use]
    pub fn compute(closes: &[f64], config: &SignalConfig) -> Option<Self> {
        if closes.len() < config.min_history {
            return None;
        }
        let vol_series = indicators::rolling_volatility(closes, config.vol_window);
        Some(Self {
            price: *closes.last()?,
            realized_vol: *vol_series.last()?,
            vol_rank: indicators::vol_rank(&vol_series)?,
            rsi: indicators::rsi(closes, config.rsi_period)?,
            sma: indicators::sma(closes, config.sma_period)?,
            macd_histogram: indicators::macd_histogram(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL)?,
        })
    }
}

/// Picks the strategy for a snapshot, or `None` when no setup is present.
#[must_use]
pub fn select_strategy(t: &TechnicalSnapshot, config: &SignalConfig) -> Option<Strategy> {
    let rich_vol = t.vol_rank >= config.min_vol_rank;
    let cheap_vol = t.vol_rank < config.debit_vol_rank_max;

    if t.rsi < config.rsi_oversold && rich_vol {
        return Some(Strategy::SellPut);
    }
    if t.rsi > config.rsi_overbought && rich_vol {
        return Some(Strategy::SellCall);
    }

    let uptrend = t.price > t.sma
        && (config.rsi_neutral..=config.rsi_overbought).contains(&t.rsi)
        && t.macd_histogram > 0.0;
    if uptrend {
        return Some(if cheap_vol { Strategy::BuyCall } else { Strategy::SellPut });
    }

    let downtrend = t.price < t.sma
        && (config.rsi_oversold..=config.rsi_neutral).contains(&t.rsi)
        && t.macd_histogram < 0.0;
    if downtrend {
        return Some(if cheap_vol { Strategy::BuyPut } else { Strategy::SellCall });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(price: f64, sma: f64, rsi: f64, vol_rank: f64, macd: f64) -> TechnicalSnapshot {
        TechnicalSnapshot {
            price,
            realized_vol: 0.25,
            vol_rank,
            rsi,
            sma,
            macd_histogram: macd,
        }
    }

    #[test]
    fn oversold_with_rich_vol_sells_puts() {
        let cfg = SignalConfig::default();
        assert_eq!(
            select_strategy(&snapshot(100.0, 105.0, 30.0, 40.0, -0.5), &cfg),
            Some(Strategy::SellPut)
        );
    }

    #[test]
    fn overbought_with_rich_vol_sells_calls() {
        let cfg = SignalConfig::default();
        assert_eq!(
            select_strategy(&snapshot(100.0, 95.0, 70.0, 30.0, 0.5), &cfg),
            Some(Strategy::SellCall)
        );
    }

    #[test]
    fn oversold_with_thin_vol_falls_through() {
        let cfg = SignalConfig::default();
        // RSI 30 fails the credit branch and sits outside the downtrend band.
        assert_eq!(select_strategy(&snapshot(100.0, 105.0, 30.0, 10.0, -0.5), &cfg), None);
    }

    #[test]
    fn uptrend_picks_side_by_vol_rank() {
        let cfg = SignalConfig::default();
        assert_eq!(
            select_strategy(&snapshot(110.0, 100.0, 58.0, 20.0, 0.3), &cfg),
            Some(Strategy::BuyCall)
        );
        assert_eq!(
            select_strategy(&snapshot(110.0, 100.0, 58.0, 60.0, 0.3), &cfg),
            Some(Strategy::SellPut)
        );
    }

    #[test]
    fn downtrend_picks_side_by_vol_rank() {
        let cfg = SignalConfig::default();
        assert_eq!(
            select_strategy(&snapshot(90.0, 100.0, 42.0, 20.0, -0.3), &cfg),
            Some(Strategy::BuyPut)
        );
        assert_eq!(
            select_strategy(&snapshot(90.0, 100.0, 42.0, 55.0, -0.3), &cfg),
            Some(Strategy::SellCall)
        );
    }

    #[test]
    fn trend_without_macd_confirmation_is_no_setup() {
        let cfg = SignalConfig::default();
        assert_eq!(select_strategy(&snapshot(110.0, 100.0, 58.0, 20.0, -0.1), &cfg), None);
    }

    #[test]
    fn short_history_has_no_snapshot() {
        let cfg = SignalConfig::default();
        let closes: Vec<f64> = (0..49).map(|i| 100.0 + f64::from(i)).collect();
        assert!(TechnicalSnapshot::compute(&closes, &cfg).is_none());
    }

    #[test]
    fn snapshot_from_trending_series() {
        let cfg = SignalConfig::default();
        let closes: Vec<f64> = (0..120)
            .map(|i| 100.0 + f64::from(i) * 0.5 + (f64::from(i) * 0.7).sin() * 2.0)
            .collect();
        let t = TechnicalSnapshot::compute(&closes, &cfg).unwrap();
        assert!((0.0..=100.0).contains(&t.vol_rank));
        assert!((0.0..=100.0).contains(&t.rsi));
        assert!(t.realized_vol > 0.0);
        assert!(t.price > t.sma);
    }
}
