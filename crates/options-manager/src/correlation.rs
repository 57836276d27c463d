//! Concentration checks: pairwise return correlation and beta.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use optdesk_core::indicators;
use optdesk_market_data::{DailyClose, MarketDataProvider};

/// Closes of `a` and `b` on the dates both series share, oldest first.
#[must_use]
pub fn aligned_closes(a: &[DailyClose], b: &[DailyClose]) -> (Vec<f64>, Vec<f64>) {
    let by_date: HashMap<NaiveDate, f64> = b.iter().map(|bar| (bar.date, bar.close)).collect();
    a.iter()
        .filter_map(|bar| by_date.get(&bar.date).map(|other| (bar.close, *other)))
        .unzip()
}

/// Beta of `asset` against `index` from aligned daily returns, rounded to 2 decimals.
///
/// Fewer than `min_samples` aligned closes, or a flat index, yields 1.0.
#[must_use]
pub fn estimate_beta(asset: &[DailyClose], index: &[DailyClose], min_samples: usize) -> f64 {
    let (a, i) = aligned_closes(asset, index);
    if a.len() < min_samples {
        return 1.0;
    }
    let ra = indicators::simple_returns(&a);
    let ri = indicators::simple_returns(&i);
    indicators::beta(&ra, &ri).map_or(1.0, |b| (b * 100.0).round() / 100.0)
}

/// Two symbols whose returns moved together above the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub first: String,
    pub second: String,
    pub rho: f64,
}

/// Pairs with Pearson correlation of daily returns above `threshold` over the
/// trailing `window` returns they share.
#[must_use]
pub fn correlated_pairs(
    series: &BTreeMap<String, Vec<DailyClose>>,
    window: usize,
    threshold: f64,
) -> Vec<CorrelatedPair> {
    let symbols: Vec<&String> = series.keys().collect();
    let mut pairs = Vec::new();
    for (i, first) in symbols.iter().enumerate() {
        for second in &symbols[i + 1..] {
            let (a, b) = aligned_closes(&series[*first], &series[*second]);
            let ra = indicators::simple_returns(&a);
            let rb = indicators::simple_returns(&b);
            let start = ra.len().saturating_sub(window);
            if let Some(rho) = indicators::pearson_correlation(&ra[start..], &rb[start..]) {
                if rho > threshold {
                    pairs.push(CorrelatedPair {
                        first: (*first).clone(),
                        second: (*second).clone(),
                        rho,
                    });
                }
            }
        }
    }
    pairs
}

/// Fetches history for each symbol and reports highly correlated pairs.
///
/// Symbols whose history cannot be fetched are left out of the matrix.
pub async fn fetch_correlated_pairs(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    lookback_days: u32,
    window: usize,
    threshold: f64,
) -> Vec<CorrelatedPair> {
    if symbols.len() < 2 {
        return Vec::new();
    }
    let mut series = BTreeMap::new();
    for symbol in symbols {
        match provider.historical_series(symbol, lookback_days).await {
            Ok(history) if !history.is_empty() => {
                series.insert(symbol.to_uppercase(), history);
            }
            Ok(_) => warn!(symbol = %symbol, "Empty history, excluded from correlation"),
            Err(e) => warn!(
                symbol = %symbol,
                error = %e,
                "History unavailable, excluded from correlation"
            ),
        }
    }
    correlated_pairs(&series, window, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<DailyClose> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| DailyClose {
                date: start + chrono::Duration::days(i as i64),
                close: *c,
            })
            .collect()
    }

    fn wave(n: usize, scale: f64, phase: f64) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + scale * ((i as f64) * 0.9 + phase).sin() + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn levered_copy_has_double_beta() {
        let index = wave(90, 2.0, 0.0);
        let asset: Vec<f64> = index
            .windows(2)
            .fold(vec![50.0], |mut acc, w| {
                let r = w[1] / w[0] - 1.0;
                let last = acc[acc.len() - 1];
                acc.push(last * (1.0 + 2.0 * r));
                acc
            });
        let beta = estimate_beta(&bars(&asset), &bars(&index), 60);
        assert!((beta - 2.0).abs() < 1e-9);
    }

    #[test]
    fn short_overlap_defaults_beta_to_one() {
        let index = wave(40, 2.0, 0.0);
        let asset = wave(40, 5.0, 0.3);
        assert_eq!(estimate_beta(&bars(&asset), &bars(&index), 60), 1.0);
    }

    #[test]
    fn reports_only_pairs_above_threshold() {
        let base = wave(80, 2.0, 0.0);
        let twin: Vec<f64> = base.iter().map(|c| c * 1.5).collect();
        let other = wave(80, 2.0, 2.0);
        let mut series = BTreeMap::new();
        series.insert("AMD".to_string(), bars(&base));
        series.insert("NVDA".to_string(), bars(&twin));
        series.insert("XOM".to_string(), bars(&other));

        let pairs = correlated_pairs(&series, 60, 0.75);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].first, "AMD");
        assert_eq!(pairs[0].second, "NVDA");
        assert!((pairs[0].rho - 1.0).abs() < 1e-9);
    }

    #[test]
    fn aligns_on_shared_dates() {
        let a = bars(&[1.0, 2.0, 3.0, 4.0]);
        let b: Vec<DailyClose> = bars(&[10.0, 20.0, 30.0, 40.0]).into_iter().skip(1).collect();
        let (x, y) = aligned_closes(&a, &b);
        assert_eq!(x, vec![2.0, 3.0, 4.0]);
        assert_eq!(y, vec![20.0, 30.0, 40.0]);
    }
}
