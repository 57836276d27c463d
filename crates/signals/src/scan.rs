//! Market scan across every watched symbol.
//!
//! Symbols are deduplicated across owners, analyzed once each in sequence with
//! a fixed delay between them, and the resulting proposals fanned back out to
//! the owners watching them, subject to cooldowns.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use optdesk_core::SentimentOpinion;

use crate::cooldown::CooldownStore;
use crate::engine::{RejectReason, SignalEngine, SignalOutcome, TradeProposal};
use crate::sentiment::SentimentGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSubscriber {
    pub owner_id: i64,
    pub use_sentiment: bool,
}

/// One symbol and everyone watching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub symbol: String,
    pub subscribers: Vec<ScanSubscriber>,
}

/// Groups (owner, symbol, use_sentiment) rows by symbol, ordered by symbol.
#[must_use]
pub fn group_targets<I>(rows: I) -> Vec<ScanTarget>
where
    I: IntoIterator<Item = (i64, String, bool)>,
{
    let mut by_symbol: BTreeMap<String, Vec<ScanSubscriber>> = BTreeMap::new();
    for (owner_id, symbol, use_sentiment) in rows {
        let subs = by_symbol.entry(symbol.to_uppercase()).or_default();
        if !subs.iter().any(|s| s.owner_id == owner_id) {
            subs.push(ScanSubscriber {
                owner_id,
                use_sentiment,
            });
        }
    }
    by_symbol
        .into_iter()
        .map(|(symbol, subscribers)| ScanTarget { symbol, subscribers })
        .collect()
}

/// Automatic scans respect cooldowns; forced scans bypass them but still stamp them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Automatic,
    Forced,
}

/// A proposal routed to one owner.
#[derive(Debug, Clone)]
pub struct ScanAlert {
    pub owner_id: i64,
    pub proposal: Arc<TradeProposal>,
    /// Present when the owner opted into sentiment checks.
    pub sentiment: Option<SentimentOpinion>,
    /// The pair was inside its cooldown window (forced scans only).
    pub was_cooling: bool,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub alerts: Vec<ScanAlert>,
    pub rejected: Vec<(String, RejectReason)>,
    /// Symbols skipped because their data could not be fetched.
    pub failed: Vec<(String, String)>,
    /// Owner alerts dropped by cooldown.
    pub suppressed: usize,
}

pub struct MarketScanner {
    engine: Arc<SignalEngine>,
    cooldowns: Arc<CooldownStore>,
    sentiment: SentimentGate,
    symbol_delay: Duration,
}

impl MarketScanner {
    #[must_use]
    pub fn new(
        engine: Arc<SignalEngine>,
        cooldowns: Arc<CooldownStore>,
        sentiment: SentimentGate,
        symbol_delay: Duration,
    ) -> Self {
        Self {
            engine,
            cooldowns,
            sentiment,
            symbol_delay,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<SignalEngine> {
        &self.engine
    }

    #[must_use]
    pub fn cooldowns(&self) -> &Arc<CooldownStore> {
        &self.cooldowns
    }

    /// Scans `targets` in order, sizing against `reference_capital`.
    ///
    /// A symbol whose data cannot be fetched is recorded in `failed` and the
    /// scan moves on.
    pub async fn run(
        &self,
        targets: &[ScanTarget],
        mode: ScanMode,
        reference_capital: f64,
        now: DateTime<Utc>,
    ) -> ScanReport {
        let today = now.date_naive();
        let mut report = ScanReport::default();
        info!(symbols = targets.len(), ?mode, "Market scan started");

        for (i, target) in targets.iter().enumerate() {
            if i > 0 && !self.symbol_delay.is_zero() {
                tokio::time::sleep(self.symbol_delay).await;
            }
            let symbol = target.symbol.as_str();

            let proposal = match self.engine.analyze(symbol, reference_capital, today).await {
                Ok(SignalOutcome::Proposed(p)) => Arc::new(*p),
                Ok(SignalOutcome::Rejected(reason)) => {
                    report.rejected.push((target.symbol.clone(), reason));
                    continue;
                }
                Err(e) => {
                    warn!(symbol, error = %e, "Skipping symbol, market data unavailable");
                    report.failed.push((target.symbol.clone(), e.to_string()));
                    continue;
                }
            };

            let mut sentiment: Option<SentimentOpinion> = None;
            for sub in &target.subscribers {
                let was_cooling = match mode {
                    ScanMode::Automatic => {
                        if !self.cooldowns.try_acquire(sub.owner_id, symbol, now) {
                            debug!(symbol, owner_id = sub.owner_id, "Alert suppressed by cooldown");
                            report.suppressed += 1;
                            continue;
                        }
                        false
                    }
                    ScanMode::Forced => {
                        let cooling = self.cooldowns.is_cooling(sub.owner_id, symbol, now);
                        self.cooldowns.record(sub.owner_id, symbol, now);
                        cooling
                    }
                };

                let opinion = if sub.use_sentiment {
                    if sentiment.is_none() {
                        sentiment = Some(
                            self.sentiment
                                .assess(symbol, proposal.strategy, &proposal.headline())
                                .await,
                        );
                    }
                    sentiment.clone()
                } else {
                    None
                };

                report.alerts.push(ScanAlert {
                    owner_id: sub.owner_id,
                    proposal: Arc::clone(&proposal),
                    sentiment: opinion,
                    was_cooling,
                });
            }
        }

        info!(
            alerts = report.alerts.len(),
            rejected = report.rejected.len(),
            failed = report.failed.len(),
            suppressed = report.suppressed,
            "Market scan finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use optdesk_core::config::{MarketConfig, SignalConfig, SizingConfig};
    use optdesk_core::OptionsKellySizer;
    use optdesk_market_data::{ChainRow, DailyClose, OptionChain, SnapshotMarketData};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 15, 0, 0).unwrap()
    }

    fn row(strike: f64, bid: f64, ask: f64, iv: f64) -> ChainRow {
        ChainRow {
            strike,
            bid,
            ask,
            last: (bid + ask) / 2.0,
            implied_vol: iv,
            open_interest: 500,
            volume: 50,
        }
    }

    /// Steady selloff then a sharp drop: oversold RSI with elevated realized vol.
    fn oversold_history(today: NaiveDate) -> Vec<DailyClose> {
        let mut closes: Vec<f64> = (0..100)
            .map(|i| 130.0 + (f64::from(i) * 1.3).sin() * 0.6 - f64::from(i) * 0.05)
            .collect();
        let mut last = *closes.last().unwrap();
        for step in [3.0, 2.5, 4.0, 3.5, 2.0, 3.0, 2.5, 1.5, 2.0, 3.0] {
            last -= step;
            closes.push(last);
        }
        let n = closes.len() as i64;
        closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| DailyClose {
                date: today - chrono::Duration::days(n - i as i64),
                close,
            })
            .collect()
    }

    fn market() -> Arc<SnapshotMarketData> {
        let md = Arc::new(SnapshotMarketData::new());
        let today = now().date_naive();
        let history = oversold_history(today);
        let spot = history.last().unwrap().close;
        md.set_history("XYZ", history);
        md.set_last("XYZ", spot);
        let expiry = today + chrono::Duration::days(35);
        let strikes: Vec<f64> = (0..12)
            .map(|i| (spot * 0.80).round() + f64::from(i) * 2.0)
            .collect();
        let puts = strikes.iter().map(|&k| row(k, 4.50, 4.70, 0.40)).collect();
        let calls = strikes.iter().map(|&k| row(k + 10.0, 1.0, 1.1, 0.38)).collect();
        md.set_chain("XYZ", expiry, OptionChain { calls, puts });
        md.mark_unavailable("BAD");
        md
    }

    fn scanner(md: Arc<SnapshotMarketData>) -> MarketScanner {
        let engine = SignalEngine::new(
            md,
            SignalConfig::default(),
            MarketConfig::default(),
            OptionsKellySizer::from(&SizingConfig::default()),
        );
        MarketScanner::new(
            Arc::new(engine),
            Arc::new(CooldownStore::from_secs(4 * 3600)),
            SentimentGate::disabled(),
            Duration::ZERO,
        )
    }

    #[test]
    fn targets_deduplicate_symbols_across_owners() {
        let targets = group_targets(vec![
            (1, "aapl".to_string(), true),
            (2, "AAPL".to_string(), false),
            (1, "MSFT".to_string(), false),
            (1, "AAPL".to_string(), true),
        ]);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].symbol, "AAPL");
        assert_eq!(targets[0].subscribers.len(), 2);
        assert_eq!(targets[1].symbol, "MSFT");
    }

    #[tokio::test]
    async fn failed_symbol_does_not_block_others() {
        let scanner = scanner(market());
        let targets = group_targets(vec![
            (1, "BAD".to_string(), false),
            (1, "XYZ".to_string(), false),
        ]);
        let report = scanner.run(&targets, ScanMode::Automatic, 50_000.0, now()).await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "BAD");
        assert_eq!(report.alerts.len(), 1);
        assert!(report.rejected.is_empty());
    }

    #[tokio::test]
    async fn automatic_scan_respects_cooldown_forced_scan_stamps_it() {
        let scanner = scanner(market());
        let targets = group_targets(vec![
            (1, "XYZ".to_string(), true),
            (2, "XYZ".to_string(), false),
        ]);

        let first = scanner.run(&targets, ScanMode::Automatic, 50_000.0, now()).await;
        assert_eq!(first.alerts.len(), 2);
        assert_eq!(first.alerts[0].proposal.strategy, optdesk_core::Strategy::SellPut);
        assert!(first.alerts[0].sentiment.as_ref().is_some_and(|s| s.fallback));
        assert!(first.alerts[1].sentiment.is_none());

        let later = now() + chrono::Duration::hours(1);
        let second = scanner.run(&targets, ScanMode::Automatic, 50_000.0, later).await;
        assert!(second.alerts.is_empty());
        assert_eq!(second.suppressed, 2);

        let forced = scanner.run(&targets, ScanMode::Forced, 50_000.0, later).await;
        assert_eq!(forced.alerts.len(), 2);
        assert!(forced.alerts.iter().all(|a| a.was_cooling));
        assert_eq!(scanner.cooldowns().last_alert(1, "XYZ"), Some(later));
    }
}
