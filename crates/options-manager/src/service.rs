//! Desk service: the scheduled passes and the loop that drives them.
//!
//! Every pass takes its clock as an argument so the CLI, the service loop and
//! tests run the same code. A pass works on one batch:
//! 1. Scan: watchlists → signal engine → per-owner optimizer → alerts (and paper entries)
//! 2. Lifecycle: re-price OPEN paper positions, close or roll, notify owners
//! 3. Daily: earnings alerts and portfolio risk reports

#![allow(clippy::format_push_string)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use optdesk_core::config::AppConfig;
use optdesk_core::{NotificationTransport, OptionsKellySizer, SentimentDecision, SentimentService};
use optdesk_data::{Database, PaperStatus};
use optdesk_market_data::MarketDataProvider;
use optdesk_signals::{
    group_targets, CooldownStore, MarketScanner, ScanAlert, ScanMode, SentimentGate, SignalEngine,
};

use crate::aggregator::RiskAggregator;
use crate::correlation::fetch_correlated_pairs;
use crate::exits::ExitRules;
use crate::hedging::{assess_regime, autonomous_hedge};
use crate::lifecycle::{LifecycleReport, PaperLifecycleManager};
use crate::notify::{DeliverySummary, Notifier, Outbound};
use crate::optimizer::{optimize, simulate_exposure, ExposureProjection, OptimizerDecision};
use crate::report::{PortfolioReport, ReportOptions};
use crate::stats::PerformanceStats;
use crate::types::LivePosition;

/// Long-lived collaborators that outlive configuration reloads.
#[derive(Clone)]
pub struct ServiceParts {
    pub db: Database,
    pub provider: Arc<dyn MarketDataProvider>,
    pub sentiment: Option<Arc<dyn SentimentService>>,
    pub transport: Arc<dyn NotificationTransport>,
    pub cooldowns: Arc<CooldownStore>,
}

impl ServiceParts {
    #[must_use]
    pub fn new(
        db: Database,
        provider: Arc<dyn MarketDataProvider>,
        transport: Arc<dyn NotificationTransport>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            provider,
            sentiment: None,
            transport,
            cooldowns: Arc::new(CooldownStore::from_secs(config.scan.cooldown_secs)),
        }
    }

    #[must_use]
    pub fn with_sentiment(mut self, service: Arc<dyn SentimentService>) -> Self {
        self.sentiment = Some(service);
        self
    }
}

/// Outcome of one scan pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanPassSummary {
    pub alerts: usize,
    pub rejected: usize,
    pub failed: usize,
    pub suppressed: usize,
    /// Paper positions opened from alerts.
    pub entries: usize,
    pub delivery: DeliverySummary,
}

/// The desk wired for one configuration.
pub struct DeskService {
    db: Database,
    provider: Arc<dyn MarketDataProvider>,
    scanner: MarketScanner,
    aggregator: RiskAggregator,
    lifecycle: PaperLifecycleManager,
    notifier: Notifier,
    config: AppConfig,
}

impl DeskService {
    #[must_use]
    pub fn new(parts: &ServiceParts, config: AppConfig) -> Self {
        let engine = SignalEngine::new(
            Arc::clone(&parts.provider),
            config.signal.clone(),
            config.market.clone(),
            OptionsKellySizer::from(&config.sizing),
        );
        let sentiment = match &parts.sentiment {
            Some(service) => SentimentGate::new(
                Arc::clone(service),
                Duration::from_millis(config.scan.sentiment_timeout_ms),
            ),
            None => SentimentGate::disabled(),
        };
        let scanner = MarketScanner::new(
            Arc::new(engine),
            Arc::clone(&parts.cooldowns),
            sentiment,
            Duration::from_millis(config.scan.symbol_delay_ms),
        );
        let aggregator = RiskAggregator::new(
            Arc::clone(&parts.provider),
            config.market.clone(),
            ExitRules::from(&config.lifecycle),
        );
        let lifecycle = PaperLifecycleManager::new(
            parts.db.paper_positions(),
            Arc::clone(&parts.provider),
            config.market.clone(),
            config.lifecycle.clone(),
        );
        Self {
            db: parts.db.clone(),
            provider: Arc::clone(&parts.provider),
            scanner,
            aggregator,
            lifecycle,
            notifier: Notifier::new(Arc::clone(&parts.transport)),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn lifecycle(&self) -> &PaperLifecycleManager {
        &self.lifecycle
    }

    #[must_use]
    pub fn aggregator(&self) -> &RiskAggregator {
        &self.aggregator
    }

    /// Owner capital, or the configured default when none is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be read.
    pub async fn capital(&self, owner_id: i64) -> Result<f64> {
        let capital = self
            .db
            .settings()
            .capital_or(owner_id, self.config.scan.default_capital)
            .await
            .with_context(|| format!("loading capital for owner {owner_id}"))?;
        Ok(capital.to_f64().unwrap_or_default())
    }

    /// Recorded positions plus OPEN paper positions.
    ///
    /// # Errors
    ///
    /// Returns an error if either store cannot be read.
    pub async fn book(&self, owner_id: i64) -> Result<Vec<LivePosition>> {
        let stored = self
            .db
            .positions()
            .list_by_owner(owner_id)
            .await
            .with_context(|| format!("loading positions for owner {owner_id}"))?;
        let paper = self
            .db
            .paper_positions()
            .query_by_owner(owner_id, Some(PaperStatus::Open))
            .await
            .with_context(|| format!("loading paper positions for owner {owner_id}"))?;
        Ok(stored
            .iter()
            .map(LivePosition::from)
            .chain(paper.iter().map(LivePosition::from))
            .collect())
    }

    /// Scans every watched symbol and delivers the resulting alerts.
    ///
    /// Each owner's book is aggregated once, before any of their alerts are
    /// sized, and every candidate is checked against that one snapshot.
    /// Automatic scans also open paper positions unless sentiment vetoed.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store fails.
    pub async fn scan_pass(&self, mode: ScanMode, now: DateTime<Utc>) -> Result<ScanPassSummary> {
        let today = now.date_naive();
        let watchlist = self.db.watchlist().list_all().await.context("loading watchlists")?;
        let targets = group_targets(
            watchlist
                .into_iter()
                .map(|e| (e.owner_id, e.symbol, e.use_sentiment)),
        );
        let reference_capital = self.config.scan.default_capital.to_f64().unwrap_or_default();
        self.load_cooldowns(now).await?;
        let report = self.scanner.run(&targets, mode, reference_capital, now).await;
        self.persist_cooldowns(&report.alerts).await?;

        let mut by_owner: BTreeMap<i64, Vec<&ScanAlert>> = BTreeMap::new();
        for alert in &report.alerts {
            by_owner.entry(alert.owner_id).or_default().push(alert);
        }

        let mut summary = ScanPassSummary {
            alerts: report.alerts.len(),
            rejected: report.rejected.len(),
            failed: report.failed.len(),
            suppressed: report.suppressed,
            ..ScanPassSummary::default()
        };
        let mut messages = Vec::with_capacity(report.alerts.len());

        for (owner_id, alerts) in by_owner {
            let capital = self.capital(owner_id).await?;
            let book = self.book(owner_id).await?;
            let snapshot = self.aggregator.snapshot(&book, today).await;
            let index_price = snapshot.reference_index_price;

            for alert in alerts {
                let proposal = &alert.proposal;
                let contracts = proposal
                    .sizing
                    .contracts_for(capital, self.config.sizing.contract_allocation_cap);
                let unit = self
                    .aggregator
                    .unit_index_delta(
                        proposal.symbol(),
                        proposal.spot,
                        proposal.candidate.model_delta,
                        index_price,
                    )
                    .await;
                let decision = optimize(
                    snapshot.weighted_delta,
                    unit,
                    proposal.strategy,
                    capital,
                    index_price,
                    self.config.risk.optimizer_limit_pct,
                );
                let quantity = contracts.min(decision.safe_quantity);
                let projection = simulate_exposure(
                    snapshot.weighted_delta,
                    unit,
                    proposal.strategy,
                    quantity,
                    capital,
                    index_price,
                );

                let vetoed = alert
                    .sentiment
                    .as_ref()
                    .is_some_and(|s| s.decision == SentimentDecision::Veto);
                let mut paper_id = None;
                let auto_entry = mode == ScanMode::Automatic && self.config.scan.auto_paper_entry;
                if auto_entry && !vetoed && quantity > 0 {
                    paper_id = self
                        .lifecycle
                        .open_from_proposal(owner_id, proposal, quantity, now)
                        .await?;
                    if paper_id.is_some() {
                        summary.entries += 1;
                    }
                } else if vetoed {
                    debug!(owner_id, symbol = proposal.symbol(), "Paper entry vetoed by sentiment");
                }

                messages.push(Outbound {
                    owner_id,
                    text: alert_message(alert, contracts, &decision, &projection, paper_id),
                    report: json!({
                        "kind": "scan_alert",
                        "proposal": &*alert.proposal,
                        "sentiment": alert.sentiment,
                        "was_cooling": alert.was_cooling,
                        "suggested_contracts": contracts,
                        "optimizer": decision,
                        "projection": projection,
                        "paper_position_id": paper_id,
                    }),
                });
            }
        }

        summary.delivery = self.notifier.send_all(&messages).await;
        info!(
            ?mode,
            alerts = summary.alerts,
            entries = summary.entries,
            delivered = summary.delivery.delivered,
            failed_deliveries = summary.delivery.failed,
            "Scan pass complete"
        );
        Ok(summary)
    }

    /// Runs the paper lifecycle once and tells owners what changed.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store fails.
    pub async fn lifecycle_pass(&self, now: DateTime<Utc>) -> Result<LifecycleReport> {
        let report = self.lifecycle.process_open(now).await?;
        let messages: Vec<Outbound> = report
            .events
            .iter()
            .map(|event| Outbound {
                owner_id: event.owner_id,
                text: event.message(),
                report: json!({ "kind": "paper_lifecycle", "event": event }),
            })
            .collect();
        let delivery = self.notifier.send_all(&messages).await;
        info!(
            transitions = report.events.len(),
            held = report.held,
            skipped = report.skipped.len(),
            delivered = delivery.delivered,
            "Lifecycle pass complete"
        );
        Ok(report)
    }

    /// Full risk picture for one owner.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store fails.
    pub async fn portfolio_report(
        &self,
        owner_id: i64,
        today: NaiveDate,
    ) -> Result<PortfolioReport> {
        let capital = self.capital(owner_id).await?;
        let book = self.book(owner_id).await?;
        let snapshot = self.aggregator.snapshot(&book, today).await;
        let risk = &self.config.risk;

        let correlated = fetch_correlated_pairs(
            self.provider.as_ref(),
            &snapshot.symbols(),
            risk.correlation_lookback_days,
            risk.correlation_window,
            risk.correlation_threshold,
        )
        .await;
        let regime = assess_regime(
            self.provider.as_ref(),
            &self.config.market,
            risk,
            snapshot.reference_index_price,
            capital,
        )
        .await;
        let hedge =
            autonomous_hedge(snapshot.weighted_delta, regime.target_delta, risk.hedge_min_gap);
        let performance = self.stats(owner_id).await?;

        Ok(PortfolioReport::new(owner_id, capital, snapshot, risk)
            .with_correlation(correlated)
            .with_hedge(regime, hedge)
            .with_performance(performance))
    }

    /// Delivers a full report to every owner holding a position.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store fails.
    pub async fn report_pass(&self, today: NaiveDate) -> Result<DeliverySummary> {
        let mut owners: BTreeSet<i64> = self
            .db
            .positions()
            .owners()
            .await
            .context("loading position owners")?
            .into_iter()
            .collect();
        let open = self
            .db
            .paper_positions()
            .list_open()
            .await
            .context("loading open paper positions")?;
        owners.extend(open.iter().map(|p| p.owner_id));

        let options = ReportOptions::full();
        let mut messages = Vec::with_capacity(owners.len());
        for owner_id in owners {
            let report = self.portfolio_report(owner_id, today).await?;
            messages.push(Outbound {
                owner_id,
                text: report.render(&options),
                report: report.to_value(&options),
            });
        }
        let delivery = self.notifier.send_all(&messages).await;
        info!(
            reports = messages.len(),
            delivered = delivery.delivered,
            "Report pass complete"
        );
        Ok(delivery)
    }

    /// Warns each owner about watched or held symbols reporting earnings soon.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store fails.
    pub async fn earnings_pass(&self, today: NaiveDate) -> Result<DeliverySummary> {
        let mut symbols_by_owner: BTreeMap<i64, BTreeSet<String>> = BTreeMap::new();
        for entry in self.db.watchlist().list_all().await.context("loading watchlists")? {
            symbols_by_owner
                .entry(entry.owner_id)
                .or_default()
                .insert(entry.symbol.to_uppercase());
        }
        for position in self.db.positions().list_all().await.context("loading positions")? {
            symbols_by_owner
                .entry(position.owner_id)
                .or_default()
                .insert(position.symbol.to_uppercase());
        }

        let horizon = self.config.scan.earnings_alert_days;
        let mut dates: HashMap<String, Option<NaiveDate>> = HashMap::new();
        let mut messages = Vec::new();
        for (owner_id, symbols) in symbols_by_owner {
            let mut upcoming = Vec::new();
            for symbol in symbols {
                if !dates.contains_key(&symbol) {
                    let date = match self.provider.earnings_date(&symbol).await {
                        Ok(date) => date,
                        Err(e) => {
                            warn!(symbol = %symbol, error = %e, "Earnings date unavailable");
                            None
                        }
                    };
                    dates.insert(symbol.clone(), date);
                }
                if let Some(Some(date)) = dates.get(&symbol) {
                    let days = (*date - today).num_days();
                    if (0..=horizon).contains(&days) {
                        upcoming.push((symbol, *date, days));
                    }
                }
            }
            if upcoming.is_empty() {
                continue;
            }
            let mut text = format!("Earnings within {horizon} days:\n");
            for (symbol, date, days) in &upcoming {
                text.push_str(&format!("  {symbol}  {date}  ({days}d)\n"));
            }
            let report = json!({
                "kind": "earnings",
                "upcoming": upcoming
                    .iter()
                    .map(|(symbol, date, days)| {
                        json!({ "symbol": symbol, "date": date, "days": days })
                    })
                    .collect::<Vec<_>>(),
            });
            messages.push(Outbound { owner_id, text, report });
        }

        let delivery = self.notifier.send_all(&messages).await;
        info!(alerts = messages.len(), delivered = delivery.delivered, "Earnings pass complete");
        Ok(delivery)
    }

    /// Realized paper-trading performance for one owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the paper positions cannot be read.
    pub async fn stats(&self, owner_id: i64) -> Result<PerformanceStats> {
        let positions = self
            .db
            .paper_positions()
            .query_by_owner(owner_id, None)
            .await
            .with_context(|| format!("loading paper history for owner {owner_id}"))?;
        Ok(PerformanceStats::from_positions(&positions))
    }

    /// Seeds the in-memory cooldowns with stamps other runs left in the store.
    async fn load_cooldowns(&self, now: DateTime<Utc>) -> Result<()> {
        let cooldowns = self.scanner.cooldowns();
        let stamps = self
            .db
            .cooldowns()
            .since(now - cooldowns.window())
            .await
            .context("loading signal cooldowns")?;
        for (owner_id, symbol, at) in stamps {
            cooldowns.seed(owner_id, &symbol, at);
        }
        Ok(())
    }

    async fn persist_cooldowns(&self, alerts: &[ScanAlert]) -> Result<()> {
        let repo = self.db.cooldowns();
        for alert in alerts {
            let symbol = alert.proposal.symbol();
            if let Some(at) = self.scanner.cooldowns().last_alert(alert.owner_id, symbol) {
                repo.stamp(alert.owner_id, symbol, at)
                    .await
                    .with_context(|| format!("saving cooldown for {symbol}"))?;
            }
        }
        Ok(())
    }

    async fn tick(&self, now: DateTime<Utc>, last_daily: &mut Option<NaiveDate>) -> Result<()> {
        self.lifecycle_pass(now).await?;
        self.scan_pass(ScanMode::Automatic, now).await?;

        let today = now.date_naive();
        if *last_daily != Some(today) {
            self.earnings_pass(today).await?;
            self.report_pass(today).await?;
            *last_daily = Some(today);
        }
        Ok(())
    }
}

/// Runs the desk until a pass fails on the store.
///
/// Lifecycle and scan passes run every poll interval; earnings alerts and
/// reports run once per calendar day. A new configuration from `config_rx`
/// rebuilds the service in place; cooldowns carry over.
///
/// # Errors
///
/// Returns the first store failure.
pub async fn run(parts: ServiceParts, mut config_rx: watch::Receiver<AppConfig>) -> Result<()> {
    let mut service = DeskService::new(&parts, config_rx.borrow_and_update().clone());
    let mut interval = poll_interval(service.config());
    let mut last_daily: Option<NaiveDate> = None;
    let mut watching = true;

    info!(
        poll_secs = service.config().scan.poll_interval_secs,
        cooldown_secs = service.config().scan.cooldown_secs,
        auto_paper_entry = service.config().scan.auto_paper_entry,
        "Desk service started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = service.tick(Utc::now(), &mut last_daily).await {
                    error!(error = %e, "Desk pass failed on the store, stopping");
                    return Err(e);
                }
            }
            changed = config_rx.changed(), if watching => {
                if changed.is_err() {
                    warn!("Config watcher gone, keeping current configuration");
                    watching = false;
                    continue;
                }
                let config = config_rx.borrow_and_update().clone();
                let poll_changed =
                    config.scan.poll_interval_secs != service.config().scan.poll_interval_secs;
                service = DeskService::new(&parts, config);
                if poll_changed {
                    interval = poll_interval(service.config());
                }
                info!(
                    poll_secs = service.config().scan.poll_interval_secs,
                    "Desk service reconfigured"
                );
            }
        }
    }
}

fn poll_interval(config: &AppConfig) -> tokio::time::Interval {
    let period = Duration::from_secs(config.scan.poll_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

fn alert_message(
    alert: &ScanAlert,
    contracts: u32,
    decision: &OptimizerDecision,
    projection: &ExposureProjection,
    paper_id: Option<i64>,
) -> String {
    let p = &alert.proposal;
    let mut text = p.headline();
    text.push('\n');
    text.push_str(&format!(
        "Spot {:.2}  1σ {:.2}-{:.2}",
        p.spot, p.expected_move.lower, p.expected_move.upper
    ));
    if let Some(breakeven) = p.breakeven {
        text.push_str(&format!("  breakeven {breakeven:.2}"));
    }
    text.push('\n');
    text.push_str(&format!(
        "Term {} ({:.2})",
        p.term_structure.state.as_str(),
        p.term_structure.ratio
    ));
    if let Some(skew) = &p.skew {
        text.push_str(&format!("  skew {} ({:.2})", skew.state.as_str(), skew.ratio));
    }
    text.push('\n');
    if let Some(earnings) = &p.earnings {
        text.push_str(&format!(
            "Earnings {} in {}d, safe range {:.2}-{:.2}\n",
            earnings.earnings_date, earnings.days_until, earnings.safe_lower, earnings.safe_upper
        ));
    }
    if let Some(strike) = p.hedge_strike {
        text.push_str(&format!("Protective strike {strike:.2}\n"));
    }
    text.push_str(&format!(
        "Kelly {contracts} contracts, {} within exposure limit",
        decision.safe_quantity
    ));
    if decision.safe_quantity == 0 && decision.hedge_shares != 0.0 {
        text.push_str(&format!(", hedge {:+.1} index shares", decision.hedge_shares));
    }
    text.push('\n');
    text.push_str(&format!(
        "Projected index delta {:+.1} ({:+.1}%)\n",
        projection.projected_delta, projection.projected_exposure_pct
    ));
    if let Some(opinion) = &alert.sentiment {
        let marker = if opinion.fallback { " (service unavailable)" } else { "" };
        text.push_str(&format!(
            "Sentiment {}{}: {}\n",
            opinion.decision.as_str(),
            marker,
            opinion.reasoning
        ));
    }
    if let Some(id) = paper_id {
        text.push_str(&format!("Paper entry #{id}\n"));
    }
    if alert.was_cooling {
        text.push_str("Repeat within cooldown window\n");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use optdesk_core::{DeliveryError, OptionType};
    use optdesk_data::NewPosition;
    use optdesk_market_data::{ChainRow, DailyClose, OptionChain, SnapshotMarketData};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use serde_json::Value;

    #[derive(Default)]
    struct Inbox {
        messages: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl NotificationTransport for Inbox {
        async fn deliver(
            &self,
            owner_id: i64,
            text: &str,
            _report: &Value,
        ) -> Result<(), DeliveryError> {
            self.messages.lock().push((owner_id, text.to_string()));
            Ok(())
        }
    }

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

    /// Oversold tape with rich put premium, so a short put sizes to real contracts.
    fn market() -> Arc<SnapshotMarketData> {
        let md = Arc::new(SnapshotMarketData::new());
        let today = now().date_naive();
        let mut closes: Vec<f64> = (0..100)
            .map(|i| 130.0 + (f64::from(i) * 1.3).sin() * 0.6 - f64::from(i) * 0.05)
            .collect();
        let mut last = *closes.last().unwrap();
        for step in [3.0, 2.5, 4.0, 3.5, 2.0, 3.0, 2.5, 1.5, 2.0, 3.0] {
            last -= step;
            closes.push(last);
        }
        let n = closes.len() as i64;
        let history: Vec<DailyClose> = closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| DailyClose {
                date: today - chrono::Duration::days(n - i as i64),
                close,
            })
            .collect();
        let spot = history.last().unwrap().close;
        md.set_history("XYZ", history);
        md.set_last("XYZ", spot);
        let expiry = today + chrono::Duration::days(35);
        let strikes: Vec<f64> = (0..12)
            .map(|i| (spot * 0.80).round() + f64::from(i) * 2.0)
            .collect();
        let puts = strikes.iter().map(|&k| row(k, 29.90, 30.10, 0.40)).collect();
        let calls = strikes.iter().map(|&k| row(k + 10.0, 1.0, 1.1, 0.38)).collect();
        md.set_chain("XYZ", expiry, OptionChain { calls, puts });
        md
    }

    async fn desk(md: Arc<SnapshotMarketData>) -> (DeskService, Arc<Inbox>) {
        let db = Database::new_in_memory().await.unwrap();
        let inbox = Arc::new(Inbox::default());
        let mut config = AppConfig::default();
        config.scan.symbol_delay_ms = 0;
        let parts = ServiceParts::new(db, md, inbox.clone(), &config);
        (DeskService::new(&parts, config), inbox)
    }

    #[tokio::test]
    async fn automatic_scan_alerts_and_opens_paper_position() {
        let (service, inbox) = desk(market()).await;
        service.db.watchlist().upsert(1, "XYZ", dec!(0), false).await.unwrap();
        service.db.settings().set_capital(1, dec!(1000000)).await.unwrap();

        let summary = service.scan_pass(ScanMode::Automatic, now()).await.unwrap();
        assert_eq!(summary.alerts, 1);
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.delivery.delivered, 1);

        let open = service
            .db
            .paper_positions()
            .query_by_owner(1, Some(PaperStatus::Open))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert!(open[0].quantity < 0);
        assert_eq!(open[0].option_type, OptionType::Put);
        assert!(open[0].tags.contains(&"auto_scan".to_string()));

        let sent = inbox.messages.lock().clone();
        assert_eq!(sent[0].0, 1);
        assert!(sent[0].1.contains(&format!("Paper entry #{}", open[0].id)));

        // Same hour: cooldown holds back both the alert and a second entry.
        let again = service
            .scan_pass(ScanMode::Automatic, now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(again.alerts, 0);
        assert_eq!(again.suppressed, 1);
        assert_eq!(again.entries, 0);
    }

    #[tokio::test]
    async fn cooldown_holds_across_separate_runs_on_one_store() {
        let db = Database::new_in_memory().await.unwrap();
        db.watchlist().upsert(1, "XYZ", dec!(0), false).await.unwrap();
        db.settings().set_capital(1, dec!(1000000)).await.unwrap();
        let mut config = AppConfig::default();
        config.scan.symbol_delay_ms = 0;
        let md = market();

        let mut passes = Vec::new();
        for offset in [0, 10] {
            // Fresh collaborators each run, as a one-shot command would build them.
            let inbox = Arc::new(Inbox::default());
            let parts = ServiceParts::new(db.clone(), md.clone(), inbox, &config);
            let service = DeskService::new(&parts, config.clone());
            let at = now() + chrono::Duration::minutes(offset);
            passes.push(service.scan_pass(ScanMode::Automatic, at).await.unwrap());
        }

        assert_eq!(passes[0].alerts, 1);
        assert_eq!(passes[0].entries, 1);
        assert_eq!(passes[1].alerts, 0);
        assert_eq!(passes[1].suppressed, 1);
        assert_eq!(passes[1].entries, 0);
        let open = db
            .paper_positions()
            .query_by_owner(1, Some(PaperStatus::Open))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn forced_scan_never_opens_positions() {
        let (service, inbox) = desk(market()).await;
        service.db.watchlist().upsert(1, "XYZ", dec!(0), false).await.unwrap();
        service.db.settings().set_capital(1, dec!(1000000)).await.unwrap();

        let summary = service.scan_pass(ScanMode::Forced, now()).await.unwrap();
        assert_eq!(summary.alerts, 1);
        assert_eq!(summary.entries, 0);
        assert!(service.book(1).await.unwrap().is_empty());
        assert_eq!(inbox.messages.lock().len(), 1);
    }

    #[tokio::test]
    async fn earnings_pass_covers_watchlist_and_positions() {
        let md = Arc::new(SnapshotMarketData::new());
        let today = now().date_naive();
        md.set_earnings("XYZ", Some(today + chrono::Duration::days(3)));
        md.set_earnings("ABC", Some(today + chrono::Duration::days(30)));
        md.set_earnings("QQQ", Some(today + chrono::Duration::days(5)));
        let (service, inbox) = desk(md).await;
        service.db.watchlist().upsert(1, "XYZ", dec!(0), false).await.unwrap();
        service.db.watchlist().upsert(1, "ABC", dec!(0), false).await.unwrap();
        service
            .db
            .positions()
            .insert(&NewPosition {
                owner_id: 2,
                symbol: "QQQ".into(),
                option_type: OptionType::Call,
                strike: dec!(400),
                expiry: today + chrono::Duration::days(40),
                entry_price: dec!(5.00),
                quantity: 1,
                stock_cost_basis: dec!(0),
            })
            .await
            .unwrap();

        let delivery = service.earnings_pass(today).await.unwrap();
        assert_eq!(delivery.delivered, 2);
        let sent = inbox.messages.lock().clone();
        let first = sent.iter().find(|(owner, _)| *owner == 1).unwrap();
        assert!(first.1.contains("XYZ"));
        assert!(!first.1.contains("ABC"));
        assert!(sent.iter().any(|(owner, text)| *owner == 2 && text.contains("QQQ")));
    }

    #[tokio::test]
    async fn report_pass_reaches_every_position_owner() {
        let md = Arc::new(SnapshotMarketData::new());
        let today = now().date_naive();
        md.set_last("XYZ", 100.0);
        md.set_chain(
            "XYZ",
            today + chrono::Duration::days(35),
            OptionChain {
                calls: vec![row(110.0, 1.10, 1.30, 0.30)],
                puts: vec![],
            },
        );
        let (service, inbox) = desk(md).await;
        service
            .db
            .positions()
            .insert(&NewPosition {
                owner_id: 4,
                symbol: "XYZ".into(),
                option_type: OptionType::Call,
                strike: dec!(110),
                expiry: today + chrono::Duration::days(35),
                entry_price: dec!(1.20),
                quantity: -1,
                stock_cost_basis: dec!(95),
            })
            .await
            .unwrap();

        let delivery = service.report_pass(today).await.unwrap();
        assert_eq!(delivery.delivered, 1);
        let sent = inbox.messages.lock().clone();
        assert_eq!(sent[0].0, 4);
        assert!(sent[0].1.contains("Portfolio risk for owner 4"));
        assert!(sent[0].1.contains("(covered)"));

        let report = service.portfolio_report(4, today).await.unwrap();
        assert_eq!(report.snapshot.positions.len(), 1);
        assert_eq!(report.performance.map(|p| p.total_trades), Some(0));
    }
}
