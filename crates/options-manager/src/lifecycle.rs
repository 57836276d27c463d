//! Paper position lifecycle: entry, re-pricing, exits and rolls.
//!
//! Every open position is re-priced against its chain mid once per pass.
//! Triggers read the raw mid; the recorded exit price carries slippage against
//! the holder. Realized PnL is written exactly once, when the position leaves
//! OPEN:
//!
//! ```text
//! realized = (exit - entry) * quantity * 100
//! ```
//!
//! Rolls settle the old position as ROLLED and open its replacement in one
//! transaction, linked through `parent_position_id`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use optdesk_core::config::{LifecycleConfig, MarketConfig};
use optdesk_core::greeks::{self, GreeksInput};
use optdesk_core::{ContractCandidate, OptionType, Strategy};
use optdesk_data::{
    NewPaperPosition, PaperPositionRecord, PaperPositionRepository, PaperStatus, Settlement,
};
use optdesk_market_data::{
    dividend_yield_or_default, simulate_entry, simulate_exit, spot_price, MarketDataError,
    MarketDataProvider, OptionChain,
};
use optdesk_signals::search::find_contract;
use optdesk_signals::{ChainContext, TradeProposal};

use crate::exits::{pnl_fraction, ExitRules};
use crate::types::ExitReason;

/// Tag prefix linking a replacement to the position it rolled from.
pub const ROLLED_FROM_TAG: &str = "rolled_from";

/// A position leaving OPEN during a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub owner_id: i64,
    pub position_id: i64,
    pub label: String,
    pub reason: ExitReason,
    pub exit_price: Decimal,
    pub realized_pnl: Decimal,
    /// Set when the position was rolled.
    pub replacement_id: Option<i64>,
    pub replacement_label: Option<String>,
}

impl LifecycleEvent {
    /// Notification text for the owner.
    #[must_use]
    pub fn message(&self) -> String {
        match (&self.replacement_label, self.replacement_id) {
            (Some(label), Some(id)) => format!(
                "Paper #{} {} rolled ({}) at {:.2}, realized {:+.2}; now #{} {}",
                self.position_id,
                self.label,
                self.reason,
                self.exit_price,
                self.realized_pnl,
                id,
                label
            ),
            _ => format!(
                "Paper #{} {} closed ({}) at {:.2}, realized {:+.2}",
                self.position_id, self.label, self.reason, self.exit_price, self.realized_pnl
            ),
        }
    }
}

/// Result of one pass over the open set.
#[derive(Debug, Default)]
pub struct LifecycleReport {
    pub events: Vec<LifecycleEvent>,
    pub held: usize,
    /// Positions not evaluated this pass, with the reason.
    pub skipped: Vec<(i64, String)>,
}

struct Quote {
    spot: f64,
    dividend_yield: f64,
}

/// Single writer for paper positions.
pub struct PaperLifecycleManager {
    store: PaperPositionRepository,
    provider: Arc<dyn MarketDataProvider>,
    market: MarketConfig,
    config: LifecycleConfig,
    rules: ExitRules,
}

impl PaperLifecycleManager {
    #[must_use]
    pub fn new(
        store: PaperPositionRepository,
        provider: Arc<dyn MarketDataProvider>,
        market: MarketConfig,
        config: LifecycleConfig,
    ) -> Self {
        let rules = ExitRules::from(&config);
        Self {
            store,
            provider,
            market,
            config,
            rules,
        }
    }

    #[must_use]
    pub fn store(&self) -> &PaperPositionRepository {
        &self.store
    }

    /// Opens `contracts` of a scan proposal at a slippage-adjusted mid.
    ///
    /// # Errors
    ///
    /// Returns an error if the position cannot be stored.
    pub async fn open_from_proposal(
        &self,
        owner_id: i64,
        proposal: &TradeProposal,
        contracts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let tags = vec!["auto_scan".to_string(), format!("strategy:{}", proposal.strategy)];
        self.open_position(owner_id, &proposal.candidate, proposal.strategy, contracts, tags, now)
            .await
    }

    /// Opens a paper position. Returns `None` when the contract has no usable
    /// mid or `contracts` is zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the position cannot be stored.
    pub async fn open_position(
        &self,
        owner_id: i64,
        candidate: &ContractCandidate,
        strategy: Strategy,
        contracts: u32,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let quantity = i32::try_from(contracts).context("contract count out of range")?
            * strategy.direction_sign();
        let mid = if candidate.bid > 0.0 && candidate.ask > 0.0 {
            candidate.mid()
        } else {
            candidate.last
        };
        let Some(fill) = simulate_entry(mid, quantity, self.config.slippage) else {
            debug!(
                contract = %candidate.display_name(),
                mid,
                quantity,
                "No paper entry, unusable mid"
            );
            return Ok(None);
        };
        let id = self
            .store
            .insert(&NewPaperPosition {
                owner_id,
                symbol: candidate.symbol.clone(),
                option_type: candidate.option_type,
                strike: decimal(candidate.strike)?,
                expiry: candidate.expiry,
                entry_price: fill.price,
                quantity,
                opened_at: now,
                parent_position_id: None,
                tags,
            })
            .await?;
        info!(
            id,
            owner_id,
            contract = %candidate.display_name(),
            quantity,
            entry = %fill.price,
            "Paper position opened"
        );
        Ok(Some(id))
    }

    /// Re-prices every OPEN position once and applies the exit and roll rules.
    ///
    /// Market data failures skip the position for this pass.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store fails.
    pub async fn process_open(&self, now: DateTime<Utc>) -> Result<LifecycleReport> {
        let today = now.date_naive();
        let batch = self.store.list_open().await.context("loading open paper positions")?;
        let mut report = LifecycleReport::default();
        let mut processed: HashSet<i64> = HashSet::new();
        let mut quotes: HashMap<String, Quote> = HashMap::new();
        let mut chains: HashMap<(String, NaiveDate), OptionChain> = HashMap::new();

        info!(open = batch.len(), "Paper lifecycle pass started");

        for position in &batch {
            if !processed.insert(position.id) {
                continue;
            }
            let label = label(position);

            let quote = match self.quote(&position.symbol, &mut quotes).await {
                Ok(q) => q,
                Err(e) => {
                    warn!(
                        id = position.id,
                        position = %label,
                        error = %e,
                        "Skipping paper position, spot unavailable"
                    );
                    report.skipped.push((position.id, e.to_string()));
                    continue;
                }
            };
            let chain = match self.chain(&position.symbol, position.expiry, &mut chains).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(
                        id = position.id,
                        position = %label,
                        error = %e,
                        "Skipping paper position, chain unavailable"
                    );
                    report.skipped.push((position.id, e.to_string()));
                    continue;
                }
            };
            let strike = to_f64(position.strike);
            let Some(row) = chain.find(position.option_type, strike) else {
                warn!(
                    id = position.id,
                    position = %label,
                    "Skipping paper position, contract not listed"
                );
                report.skipped.push((position.id, "contract not listed".to_string()));
                continue;
            };
            let mid = row.mid_or_last();
            let entry = to_f64(position.entry_price);
            let Some(pnl) = pnl_fraction(position.quantity, entry, mid).filter(|_| mid > 0.0) else {
                report.skipped.push((position.id, "no usable price".to_string()));
                continue;
            };

            let delta = greeks::model_delta(&GreeksInput {
                spot: quote.spot,
                strike,
                years: greeks::year_fraction(position.expiry, today),
                rate: self.market.risk_free_rate,
                implied_vol: row.implied_vol,
                dividend_yield: quote.dividend_yield,
                option_type: position.option_type,
            });
            let dte = position.days_to_expiry(today);

            let Some(reason) = self.rules.evaluate(position.quantity, pnl, delta, dte) else {
                debug!(id = position.id, pnl, delta, dte, "Paper position held");
                report.held += 1;
                continue;
            };

            let Some(exit) = simulate_exit(mid, position.quantity, self.config.slippage) else {
                report.skipped.push((position.id, "no usable exit price".to_string()));
                continue;
            };
            let settlement = Settlement {
                exit_price: exit.price,
                realized_pnl: realized_pnl(position.entry_price, exit.price, position.quantity),
                closed_at: now,
            };

            let event = if reason == ExitReason::Roll {
                self.roll(position, settlement, quote.spot, quote.dividend_yield, today, now)
                    .await?
            } else {
                self.close(position, reason, settlement).await?
            };
            if let Some(event) = event {
                if let Some(new_id) = event.replacement_id {
                    processed.insert(new_id);
                }
                report.events.push(event);
            }
        }

        info!(
            transitions = report.events.len(),
            held = report.held,
            skipped = report.skipped.len(),
            "Paper lifecycle pass finished"
        );
        Ok(report)
    }

    async fn close(
        &self,
        position: &PaperPositionRecord,
        reason: ExitReason,
        settlement: Settlement,
    ) -> Result<Option<LifecycleEvent>> {
        if !self.store.close(position.id, PaperStatus::Closed, settlement).await? {
            debug!(id = position.id, "Paper position already settled");
            return Ok(None);
        }
        info!(
            id = position.id,
            owner_id = position.owner_id,
            reason = %reason,
            exit = %settlement.exit_price,
            realized = %settlement.realized_pnl,
            "Paper position closed"
        );
        Ok(Some(LifecycleEvent {
            owner_id: position.owner_id,
            position_id: position.id,
            label: label(position),
            reason,
            exit_price: settlement.exit_price,
            realized_pnl: settlement.realized_pnl,
            replacement_id: None,
            replacement_label: None,
        }))
    }

    async fn roll(
        &self,
        position: &PaperPositionRecord,
        settlement: Settlement,
        spot: f64,
        dividend_yield: f64,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<LifecycleEvent>> {
        let replacement = match self
            .replacement_contract(position, spot, dividend_yield, today)
            .await
        {
            Ok(Some(r)) => r,
            Ok(None) => {
                warn!(id = position.id, "No roll replacement found, closing instead");
                return self.close(position, ExitReason::RollUnavailable, settlement).await;
            }
            Err(e) => {
                warn!(id = position.id, error = %e, "Roll search failed, closing instead");
                return self.close(position, ExitReason::RollUnavailable, settlement).await;
            }
        };
        let (candidate, mid) = replacement;
        let Some(fill) = simulate_entry(mid, position.quantity, self.config.slippage) else {
            return self.close(position, ExitReason::RollUnavailable, settlement).await;
        };

        let mut tags: Vec<String> = position
            .tags
            .iter()
            .filter(|t| !t.starts_with(ROLLED_FROM_TAG))
            .cloned()
            .collect();
        tags.push(format!("{ROLLED_FROM_TAG}:{}", position.id));

        let new_position = NewPaperPosition {
            owner_id: position.owner_id,
            symbol: position.symbol.clone(),
            option_type: position.option_type,
            strike: decimal(candidate.strike)?,
            expiry: candidate.expiry,
            entry_price: fill.price,
            quantity: position.quantity,
            opened_at: now,
            parent_position_id: Some(position.id),
            tags,
        };
        let Some(new_id) = self.store.roll(position.id, settlement, &new_position).await? else {
            debug!(id = position.id, "Paper position already settled");
            return Ok(None);
        };
        info!(
            id = position.id,
            new_id,
            owner_id = position.owner_id,
            from = %label(position),
            to = %candidate.display_name(),
            realized = %settlement.realized_pnl,
            "Paper position rolled"
        );
        Ok(Some(LifecycleEvent {
            owner_id: position.owner_id,
            position_id: position.id,
            label: label(position),
            reason: ExitReason::Roll,
            exit_price: settlement.exit_price,
            realized_pnl: settlement.realized_pnl,
            replacement_id: Some(new_id),
            replacement_label: Some(candidate.display_name()),
        }))
    }

    /// Same right and direction, expiry nearest the middle of the roll window,
    /// strike nearest the roll target delta.
    async fn replacement_contract(
        &self,
        position: &PaperPositionRecord,
        spot: f64,
        dividend_yield: f64,
        today: NaiveDate,
    ) -> Result<Option<(ContractCandidate, f64)>, MarketDataError> {
        let expirations = self.provider.expirations(&position.symbol).await?;
        let Some((expiry, dte)) =
            roll_expiry(&expirations, today, (self.config.roll_min_dte, self.config.roll_max_dte))
        else {
            return Ok(None);
        };
        let chain = self.provider.option_chain(&position.symbol, expiry).await?;
        let strategy = Strategy::for_position(position.option_type, position.quantity);
        let target = match position.option_type {
            OptionType::Put => -self.config.roll_target_delta,
            OptionType::Call => self.config.roll_target_delta,
        };
        let ctx = ChainContext {
            spot,
            years: greeks::year_fraction(expiry, today),
            rate: self.market.risk_free_rate,
            dividend_yield,
        };
        let replacement =
            find_contract(&position.symbol, &chain, strategy, target, expiry, dte, &ctx);
        Ok(replacement.and_then(|c| {
            let mid = chain.find(c.option_type, c.strike)?.mid_or_last();
            (mid > 0.0).then_some((c, mid))
        }))
    }

    async fn quote<'a>(
        &self,
        symbol: &str,
        cache: &'a mut HashMap<String, Quote>,
    ) -> Result<&'a Quote, MarketDataError> {
        let key = symbol.to_uppercase();
        if !cache.contains_key(&key) {
            let spot = spot_price(self.provider.as_ref(), symbol).await?;
            let dividend_yield = dividend_yield_or_default(
                self.provider.as_ref(),
                symbol,
                self.market.etf_dividend_yield,
            )
            .await;
            cache.insert(key.clone(), Quote { spot, dividend_yield });
        }
        cache.get(&key).ok_or_else(|| MarketDataError::not_found(symbol))
    }

    async fn chain<'a>(
        &self,
        symbol: &str,
        expiry: NaiveDate,
        cache: &'a mut HashMap<(String, NaiveDate), OptionChain>,
    ) -> Result<&'a OptionChain, MarketDataError> {
        let key = (symbol.to_uppercase(), expiry);
        if !cache.contains_key(&key) {
            let chain = self.provider.option_chain(symbol, expiry).await?;
            cache.insert(key.clone(), chain);
        }
        cache.get(&key).ok_or_else(|| MarketDataError::not_found(symbol))
    }
}

/// Listed expiry inside `window` closest to its midpoint.
#[must_use]
pub fn roll_expiry(
    expirations: &[NaiveDate],
    today: NaiveDate,
    window: (i64, i64),
) -> Option<(NaiveDate, i64)> {
    let middle = (window.0 + window.1) as f64 / 2.0;
    expirations
        .iter()
        .map(|exp| (*exp, (*exp - today).num_days()))
        .filter(|(_, dte)| (window.0..=window.1).contains(dte))
        .min_by(|a, b| (a.1 as f64 - middle).abs().total_cmp(&(b.1 as f64 - middle).abs()))
}

/// `(exit - entry) * quantity * 100`.
#[must_use]
pub fn realized_pnl(entry: Decimal, exit: Decimal, quantity: i32) -> Decimal {
    (exit - entry) * Decimal::from(quantity) * Decimal::ONE_HUNDRED
}

fn label(position: &PaperPositionRecord) -> String {
    format!(
        "{} {}{} {}",
        position.symbol,
        position.strike.normalize(),
        position.option_type,
        position.expiry
    )
}

fn to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or_default()
}

fn decimal(value: f64) -> Result<Decimal> {
    use rust_decimal::prelude::FromPrimitive;
    Decimal::from_f64(value)
        .map(|d| d.round_dp(4))
        .with_context(|| format!("{value} is not representable"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use optdesk_data::Database;
    use optdesk_market_data::{ChainRow, SnapshotMarketData};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 15, 0, 0).unwrap()
    }

    fn expiry_in(days: i64) -> NaiveDate {
        now().date_naive() + chrono::Duration::days(days)
    }

    fn put_row(strike: f64, bid: f64, ask: f64) -> ChainRow {
        ChainRow {
            strike,
            bid,
            ask,
            last: (bid + ask) / 2.0,
            implied_vol: 0.30,
            open_interest: 500,
            volume: 50,
        }
    }

    fn short_put(strike: Decimal, entry: Decimal, expiry: NaiveDate) -> NewPaperPosition {
        NewPaperPosition {
            owner_id: 7,
            symbol: "XYZ".into(),
            option_type: OptionType::Put,
            strike,
            expiry,
            entry_price: entry,
            quantity: -1,
            opened_at: now(),
            parent_position_id: None,
            tags: vec!["auto_scan".into()],
        }
    }

    async fn manager(md: Arc<SnapshotMarketData>) -> PaperLifecycleManager {
        let db = Database::new_in_memory().await.unwrap();
        PaperLifecycleManager::new(
            db.paper_positions(),
            md,
            MarketConfig::default(),
            LifecycleConfig::default(),
        )
    }

    #[tokio::test]
    async fn short_at_sixty_percent_profit_closes_once() {
        let md = Arc::new(SnapshotMarketData::new());
        md.set_last("XYZ", 100.0);
        let expiry = expiry_in(35);
        md.set_chain(
            "XYZ",
            expiry,
            OptionChain {
                calls: vec![],
                puts: vec![put_row(90.0, 1.99, 2.01)],
            },
        );
        let manager = manager(md).await;
        let id = manager.store().insert(&short_put(dec!(90), dec!(5.00), expiry)).await.unwrap();

        let report = manager.process_open(now()).await.unwrap();
        assert_eq!(report.events.len(), 1);
        let event = &report.events[0];
        assert_eq!(event.reason, ExitReason::ProfitTarget);
        assert_eq!(event.exit_price, dec!(2.02));
        assert_eq!(event.realized_pnl, dec!(298.00));

        let again = manager.process_open(now() + chrono::Duration::hours(1)).await.unwrap();
        assert!(again.events.is_empty());
        let stored = manager.store().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaperStatus::Closed);
        assert_eq!(stored.realized_pnl, Some(dec!(298.00)));
    }

    #[tokio::test]
    async fn repeated_rolls_keep_one_open_member() {
        let md = Arc::new(SnapshotMarketData::new());
        let expiry = expiry_in(35);
        let puts = (50..=100).map(|k| put_row(f64::from(k), 2.00, 2.10)).collect();
        md.set_chain("XYZ", expiry, OptionChain { calls: vec![], puts });
        let manager = manager(Arc::clone(&md)).await;
        let root = manager.store().insert(&short_put(dec!(100), dec!(2.05), expiry)).await.unwrap();

        let mut current = root;
        for pass in 0..3 {
            // Spot at the open strike puts the short put near 0.46 delta.
            let open = manager.store().get_by_id(current).await.unwrap().unwrap();
            md.set_last("XYZ", to_f64(open.strike));
            let report = manager
                .process_open(now() + chrono::Duration::minutes(pass))
                .await
                .unwrap();
            assert_eq!(report.events.len(), 1, "pass {pass}");
            let event = &report.events[0];
            assert_eq!(event.reason, ExitReason::Roll);
            current = event.replacement_id.unwrap();
        }

        let chain = manager.store().chain(root).await.unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.iter().filter(|p| p.status == PaperStatus::Open).count(), 1);
        assert_eq!(chain.iter().filter(|p| p.status == PaperStatus::Rolled).count(), 3);
        assert_eq!(chain[0].parent_position_id, None);
        for pair in chain.windows(2) {
            assert_eq!(pair[1].parent_position_id, Some(pair[0].id));
            assert!(pair[1].strike < pair[0].strike);
            assert!(pair[1].tags.contains(&format!("{ROLLED_FROM_TAG}:{}", pair[0].id)));
            assert!(pair[0].realized_pnl.is_some());
        }
        assert_eq!(chain[3].id, current);
        assert!(chain[3].realized_pnl.is_none());
    }

    #[tokio::test]
    async fn roll_without_replacement_closes() {
        let md = Arc::new(SnapshotMarketData::new());
        md.set_last("XYZ", 100.0);
        // Only a 25-day expiry: outside the roll window, outside the DTE exit.
        let expiry = expiry_in(25);
        md.set_chain(
            "XYZ",
            expiry,
            OptionChain {
                calls: vec![],
                puts: vec![put_row(100.0, 3.00, 3.10)],
            },
        );
        let manager = manager(md).await;
        let id = manager.store().insert(&short_put(dec!(100), dec!(3.05), expiry)).await.unwrap();

        let report = manager.process_open(now()).await.unwrap();
        assert_eq!(report.events[0].reason, ExitReason::RollUnavailable);
        assert!(report.events[0].replacement_id.is_none());
        let stored = manager.store().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaperStatus::Closed);
    }

    #[tokio::test]
    async fn unavailable_symbol_is_skipped_not_fatal() {
        let md = Arc::new(SnapshotMarketData::new());
        md.mark_unavailable("XYZ");
        let manager = manager(md).await;
        manager.store().insert(&short_put(dec!(90), dec!(2.00), expiry_in(35))).await.unwrap();

        let report = manager.process_open(now()).await.unwrap();
        assert!(report.events.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }

    #[tokio::test]
    async fn entry_fill_moves_against_seller() {
        let md = Arc::new(SnapshotMarketData::new());
        let manager = manager(md).await;
        let candidate = ContractCandidate {
            symbol: "XYZ".into(),
            option_type: OptionType::Put,
            strike: 90.0,
            expiry: expiry_in(35),
            dte: 35,
            bid: 2.50,
            ask: 2.70,
            last: 2.60,
            implied_vol: 0.40,
            model_delta: -0.18,
            open_interest: 500,
            volume: 50,
        };
        let id = manager
            .open_position(7, &candidate, Strategy::SellPut, 2, vec!["manual".into()], now())
            .await
            .unwrap()
            .unwrap();
        let stored = manager.store().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, -2);
        assert_eq!(stored.entry_price, dec!(2.574));
        assert_eq!(stored.status, PaperStatus::Open);

        let none = manager
            .open_position(7, &candidate, Strategy::SellPut, 0, vec![], now())
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn roll_expiry_prefers_window_middle() {
        let today = now().date_naive();
        let exps = [expiry_in(20), expiry_in(31), expiry_in(38), expiry_in(44), expiry_in(60)];
        assert_eq!(roll_expiry(&exps, today, (30, 45)), Some((expiry_in(38), 38)));
        assert_eq!(roll_expiry(&[expiry_in(60)], today, (30, 45)), None);
        assert_eq!(realized_pnl(dec!(5.00), dec!(2.02), -1), dec!(298.00));
    }
}
