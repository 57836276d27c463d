//! Beta-weighted portfolio Greeks and margin usage.
//!
//! Each position's Greeks are scaled into reference-index units with the
//! factor `beta * spot / index_price`. Delta and theta scale linearly with the
//! factor; gamma scales with its square, because gamma is the second
//! derivative with respect to the underlying's price.
//!
//! A [`RiskSnapshot`] is a derived projection: it is recomputed on demand and
//! never persisted.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use optdesk_core::config::MarketConfig;
use optdesk_core::greeks::{self, Greeks, GreeksInput};
use optdesk_core::{OptionType, CONTRACT_MULTIPLIER};
use optdesk_market_data::{
    dividend_yield_or_default, spot_price, DailyClose, MarketDataError, MarketDataProvider,
    OptionChain,
};

use crate::correlation::estimate_beta;
use crate::exits::{pnl_fraction, ExitRules};
use crate::types::{ExitReason, LivePosition};

/// Index-unit scaling for one underlying.
#[must_use]
pub fn weight_factor(beta: f64, spot: f64, index_price: f64) -> f64 {
    if index_price <= 0.0 {
        return beta;
    }
    beta * (spot / index_price)
}

/// Weighted (delta, gamma, theta) contribution of `quantity` contracts.
#[must_use]
pub fn weighted_contribution(greeks: &Greeks, quantity: i32, factor: f64) -> (f64, f64, f64) {
    let units = f64::from(quantity) * CONTRACT_MULTIPLIER;
    (
        greeks.delta * units * factor,
        greeks.gamma * units * factor * factor,
        greeks.theta * units * factor,
    )
}

/// Capital locked by a position.
///
/// Covered calls and long options lock nothing. Naked calls use the broker
/// formula `max(20% spot - OTM + premium, 10% spot + premium)`; short puts are
/// cash-secured at the strike.
#[must_use]
pub fn margin_requirement(position: &LivePosition, spot: f64, option_price: f64) -> f64 {
    if !position.is_short() {
        return 0.0;
    }
    let contracts = f64::from(position.quantity.unsigned_abs()) * CONTRACT_MULTIPLIER;
    match position.option_type {
        OptionType::Call if position.is_covered_call() => 0.0,
        OptionType::Call => {
            let otm = (position.strike - spot).max(0.0);
            let per_share = (0.20 * spot - otm + option_price).max(0.10 * spot + option_price);
            per_share * contracts
        }
        OptionType::Put => position.strike * contracts,
    }
}

/// Analytics for one live position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRisk {
    pub position: LivePosition,
    pub spot: f64,
    pub beta: f64,
    pub current_price: f64,
    pub implied_vol: f64,
    pub dte: i64,
    /// Per-share Greeks.
    pub greeks: Greeks,
    pub weighted_delta: f64,
    pub weighted_gamma: f64,
    pub weighted_theta: f64,
    pub margin: f64,
    pub pnl_fraction: Option<f64>,
    /// Exit rule the position currently trips, if any.
    pub advice: Option<ExitReason>,
}

/// A position left out of the totals, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPosition {
    pub label: String,
    pub reason: String,
}

/// Portfolio totals in reference-index units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    /// Index-equivalent shares.
    pub weighted_delta: f64,
    pub weighted_gamma: f64,
    /// Expected dollar decay per day.
    pub daily_theta: f64,
    pub margin_used: f64,
    pub reference_index_price: f64,
    pub positions: Vec<PositionRisk>,
    pub skipped: Vec<SkippedPosition>,
}

impl RiskSnapshot {
    /// Dollar value of the index-equivalent delta.
    #[must_use]
    pub fn delta_exposure(&self) -> f64 {
        self.weighted_delta * self.reference_index_price
    }

    /// Distinct underlyings in the snapshot, ordered.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .positions
            .iter()
            .map(|p| p.position.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    fn add(&mut self, risk: PositionRisk) {
        self.weighted_delta += risk.weighted_delta;
        self.weighted_gamma += risk.weighted_gamma;
        self.daily_theta += risk.weighted_theta;
        self.margin_used += risk.margin;
        self.positions.push(risk);
    }
}

/// Per-underlying inputs shared by every position on it.
struct Underlying {
    spot: f64,
    beta: f64,
    dividend_yield: f64,
    chains: HashMap<NaiveDate, OptionChain>,
}

/// Computes [`RiskSnapshot`]s from live market data.
pub struct RiskAggregator {
    provider: Arc<dyn MarketDataProvider>,
    market: MarketConfig,
    rules: ExitRules,
}

impl RiskAggregator {
    #[must_use]
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        market: MarketConfig,
        rules: ExitRules,
    ) -> Self {
        Self {
            provider,
            market,
            rules,
        }
    }

    #[must_use]
    pub fn market(&self) -> &MarketConfig {
        &self.market
    }

    /// Reference index price, or the configured fallback when it cannot be quoted.
    pub async fn reference_price(&self) -> f64 {
        let index = self.market.reference_index.as_str();
        match spot_price(self.provider.as_ref(), index).await {
            Ok(price) => price,
            Err(e) => {
                warn!(
                    index,
                    error = %e,
                    fallback = self.market.fallback_index_price,
                    "Reference index unavailable, using fallback price"
                );
                self.market.fallback_index_price
            }
        }
    }

    /// Beta of `symbol` against the reference index; 1.0 on any data gap.
    pub async fn beta(&self, symbol: &str, index_history: &[DailyClose]) -> f64 {
        if symbol.eq_ignore_ascii_case(&self.market.reference_index) || index_history.is_empty() {
            return 1.0;
        }
        match self
            .provider
            .historical_series(symbol, self.market.beta_lookback_days)
            .await
        {
            Ok(history) => estimate_beta(&history, index_history, self.market.beta_min_samples),
            Err(e) => {
                warn!(symbol, error = %e, "History unavailable, beta defaults to 1.0");
                1.0
            }
        }
    }

    /// Index-equivalent delta of one long contract with per-share `model_delta`.
    pub async fn unit_index_delta(
        &self,
        symbol: &str,
        spot: f64,
        model_delta: f64,
        index_price: f64,
    ) -> f64 {
        let index_history = self.index_history().await;
        let beta = self.beta(symbol, &index_history).await;
        model_delta * CONTRACT_MULTIPLIER * weight_factor(beta, spot, index_price)
    }

    async fn index_history(&self) -> Vec<DailyClose> {
        let index = self.market.reference_index.as_str();
        match self
            .provider
            .historical_series(index, self.market.beta_lookback_days)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(index, error = %e, "Reference index history unavailable");
                Vec::new()
            }
        }
    }

    /// Aggregates every position. Symbols or contracts whose data cannot be
    /// fetched are recorded in `skipped`; the rest of the book is unaffected.
    pub async fn snapshot(&self, positions: &[LivePosition], today: NaiveDate) -> RiskSnapshot {
        let mut snapshot = RiskSnapshot {
            reference_index_price: self.reference_price().await,
            ..RiskSnapshot::default()
        };
        if positions.is_empty() {
            return snapshot;
        }
        let index_history = self.index_history().await;

        let mut by_symbol: BTreeMap<String, Vec<&LivePosition>> = BTreeMap::new();
        for position in positions {
            by_symbol.entry(position.symbol.to_uppercase()).or_default().push(position);
        }

        for (symbol, group) in by_symbol {
            let mut underlying = match self.underlying(&symbol, &index_history).await {
                Ok(u) => u,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Skipping symbol, spot unavailable");
                    for position in group {
                        snapshot.skipped.push(SkippedPosition {
                            label: position.label(),
                            reason: e.to_string(),
                        });
                    }
                    continue;
                }
            };

            let index_price = snapshot.reference_index_price;
            for position in group {
                match self
                    .position_risk(position, &mut underlying, index_price, today)
                    .await
                {
                    Ok(risk) => snapshot.add(risk),
                    Err(reason) => {
                        warn!(position = %position.label(), reason = %reason, "Skipping position");
                        snapshot.skipped.push(SkippedPosition {
                            label: position.label(),
                            reason,
                        });
                    }
                }
            }
        }

        info!(
            positions = snapshot.positions.len(),
            skipped = snapshot.skipped.len(),
            weighted_delta = snapshot.weighted_delta,
            weighted_gamma = snapshot.weighted_gamma,
            daily_theta = snapshot.daily_theta,
            margin_used = snapshot.margin_used,
            "Risk snapshot computed"
        );
        snapshot
    }

    async fn underlying(
        &self,
        symbol: &str,
        index_history: &[DailyClose],
    ) -> Result<Underlying, MarketDataError> {
        let spot = spot_price(self.provider.as_ref(), symbol).await?;
        let beta = self.beta(symbol, index_history).await;
        let dividend_yield = dividend_yield_or_default(
            self.provider.as_ref(),
            symbol,
            self.market.etf_dividend_yield,
        )
        .await;
        debug!(symbol, spot, beta, dividend_yield, "Underlying priced");
        Ok(Underlying {
            spot,
            beta,
            dividend_yield,
            chains: HashMap::new(),
        })
    }

    async fn position_risk(
        &self,
        position: &LivePosition,
        underlying: &mut Underlying,
        index_price: f64,
        today: NaiveDate,
    ) -> Result<PositionRisk, String> {
        if !underlying.chains.contains_key(&position.expiry) {
            let chain = self
                .provider
                .option_chain(&position.symbol, position.expiry)
                .await
                .map_err(|e| e.to_string())?;
            underlying.chains.insert(position.expiry, chain);
        }
        let row = underlying
            .chains
            .get(&position.expiry)
            .and_then(|chain| chain.find(position.option_type, position.strike))
            .ok_or_else(|| "contract not listed".to_string())?;

        let current_price = row.mid_or_last();
        let implied_vol = row.implied_vol;
        let spot = underlying.spot;
        let dte = (position.expiry - today).num_days();

        let greeks = greeks::compute(&GreeksInput {
            spot,
            strike: position.strike,
            years: greeks::year_fraction(position.expiry, today),
            rate: self.market.risk_free_rate,
            implied_vol,
            dividend_yield: underlying.dividend_yield,
            option_type: position.option_type,
        })
        .unwrap_or_else(|| {
            warn!(
                position = %position.label(),
                implied_vol,
                "Greeks unavailable, contributing zero"
            );
            Greeks::default()
        });

        let factor = weight_factor(underlying.beta, spot, index_price);
        let (weighted_delta, weighted_gamma, weighted_theta) =
            weighted_contribution(&greeks, position.quantity, factor);
        let pnl = pnl_fraction(position.quantity, position.entry_price, current_price);
        let advice = pnl.and_then(|p| self.rules.evaluate(position.quantity, p, greeks.delta, dte));

        Ok(PositionRisk {
            position: position.clone(),
            spot,
            beta: underlying.beta,
            current_price,
            implied_vol,
            dte,
            greeks,
            weighted_delta,
            weighted_gamma,
            weighted_theta,
            margin: margin_requirement(position, spot, current_price),
            pnl_fraction: pnl,
            advice,
        })
    }
}
