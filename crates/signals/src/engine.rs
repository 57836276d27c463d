//! Contract-selection signal engine.
//!
//! Runs one symbol through the pipeline:
//!
//! 1. technical gate and strategy selection
//! 2. earnings move and term structure (diagnostics only)
//! 3. expiry and contract search
//! 4. vertical skew, liquidity, volatility-risk-premium and expected-move gates
//! 5. Kelly sizing
//!
//! Every gate failure is a [`SignalOutcome::Rejected`]. Only a failed fetch of
//! data the pipeline cannot proceed without surfaces as an error, so callers can
//! skip the symbol for this pass.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use optdesk_core::config::{MarketConfig, SignalConfig};
use optdesk_core::greeks::year_fraction;
use optdesk_core::{ContractCandidate, OptionsKellySizer, SizingDecision, SizingReason, Strategy};
use optdesk_market_data::{closes, dividend_yield_or_default, MarketDataError, MarketDataProvider};

use crate::gates::{self, ExpectedMove};
use crate::liquidity::{check_liquidity, LiquidityCheck, LiquidityReject};
use crate::search::{find_contract, select_expiry};
use crate::surface::{self, ChainContext, EarningsWindow, TermStructure, VerticalSkew};
use crate::technical::{select_strategy, TechnicalSnapshot};

/// A sized trade idea with every diagnostic gathered on the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub strategy: Strategy,
    pub spot: f64,
    pub candidate: ContractCandidate,
    pub technical: TechnicalSnapshot,
    pub earnings: Option<EarningsWindow>,
    pub term_structure: TermStructure,
    pub skew: Option<VerticalSkew>,
    pub liquidity: LiquidityCheck,
    pub volatility_risk_premium: f64,
    pub expected_move: ExpectedMove,
    /// Expiry breakeven for short strategies.
    pub breakeven: Option<f64>,
    /// Suggested short strike for turning a long option into a vertical.
    pub hedge_strike: Option<f64>,
    pub dividend_yield: f64,
    pub sizing: SizingDecision,
}

impl TradeProposal {
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.candidate.symbol
    }

    /// One-line description used for notifications and sentiment context.
    #[must_use]
    pub fn headline(&self) -> String {
        format!(
            "{} {} @ {:.2}/{:.2} | delta {:.2} | DTE {} | IV {:.1}% | return {:.1}% | alloc {:.2}%",
            self.strategy,
            self.candidate.display_name(),
            self.candidate.bid,
            self.candidate.ask,
            self.candidate.model_delta,
            self.candidate.dte,
            self.candidate.implied_vol * 100.0,
            self.sizing.annualized_return_pct,
            self.sizing.allocation_fraction * 100.0,
        )
    }
}

/// Result of running one symbol through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Proposed(Box<TradeProposal>),
    Rejected(RejectReason),
}

impl SignalOutcome {
    #[must_use]
    pub fn proposal(&self) -> Option<&TradeProposal> {
        match self {
            Self::Proposed(p) => Some(p),
            Self::Rejected(_) => None,
        }
    }
}

/// Why a symbol produced no trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    InsufficientHistory { observations: usize },
    NoSetup,
    NoExpiry { strategy: Strategy },
    NoContract { expiry: NaiveDate },
    SkewVeto { ratio: f64 },
    Illiquid(LiquidityReject),
    VolatilityPremium { premium: f64 },
    InsideExpectedMove { breakeven: f64, lower: f64, upper: f64 },
    Sizing { reason: SizingReason, annualized_return_pct: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientHistory { observations } => {
                write!(f, "insufficient history ({observations} closes)")
            }
            Self::NoSetup => write!(f, "no technical setup"),
            Self::NoExpiry { strategy } => write!(f, "no expiry in {strategy} window"),
            Self::NoContract { expiry } => write!(f, "no traded contract for {expiry}"),
            Self::SkewVeto { ratio } => write!(f, "put skew {ratio:.2} vetoes short put"),
            Self::Illiquid(reason) => write!(f, "illiquid: {reason}"),
            Self::VolatilityPremium { premium } => {
                write!(f, "volatility premium {:+.2}%", premium * 100.0)
            }
            Self::InsideExpectedMove { breakeven, lower, upper } => {
                write!(f, "breakeven {breakeven:.2} inside {lower:.2}-{upper:.2}")
            }
            Self::Sizing {
                reason,
                annualized_return_pct,
            } => write!(f, "sizing {reason} ({annualized_return_pct:.1}% annualized)"),
        }
    }
}

/// Signal engine over a market data provider.
pub struct SignalEngine {
    provider: Arc<dyn MarketDataProvider>,
    signal: SignalConfig,
    market: MarketConfig,
    sizer: OptionsKellySizer,
}

impl SignalEngine {
    #[must_use]
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        signal: SignalConfig,
        market: MarketConfig,
        sizer: OptionsKellySizer,
    ) -> Self {
        Self {
            provider,
            signal,
            market,
            sizer,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.provider
    }

    #[must_use]
    pub fn sizer(&self) -> &OptionsKellySizer {
        &self.sizer
    }

    /// Runs the full pipeline for `symbol`, sizing against `capital`.
    ///
    /// # Errors
    ///
    /// Returns an error when price history, expiries or the selected chain
    /// cannot be fetched.
    pub async fn analyze(
        &self,
        symbol: &str,
        capital: f64,
        today: NaiveDate,
    ) -> Result<SignalOutcome, MarketDataError> {
        let history = self
            .provider
            .historical_series(symbol, self.signal.history_lookback_days)
            .await?;
        let prices = closes(&history);
        let Some(technical) = TechnicalSnapshot::compute(&prices, &self.signal) else {
            return Ok(self.reject(
                symbol,
                RejectReason::InsufficientHistory {
                    observations: prices.len(),
                },
            ));
        };
        self.evaluate(symbol, technical, capital, today).await
    }

    /// Runs every stage after the technical gate against a precomputed snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when expiries or the selected chain cannot be fetched.
    pub async fn evaluate(
        &self,
        symbol: &str,
        technical: TechnicalSnapshot,
        capital: f64,
        today: NaiveDate,
    ) -> Result<SignalOutcome, MarketDataError> {
        let Some(strategy) = select_strategy(&technical, &self.signal) else {
            return Ok(self.reject(symbol, RejectReason::NoSetup));
        };

        let spot = match self.provider.quote(symbol).await {
            Ok(quote) if quote.last > 0.0 => quote.last,
            _ => technical.price,
        };
        let expirations = self.provider.expirations(symbol).await?;
        let dividend_yield = dividend_yield_or_default(
            self.provider.as_ref(),
            symbol,
            self.market.etf_dividend_yield,
        )
        .await;

        let earnings = self.earnings_window(symbol, &expirations, spot, today).await;
        let term_structure = self.term_structure(symbol, &expirations, spot, today).await;

        let Some((expiry, dte)) = select_expiry(&expirations, today, strategy.dte_window()) else {
            return Ok(self.reject(symbol, RejectReason::NoExpiry { strategy }));
        };
        let chain = self.provider.option_chain(symbol, expiry).await?;
        let ctx = ChainContext {
            spot,
            years: year_fraction(expiry, today),
            rate: self.market.risk_free_rate,
            dividend_yield,
        };

        let Some(candidate) =
            find_contract(symbol, &chain, strategy, strategy.target_delta(), expiry, dte, &ctx)
        else {
            return Ok(self.reject(symbol, RejectReason::NoContract { expiry }));
        };

        let skew = surface::vertical_skew(
            &chain,
            &ctx,
            self.signal.skew_delta,
            self.signal.skew_tail_risk,
            self.signal.skew_call_bias,
        );
        if let Some(s) = skew {
            if strategy == Strategy::SellPut && s.ratio >= self.signal.skew_put_veto {
                return Ok(self.reject(symbol, RejectReason::SkewVeto { ratio: s.ratio }));
            }
        }

        let liquidity = match check_liquidity(&candidate, &self.signal) {
            Ok(check) => check,
            Err(reason) => return Ok(self.reject(symbol, RejectReason::Illiquid(reason))),
        };

        let premium = gates::volatility_risk_premium(candidate.implied_vol, technical.realized_vol);
        if !gates::vrp_allows(strategy, premium, self.signal.max_debit_premium) {
            return Ok(self.reject(symbol, RejectReason::VolatilityPremium { premium }));
        }

        let expected_move = ExpectedMove::new(spot, candidate.implied_vol, dte);
        let breakeven = gates::credit_breakeven(strategy, &candidate);
        if let Some(be) = breakeven {
            if !gates::breakeven_outside_band(strategy, be, &expected_move) {
                return Ok(self.reject(
                    symbol,
                    RejectReason::InsideExpectedMove {
                        breakeven: be,
                        lower: expected_move.lower,
                        upper: expected_move.upper,
                    },
                ));
            }
        }
        let hedge_strike = gates::hedge_strike(strategy, &candidate, &chain, &expected_move);

        let sizing = if strategy.is_credit() {
            self.sizer
                .size_credit(candidate.bid, candidate.strike, candidate.model_delta, dte, capital)
        } else {
            self.sizer.size_debit(
                candidate.mid(),
                expected_move.amount,
                candidate.model_delta,
                dte,
                capital,
            )
        };
        if !sizing.should_trade {
            return Ok(self.reject(
                symbol,
                RejectReason::Sizing {
                    reason: sizing.reason,
                    annualized_return_pct: sizing.annualized_return_pct,
                },
            ));
        }

        let proposal = TradeProposal {
            strategy,
            spot,
            candidate,
            technical,
            earnings,
            term_structure,
            skew,
            liquidity,
            volatility_risk_premium: premium,
            expected_move,
            breakeven,
            hedge_strike,
            dividend_yield,
            sizing,
        };
        info!(
            symbol,
            strategy = %strategy,
            contract = %proposal.candidate.display_name(),
            delta = proposal.candidate.model_delta,
            annualized = proposal.sizing.annualized_return_pct,
            allocation = proposal.sizing.allocation_fraction,
            "Signal proposed"
        );
        Ok(SignalOutcome::Proposed(Box::new(proposal)))
    }

    async fn earnings_window(
        &self,
        symbol: &str,
        expirations: &[NaiveDate],
        spot: f64,
        today: NaiveDate,
    ) -> Option<EarningsWindow> {
        let date = match self.provider.earnings_date(symbol).await {
            Ok(date) => date?,
            Err(e) => {
                warn!(symbol, error = %e, "Earnings date unavailable");
                return None;
            }
        };
        let days = (date - today).num_days();
        if !(0..=self.signal.earnings_window_days).contains(&days) {
            return None;
        }
        let expiry = surface::covering_expiry(expirations, date)?;
        match self.provider.option_chain(symbol, expiry).await {
            Ok(chain) => surface::earnings_move(&chain, spot, date, expiry, today),
            Err(e) => {
                debug!(symbol, %expiry, error = %e, "Earnings straddle chain unavailable");
                None
            }
        }
    }

    async fn term_structure(
        &self,
        symbol: &str,
        expirations: &[NaiveDate],
        spot: f64,
        today: NaiveDate,
    ) -> TermStructure {
        let Some((front, back)) = surface::term_expiries(
            expirations,
            today,
            self.signal.term_front_dte,
            self.signal.term_back_dte,
        ) else {
            return TermStructure::flat();
        };
        let chains = (
            self.provider.option_chain(symbol, front).await,
            self.provider.option_chain(symbol, back).await,
        );
        match chains {
            (Ok(front_chain), Ok(back_chain)) => surface::term_structure(
                (front, &front_chain),
                (back, &back_chain),
                spot,
                self.signal.term_inversion,
                self.signal.term_normal,
            )
            .unwrap_or_else(TermStructure::flat),
            _ => {
                debug!(symbol, "Term structure chains unavailable");
                TermStructure::flat()
            }
        }
    }

    fn reject(&self, symbol: &str, reason: RejectReason) -> SignalOutcome {
        debug!(symbol, %reason, "Signal rejected");
        SignalOutcome::Rejected(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optdesk_core::config::SizingConfig;
    use optdesk_market_data::{ChainRow, DailyClose, OptionChain, SnapshotMarketData};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
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

    fn engine(md: Arc<SnapshotMarketData>) -> SignalEngine {
        SignalEngine::new(
            md,
            SignalConfig::default(),
            MarketConfig::default(),
            OptionsKellySizer::from(&SizingConfig::default()),
        )
    }

    /// Spot 100, one expiry 35 days out. The 90 put carries model delta near -0.17.
    fn short_put_market(bid_90: f64, ask_90: f64, put_iv: f64) -> Arc<SnapshotMarketData> {
        let md = Arc::new(SnapshotMarketData::new());
        md.set_last("XYZ", 100.0);
        let expiry = today() + chrono::Duration::days(35);
        let puts = [80.0_f64, 85.0, 90.0, 95.0, 100.0]
            .iter()
            .map(|&k| {
                if (k - 90.0).abs() < 1e-9 {
                    row(k, bid_90, ask_90, put_iv)
                } else {
                    row(k, 1.0, 1.1, put_iv)
                }
            })
            .collect();
        let calls = [100.0, 105.0, 110.0, 115.0]
            .iter()
            .map(|&k| row(k, 1.0, 1.1, 0.38))
            .collect();
        md.set_chain("XYZ", expiry, OptionChain { calls, puts });
        md
    }

    fn oversold() -> TechnicalSnapshot {
        TechnicalSnapshot {
            price: 100.0,
            realized_vol: 0.25,
            vol_rank: 40.0,
            rsi: 30.0,
            sma: 105.0,
            macd_histogram: -0.5,
        }
    }

    #[tokio::test]
    async fn oversold_symbol_proposes_short_put_above_return_hurdle() {
        let md = short_put_market(2.50, 2.70, 0.40);
        let outcome = engine(md).evaluate("XYZ", oversold(), 50_000.0, today()).await.unwrap();

        let p = outcome.proposal().expect("proposal");
        assert_eq!(p.strategy, Strategy::SellPut);
        assert!((p.candidate.strike - 90.0).abs() < 1e-9);
        assert!(p.candidate.model_delta > -0.20 && p.candidate.model_delta < -0.15);
        assert_eq!(p.candidate.dte, 35);
        assert!(p.sizing.annualized_return_pct >= 15.0);
        assert!(p.sizing.allocation_fraction <= 0.05);
        assert!(p.earnings.is_none());
        assert_eq!(p.term_structure.state, surface::TermState::Flat);
        let skew = p.skew.expect("skew");
        assert!((skew.ratio - 0.40 / 0.38).abs() < 1e-9);
        assert!(p.volatility_risk_premium >= 0.0);
        assert_eq!(p.breakeven, Some(87.5));
    }

    #[tokio::test]
    async fn lower_bid_lowers_return_and_flips_to_reject() {
        let md = short_put_market(1.00, 1.05, 0.40);
        let eng = engine(md);
        let outcome = eng.evaluate("XYZ", oversold(), 50_000.0, today()).await.unwrap();
        assert!(matches!(
            outcome,
            SignalOutcome::Rejected(RejectReason::InsideExpectedMove { .. })
        ));

        let delta = -0.17;
        let rich = eng.sizer().size_credit(2.50, 90.0, delta, 35, 50_000.0);
        let thin = eng.sizer().size_credit(1.00, 90.0, delta, 35, 50_000.0);
        assert!(thin.annualized_return_pct < rich.annualized_return_pct);
        assert!(!thin.should_trade);
    }

    #[tokio::test]
    async fn steep_put_skew_vetoes_short_put() {
        let md = short_put_market(2.50, 2.70, 0.60);
        let outcome = engine(md).evaluate("XYZ", oversold(), 50_000.0, today()).await.unwrap();
        assert!(matches!(
            outcome,
            SignalOutcome::Rejected(RejectReason::SkewVeto { ratio }) if ratio >= 1.5
        ));
    }

    #[tokio::test]
    async fn cheap_vol_uptrend_buys_call_with_spread_hedge() {
        let md = Arc::new(SnapshotMarketData::new());
        md.set_last("ABC", 110.0);
        let expiry = today() + chrono::Duration::days(45);
        let calls = [100.0, 105.0, 110.0, 115.0, 120.0, 125.0]
            .iter()
            .map(|&k| row(k, 4.80, 5.00, 0.31))
            .collect();
        md.set_chain("ABC", expiry, OptionChain { calls, puts: vec![] });

        let technical = TechnicalSnapshot {
            price: 110.0,
            realized_vol: 0.30,
            vol_rank: 20.0,
            rsi: 58.0,
            sma: 100.0,
            macd_histogram: 0.3,
        };
        let outcome = engine(md).evaluate("ABC", technical, 50_000.0, today()).await.unwrap();
        let p = outcome.proposal().expect("proposal");
        assert_eq!(p.strategy, Strategy::BuyCall);
        assert!((p.candidate.strike - 110.0).abs() < 1e-9);
        assert!(p.volatility_risk_premium <= 0.03);
        assert_eq!(p.hedge_strike, Some(120.0));
        assert!(p.breakeven.is_none());
        assert!((p.sizing.allocation_fraction - 0.03).abs() < 1e-12);
    }

    #[tokio::test]
    async fn rich_debit_premium_rejected() {
        let md = Arc::new(SnapshotMarketData::new());
        md.set_last("ABC", 110.0);
        let expiry = today() + chrono::Duration::days(45);
        let calls = [105.0, 110.0, 115.0].iter().map(|&k| row(k, 4.80, 5.00, 0.40)).collect();
        md.set_chain("ABC", expiry, OptionChain { calls, puts: vec![] });
        let technical = TechnicalSnapshot {
            price: 110.0,
            realized_vol: 0.30,
            vol_rank: 20.0,
            rsi: 58.0,
            sma: 100.0,
            macd_histogram: 0.3,
        };
        let outcome = engine(md).evaluate("ABC", technical, 50_000.0, today()).await.unwrap();
        assert!(matches!(
            outcome,
            SignalOutcome::Rejected(RejectReason::VolatilityPremium { .. })
        ));
    }

    #[tokio::test]
    async fn short_history_is_rejection_not_error() {
        let md = Arc::new(SnapshotMarketData::new());
        let bars = (0..30)
            .map(|i| DailyClose {
                date: today() - chrono::Duration::days(30 - i),
                close: 50.0,
            })
            .collect();
        md.set_history("LOW", bars);
        let outcome = engine(md).analyze("LOW", 50_000.0, today()).await.unwrap();
        assert_eq!(
            outcome,
            SignalOutcome::Rejected(RejectReason::InsufficientHistory { observations: 30 })
        );
    }

    #[tokio::test]
    async fn unavailable_symbol_is_error() {
        let md = Arc::new(SnapshotMarketData::new());
        md.mark_unavailable("DOWN");
        assert!(engine(md).analyze("DOWN", 50_000.0, today()).await.is_err());
    }

    #[tokio::test]
    async fn earnings_inside_window_prices_straddle() {
        let md = short_put_market(2.50, 2.70, 0.40);
        md.set_earnings("XYZ", Some(today() + chrono::Duration::days(10)));
        let outcome = engine(md).evaluate("XYZ", oversold(), 50_000.0, today()).await.unwrap();
        let window = outcome.proposal().expect("proposal").earnings.expect("earnings window");
        assert_eq!(window.days_until, 10);
        // ATM straddle: 100 call 1.05 mid, 100 put 1.05 mid.
        assert!((window.move_pct - 2.1).abs() < 1e-9);
    }
}
