use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub market: MarketConfig,
    pub signal: SignalConfig,
    pub sizing: SizingConfig,
    pub risk: RiskConfig,
    pub lifecycle: LifecycleConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://optdesk.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

/// Market-wide constants and fallbacks used when provider data is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub risk_free_rate: f64,
    /// Reference index used for beta weighting and index-equivalent exposure.
    pub reference_index: String,
    /// Volatility index consulted for the hedging regime.
    pub volatility_index: String,
    /// Index price used when the reference quote cannot be fetched.
    pub fallback_index_price: f64,
    /// Dividend yield assumed for index and ETF underlyings.
    pub etf_dividend_yield: f64,
    pub beta_lookback_days: u32,
    /// Fewer aligned return samples than this yields beta 1.0.
    pub beta_min_samples: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.042,
            reference_index: "SPY".to_string(),
            volatility_index: "^VIX".to_string(),
            fallback_index_price: 500.0,
            etf_dividend_yield: 0.015,
            beta_lookback_days: 90,
            beta_min_samples: 60,
        }
    }
}

/// Thresholds for the signal pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub min_history: usize,
    pub history_lookback_days: u32,
    pub vol_window: usize,
    pub rsi_period: usize,
    pub sma_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub rsi_neutral: f64,
    pub min_vol_rank: f64,
    /// Trend branches pick the debit strategy below this vol-rank.
    pub debit_vol_rank_max: f64,
    pub earnings_window_days: i64,
    pub term_front_dte: i64,
    pub term_back_dte: i64,
    pub term_inversion: f64,
    pub term_normal: f64,
    pub skew_delta: f64,
    pub skew_tail_risk: f64,
    pub skew_put_veto: f64,
    pub skew_call_bias: f64,
    pub base_spread_pct: f64,
    pub long_dated_days: i64,
    pub long_dated_spread_pct: f64,
    pub extreme_delta_high: f64,
    pub extreme_delta_low: f64,
    pub extreme_delta_spread_pct: f64,
    pub cheap_contract_ask: f64,
    pub cheap_contract_max_spread: f64,
    pub min_open_interest: u64,
    pub min_volume: u64,
    pub max_debit_premium: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_history: 50,
            history_lookback_days: 365,
            vol_window: 20,
            rsi_period: 14,
            sma_period: 20,
            rsi_oversold: 35.0,
            rsi_overbought: 65.0,
            rsi_neutral: 50.0,
            min_vol_rank: 30.0,
            debit_vol_rank_max: 50.0,
            earnings_window_days: 14,
            term_front_dte: 30,
            term_back_dte: 60,
            term_inversion: 1.05,
            term_normal: 0.95,
            skew_delta: 0.25,
            skew_tail_risk: 1.30,
            skew_put_veto: 1.50,
            skew_call_bias: 0.90,
            base_spread_pct: 10.0,
            long_dated_days: 90,
            long_dated_spread_pct: 5.0,
            extreme_delta_high: 0.80,
            extreme_delta_low: 0.15,
            extreme_delta_spread_pct: 5.0,
            cheap_contract_ask: 1.00,
            cheap_contract_max_spread: 0.10,
            min_open_interest: 100,
            min_volume: 10,
            max_debit_premium: 0.03,
        }
    }
}

/// Fractional-Kelly sizing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    pub kelly_fraction: f64,
    pub credit_ceiling: f64,
    pub debit_ceiling: f64,
    /// Annualized return hurdles, in percent.
    pub credit_min_return_pct: f64,
    pub debit_min_return_pct: f64,
    /// Cap applied to the allocation before converting to contracts.
    pub contract_allocation_cap: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            kelly_fraction: 0.25,
            credit_ceiling: 0.05,
            debit_ceiling: 0.03,
            credit_min_return_pct: 15.0,
            debit_min_return_pct: 30.0,
            contract_allocation_cap: 0.25,
        }
    }
}

/// Portfolio risk flags and optimizer limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub delta_exposure_pct: f64,
    /// Gamma threshold per $10,000 of capital.
    pub gamma_per_10k: f64,
    pub theta_low_pct: f64,
    pub theta_high_pct: f64,
    pub margin_warn_pct: f64,
    pub margin_critical_pct: f64,
    pub correlation_window: usize,
    pub correlation_threshold: f64,
    pub correlation_lookback_days: u32,
    /// Index-equivalent exposure limit for the optimizer, in percent of capital.
    pub optimizer_limit_pct: f64,
    /// Minimum delta gap before an autonomous hedge is suggested.
    pub hedge_min_gap: f64,
    pub regime_sma_period: usize,
    pub regime_calm_vix: f64,
    pub regime_stress_vix: f64,
    /// Volatility index level assumed when its quote is unavailable.
    pub fallback_vix: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            delta_exposure_pct: 15.0,
            gamma_per_10k: 2.0,
            theta_low_pct: 0.05,
            theta_high_pct: 0.30,
            margin_warn_pct: 30.0,
            margin_critical_pct: 50.0,
            correlation_window: 60,
            correlation_threshold: 0.75,
            correlation_lookback_days: 90,
            optimizer_limit_pct: 15.0,
            hedge_min_gap: 50.0,
            regime_sma_period: 200,
            regime_calm_vix: 25.0,
            regime_stress_vix: 35.0,
            fallback_vix: 20.0,
        }
    }
}

/// Paper position exit and roll rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub slippage: f64,
    pub short_profit_target: f64,
    pub short_stop_loss: f64,
    pub long_profit_target: f64,
    pub long_stop_loss: f64,
    pub exit_dte: i64,
    pub roll_delta: f64,
    pub roll_min_dte: i64,
    pub roll_max_dte: i64,
    pub roll_target_delta: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            slippage: 0.01,
            short_profit_target: 0.50,
            short_stop_loss: 1.50,
            long_profit_target: 1.00,
            long_stop_loss: 0.50,
            exit_dte: 21,
            roll_delta: 0.40,
            roll_min_dte: 30,
            roll_max_dte: 45,
            roll_target_delta: 0.20,
        }
    }
}

/// Scheduling of the scan, lifecycle and daily passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub cooldown_secs: u64,
    pub symbol_delay_ms: u64,
    /// Capital assumed for owners without a stored setting.
    pub default_capital: Decimal,
    pub poll_interval_secs: u64,
    pub earnings_alert_days: i64,
    /// Open a paper position automatically when a scan proposal clears the optimizer.
    pub auto_paper_entry: bool,
    pub sentiment_timeout_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 4 * 60 * 60,
            symbol_delay_ms: 500,
            default_capital: Decimal::new(50_000, 0),
            poll_interval_secs: 300,
            earnings_alert_days: 7,
            auto_paper_entry: true,
            sentiment_timeout_ms: 10_000,
        }
    }
}
