//! Projection of a [`RiskSnapshot`] into deliverable reports.
//!
//! [`PortfolioReport`] is the one canonical view; [`ReportOptions`] only
//! chooses which parts of it are rendered.

#![allow(clippy::format_push_string)]

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use optdesk_core::config::RiskConfig;

use crate::aggregator::RiskSnapshot;
use crate::correlation::CorrelatedPair;
use crate::flags::{DeltaState, GammaState, MarginState, RiskFlags, ThetaState};
use crate::hedging::{HedgeRequirement, RegimeAssessment};
use crate::stats::PerformanceStats;

const RULE: &str = "───────────────────────────────────────────────────────────────\n";

/// Which sections a rendering includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOptions {
    pub positions: bool,
    pub concentration: bool,
    pub hedge: bool,
    pub performance: bool,
}

impl ReportOptions {
    /// Every section.
    #[must_use]
    pub fn full() -> Self {
        Self {
            positions: true,
            concentration: true,
            hedge: true,
            performance: true,
        }
    }

    /// Totals and flags only.
    #[must_use]
    pub fn summary() -> Self {
        Self {
            positions: false,
            concentration: false,
            hedge: false,
            performance: false,
        }
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::full()
    }
}

/// Everything known about one owner's book at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub owner_id: i64,
    pub capital: f64,
    pub snapshot: RiskSnapshot,
    pub flags: RiskFlags,
    pub correlated: Vec<CorrelatedPair>,
    pub regime: Option<RegimeAssessment>,
    pub hedge: Option<HedgeRequirement>,
    pub performance: Option<PerformanceStats>,
}

impl PortfolioReport {
    #[must_use]
    pub fn new(owner_id: i64, capital: f64, snapshot: RiskSnapshot, config: &RiskConfig) -> Self {
        let flags = RiskFlags::evaluate(&snapshot, capital, config);
        Self {
            owner_id,
            capital,
            snapshot,
            flags,
            correlated: Vec::new(),
            regime: None,
            hedge: None,
            performance: None,
        }
    }

    #[must_use]
    pub fn with_correlation(mut self, correlated: Vec<CorrelatedPair>) -> Self {
        self.correlated = correlated;
        self
    }

    #[must_use]
    pub fn with_hedge(mut self, regime: RegimeAssessment, hedge: Option<HedgeRequirement>) -> Self {
        self.regime = Some(regime);
        self.hedge = hedge;
        self
    }

    #[must_use]
    pub fn with_performance(mut self, performance: PerformanceStats) -> Self {
        self.performance = Some(performance);
        self
    }

    /// Structured form for the notification transport.
    #[must_use]
    pub fn to_value(&self, options: &ReportOptions) -> Value {
        let s = &self.snapshot;
        let mut value = json!({
            "owner_id": self.owner_id,
            "capital": self.capital,
            "reference_index_price": s.reference_index_price,
            "weighted_delta": s.weighted_delta,
            "weighted_gamma": s.weighted_gamma,
            "daily_theta": s.daily_theta,
            "margin_used": s.margin_used,
            "flags": self.flags,
            "skipped": s.skipped,
        });
        if options.positions {
            value["positions"] = json!(s.positions);
        }
        if options.concentration {
            value["correlated"] = json!(self.correlated);
        }
        if options.hedge {
            value["regime"] = json!(self.regime);
            value["hedge"] = json!(self.hedge);
        }
        if options.performance {
            value["performance"] = json!(self.performance);
        }
        value
    }

    /// Plain-text form.
    #[must_use]
    pub fn render(&self, options: &ReportOptions) -> String {
        let s = &self.snapshot;
        let f = &self.flags;
        let mut out = String::new();

        out.push_str(&format!("Portfolio risk for owner {}\n", self.owner_id));
        out.push_str(RULE);

        if options.positions {
            for p in &s.positions {
                let advice = p.advice.map_or("hold", |a| a.as_str());
                let covered = if p.position.is_covered_call() { " (covered)" } else { "" };
                let pnl = p
                    .pnl_fraction
                    .map_or_else(|| "n/a".to_string(), |x| format!("{:+.2}%", x * 100.0));
                out.push_str(&format!(
                    "{}{}  entry ${:.2}  now ${:.2}  pnl {}  dte {}  idx Δ {:+.2}  -> {}\n",
                    p.position.label(),
                    covered,
                    p.position.entry_price,
                    p.current_price,
                    pnl,
                    p.dte,
                    p.weighted_delta,
                    advice,
                ));
            }
            for skipped in &s.skipped {
                out.push_str(&format!("{}  skipped: {}\n", skipped.label, skipped.reason));
            }
            out.push_str(RULE);
        }

        let delta_note = match f.delta {
            DeltaState::Neutral => "within limit",
            DeltaState::OverLong => "long exposure over limit",
            DeltaState::OverShort => "short exposure over limit",
        };
        out.push_str(&format!(
            "Index delta:    {:+.1} sh  ${:.0}  ({:.1}%)  {}\n",
            s.weighted_delta, f.delta_exposure, f.delta_exposure_pct, delta_note
        ));
        let gamma_note = match f.gamma {
            GammaState::Neutral => "neutral",
            GammaState::Fragile => "fragile",
            GammaState::Antifragile => "antifragile",
        };
        out.push_str(&format!(
            "Gamma:          {:+.2}  (±{:.2})  {}\n",
            s.weighted_gamma, f.gamma_threshold, gamma_note
        ));
        let theta_note = match f.theta {
            ThetaState::Healthy => "healthy",
            ThetaState::Low => "low",
            ThetaState::Excessive => "excessive",
        };
        out.push_str(&format!(
            "Daily theta:    ${:+.2}  ({:.3}%)  {}\n",
            s.daily_theta, f.theta_yield_pct, theta_note
        ));
        let margin_note = match f.margin {
            MarginState::Normal => "normal",
            MarginState::Warning => "warning",
            MarginState::Critical => "critical, stop opening positions",
        };
        out.push_str(&format!(
            "Margin:         ${:.2}  ({:.1}%)  {}\n",
            s.margin_used, f.margin_pct, margin_note
        ));

        if options.concentration && !self.correlated.is_empty() {
            out.push_str(RULE);
            out.push_str("Correlated pairs\n");
            for pair in &self.correlated {
                out.push_str(&format!(
                    "  {} & {}  ρ = {:.2}\n",
                    pair.first, pair.second, pair.rho
                ));
            }
        }

        if options.hedge {
            if let Some(regime) = &self.regime {
                out.push_str(RULE);
                out.push_str(&format!(
                    "Regime:         {}  (VIX {:.1})  target Δ {:+.1}\n",
                    regime.regime.as_str(),
                    regime.vix,
                    regime.target_delta
                ));
                match &self.hedge {
                    Some(h) => out.push_str(&format!(
                        "Hedge:          gap {:+.2}  buy {} ATM {}  or {:+} index shares\n",
                        h.delta_gap, h.option_contracts, h.option_type, h.index_shares
                    )),
                    None => out.push_str("Hedge:          none needed\n"),
                }
            }
        }

        if options.performance {
            if let Some(p) = &self.performance {
                out.push_str(RULE);
                out.push_str(&render_performance(p));
            }
        }

        out
    }
}

/// Plain-text performance block.
#[must_use]
pub fn render_performance(stats: &PerformanceStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("Settled trades: {}\n", stats.total_trades));
    out.push_str(&format!("Win rate:       {:.2}%\n", stats.win_rate));
    out.push_str(&format!("Total PnL:      ${:.2}\n", stats.total_pnl));
    out.push_str(&format!("Average PnL:    ${:.2}\n", stats.average_pnl));
    match stats.profit_factor {
        Some(pf) => out.push_str(&format!("Profit factor:  {pf:.2}\n")),
        None => out.push_str("Profit factor:  n/a\n"),
    }
    out
}
