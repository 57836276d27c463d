//! Price-series indicators used by the technical gate and the risk aggregator.
//!
//! All functions take closes ordered oldest first and return `None` when the
//! series is too short to produce a value.

const TRADING_DAYS: f64 = 252.0;

/// Natural log returns between consecutive closes.
#[must_use]
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

/// Simple percentage returns between consecutive closes.
#[must_use]
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { w[1] / w[0] - 1.0 })
        .collect()
}

/// Sample standard deviation (n - 1 denominator).
#[must_use]
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

/// Rolling annualized realized volatility of log returns.
///
/// Element `i` covers the `window` returns ending at return `i + window - 1`.
#[must_use]
pub fn rolling_volatility(prices: &[f64], window: usize) -> Vec<f64> {
    if window < 2 {
        return Vec::new();
    }
    log_returns(prices)
        .windows(window)
        .filter_map(sample_std)
        .map(|s| s * TRADING_DAYS.sqrt())
        .collect()
}

/// Position of the latest value within the series' min/max range, 0-100.
///
/// A flat series ranks 0.
#[must_use]
pub fn vol_rank(series: &[f64]) -> Option<f64> {
    let current = *series.last()?;
    let (min, max) = series
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if max > min {
        Some((current - min) / (max - min) * 100.0)
    } else {
        Some(0.0)
    }
}

/// Simple moving average of the last `period` closes.
#[must_use]
pub fn sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let tail = &prices[prices.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Wilder RSI, seeded with the simple average of the first `period` moves.
#[must_use]
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() <= period {
        return None;
    }
    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let p = period as f64;

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / p;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / p;

    for c in &changes[period..] {
        avg_gain = (avg_gain * (p - 1.0) + c.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-c).max(0.0)) / p;
    }

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Exponential moving average series, seeded with the SMA of the first `period` values.
///
/// Element `i` corresponds to input index `i + period - 1`.
#[must_use]
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    for v in &values[period..] {
        let prev = out[out.len() - 1];
        out.push(alpha * v + (1.0 - alpha) * prev);
    }
    out
}

/// MACD histogram (MACD line minus signal line) at the latest close.
#[must_use]
pub fn macd_histogram(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Option<f64> {
    if fast >= slow {
        return None;
    }
    let fast_ema = ema_series(prices, fast);
    let slow_ema = ema_series(prices, slow);
    if slow_ema.is_empty() {
        return None;
    }
    // Align the fast EMA to the slow EMA's first index.
    let offset = slow - fast;
    let macd_line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();
    let signal_line = ema_series(&macd_line, signal);
    let last_signal = signal_line.last()?;
    let last_macd = macd_line.last()?;
    Some(last_macd - last_signal)
}

/// Pearson correlation coefficient of two equal-length series.
///
/// Returns `None` for mismatched or too-short input, or when either side has zero variance.
#[must_use]
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 3 {
        return None;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Regression beta of `asset` returns against `index` returns (Cov / Var).
#[must_use]
pub fn beta(asset: &[f64], index: &[f64]) -> Option<f64> {
    if asset.len() != index.len() || asset.len() < 2 {
        return None;
    }
    let n = asset.len() as f64;
    let mean_a = asset.iter().sum::<f64>() / n;
    let mean_i = index.iter().sum::<f64>() / n;
    let cov = asset
        .iter()
        .zip(index)
        .map(|(a, i)| (a - mean_a) * (i - mean_i))
        .sum::<f64>()
        / (n - 1.0);
    let var = index.iter().map(|i| (i - mean_i).powi(2)).sum::<f64>() / (n - 1.0);
    if var == 0.0 {
        return None;
    }
    Some(cov / var)
}
