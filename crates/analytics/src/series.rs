//! Rolling and cumulative series primitives.
//!
//! All helpers follow pandas-style NaN conventions: a rolling window
//! containing any NaN yields NaN, standard deviations are sample
//! deviations (ddof = 1), and cumulative operations leave NaN positions
//! NaN while the accumulator carries on past them.

/// Rolling mean over `window` samples; first `window - 1` outputs are NaN.
#[must_use]
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |slice| {
        slice.iter().sum::<f64>() / slice.len() as f64
    })
}

/// Rolling sample standard deviation over `window` samples.
#[must_use]
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, sample_std)
}

fn rolling(values: &[f64], window: usize, stat: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for i in (window - 1)..values.len() {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = stat(slice);
    }
    out
}

fn sample_std(slice: &[f64]) -> f64 {
    if slice.len() < 2 {
        return f64::NAN;
    }
    let n = slice.len() as f64;
    let mean = slice.iter().sum::<f64>() / n;
    let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

/// Exponentially weighted mean with span semantics (`alpha = 2/(span+1)`)
/// and adjusted weighting, defined from the first element.
///
/// NaN inputs produce NaN outputs while the decaying weights carry across
/// the gap.
#[must_use]
pub fn ewm_mean(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;
    let mut out = vec![f64::NAN; values.len()];
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (i, &value) in values.iter().enumerate() {
        numerator *= decay;
        denominator *= decay;
        if value.is_nan() {
            continue;
        }
        numerator += value;
        denominator += 1.0;
        out[i] = numerator / denominator;
    }
    out
}

/// First difference; index 0 is NaN.
#[must_use]
pub fn diff(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        out[i] = values[i] - values[i - 1];
    }
    out
}

/// Cumulative sum that skips NaN: NaN positions stay NaN, accumulation
/// continues afterwards.
#[must_use]
pub fn cumsum(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    let mut acc = 0.0;
    for (i, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        acc += value;
        out[i] = acc;
    }
    out
}

/// Cumulative product with the same NaN-skipping convention as [`cumsum`].
#[must_use]
pub fn cumprod(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    let mut acc = 1.0;
    for (i, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        acc *= value;
        out[i] = acc;
    }
    out
}

/// Mean of the non-NaN values; NaN when none exist.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &value in values {
        if value.is_nan() {
            continue;
        }
        sum += value;
        n += 1;
    }
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Sample standard deviation of the non-NaN values; NaN when fewer than two
/// exist.
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sample_std(&finite)
}

/// Minimum of the non-NaN values; NaN when none exist.
#[must_use]
pub fn min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, f64::min)
}

/// Maximum of the non-NaN values; NaN when none exist.
#[must_use]
pub fn max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, f64::max)
}
