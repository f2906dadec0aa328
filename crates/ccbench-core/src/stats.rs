// ── Descriptive statistics ────────────────────────────────────────────────────

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sum of squared deviations from `mean`.
fn squared_deviations(values: &[f64], mean: f64) -> f64 {
    values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum()
}

/// Sample standard deviation (denominator `n - 1`).
///
/// Returns `None` for fewer than two values; a single sample carries no
/// spread information and is never reported as `0.0`.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    Some((squared_deviations(values, m) / (values.len() - 1) as f64).sqrt())
}

/// Population standard deviation (denominator `n`), `None` when empty.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some((squared_deviations(values, m) / values.len() as f64).sqrt())
}

/// Mean and population standard deviation over the defined subset of
/// `values`.
///
/// Undefined entries are excluded from both the sum and the count; when no
/// entry is defined both results are `None`.
pub fn defined_mean_std(values: &[Option<f64>]) -> (Option<f64>, Option<f64>) {
    let defined: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    (mean(&defined), population_std(&defined))
}

/// Round half to even, the binning policy for interval end times.
///
/// `0.5 → 0`, `1.5 → 2`, `2.5 → 2`, `3.5 → 4`.
pub fn round_half_even(value: f64) -> f64 {
    value.round_ties_even()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
