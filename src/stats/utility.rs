//! Null-skipping descriptive statistics.
//!
//! Every function ignores `None` and NaN inputs and returns `None` when no
//! value is left, so an empty group never turns into a zero.

fn present<I: IntoIterator<Item = Option<f64>>>(values: I) -> impl Iterator<Item = f64> {
    values.into_iter().flatten().filter(|v| !v.is_nan())
}

/// Arithmetic mean of the present values.
pub fn mean<I: IntoIterator<Item = Option<f64>>>(values: I) -> Option<f64> {
    let (sum, count) = present(values).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        return None;
    }
    Some(sum / count as f64)
}

pub fn max<I: IntoIterator<Item = Option<f64>>>(values: I) -> Option<f64> {
    present(values).reduce(f64::max)
}

pub fn min<I: IntoIterator<Item = Option<f64>>>(values: I) -> Option<f64> {
    present(values).reduce(f64::min)
}

/// `Σ(value·weight) / Σ(weight)` over the pairs where both sides are present.
///
/// Returns `None` when no pair qualifies or the weights sum to zero.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (Option<f64>, Option<f64>)>,
{
    let (weighted, weights) = pairs
        .into_iter()
        .filter_map(|(value, weight)| match (value, weight) {
            (Some(v), Some(w)) if !v.is_nan() && !w.is_nan() => Some((v, w)),
            _ => None,
        })
        .fold((0.0, 0.0), |(vw, ws), (v, w)| (vw + v * w, ws + w));
    if weights == 0.0 {
        return None;
    }
    Some(weighted / weights)
}

/// Rounds half-to-even at `decimals` places; negative `decimals` round to
/// tens, hundreds, thousands, ...
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if decimals >= 0 {
        let factor = 10f64.powi(decimals);
        (value * factor).round_ties_even() / factor
    } else {
        let factor = 10f64.powi(-decimals);
        (value / factor).round_ties_even() * factor
    }
}
