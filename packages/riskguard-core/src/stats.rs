//! Statistical primitives shared by the risk, outlier and forecast code.
//!
//! Conventions follow the usual dataframe semantics: NaN marks a missing
//! observation, sample statistics use one degree of freedom, and a rolling
//! window that is not yet full yields NaN rather than zero.

use std::cmp::Ordering;

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample standard deviation (ddof = 1). NaN with fewer than two points.
pub fn std_dev(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Median of the non-NaN values. NaN if there are none.
pub fn median(data: &[f64]) -> f64 {
    let mut valid: Vec<f64> = data.iter().copied().filter(|x| !x.is_nan()).collect();
    if valid.is_empty() {
        return f64::NAN;
    }
    valid.sort_by(f64::total_cmp);
    let mid = valid.len() / 2;
    if valid.len() % 2 == 0 {
        (valid[mid - 1] + valid[mid]) / 2.0
    } else {
        valid[mid]
    }
}

/// Empirical quantile with linear interpolation between order statistics.
///
/// `q` is clamped to [0, 1]. NaN for an empty slice.
pub fn quantile(data: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|x| !x.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Centered rolling median ignoring NaN.
///
/// Position `i` looks at `[i - window/2, i + window/2]`, clipped to the
/// slice. Positions whose window holds fewer than `min_periods` valid
/// values are NaN.
pub fn rolling_median_centered(data: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    let n = data.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            let slice = &data[lo..hi];
            let valid = slice.iter().filter(|x| !x.is_nan()).count();
            if valid == 0 || valid < min_periods {
                f64::NAN
            } else {
                median(slice)
            }
        })
        .collect()
}

/// Trailing rolling sample standard deviation (ddof = 1).
///
/// The first `period - 1` values are NaN, as is any window containing NaN.
pub fn rolling_std(data: &[f64], period: usize) -> Vec<f64> {
    rolling_apply(data, period, std_dev)
}

fn rolling_apply<F>(data: &[f64], period: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let n = data.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || period > n {
        return result;
    }

    for i in (period - 1)..n {
        let window = &data[i + 1 - period..=i];
        if window.iter().all(|x| !x.is_nan()) {
            result[i] = f(window);
        }
    }

    result
}

/// Pearson correlation over pairs where both sides are present.
///
/// NaN with fewer than two complete pairs or zero variance on either side.
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return f64::NAN;
    }
    sxy / (sxx.sqrt() * syy.sqrt())
}

/// Index of the minimum non-NaN value, first occurrence on ties.
pub fn argmin(data: &[f64]) -> Option<usize> {
    data.iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&data), 5.0);
        // Sample std of this classic set is sqrt(32/7)
        assert_relative_eq!(std_dev(&data), (32.0_f64 / 7.0).sqrt(), epsilon = 1e-12);
        assert!(std_dev(&[1.0]).is_nan());
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_median_ignores_nan() {
        assert_eq!(median(&[3.0, f64::NAN, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&[f64::NAN]).is_nan());
    }

    #[test]
    fn test_quantile_linear() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile(&data, 0.5), 3.0);
        assert_relative_eq!(quantile(&data, 0.25), 2.0);
        // 0.05 * 4 = 0.2 between 1 and 2
        assert_relative_eq!(quantile(&data, 0.05), 1.2, epsilon = 1e-12);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_rolling_median_centered() {
        let data = [1.0, 100.0, 2.0, 3.0, 4.0];
        let med = rolling_median_centered(&data, 3, 2);
        // i=0 sees [1, 100]
        assert_eq!(med[0], 50.5);
        // i=1 sees [1, 100, 2]
        assert_eq!(med[1], 2.0);
        assert_eq!(med[4], 3.5);

        let sparse = rolling_median_centered(&[f64::NAN, 1.0, f64::NAN], 3, 2);
        assert!(sparse.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_rolling_std() {
        let data = [1.0, 2.0, 3.0, 4.0];
        let s = rolling_std(&data, 3);
        assert!(s[1].is_nan());
        assert_relative_eq!(s[2], 1.0);
        assert_relative_eq!(s[3], 1.0);

        assert!(rolling_std(&data, 5).iter().all(|v| v.is_nan()));
        assert!(rolling_std(&[1.0, f64::NAN, 3.0], 2).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert_relative_eq!(correlation(&x, &y), 1.0, epsilon = 1e-12);

        let z = [4.0, 3.0, 2.0, f64::NAN];
        assert_relative_eq!(correlation(&x, &z), -1.0, epsilon = 1e-12);
        assert!(correlation(&x, &[1.0, 1.0, 1.0, 1.0]).is_nan());
    }

    #[test]
    fn test_argmin_first_tie() {
        assert_eq!(argmin(&[3.0, 1.0, f64::NAN, 1.0]), Some(1));
        assert_eq!(argmin(&[f64::NAN]), None);
    }
}
