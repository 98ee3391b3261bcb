//! Descriptive statistics and small linear-algebra helpers shared by the
//! portfolio services.

use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Variances below this are treated as zero.
pub const VARIANCE_EPSILON: f64 = 1e-18;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1 denominator). Zero for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    variance.sqrt()
}

/// Percentile with linear interpolation between order statistics
/// (`p` in 0..=100). NaN for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, p)
}

pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

/// Largest peak-to-trough decline of the value curve obtained by compounding
/// `returns` from 1.0. Returned as a non-positive fraction.
pub fn max_drawdown_from_returns(returns: &[f64]) -> f64 {
    let mut value = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    for r in returns {
        value *= 1.0 + r;
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (value - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Same as [`max_drawdown_from_returns`] for an already compounded curve
/// that implicitly starts at 1.0.
pub fn max_drawdown_from_values(values: &[f64]) -> f64 {
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        }
        let dd = (v - peak) / peak;
        if dd < max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

/// Row means of an assets × observations matrix.
pub fn mean_vector(returns: &Array2<f64>) -> Array1<f64> {
    returns
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(returns.nrows()))
}

/// Sample covariance matrix of an assets × observations matrix.
pub fn covariance_matrix(returns: &Array2<f64>) -> Array2<f64> {
    let n_assets = returns.nrows();
    let n_obs = returns.ncols();
    if n_obs < 2 {
        return Array2::zeros((n_assets, n_assets));
    }
    let means = mean_vector(returns);
    let centered = returns - &means.insert_axis(Axis(1));
    centered.dot(&centered.t()) / (n_obs as f64 - 1.0)
}

/// Pearson correlation between two equally long series.
///
/// Identical series correlate at exactly 1.0; if either series has zero
/// variance (and they are not identical) the correlation is 0.0.
pub fn pearson(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    if a == b {
        return 1.0;
    }
    let n = a.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let mean_a = a.sum() / n;
    let mean_b = b.sum() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a < VARIANCE_EPSILON || var_b < VARIANCE_EPSILON {
        return 0.0;
    }
    (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0)
}

/// Symmetric correlation matrix of an assets × observations matrix with an
/// exact unit diagonal.
pub fn correlation_matrix(returns: &Array2<f64>) -> Array2<f64> {
    let n = returns.nrows();
    let mut corr = Array2::<f64>::eye(n);
    for i in 0..n {
        for j in (i + 1)..n {
            let c = pearson(returns.row(i), returns.row(j));
            corr[[i, j]] = c;
            corr[[j, i]] = c;
        }
    }
    corr
}

/// Lower-triangular `L` with `L·Lᵀ = matrix` for a symmetric
/// positive-semi-definite matrix.
///
/// Zero pivots are allowed (they arise from zero-variance assets) as long as
/// the rest of their column is zero too. Returns `None` when the matrix is
/// not positive-semi-definite within tolerance.
pub fn cholesky_psd(matrix: &Array2<f64>) -> Option<Array2<f64>> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return None;
    }
    let scale = matrix
        .diag()
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tol = (scale * 1e-12).max(1e-300);

    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut pivot = matrix[[j, j]];
        for k in 0..j {
            pivot -= l[[j, k]] * l[[j, k]];
        }
        if pivot < -tol {
            return None;
        }
        if pivot <= tol {
            // Degenerate direction: every remaining entry of the column must vanish
            for i in (j + 1)..n {
                let mut residual = matrix[[i, j]];
                for k in 0..j {
                    residual -= l[[i, k]] * l[[j, k]];
                }
                if residual.abs() > tol.sqrt() * scale.sqrt().max(1.0) {
                    return None;
                }
            }
            continue;
        }
        let diag = pivot.sqrt();
        l[[j, j]] = diag;
        for i in (j + 1)..n {
            let mut value = matrix[[i, j]];
            for k in 0..j {
                value -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = value / diag;
        }
    }
    Some(l)
}
