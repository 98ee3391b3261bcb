use ndarray::{Array1, Array2};
use tracing::{debug, info, warn};

use crate::config::{AnalyticsConfig, TRADING_DAYS_PER_YEAR};
use crate::errors::{AnalyticsError, WeightSnapshot};
use crate::models::optimization::{Objective, OptimizationParams, OptimizationResult, WeightChange};
use crate::models::portfolio::{AlignedPortfolio, Portfolio};
use crate::services::statistics::{covariance_matrix, mean_vector, VARIANCE_EPSILON};

/// Sufficient-decrease constant of the Armijo line search
const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const MIN_STEP: f64 = 1e-10;
const MAX_STEP: f64 = 1e10;

const MAX_OUTER_ITERATIONS: usize = 40;
/// Allowed gap between achieved and target annual return
const TARGET_TOLERANCE: f64 = 1e-6;

/// Iterations without a meaningful objective decrease before the solver stops
const STALL_WINDOW: usize = 100;
/// Portfolio variance, relative to the mean asset variance, below which a
/// Sharpe ratio is no longer meaningful
const RISKLESS_VARIANCE_RATIO: f64 = 1e-6;

const DYKSTRA_MAX_ITERATIONS: usize = 1000;
const PROJECTION_TOLERANCE: f64 = 1e-12;

/// Find the weights that best serve the requested risk profile.
///
/// Works on annualized mean returns and covariance. The objective follows
/// from the parameters: minimum variance for a target return when one is
/// given, otherwise minimum variance (conservative), Sharpe minus a
/// variance penalty (moderate) or maximum Sharpe (aggressive). Weights are
/// long-only, sum to 1, and respect the optional per-position and sector
/// caps.
pub fn optimize_portfolio(
    portfolio: &Portfolio,
    params: &OptimizationParams,
    config: &AnalyticsConfig,
) -> Result<OptimizationResult, AnalyticsError> {
    validate_params(params)?;
    info!(
        "Optimizing portfolio of {} positions ({:?})",
        portfolio.positions.len(),
        params.objective()
    );
    let aligned = portfolio.align()?;
    optimize_aligned(&aligned, params, config)
}

pub fn optimize_aligned(
    aligned: &AlignedPortfolio,
    params: &OptimizationParams,
    config: &AnalyticsConfig,
) -> Result<OptimizationResult, AnalyticsError> {
    validate_params(params)?;

    let mu = mean_vector(aligned.returns()) * TRADING_DAYS_PER_YEAR;
    let covariance = covariance_matrix(aligned.returns()) * TRADING_DAYS_PER_YEAR;
    let current = aligned.weights().clone();
    let objective = params.objective();

    let fail = |reason: String, iterations: usize, weights: &Array1<f64>| {
        warn!("Optimization failed: {}", reason);
        AnalyticsError::OptimizationFailed {
            reason,
            iterations,
            best_weights: Some(snapshot(aligned.symbols(), weights)),
        }
    };

    if covariance.diag().sum() < VARIANCE_EPSILON || covariance.iter().any(|v| !v.is_finite()) {
        return Err(fail("Covariance matrix is degenerate".to_string(), 0, &current));
    }

    let set = FeasibleSet::new(aligned, params);
    if let Some(reason) = set.infeasibility() {
        return Err(fail(reason, 0, &current));
    }

    if let Some(target) = params.target_return {
        let best = mu.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let worst = mu.iter().cloned().fold(f64::INFINITY, f64::min);
        if target > best + TARGET_TOLERANCE || target < worst - TARGET_TOLERANCE {
            return Err(fail(
                format!(
                    "Target return {:.4} is outside the achievable range [{:.4}, {:.4}]",
                    target, worst, best
                ),
                0,
                &current,
            ));
        }
    }

    let mut problem = Problem {
        mu: &mu,
        covariance: &covariance,
        risk_free_rate: config.risk_free_rate,
        objective,
        penalty: params.risk_tolerance.variance_penalty(),
        target: params.target_return.unwrap_or(0.0),
        multiplier: 0.0,
        rho: 0.0,
    };

    let start = set.project(&current);
    let solution = match objective {
        Objective::MinVarianceForTarget => solve_with_target(&mut problem, &set, start, config),
        _ => minimize(&problem, &set, start, config.optimizer_max_iterations, config.optimizer_tolerance),
    };

    if !solution.converged {
        return Err(fail(solution.reason, solution.iterations, &solution.weights));
    }

    // Clean up solver residue
    let mut weights = solution
        .weights
        .mapv(|w| if w < config.optimizer_tolerance { 0.0 } else { w });
    let total = weights.sum();
    if total > 0.0 {
        weights /= total;
    }

    let expected_annual_return = mu.dot(&weights);
    let variance = weights.dot(&covariance.dot(&weights)).max(0.0);
    let expected_annual_volatility = variance.sqrt();

    let mean_asset_variance = covariance.diag().sum() / weights.len() as f64;
    if matches!(objective, Objective::MaxSharpe | Objective::PenalizedSharpe)
        && variance < RISKLESS_VARIANCE_RATIO * mean_asset_variance
    {
        return Err(fail(
            "Sharpe ratio is unbounded: the optimum collapses onto a riskless combination"
                .to_string(),
            solution.iterations,
            &weights,
        ));
    }

    let sharpe_ratio = if variance < VARIANCE_EPSILON {
        None
    } else {
        Some((expected_annual_return - config.risk_free_rate) / expected_annual_volatility)
    };

    debug!(
        iterations = solution.iterations,
        expected_annual_return, expected_annual_volatility, "Optimization converged"
    );

    let allocations = aligned
        .symbols()
        .iter()
        .enumerate()
        .map(|(i, symbol)| {
            let change = weights[i] - current[i];
            WeightChange {
                symbol: symbol.clone(),
                current_weight: current[i],
                optimal_weight: weights[i],
                change,
                percentage_change: if current[i] > f64::EPSILON {
                    change / current[i] * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();

    Ok(OptimizationResult {
        objective,
        risk_tolerance: params.risk_tolerance,
        target_return: params.target_return,
        expected_annual_return,
        expected_annual_volatility,
        sharpe_ratio,
        iterations: solution.iterations,
        allocations,
    })
}

fn validate_params(params: &OptimizationParams) -> Result<(), AnalyticsError> {
    if let Some(cap) = params.max_weight {
        if !(cap > 0.0 && cap <= 1.0) {
            return Err(AnalyticsError::Validation(format!(
                "max_weight must be in (0, 1], got {}",
                cap
            )));
        }
    }
    if let Some(target) = params.target_return {
        if !target.is_finite() {
            return Err(AnalyticsError::Validation(
                "target_return must be a finite number".to_string(),
            ));
        }
    }
    for (sector, cap) in &params.sector_caps {
        if !(*cap >= 0.0 && cap.is_finite()) {
            return Err(AnalyticsError::Validation(format!(
                "Sector cap for {} must be non-negative, got {}",
                sector, cap
            )));
        }
    }
    Ok(())
}

fn snapshot(symbols: &[String], weights: &Array1<f64>) -> Vec<WeightSnapshot> {
    symbols
        .iter()
        .zip(weights.iter())
        .map(|(symbol, &weight)| WeightSnapshot {
            symbol: symbol.clone(),
            weight,
        })
        .collect()
}

/// Objective on annualized inputs, written as a minimization.
struct Problem<'a> {
    mu: &'a Array1<f64>,
    covariance: &'a Array2<f64>,
    risk_free_rate: f64,
    objective: Objective,
    penalty: f64,
    target: f64,
    /// Augmented Lagrangian multiplier and penalty for the return target
    multiplier: f64,
    rho: f64,
}

impl Problem<'_> {
    fn evaluate(&self, w: &Array1<f64>) -> (f64, Array1<f64>) {
        let sigma_w = self.covariance.dot(w);
        let variance = w.dot(&sigma_w).max(0.0);

        match self.objective {
            Objective::MinVariance => (variance, &sigma_w * 2.0),
            Objective::MinVarianceForTarget => {
                let gap = self.mu.dot(w) - self.target;
                let value = variance + self.multiplier * gap + 0.5 * self.rho * gap * gap;
                let gradient = &sigma_w * 2.0 + &(self.mu * (self.multiplier + self.rho * gap));
                (value, gradient)
            }
            Objective::MaxSharpe | Objective::PenalizedSharpe => {
                let (sharpe, sharpe_gradient) = self.sharpe(w, &sigma_w, variance);
                let mut value = -sharpe;
                let mut gradient = -sharpe_gradient;
                if self.objective == Objective::PenalizedSharpe {
                    value += self.penalty * variance;
                    gradient = gradient + &(&sigma_w * (2.0 * self.penalty));
                }
                (value, gradient)
            }
        }
    }

    /// Sharpe ratio and its gradient `μ/s − (m − rf)·Σw/s³`.
    fn sharpe(&self, w: &Array1<f64>, sigma_w: &Array1<f64>, variance: f64) -> (f64, Array1<f64>) {
        let s = variance.sqrt().max(1e-12);
        let excess = self.mu.dot(w) - self.risk_free_rate;
        let gradient = self.mu / s - &(sigma_w * (excess / (s * s * s)));
        (excess / s, gradient)
    }
}

/// Long-only simplex with per-position upper bounds, intersected with the
/// sector halfspaces `Σ_{i∈g} wᵢ ≤ cap_g`.
struct FeasibleSet {
    upper: Array1<f64>,
    groups: Vec<(String, Vec<usize>, f64)>,
}

impl FeasibleSet {
    fn new(aligned: &AlignedPortfolio, params: &OptimizationParams) -> Self {
        let n = aligned.n_assets();
        let upper = Array1::from_elem(n, params.max_weight.unwrap_or(1.0));

        let groups = params
            .sector_caps
            .iter()
            .filter_map(|(sector, &cap)| {
                let members: Vec<usize> = aligned
                    .sectors()
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.as_deref() == Some(sector.as_str()))
                    .map(|(i, _)| i)
                    .collect();
                if members.is_empty() {
                    debug!("Sector cap for {} matches no position", sector);
                    None
                } else {
                    Some((sector.clone(), members, cap))
                }
            })
            .collect();

        Self { upper, groups }
    }

    /// Reason the set is empty, if it is. Sectors are disjoint, so the
    /// largest reachable total is the sum over sectors of the smaller of the
    /// sector cap and its members' caps.
    fn infeasibility(&self) -> Option<String> {
        let n = self.upper.len();
        if self.upper.sum() < 1.0 - 1e-12 {
            return Some(format!(
                "Position cap {:.4} cannot be met by {} positions summing to 1",
                self.upper[0], n
            ));
        }

        let mut grouped = vec![false; n];
        let mut reachable = 0.0;
        for (_, members, cap) in &self.groups {
            let member_total: f64 = members.iter().map(|&i| self.upper[i]).sum();
            reachable += cap.min(member_total);
            for &i in members {
                grouped[i] = true;
            }
        }
        reachable += (0..n).filter(|&i| !grouped[i]).map(|i| self.upper[i]).sum::<f64>();
        if reachable < 1.0 - 1e-12 {
            return Some(format!(
                "Sector caps leave at most {:.4} of the portfolio allocatable",
                reachable
            ));
        }
        None
    }

    fn project(&self, v: &Array1<f64>) -> Array1<f64> {
        if self.groups.is_empty() {
            return project_capped_simplex(v, &self.upper);
        }

        // Dykstra's alternating projections; the simplex comes last so the
        // result always sums to 1
        let n = v.len();
        let mut x = v.clone();
        let mut increments = vec![Array1::<f64>::zeros(n); self.groups.len() + 1];
        for _ in 0..DYKSTRA_MAX_ITERATIONS {
            let previous = x.clone();
            for (j, (_, members, cap)) in self.groups.iter().enumerate() {
                let shifted = &x + &increments[j];
                let projected = project_halfspace(&shifted, members, *cap);
                increments[j] = &shifted - &projected;
                x = projected;
            }
            let last = self.groups.len();
            let shifted = &x + &increments[last];
            let projected = project_capped_simplex(&shifted, &self.upper);
            increments[last] = &shifted - &projected;
            x = projected;

            if max_abs(&(&x - &previous)) < PROJECTION_TOLERANCE {
                break;
            }
        }
        x
    }
}

/// Euclidean projection onto `{0 ≤ wᵢ ≤ uᵢ, Σw = 1}` by bisection on the
/// shift `τ` in `wᵢ = clamp(vᵢ − τ, 0, uᵢ)`.
fn project_capped_simplex(v: &Array1<f64>, upper: &Array1<f64>) -> Array1<f64> {
    let total = |tau: f64| -> f64 {
        v.iter()
            .zip(upper.iter())
            .map(|(x, u)| (x - tau).clamp(0.0, *u))
            .sum()
    };

    let mut lo = v.iter().cloned().fold(f64::INFINITY, f64::min) - 1.0;
    let mut hi = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if total(mid) > 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= f64::EPSILON * hi.abs().max(1.0) {
            break;
        }
    }
    let tau = 0.5 * (lo + hi);
    v.iter()
        .zip(upper.iter())
        .map(|(x, u)| (x - tau).clamp(0.0, *u))
        .collect()
}

fn project_halfspace(v: &Array1<f64>, members: &[usize], cap: f64) -> Array1<f64> {
    let excess = members.iter().map(|&i| v[i]).sum::<f64>() - cap;
    let mut out = v.clone();
    if excess > 0.0 {
        let shift = excess / members.len() as f64;
        for &i in members {
            out[i] -= shift;
        }
    }
    out
}

fn max_abs(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}

struct Solution {
    weights: Array1<f64>,
    iterations: usize,
    converged: bool,
    reason: String,
}

/// Projected gradient descent with Barzilai-Borwein trial steps and Armijo
/// backtracking. Stops when the projected gradient step `P(w − ∇f) − w`
/// falls below `tolerance`.
fn minimize(
    problem: &Problem,
    set: &FeasibleSet,
    start: Array1<f64>,
    max_iterations: usize,
    tolerance: f64,
) -> Solution {
    let mut w = start;
    let (mut value, mut gradient) = problem.evaluate(&w);
    let mut step = 1.0;
    let mut reference_value = value;
    let mut stalled_for = 0;

    for iteration in 0..max_iterations {
        let residual = max_abs(&(&set.project(&(&w - &gradient)) - &w));
        if residual < tolerance {
            return Solution {
                weights: w,
                iterations: iteration,
                converged: true,
                reason: String::new(),
            };
        }

        let mut t = step;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = set.project(&(&w - &(&gradient * t)));
            let direction = &candidate - &w;
            let (candidate_value, candidate_gradient) = problem.evaluate(&candidate);
            if candidate_value <= value + ARMIJO * gradient.dot(&direction) {
                accepted = Some((candidate, candidate_value, candidate_gradient, direction));
                break;
            }
            t *= 0.5;
        }

        let Some((candidate, candidate_value, candidate_gradient, direction)) = accepted else {
            // No representable decrease left: accept if close to stationary
            let converged = residual < tolerance.sqrt();
            return Solution {
                weights: w,
                iterations: iteration + 1,
                converged,
                reason: format!("Line search stalled with projected gradient {:.3e}", residual),
            };
        };

        let y = &candidate_gradient - &gradient;
        let sy = direction.dot(&y);
        step = if sy > 0.0 {
            (direction.dot(&direction) / sy).clamp(MIN_STEP, MAX_STEP)
        } else {
            (t * 2.0).min(MAX_STEP)
        };

        w = candidate;
        value = candidate_value;
        gradient = candidate_gradient;

        if reference_value - value > tolerance * (1.0 + reference_value.abs()) {
            reference_value = value;
            stalled_for = 0;
        } else {
            stalled_for += 1;
            if stalled_for >= STALL_WINDOW {
                let residual = max_abs(&(&set.project(&(&w - &gradient)) - &w));
                return Solution {
                    weights: w,
                    iterations: iteration + 1,
                    converged: residual < tolerance.sqrt(),
                    reason: format!(
                        "Objective stopped improving for {} iterations (projected gradient {:.3e})",
                        STALL_WINDOW, residual
                    ),
                };
            }
        }
    }

    Solution {
        weights: w,
        iterations: max_iterations,
        converged: false,
        reason: format!("Iteration limit of {} reached", max_iterations),
    }
}

/// Minimum variance subject to `μ·w = target` by the augmented Lagrangian
/// method: each outer round minimizes
/// `w'Σw + λ·(μ·w − t) + ρ/2·(μ·w − t)²` over the feasible set, then
/// updates λ and, when the gap shrinks too slowly, ρ.
fn solve_with_target(
    problem: &mut Problem,
    set: &FeasibleSet,
    start: Array1<f64>,
    config: &AnalyticsConfig,
) -> Solution {
    let scale = problem.covariance.diag().sum() / problem.mu.dot(problem.mu).max(1e-12);
    problem.rho = (10.0 * scale).max(1.0);
    problem.multiplier = 0.0;

    let mut weights = start;
    let mut iterations = 0;
    let mut previous_gap = f64::INFINITY;

    for _ in 0..MAX_OUTER_ITERATIONS {
        let budget = config.optimizer_max_iterations.saturating_sub(iterations);
        if budget == 0 {
            break;
        }
        let inner = minimize(problem, set, weights, budget, config.optimizer_tolerance);
        iterations += inner.iterations;
        weights = inner.weights;

        let gap = problem.mu.dot(&weights) - problem.target;
        if !inner.converged && inner.iterations >= budget {
            return Solution {
                weights,
                iterations,
                converged: false,
                reason: inner.reason,
            };
        }
        if gap.abs() < TARGET_TOLERANCE {
            return Solution {
                weights,
                iterations,
                converged: inner.converged,
                reason: inner.reason,
            };
        }

        problem.multiplier += problem.rho * gap;
        if gap.abs() > 0.25 * previous_gap {
            problem.rho = (problem.rho * 10.0).min(1e12);
        }
        previous_gap = gap.abs();
    }

    Solution {
        weights,
        iterations,
        converged: false,
        reason: format!(
            "Target return {:.4} not reachable under the weight constraints",
            problem.target
        ),
    }
}
