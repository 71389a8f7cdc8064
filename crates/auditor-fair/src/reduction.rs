//! Exponentiated-gradient reduction for fair classification.
//!
//! Solves `min_Q err(Q)  s.t.  γ(Q) <= bound` over randomized mixtures `Q`
//! of decision trees by playing a zero-sum game between a learner (best
//! response to the current Lagrange multipliers, found by fitting a
//! cost-sensitive tree) and a multiplier player updated by exponentiated
//! gradient. After the first round each iteration also solves the
//! saddle point exactly over the hypotheses found so far (a small linear
//! program) and keeps whichever of the two mixtures has the smaller duality
//! gap. Iteration stops once that gap drops below `nu`.

use rand::Rng;
use serde::Serialize;

use auditor_common::config::MitigationConfig;
use auditor_common::error::{AuditorError, Result};
use auditor_data::split::rng_from;
use auditor_data::FeatureMatrix;

use crate::linprog;
use crate::moments::{Constraint, DemographicParity, ErrorRate};
use crate::tree::DecisionTreeClassifier;

const ACCURACY_MUL: f64 = 0.5;
const REGRET_CHECK_START_T: usize = 5;
const REGRET_CHECK_INCREASE_T: f64 = 1.6;
const SHRINK_REGRET: f64 = 0.8;
const SHRINK_ETA: f64 = 0.8;
const MIN_ITER: usize = 5;
const PRECISION: f64 = 1e-8;
const GAP_MULTIPLIERS: [f64; 4] = [1.0, 2.0, 5.0, 10.0];

/// Reduction settings. The constraint bound and the multiplier bound both derive from `eps`.
#[derive(Debug, Clone)]
pub struct ExponentiatedGradient {
    pub eps: f64,
    pub max_iter: usize,
    pub eta0: f64,
    pub nu: Option<f64>,
    pub max_depth: usize,
    pub seed: Option<u64>,
    pub run_linprog_step: bool,
}

impl Default for ExponentiatedGradient {
    fn default() -> Self {
        Self::from_config(&MitigationConfig::default(), 5)
    }
}

/// Convergence facts about a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct ReductionDiagnostics {
    pub iterations: usize,
    pub best_iter: usize,
    pub best_gap: f64,
    pub oracle_calls: usize,
    pub n_hypotheses: usize,
    /// Iterations whose kept mixture came from the linear program
    pub linprog_steps: usize,
    pub nu: f64,
}

/// Randomized mixture of trees produced by the reduction.
#[derive(Debug, Clone)]
pub struct MitigatedModel {
    predictors: Vec<DecisionTreeClassifier>,
    weights: Vec<f64>,
    seed: Option<u64>,
    pub diagnostics: ReductionDiagnostics,
}

struct Hypothesis {
    tree: DecisionTreeClassifier,
    error: f64,
    gamma: Vec<f64>,
}

struct Evaluation {
    lagrangian: f64,
    lagrangian_high: f64,
}

struct GapResult {
    lagrangian: f64,
    lagrangian_low: f64,
    lagrangian_high: f64,
}

/// Exact saddle point over the hypotheses known when it was solved.
#[derive(Debug, Clone)]
struct LinprogStep {
    n_hypotheses: usize,
    q: Vec<f64>,
    lambda: Vec<f64>,
    gap: f64,
}

impl GapResult {
    fn gap(&self) -> f64 {
        (self.lagrangian - self.lagrangian_low).max(self.lagrangian_high - self.lagrangian)
    }
}

/// Training-set state shared by the learner's best responses.
struct Lagrangian<'a, C: Constraint> {
    x: &'a FeatureMatrix,
    objective: ErrorRate,
    constraint: &'a C,
    bound: Vec<f64>,
    multiplier_bound: f64,
    max_depth: usize,
    hypotheses: Vec<Hypothesis>,
    oracle_calls: usize,
    last_linprog: Option<LinprogStep>,
}

impl<'a, C: Constraint> Lagrangian<'a, C> {
    fn new(x: &'a FeatureMatrix, y: &[usize], constraint: &'a C, multiplier_bound: f64, max_depth: usize) -> Self {
        Self {
            x,
            objective: ErrorRate::new(y),
            constraint,
            bound: constraint.bound(),
            multiplier_bound,
            max_depth,
            hypotheses: Vec::new(),
            oracle_calls: 0,
            last_linprog: None,
        }
    }

    /// Fit a tree to the cost-sensitive problem induced by `lambda`.
    fn call_oracle(&mut self, lambda: &[f64]) -> Result<DecisionTreeClassifier> {
        let signed: Vec<f64> = self
            .objective
            .signed_weights()
            .iter()
            .zip(self.constraint.signed_weights(lambda))
            .map(|(o, c)| o + c)
            .collect();

        let red_y: Vec<usize> = signed.iter().map(|w| usize::from(*w > 0.0)).collect();
        let abs_sum: f64 = signed.iter().map(|w| w.abs()).sum();
        let n = signed.len() as f64;
        let red_w: Vec<f64> = if abs_sum > 0.0 {
            signed.iter().map(|w| n * w.abs() / abs_sum).collect()
        } else {
            vec![1.0; signed.len()]
        };

        let mut tree = DecisionTreeClassifier::new().with_max_depth(self.max_depth);
        tree.fit(self.x, &red_y, Some(&red_w))?;
        self.oracle_calls += 1;
        Ok(tree)
    }

    /// Best response to `lambda` among the stored hypotheses and a freshly fitted one.
    fn best_h(&mut self, lambda: &[f64]) -> Result<usize> {
        let tree = self.call_oracle(lambda)?;
        let predictions: Vec<f64> = tree.predict(self.x)?.into_iter().map(|p| p as f64).collect();
        let error = self.objective.error(&predictions);
        let gamma = self.constraint.gamma(&predictions);
        let value = error + dot(&gamma, lambda);

        let best_existing = self
            .hypotheses
            .iter()
            .map(|h| h.error + dot(&h.gamma, lambda))
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match best_existing {
            Some((idx, best_value)) if value >= best_value - PRECISION => Ok(idx),
            _ => {
                self.hypotheses.push(Hypothesis { tree, error, gamma });
                Ok(self.hypotheses.len() - 1)
            }
        }
    }

    /// Lagrangian of a mixture `q` (indexed like `hypotheses`, shorter means zero weight).
    fn eval(&self, q: &[f64], lambda: &[f64]) -> Evaluation {
        let mut error = 0.0;
        let mut gamma = vec![0.0; self.bound.len()];
        for (weight, h) in q.iter().zip(&self.hypotheses) {
            error += weight * h.error;
            for (g, hg) in gamma.iter_mut().zip(&h.gamma) {
                *g += weight * hg;
            }
        }

        let slack: Vec<f64> = gamma.iter().zip(&self.bound).map(|(g, b)| g - b).collect();
        let lagrangian = error + dot(&self.constraint.project_lambda(lambda), &slack);
        let max_violation = slack.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lagrangian_high = if max_violation > 0.0 {
            error + self.multiplier_bound * max_violation
        } else {
            error
        };

        Evaluation { lagrangian, lagrangian_high }
    }

    fn eval_gap(&mut self, q: &[f64], lambda_hat: &[f64], nu: f64) -> Result<GapResult> {
        let evaluation = self.eval(q, lambda_hat);
        let mut result = GapResult {
            lagrangian: evaluation.lagrangian,
            lagrangian_low: evaluation.lagrangian,
            lagrangian_high: evaluation.lagrangian_high,
        };

        for mul in GAP_MULTIPLIERS {
            let scaled: Vec<f64> = lambda_hat.iter().map(|l| l * mul).collect();
            let h_idx = self.best_h(&scaled)?;
            let mut single = vec![0.0; h_idx + 1];
            single[h_idx] = 1.0;
            let low = self.eval(&single, lambda_hat).lagrangian;
            if low < result.lagrangian_low {
                result.lagrangian_low = low;
            }
            if result.gap() > nu + PRECISION {
                break;
            }
        }

        Ok(result)
    }

    /// Solve `max_λ min_h L(h, λ)` over the stored hypotheses, `λ >= 0`, `Σλ <= B`.
    ///
    /// Variables are `[λ..., μ⁺, μ⁻]` with `μ = μ⁺ - μ⁻ <= err(h) + λ·(γ(h) - bound)`
    /// for every hypothesis; the duals of those rows are the mixture weights.
    /// Reuses the previous solution while no hypothesis has been added.
    fn solve_linprog(&mut self, nu: f64) -> Result<LinprogStep> {
        let n_hypotheses = self.hypotheses.len();
        if let Some(step) = self.last_linprog.as_ref().filter(|s| s.n_hypotheses == n_hypotheses) {
            return Ok(step.clone());
        }

        let k = self.bound.len();
        let mut c = vec![0.0; k + 2];
        c[k] = 1.0;
        c[k + 1] = -1.0;

        let mut a = Vec::with_capacity(n_hypotheses + 1);
        let mut b = Vec::with_capacity(n_hypotheses + 1);
        for h in &self.hypotheses {
            let mut row: Vec<f64> = h.gamma.iter().zip(&self.bound).map(|(g, bd)| bd - g).collect();
            row.extend([1.0, -1.0]);
            a.push(row);
            b.push(h.error);
        }
        let mut budget = vec![1.0; k];
        budget.extend([0.0, 0.0]);
        a.push(budget);
        b.push(self.multiplier_bound);

        let solution = linprog::maximize(&c, &a, &b)?;
        let lambda = solution.x[..k].to_vec();
        let q = solution.duals[..n_hypotheses].to_vec();
        let gap = self.eval_gap(&q, &lambda, nu)?.gap();

        let step = LinprogStep { n_hypotheses, q, lambda, gap };
        self.last_linprog = Some(step.clone());
        Ok(step)
    }
}

impl ExponentiatedGradient {
    pub fn from_config(config: &MitigationConfig, max_depth: usize) -> Self {
        Self {
            eps: config.eps,
            max_iter: config.max_iter,
            eta0: config.eta0,
            nu: config.nu,
            max_depth,
            seed: config.seed,
            run_linprog_step: config.run_linprog_step,
        }
    }

    /// Train under a demographic-parity constraint on `sensitive`.
    pub fn fit(&self, x: &FeatureMatrix, y: &[usize], sensitive: &[String]) -> Result<MitigatedModel> {
        if x.n_rows() == 0 {
            return Err(AuditorError::training("cannot mitigate on zero samples"));
        }
        if y.len() != x.n_rows() || sensitive.len() != x.n_rows() {
            return Err(AuditorError::training(format!(
                "X has {} rows, y has {}, sensitive features have {}",
                x.n_rows(),
                y.len(),
                sensitive.len()
            )));
        }
        if y.iter().any(|&label| label > 1) {
            return Err(AuditorError::training("labels must be 0 or 1"));
        }
        if self.eps <= 0.0 {
            return Err(AuditorError::training("eps must be positive"));
        }
        if self.max_iter == 0 {
            return Err(AuditorError::training("max_iter must be at least 1"));
        }

        let constraint = DemographicParity::new(sensitive, self.eps)?;
        self.fit_with(x, y, &constraint)
    }

    fn fit_with<C: Constraint>(&self, x: &FeatureMatrix, y: &[usize], constraint: &C) -> Result<MitigatedModel> {
        let n = x.n_rows();
        let multiplier_bound = 1.0 / self.eps;
        let mut lagrangian = Lagrangian::new(x, y, constraint, multiplier_bound, self.max_depth);
        let bound = constraint.bound();
        let k = constraint.len();

        let mut theta = vec![0.0_f64; k];
        let mut lambda_sum = vec![0.0_f64; k];
        let mut q_sum: Vec<f64> = Vec::new();
        let mut gaps_eg: Vec<f64> = Vec::new();
        let mut gaps: Vec<f64> = Vec::new();
        let mut qs: Vec<Vec<f64>> = Vec::new();
        let mut linprog_steps = 0;
        let mut last_regret_checked = REGRET_CHECK_START_T;
        let mut last_gap = f64::INFINITY;
        let mut nu = self.nu.unwrap_or(0.0);
        let mut eta = self.eta0 / multiplier_bound;
        let mut iterations = 0;

        for t in 0..self.max_iter {
            iterations = t + 1;

            let exp_theta: Vec<f64> = theta.iter().map(|v| v.exp()).collect();
            let denom = 1.0 + exp_theta.iter().sum::<f64>();
            let lambda: Vec<f64> = exp_theta.iter().map(|e| multiplier_bound * e / denom).collect();
            for (s, l) in lambda_sum.iter_mut().zip(&lambda) {
                *s += l;
            }
            let lambda_eg: Vec<f64> = lambda_sum.iter().map(|s| s / (t + 1) as f64).collect();

            let h_idx = lagrangian.best_h(&lambda)?;

            if t == 0 {
                if self.nu.is_none() {
                    nu = ACCURACY_MUL * initial_error_spread(&lagrangian, h_idx, y)? / (n as f64).sqrt();
                }
                tracing::debug!(nu, eta, bound = multiplier_bound, "exponentiated gradient started");
            }

            if q_sum.len() <= h_idx {
                q_sum.resize(h_idx + 1, 0.0);
            }
            q_sum[h_idx] += 1.0;
            let total: f64 = q_sum.iter().sum();
            let q_eg: Vec<f64> = q_sum.iter().map(|c| c / total).collect();

            let gap_eg = lagrangian.eval_gap(&q_eg, &lambda_eg, nu)?.gap();
            gaps_eg.push(gap_eg);

            let step = if t > 0 && self.run_linprog_step {
                Some(lagrangian.solve_linprog(nu)?)
            } else {
                None
            };
            let gap = match step {
                Some(step) if step.gap <= gap_eg => {
                    linprog_steps += 1;
                    qs.push(step.q);
                    step.gap
                }
                _ => {
                    qs.push(q_eg);
                    gap_eg
                }
            };
            gaps.push(gap);
            tracing::trace!(t, gap, gap_eg, hypotheses = lagrangian.hypotheses.len(), "iteration");

            if gap < nu && t >= MIN_ITER {
                break;
            }

            if t as f64 >= last_regret_checked as f64 * REGRET_CHECK_INCREASE_T {
                let best_gap = gaps_eg.iter().copied().fold(f64::INFINITY, f64::min);
                if best_gap > last_gap * SHRINK_REGRET {
                    eta *= SHRINK_ETA;
                }
                last_regret_checked = t;
                last_gap = best_gap;
            }

            let gamma = &lagrangian.hypotheses[h_idx].gamma;
            for ((th, g), b) in theta.iter_mut().zip(gamma).zip(&bound) {
                *th += eta * (g - b);
            }
        }

        let min_gap = gaps.iter().copied().fold(f64::INFINITY, f64::min);
        let best_iter = gaps
            .iter()
            .rposition(|g| *g <= min_gap + PRECISION)
            .ok_or_else(|| AuditorError::training("exponentiated gradient ran zero iterations"))?;
        let best_gap = gaps[best_iter];
        let mut weights = qs.swap_remove(best_iter);
        weights.resize(lagrangian.hypotheses.len(), 0.0);

        let diagnostics = ReductionDiagnostics {
            iterations,
            best_iter,
            best_gap,
            oracle_calls: lagrangian.oracle_calls,
            n_hypotheses: lagrangian.hypotheses.len(),
            linprog_steps,
            nu,
        };
        tracing::info!(
            iterations,
            best_iter,
            best_gap,
            oracle_calls = diagnostics.oracle_calls,
            hypotheses = diagnostics.n_hypotheses,
            linprog_steps,
            "exponentiated gradient finished"
        );

        // keep only hypotheses that carry weight
        let (predictors, weights): (Vec<_>, Vec<_>) = lagrangian
            .hypotheses
            .into_iter()
            .zip(weights)
            .filter(|(_, w)| *w > 0.0)
            .map(|(h, w)| (h.tree, w))
            .unzip();

        Ok(MitigatedModel { predictors, weights, seed: self.seed, diagnostics })
    }
}

/// Sample standard deviation of `|h(X) - y|` for the first best response.
fn initial_error_spread<C: Constraint>(lagrangian: &Lagrangian<'_, C>, h_idx: usize, y: &[usize]) -> Result<f64> {
    let predictions = lagrangian.hypotheses[h_idx].tree.predict(lagrangian.x)?;
    let diffs: Vec<f64> = predictions
        .iter()
        .zip(y)
        .map(|(&p, &t)| (p as f64 - t as f64).abs())
        .collect();
    let n = diffs.len() as f64;
    if n < 2.0 {
        return Ok(0.0);
    }
    let mean = diffs.iter().sum::<f64>() / n;
    let var = diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Ok(var.sqrt())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl MitigatedModel {
    pub fn n_predictors(&self) -> usize {
        self.predictors.len()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Probability that the mixture predicts 1 for each row.
    pub fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let total: f64 = self.weights.iter().sum();
        if self.predictors.is_empty() || total <= 0.0 {
            return Err(AuditorError::training("mitigated model has no weighted predictors"));
        }

        let mut proba = vec![0.0; x.n_rows()];
        for (tree, weight) in self.predictors.iter().zip(&self.weights) {
            for (p, label) in proba.iter_mut().zip(tree.predict(x)?) {
                *p += weight / total * label as f64;
            }
        }
        Ok(proba)
    }

    /// Draw a hard prediction per row from the mixture.
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        let mut rng = rng_from(self.seed);
        Ok(proba
            .into_iter()
            .map(|p| usize::from(rng.gen::<f64>() < p))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::proxy_dataset;

    fn selection_gap(pred: &[usize], groups: &[String]) -> f64 {
        let rate = |g: &str| {
            let sel: Vec<usize> = pred
                .iter()
                .zip(groups)
                .filter(|(_, grp)| grp.as_str() == g)
                .map(|(p, _)| *p)
                .collect();
            sel.iter().sum::<usize>() as f64 / sel.len() as f64
        };
        (rate("Male") - rate("Female")).abs()
    }

    fn two_group_problem() -> (FeatureMatrix, Vec<usize>, DemographicParity) {
        let x = FeatureMatrix::from_vec(4, 1, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let groups: Vec<String> = ["a", "a", "b", "b"].iter().map(|s| s.to_string()).collect();
        let dp = DemographicParity::new(&groups, 0.1).unwrap();
        (x, vec![0, 1, 0, 1], dp)
    }

    fn hypothesis(error: f64, gamma: Vec<f64>) -> Hypothesis {
        Hypothesis { tree: DecisionTreeClassifier::new(), error, gamma }
    }

    #[test]
    fn test_reduces_parity_gap_when_group_leaks_into_feature() {
        let ds = proxy_dataset(1500, 11);

        let mut baseline = DecisionTreeClassifier::new().with_max_depth(5);
        baseline.fit(&ds.features, &ds.labels, None).unwrap();
        let base_pred = baseline.predict(&ds.features).unwrap();
        let base_gap = selection_gap(&base_pred, &ds.groups);

        let eg = ExponentiatedGradient { seed: Some(5), ..Default::default() };
        let model = eg.fit(&ds.features, &ds.labels, &ds.groups).unwrap();
        let fair_pred = model.predict(&ds.features).unwrap();
        let fair_gap = selection_gap(&fair_pred, &ds.groups);

        assert!(base_gap > 0.3, "baseline gap {base_gap}");
        assert!(fair_gap < base_gap / 2.0, "mitigated gap {fair_gap} vs baseline {base_gap}");
        assert!(model.diagnostics.iterations >= 1);
        assert!(model.diagnostics.oracle_calls >= model.diagnostics.iterations);
        assert!(model.diagnostics.linprog_steps < model.diagnostics.iterations);
    }

    #[test]
    fn test_mixture_weights_normalised() {
        let ds = proxy_dataset(400, 2);
        let eg = ExponentiatedGradient { max_iter: 10, seed: Some(1), ..Default::default() };
        let model = eg.fit(&ds.features, &ds.labels, &ds.groups).unwrap();

        assert!(model.n_predictors() >= 1);
        assert!((model.weights().iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(model.weights().iter().all(|w| *w > 0.0));

        let proba = model.predict_proba(&ds.features).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0 + 1e-9).contains(p)));
    }

    #[test]
    fn test_without_linprog_step() {
        let ds = proxy_dataset(300, 8);
        let eg = ExponentiatedGradient { max_iter: 12, run_linprog_step: false, seed: Some(2), ..Default::default() };
        let model = eg.fit(&ds.features, &ds.labels, &ds.groups).unwrap();
        assert_eq!(model.diagnostics.linprog_steps, 0);
        assert!((model.weights().iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_seeded_prediction_is_reproducible() {
        let ds = proxy_dataset(300, 4);
        let eg = ExponentiatedGradient { max_iter: 8, seed: Some(99), ..Default::default() };
        let model = eg.fit(&ds.features, &ds.labels, &ds.groups).unwrap();
        assert_eq!(model.predict(&ds.features).unwrap(), model.predict(&ds.features).unwrap());
    }

    #[test]
    fn test_input_validation() {
        let ds = proxy_dataset(20, 1);
        let eg = ExponentiatedGradient::default();
        assert!(eg.fit(&ds.features, &ds.labels[..10], &ds.groups).is_err());

        let mut bad = ds.labels.clone();
        bad[0] = 2;
        assert!(eg.fit(&ds.features, &bad, &ds.groups).is_err());

        let zero_eps = ExponentiatedGradient { eps: 0.0, ..Default::default() };
        assert!(zero_eps.fit(&ds.features, &ds.labels, &ds.groups).is_err());

        let no_iterations = ExponentiatedGradient { max_iter: 0, ..Default::default() };
        let err = no_iterations.fit(&ds.features, &ds.labels, &ds.groups).unwrap_err();
        assert!(err.to_string().contains("max_iter"), "{err}");
    }

    #[test]
    fn test_eval_projects_multipliers() {
        let (x, y, dp) = two_group_problem();
        let mut lagrangian = Lagrangian::new(&x, &y, &dp, 10.0, 2);
        lagrangian.hypotheses.push(hypothesis(0.25, vec![0.1, -0.1, -0.1, 0.1]));

        // λ₊(a) and λ₋(a) cancel, so only the error remains
        let balanced = lagrangian.eval(&[1.0], &[0.5, 0.0, 0.5, 0.0]);
        assert!((balanced.lagrangian - 0.25).abs() < 1e-12);

        // net λ₊(a) = 1 charges γ₊(a) - bound = 0
        let net = lagrangian.eval(&[1.0], &[1.0, 0.0, 0.0, 0.0]);
        assert!((net.lagrangian - 0.25).abs() < 1e-12);
        assert_eq!(net.lagrangian_high, 0.25);
    }

    #[test]
    fn test_linprog_step_mixes_to_feasibility() {
        let (x, y, dp) = two_group_problem();
        let mut lagrangian = Lagrangian::new(&x, &y, &dp, 10.0, 2);
        // accurate but 0.2 over the bound on γ₊(a) and γ₋(b)
        lagrangian.hypotheses.push(hypothesis(0.1, vec![0.3, -0.3, -0.3, 0.3]));
        // inaccurate but exactly fair
        lagrangian.hypotheses.push(hypothesis(0.4, vec![0.0; 4]));

        let step = lagrangian.solve_linprog(0.0).unwrap();
        assert_eq!(step.n_hypotheses, 2);
        assert!((step.q[0] - 1.0 / 3.0).abs() < 1e-8, "q = {:?}", step.q);
        assert!((step.q[1] - 2.0 / 3.0).abs() < 1e-8, "q = {:?}", step.q);
        assert!((step.lambda[0] + step.lambda[3] - 1.0).abs() < 1e-8, "lambda = {:?}", step.lambda);
        assert!(step.gap >= 0.0);
    }

    #[test]
    fn test_gap_result() {
        let r = GapResult { lagrangian: 0.3, lagrangian_low: 0.25, lagrangian_high: 0.4 };
        assert!((r.gap() - 0.1).abs() < 1e-12);
    }
}
