use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::f64::consts::PI;
use tracing::debug;

use crate::error::{RegimeError, Result};
use crate::ml::kmeans::KMeans;

/// Outcome of a Baum-Welch fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    pub log_likelihood: f64,
    pub n_iter: usize,
    pub converged: bool,
}

/// Hidden Markov Model with multivariate Gaussian emissions and one full
/// covariance matrix per state. State ids are unordered.
#[derive(Debug, Clone)]
pub struct GaussianHMM {
    pub n_states: usize,
    pub n_features: usize,
    /// State transition matrix (n_states x n_states), rows sum to 1
    pub transition: Array2<f64>,
    pub start_prob: Array1<f64>,
    /// Mean vector per state (n_states x n_features)
    pub means: Array2<f64>,
    /// Covariance matrix per state (n_features x n_features)
    pub covars: Vec<Array2<f64>>,
    /// Diagonal floor added to every covariance estimate
    pub min_covar: f64,
    /// Seed for the k-means initialisation
    pub seed: u64,
    // Cholesky factors and log-determinants of `covars`
    chol: Vec<Array2<f64>>,
    log_dets: Vec<f64>,
}

impl GaussianHMM {
    /// Create an untrained model: uniform start, self-persistent transitions,
    /// zero means, identity covariances.
    pub fn new(n_states: usize, n_features: usize) -> Self {
        let start_prob = Array1::from_elem(n_states, 1.0 / n_states as f64);

        let mut transition = if n_states > 1 {
            Array2::from_elem((n_states, n_states), 0.5 / (n_states - 1) as f64)
        } else {
            Array2::from_elem((n_states, n_states), 0.0)
        };
        for i in 0..n_states {
            // Slightly prefer staying in the same state
            transition[[i, i]] = if n_states > 1 { 0.5 } else { 1.0 };
        }

        let covars = vec![Array2::eye(n_features); n_states];

        Self {
            n_states,
            n_features,
            transition,
            start_prob,
            means: Array2::zeros((n_states, n_features)),
            chol: covars.clone(),
            log_dets: vec![0.0; n_states],
            covars,
            min_covar: 1e-3,
            seed: 42,
        }
    }

    pub fn with_min_covar(mut self, min_covar: f64) -> Self {
        self.min_covar = min_covar;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Seed means and covariances from a k-means partition of the data.
    pub fn init_with_kmeans(&mut self, observations: &Array2<f64>) -> Result<()> {
        self.check_shape(observations)?;

        let fit = KMeans::new(self.n_states)
            .with_seed(self.seed)
            .fit(observations)?;
        self.means.assign(&fit.centroids);

        let global = covariance(observations, observations.mean_axis(Axis(0)).as_ref(), None);
        for state in 0..self.n_states {
            let members: Vec<usize> = fit
                .labels
                .iter()
                .enumerate()
                .filter(|&(_, &label)| label == state)
                .map(|(i, _)| i)
                .collect();

            let mut cov = if members.len() >= 2 {
                let subset = observations.select(Axis(0), &members);
                covariance(&subset, Some(&self.means.row(state).to_owned()), None)
            } else {
                global.clone()
            };
            for j in 0..self.n_features {
                cov[[j, j]] += self.min_covar;
            }
            self.covars[state] = cov;
        }

        self.refresh_factors()
    }

    /// Log density of every observation under every state (n_obs x n_states).
    pub fn log_emissions(&self, observations: &Array2<f64>) -> Array2<f64> {
        let n_obs = observations.nrows();
        let mut log_b = Array2::zeros((n_obs, self.n_states));
        let log_norm = self.n_features as f64 * (2.0 * PI).ln();

        for (t, obs) in observations.rows().into_iter().enumerate() {
            for state in 0..self.n_states {
                let mahal = self.mahalanobis(obs, state);
                log_b[[t, state]] = -0.5 * (log_norm + self.log_dets[state] + mahal);
            }
        }
        log_b
    }

    /// Forward pass in log space. Returns (log_alpha, total log-likelihood).
    pub fn forward(&self, log_b: &Array2<f64>) -> (Array2<f64>, f64) {
        let n_obs = log_b.nrows();
        let mut log_alpha = Array2::from_elem((n_obs, self.n_states), f64::NEG_INFINITY);

        for state in 0..self.n_states {
            log_alpha[[0, state]] = self.start_prob[state].ln() + log_b[[0, state]];
        }

        let mut terms = vec![0.0; self.n_states];
        for t in 1..n_obs {
            for j in 0..self.n_states {
                for (i, term) in terms.iter_mut().enumerate() {
                    *term = log_alpha[[t - 1, i]] + self.transition[[i, j]].ln();
                }
                log_alpha[[t, j]] = log_sum_exp(&terms) + log_b[[t, j]];
            }
        }

        let log_prob = log_sum_exp(&log_alpha.row(n_obs - 1).to_vec());
        (log_alpha, log_prob)
    }

    fn backward(&self, log_b: &Array2<f64>) -> Array2<f64> {
        let n_obs = log_b.nrows();
        let mut log_beta = Array2::from_elem((n_obs, self.n_states), f64::NEG_INFINITY);
        log_beta.row_mut(n_obs - 1).fill(0.0);

        let mut terms = vec![0.0; self.n_states];
        for t in (0..n_obs - 1).rev() {
            for i in 0..self.n_states {
                for (j, term) in terms.iter_mut().enumerate() {
                    *term = self.transition[[i, j]].ln() + log_b[[t + 1, j]] + log_beta[[t + 1, j]];
                }
                log_beta[[t, i]] = log_sum_exp(&terms);
            }
        }

        log_beta
    }

    /// Train with Baum-Welch EM, stopping when the log-likelihood gain drops
    /// below `tol` or after `max_iter` iterations.
    pub fn fit(&mut self, observations: &Array2<f64>, max_iter: usize, tol: f64) -> Result<FitReport> {
        self.check_shape(observations)?;

        let n_obs = observations.nrows();
        if n_obs < 2 {
            return Err(RegimeError::InsufficientData(
                "need at least 2 observations".to_string(),
            ));
        }

        self.init_with_kmeans(observations)?;

        let mut prev_log_prob = f64::NEG_INFINITY;

        for iteration in 0..max_iter {
            // E-step
            let log_b = self.log_emissions(observations);
            let (log_alpha, log_prob) = self.forward(&log_b);
            if !log_prob.is_finite() {
                return Err(RegimeError::Numerical(format!(
                    "log-likelihood became {} at iteration {}",
                    log_prob,
                    iteration + 1
                )));
            }

            if (log_prob - prev_log_prob).abs() < tol {
                debug!(iteration = iteration + 1, log_prob, "HMM converged");
                return Ok(FitReport {
                    log_likelihood: log_prob,
                    n_iter: iteration + 1,
                    converged: true,
                });
            }
            prev_log_prob = log_prob;

            let log_beta = self.backward(&log_b);

            // State occupation probabilities
            let mut gamma = Array2::<f64>::zeros((n_obs, self.n_states));
            for t in 0..n_obs {
                for state in 0..self.n_states {
                    gamma[[t, state]] = (log_alpha[[t, state]] + log_beta[[t, state]] - log_prob).exp();
                }
            }

            // Expected transition counts
            let mut xi_sum = Array2::<f64>::zeros((self.n_states, self.n_states));
            for t in 0..n_obs - 1 {
                for i in 0..self.n_states {
                    for j in 0..self.n_states {
                        let log_xi = log_alpha[[t, i]]
                            + self.transition[[i, j]].ln()
                            + log_b[[t + 1, j]]
                            + log_beta[[t + 1, j]]
                            - log_prob;
                        xi_sum[[i, j]] += log_xi.exp();
                    }
                }
            }

            // M-step
            self.start_prob.assign(&gamma.row(0));

            for i in 0..self.n_states {
                let row_sum: f64 = xi_sum.row(i).sum();
                if row_sum > 0.0 {
                    for j in 0..self.n_states {
                        self.transition[[i, j]] = xi_sum[[i, j]] / row_sum;
                    }
                }
            }

            for state in 0..self.n_states {
                let weights = gamma.column(state);
                let gamma_sum: f64 = weights.sum();
                if gamma_sum <= 1e-10 {
                    continue;
                }

                let mean = observations.t().dot(&weights) / gamma_sum;
                let mut cov = covariance(observations, Some(&mean), Some(weights));
                for j in 0..self.n_features {
                    cov[[j, j]] += self.min_covar;
                }
                self.means.row_mut(state).assign(&mean);
                self.covars[state] = cov;
            }
            self.refresh_factors()?;
        }

        Ok(FitReport {
            log_likelihood: prev_log_prob,
            n_iter: max_iter,
            converged: false,
        })
    }

    /// Most likely state sequence (Viterbi).
    pub fn predict(&self, observations: &Array2<f64>) -> Result<Vec<usize>> {
        self.check_shape(observations)?;

        let n_obs = observations.nrows();
        if n_obs == 0 {
            return Ok(Vec::new());
        }

        let log_b = self.log_emissions(observations);
        let mut log_delta = Array2::from_elem((n_obs, self.n_states), f64::NEG_INFINITY);
        let mut psi = Array2::<usize>::zeros((n_obs, self.n_states));

        for state in 0..self.n_states {
            log_delta[[0, state]] = self.start_prob[state].ln() + log_b[[0, state]];
        }

        for t in 1..n_obs {
            for j in 0..self.n_states {
                let mut max_val = f64::NEG_INFINITY;
                let mut max_state = 0;

                for i in 0..self.n_states {
                    let val = log_delta[[t - 1, i]] + self.transition[[i, j]].ln();
                    if val > max_val {
                        max_val = val;
                        max_state = i;
                    }
                }

                log_delta[[t, j]] = max_val + log_b[[t, j]];
                psi[[t, j]] = max_state;
            }
        }

        // Backtracking
        let mut states = vec![0; n_obs];
        let mut max_val = f64::NEG_INFINITY;
        for state in 0..self.n_states {
            if log_delta[[n_obs - 1, state]] > max_val {
                max_val = log_delta[[n_obs - 1, state]];
                states[n_obs - 1] = state;
            }
        }

        for t in (0..n_obs - 1).rev() {
            states[t] = psi[[t + 1, states[t + 1]]];
        }

        Ok(states)
    }

    fn check_shape(&self, observations: &Array2<f64>) -> Result<()> {
        if observations.ncols() != self.n_features {
            return Err(RegimeError::Numerical(format!(
                "observation features mismatch: expected {}, got {}",
                self.n_features,
                observations.ncols()
            )));
        }
        Ok(())
    }

    fn refresh_factors(&mut self) -> Result<()> {
        for state in 0..self.n_states {
            let l = cholesky(&self.covars[state]).ok_or_else(|| {
                RegimeError::Numerical(format!("covariance of state {} is not positive definite", state))
            })?;
            self.log_dets[state] = 2.0 * l.diag().iter().map(|d| d.ln()).sum::<f64>();
            self.chol[state] = l;
        }
        Ok(())
    }

    /// (x - mu)^T Sigma^-1 (x - mu) via forward substitution on L.
    fn mahalanobis(&self, obs: ArrayView1<f64>, state: usize) -> f64 {
        let l = &self.chol[state];
        let mut y = vec![0.0; self.n_features];
        for i in 0..self.n_features {
            let mut sum = obs[i] - self.means[[state, i]];
            for k in 0..i {
                sum -= l[[i, k]] * y[k];
            }
            y[i] = sum / l[[i, i]];
        }
        y.iter().map(|v| v * v).sum()
    }
}

/// Lower-triangular L with `L L^T = matrix`, or `None` when the matrix is
/// not positive definite.
fn cholesky(matrix: &Array2<f64>) -> Option<Array2<f64>> {
    let n = matrix.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let mut diag = matrix[[j, j]];
        for k in 0..j {
            diag -= l[[j, k]] * l[[j, k]];
        }
        if !(diag > 0.0 && diag.is_finite()) {
            return None;
        }
        l[[j, j]] = diag.sqrt();
        for i in j + 1..n {
            let mut sum = matrix[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            l[[i, j]] = sum / l[[j, j]];
        }
    }
    Some(l)
}

/// Covariance of the rows around `mean`, optionally weighted. Unweighted
/// estimates divide by n.
fn covariance(
    data: &Array2<f64>,
    mean: Option<&Array1<f64>>,
    weights: Option<ArrayView1<f64>>,
) -> Array2<f64> {
    let d = data.ncols();
    let mut cov = Array2::zeros((d, d));
    let Some(mean) = mean else {
        return cov;
    };

    let mut total = 0.0;
    for (t, row) in data.rows().into_iter().enumerate() {
        let w = weights.as_ref().map_or(1.0, |w| w[t]);
        let diff = &row - mean;
        for i in 0..d {
            for j in 0..d {
                cov[[i, j]] += w * diff[i] * diff[j];
            }
        }
        total += w;
    }
    if total > 0.0 {
        cov /= total;
    }
    cov
}

/// Log-sum-exp trick for numerical stability
fn log_sum_exp(log_values: &[f64]) -> f64 {
    if log_values.is_empty() {
        return f64::NEG_INFINITY;
    }

    let max_val = log_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }

    let sum_exp: f64 = log_values.iter().map(|&v| (v - max_val).exp()).sum();
    max_val + sum_exp.ln()
}
