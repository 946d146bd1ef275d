//! Gaussian mixture refinement of slice offsets
//!
//! Across the staves of a system, the offset of the i-th key slice (from measure start)
//! should be the same. Observed offsets are noisy and some staves miss slices, so the
//! per-index means are refined by expectation-maximization over a 1-D mixture, one
//! component per slice index, all with unit variance.
//!
//! # Algorithm
//!
//! - **E-step**: responsibility of component k for value v is proportional to
//!   `w_k * exp(-(v - m_k)^2 / 2)`, normalized with log-sum-exp
//! - **M-step**: `m_k` becomes the responsibility-weighted mean of the values, `w_k` the
//!   mean responsibility
//!
//! Iterations stop when no mean moves by more than a tiny epsilon.

/// Numerical stability epsilon
const EPSILON: f64 = 1e-10;

/// Mean displacement below which the fit is considered converged
const CONVERGENCE: f64 = 1e-6;

/// Result of a mixture fit
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureFit {
    /// Component means
    pub means: Vec<f64>,

    /// Component weights (sum to 1.0)
    pub weights: Vec<f64>,

    /// Iterations run
    pub iterations: usize,
}

/// Refine `initial_means` against `values` with a unit-variance Gaussian mixture
///
/// # Arguments
///
/// * `values` - Observed values
/// * `initial_means` - One starting mean per component
/// * `max_iterations` - Upper bound on EM iterations
///
/// # Returns
///
/// The refined means, in component order. With no value or no component, the initial
/// means are returned unchanged. A component that ends up responsible for nothing keeps
/// its previous mean.
///
/// # Example
///
/// ```
/// use stave_keysig::features::key::mixture::fit_means;
///
/// let fit = fit_means(&[40.0, 41.0, 62.0, 61.0], &[39.0, 63.0], 50);
/// assert!((fit.means[0] - 40.5).abs() < 1e-6);
/// assert!((fit.means[1] - 61.5).abs() < 1e-6);
/// ```
pub fn fit_means(values: &[f64], initial_means: &[f64], max_iterations: usize) -> MixtureFit {
    let k = initial_means.len();
    let mut means = initial_means.to_vec();
    let mut weights = vec![if k > 0 { 1.0 / k as f64 } else { 0.0 }; k];

    if values.is_empty() || k == 0 {
        return MixtureFit {
            means,
            weights,
            iterations: 0,
        };
    }

    let n = values.len() as f64;
    let mut responsibilities = vec![vec![0.0; k]; values.len()];
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        // E-step
        for (v, resp) in values.iter().zip(responsibilities.iter_mut()) {
            for (j, r) in resp.iter_mut().enumerate() {
                let d = v - means[j];
                *r = weights[j].max(EPSILON).ln() - 0.5 * d * d;
            }

            let max_log = resp.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let sum: f64 = resp.iter().map(|r| (r - max_log).exp()).sum();
            let log_norm = max_log + sum.ln();

            for r in resp.iter_mut() {
                *r = (*r - log_norm).exp();
            }
        }

        // M-step
        let mut shift: f64 = 0.0;

        for j in 0..k {
            let total: f64 = responsibilities.iter().map(|r| r[j]).sum();
            weights[j] = total / n;

            if total > EPSILON {
                let mean = values
                    .iter()
                    .zip(responsibilities.iter())
                    .map(|(v, r)| v * r[j])
                    .sum::<f64>()
                    / total;
                shift = shift.max((mean - means[j]).abs());
                means[j] = mean;
            }
        }

        if shift < CONVERGENCE {
            break;
        }
    }

    log::debug!("Mixture fit in {} iterations: {:?}", iterations, means);

    MixtureFit {
        means,
        weights,
        iterations,
    }
}
