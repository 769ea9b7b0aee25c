use crate::tuning::store::TrialRecord;
use crate::tuning::{ParamSpec, Params};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Univariate Tree-structured Parzen Estimator.
///
/// Each parameter is sampled independently. Finished trials are split into
/// the best `gamma` fraction and the rest; candidates drawn from the "good"
/// density are ranked by the ratio of good to bad density.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TpeSampler {
    /// Trials sampled uniformly before the model kicks in.
    pub n_startup_trials: usize,
    pub n_ei_candidates: usize,
    pub gamma: f64,
    pub prior_weight: f64,
}

impl Default for TpeSampler {
    fn default() -> Self {
        Self {
            n_startup_trials: 10,
            n_ei_candidates: 24,
            gamma: 0.25,
            prior_weight: 1.0,
        }
    }
}

impl TpeSampler {
    pub fn sample(&self, space: &[ParamSpec], history: &[TrialRecord], rng: &mut StdRng) -> Params {
        space
            .iter()
            .map(|spec| {
                let value = self.sample_one(spec, history, rng);
                (spec.name.clone(), value)
            })
            .collect()
    }

    fn sample_one(&self, spec: &ParamSpec, history: &[TrialRecord], rng: &mut StdRng) -> f64 {
        // (value, trial number, parameter)
        let mut observed: Vec<(f64, usize, f64)> = history
            .iter()
            .filter(|r| r.is_informative())
            .filter_map(|r| Some((r.value?, r.number, *r.params.get(&spec.name)?)))
            .collect();

        if observed.len() < self.n_startup_trials.max(2) || spec.high <= spec.low {
            return spec.sample_uniform(rng);
        }

        // Equal values rank by trial number, so repeats of one point land in
        // the bad set once the good set is full.
        observed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let n_good = ((self.gamma * observed.len() as f64).ceil() as usize)
            .clamp(1, observed.len() - 1);
        let good: Vec<f64> = observed[..n_good].iter().map(|o| o.2).collect();
        let bad: Vec<f64> = observed[n_good..].iter().map(|o| o.2).collect();

        // Stepped parameters own half a step on either side of the bounds
        let half = spec.step.filter(|s| *s > 0.0).map_or(0.0, |s| s / 2.0);
        let (low, high) = (spec.low - half, spec.high + half);
        let l = Parzen::new(&good, low, high, self.prior_weight);
        let g = Parzen::new(&bad, low, high, self.prior_weight);

        let mut best = spec.sample_uniform(rng);
        let mut best_score = f64::NEG_INFINITY;
        for _ in 0..self.n_ei_candidates {
            let x = spec.snap(l.draw(rng));
            let score = l.log_pdf(x) - g.log_pdf(x);
            if score > best_score {
                best_score = score;
                best = x;
            }
        }
        best
    }
}

struct Kernel {
    mu: f64,
    sigma: f64,
    weight: f64,
}

/// Gaussian mixture with one kernel per observation plus a wide prior
/// kernel at the centre of the range.
struct Parzen {
    kernels: Vec<Kernel>,
    total_weight: f64,
    low: f64,
    high: f64,
}

impl Parzen {
    fn new(points: &[f64], low: f64, high: f64, prior_weight: f64) -> Self {
        let span = high - low;
        let prior_mu = 0.5 * (low + high);

        let mut mus: Vec<(f64, bool)> = points.iter().map(|&p| (p, false)).collect();
        mus.push((prior_mu, true));
        mus.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Each kernel is as wide as the larger gap to its neighbours
        let min_sigma = span / (points.len() as f64 + 1.0).min(100.0);
        let kernels: Vec<Kernel> = mus
            .iter()
            .enumerate()
            .map(|(i, &(mu, is_prior))| {
                if is_prior {
                    return Kernel {
                        mu,
                        sigma: span,
                        weight: prior_weight,
                    };
                }
                let left = mu - if i > 0 { mus[i - 1].0 } else { low };
                let right = if i + 1 < mus.len() { mus[i + 1].0 } else { high } - mu;
                Kernel {
                    mu,
                    sigma: left.max(right).clamp(min_sigma, span),
                    weight: 1.0,
                }
            })
            .collect();

        Self {
            total_weight: kernels.iter().map(|k| k.weight).sum(),
            kernels,
            low,
            high,
        }
    }

    fn draw(&self, rng: &mut StdRng) -> f64 {
        let mut pick = rng.gen::<f64>() * self.total_weight;
        let mut chosen = &self.kernels[0];
        for kernel in &self.kernels {
            chosen = kernel;
            if pick < kernel.weight {
                break;
            }
            pick -= kernel.weight;
        }

        let Ok(normal) = Normal::new(chosen.mu, chosen.sigma) else {
            return chosen.mu.clamp(self.low, self.high);
        };
        for _ in 0..16 {
            let x = normal.sample(rng);
            if (self.low..=self.high).contains(&x) {
                return x;
            }
        }
        chosen.mu.clamp(self.low, self.high)
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let density: f64 = self
            .kernels
            .iter()
            .map(|k| {
                let z = (x - k.mu) / k.sigma;
                k.weight * (-0.5 * z * z).exp() / (k.sigma * (2.0 * PI).sqrt())
            })
            .sum();
        (density / self.total_weight).max(f64::MIN_POSITIVE).ln()
    }
}
