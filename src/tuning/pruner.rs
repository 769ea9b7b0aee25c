use serde::{Deserialize, Serialize};

/// Stops a trial whose best value so far is worse than the median of what
/// earlier trials had reached at the same step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MedianPruner {
    /// Finished trials required before anything is pruned.
    pub n_startup_trials: usize,
    /// Steps every trial is allowed to run unconditionally.
    pub n_warmup_steps: usize,
}

impl Default for MedianPruner {
    fn default() -> Self {
        Self {
            n_startup_trials: 5,
            n_warmup_steps: 10,
        }
    }
}

impl MedianPruner {
    /// `curve` holds the trial's reported values for steps `0..=step`;
    /// `others` the curves of finished trials. Lower values are better.
    pub fn should_prune(&self, curve: &[f64], others: &[&[f64]]) -> bool {
        let Some(step) = curve.len().checked_sub(1) else {
            return false;
        };
        if step < self.n_warmup_steps || others.len() < self.n_startup_trials {
            return false;
        }

        let mut reference: Vec<f64> = others
            .iter()
            .filter(|c| c.len() > step)
            .map(|c| best_of(&c[..=step]))
            .collect();
        if reference.is_empty() {
            return false;
        }
        reference.sort_by(f64::total_cmp);
        let mid = reference.len() / 2;
        let median = if reference.len() % 2 == 0 {
            (reference[mid - 1] + reference[mid]) / 2.0
        } else {
            reference[mid]
        };

        best_of(curve) > median
    }
}

fn best_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}
