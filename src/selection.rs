use crate::error::{SfResult, SiteForgeError};
use fastrand::Rng;
use serde::{Deserialize, Serialize};

/// A chromosome: one gene per candidate, `true` meaning the site is active.
///
/// Fitness is cached and dropped whenever a gene changes. Equality looks at
/// genes only. Serializes as a `[0, 1, ...]` bit vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Selection {
    genes: Vec<bool>,
    fitness: Option<f64>,
}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.genes == other.genes
    }
}

impl Eq for Selection {}

impl TryFrom<Vec<u8>> for Selection {
    type Error = String;

    fn try_from(bits: Vec<u8>) -> Result<Self, Self::Error> {
        let genes = bits
            .into_iter()
            .map(|b| match b {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(format!("gene must be 0 or 1, got {}", other)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_genes(genes))
    }
}

impl From<Selection> for Vec<u8> {
    fn from(sel: Selection) -> Self {
        sel.to_bits()
    }
}

impl Selection {
    pub fn zeros(len: usize) -> Self {
        Self::from_genes(vec![false; len])
    }

    pub fn from_genes(genes: Vec<bool>) -> Self {
        Self {
            genes,
            fitness: None,
        }
    }

    pub fn from_indices(len: usize, active: &[usize]) -> SfResult<Self> {
        let mut sel = Self::zeros(len);
        for &i in active {
            if i >= len {
                return Err(SiteForgeError::Validation(format!(
                    "Active index {} out of range for {} candidates",
                    i, len
                )));
            }
            sel.genes[i] = true;
        }
        Ok(sel)
    }

    /// Exactly `max_active` genes set, drawn uniformly without replacement.
    pub fn create_random(rng: &mut Rng, len: usize, max_active: usize) -> SfResult<Self> {
        if max_active > len {
            return Err(SiteForgeError::Config(format!(
                "Cannot activate {} sites out of {} candidates",
                max_active, len
            )));
        }
        // Partial Fisher-Yates over the index pool
        let mut pool: Vec<usize> = (0..len).collect();
        let mut sel = Self::zeros(len);
        for k in 0..max_active {
            let pick = rng.usize(k..len);
            pool.swap(k, pick);
            sel.genes[pool[k]] = true;
        }
        Ok(sel)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn genes(&self) -> &[bool] {
        &self.genes
    }

    #[inline(always)]
    pub fn is_active(&self, idx: usize) -> bool {
        self.genes[idx]
    }

    pub fn set(&mut self, idx: usize, active: bool) {
        if self.genes[idx] != active {
            self.genes[idx] = active;
            self.fitness = None;
        }
    }

    pub fn active_count(&self) -> usize {
        self.genes.iter().filter(|&&g| g).count()
    }

    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.genes
            .iter()
            .enumerate()
            .filter_map(|(i, &g)| g.then_some(i))
    }

    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    pub fn to_bits(&self) -> Vec<u8> {
        self.genes.iter().map(|&g| g as u8).collect()
    }

    pub fn is_feasible(&self, max_active: usize) -> bool {
        self.active_count() <= max_active
    }

    pub fn distance_to_feasible(&self, max_active: usize) -> usize {
        self.active_count().saturating_sub(max_active)
    }

    /// Clears uniformly chosen active genes until the budget holds.
    /// Returns how many genes were cleared.
    pub fn repair(&mut self, max_active: usize, rng: &mut Rng) -> usize {
        let mut active: Vec<usize> = self.active_indices().collect();
        let mut cleared = 0;
        while active.len() > max_active {
            let victim = active.swap_remove(rng.usize(..active.len()));
            self.genes[victim] = false;
            cleared += 1;
        }
        if cleared > 0 {
            self.fitness = None;
        }
        cleared
    }
}
