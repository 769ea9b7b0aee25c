use crate::selection::Selection;
use clap::ValueEnum;
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CrossoverKind {
    #[default]
    Uniform,
    OnePoint,
}

impl CrossoverKind {
    pub fn apply(
        self,
        a: &Selection,
        b: &Selection,
        indpb: f64,
        max_active: usize,
        rng: &mut Rng,
    ) -> (Selection, Selection) {
        match self {
            CrossoverKind::Uniform => crossover_uniform(a, b, indpb, max_active, rng),
            CrossoverKind::OnePoint => crossover_one_point(a, b, max_active, rng),
        }
    }
}

/// Swaps each gene between the parents with probability `indpb`.
/// Children over budget are repaired.
pub fn crossover_uniform(
    a: &Selection,
    b: &Selection,
    indpb: f64,
    max_active: usize,
    rng: &mut Rng,
) -> (Selection, Selection) {
    let len = a.len().min(b.len());
    let mut genes_a = Vec::with_capacity(len);
    let mut genes_b = Vec::with_capacity(len);

    for i in 0..len {
        let (ga, gb) = (a.is_active(i), b.is_active(i));
        if rng.f64() < indpb {
            genes_a.push(gb);
            genes_b.push(ga);
        } else {
            genes_a.push(ga);
            genes_b.push(gb);
        }
    }

    finish(genes_a, genes_b, max_active, rng)
}

/// Exchanges the tails after a cut point in `[1, len - 1]`.
pub fn crossover_one_point(
    a: &Selection,
    b: &Selection,
    max_active: usize,
    rng: &mut Rng,
) -> (Selection, Selection) {
    let len = a.len().min(b.len());
    if len < 2 {
        return (a.clone(), b.clone());
    }
    let cut = rng.usize(1..len);

    let genes_a: Vec<bool> = a.genes()[..cut]
        .iter()
        .chain(&b.genes()[cut..len])
        .copied()
        .collect();
    let genes_b: Vec<bool> = b.genes()[..cut]
        .iter()
        .chain(&a.genes()[cut..len])
        .copied()
        .collect();

    finish(genes_a, genes_b, max_active, rng)
}

fn finish(
    genes_a: Vec<bool>,
    genes_b: Vec<bool>,
    max_active: usize,
    rng: &mut Rng,
) -> (Selection, Selection) {
    let mut child_a = Selection::from_genes(genes_a);
    let mut child_b = Selection::from_genes(genes_b);
    child_a.repair(max_active, rng);
    child_b.repair(max_active, rng);
    (child_a, child_b)
}
