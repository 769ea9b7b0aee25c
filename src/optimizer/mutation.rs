use crate::selection::Selection;
use clap::ValueEnum;
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// How mutation keeps a selection within its activation budget.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MutationGuard {
    /// A 0 -> 1 flip only happens while the budget has room.
    #[default]
    GuardOnFlip,
    /// Flip freely, then repair.
    RepairAfter,
}

/// Flips each gene with probability `rate`. Returns the number of flips
/// applied (repair removals are not counted).
pub fn mutate(
    sel: &mut Selection,
    rate: f64,
    max_active: usize,
    guard: MutationGuard,
    rng: &mut Rng,
) -> usize {
    let mut active = sel.active_count();
    let mut flips = 0;

    for i in 0..sel.len() {
        if rng.f64() >= rate {
            continue;
        }
        if sel.is_active(i) {
            sel.set(i, false);
            active -= 1;
            flips += 1;
        } else if guard == MutationGuard::RepairAfter || active < max_active {
            sel.set(i, true);
            active += 1;
            flips += 1;
        }
    }

    if guard == MutationGuard::RepairAfter {
        sel.repair(max_active, rng);
    }
    flips
}
