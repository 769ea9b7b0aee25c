//! Generational genetic search over site selections.

pub mod crossover;
pub mod initialization;
pub mod mutation;
pub mod runner;
pub mod tournament;

pub use self::runner::{
    GaOptions, GenerationStats, NoProgress, OptimizationResult, Optimizer, PenaltyParams,
    ProgressCallback,
};
