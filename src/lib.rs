pub mod config;
pub mod error;
pub mod geometry;
pub mod heuristics;
pub mod optimizer;
pub mod population;
pub mod reachability;
pub mod results;
pub mod scorer;
pub mod selection;
pub mod tuning;
