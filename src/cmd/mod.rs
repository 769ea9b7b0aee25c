pub mod evaluate;
pub mod heuristic;
pub mod search;
pub mod tune;

use siteforge::config::Config;
use siteforge::scorer::Scorer;
use std::path::PathBuf;
use std::sync::Arc;

/// Inputs shared by every subcommand once data is loaded.
pub struct Context {
    pub config: Config,
    pub scorer: Arc<Scorer>,
    pub results_dir: PathBuf,
}
