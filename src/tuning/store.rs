use crate::error::SfResult;
use crate::tuning::Params;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TrialState {
    Complete,
    Pruned,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub study: String,
    pub number: usize,
    pub seed: u64,
    pub params: Params,
    pub state: TrialState,
    pub value: Option<f64>,
    #[serde(default)]
    pub intermediate: Vec<f64>,
}

impl TrialRecord {
    /// Finished trials whose value can guide the sampler.
    pub fn is_informative(&self) -> bool {
        self.state != TrialState::Failed && self.value.is_some()
    }
}

/// Append-only JSON Lines log of finished trials. Several studies can share
/// one file; records are told apart by study name.
#[derive(Debug, Clone, Default)]
pub struct TrialStore {
    path: Option<PathBuf>,
}

impl TrialStore {
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn at<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    pub fn load(&self, study: &str) -> SfResult<Vec<TrialRecord>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        let mut records = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let record: TrialRecord = serde_json::from_str(line)?;
            if record.study == study {
                records.push(record);
            }
        }
        records.sort_by_key(|r| r.number);
        Ok(records)
    }

    pub fn append(&self, record: &TrialRecord) -> SfResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }
}
