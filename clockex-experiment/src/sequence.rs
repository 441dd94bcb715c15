use std::fs;
use std::path::Path;

use clockex_core::{Group, RunType, TrialMode, TrialSpec};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// The ordered trial lists a run draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialSequences {
    /// Short list for equipment checks.
    pub check: Vec<TrialSpec>,
    pub a: Vec<TrialSpec>,
    pub b: Vec<TrialSpec>,
}

impl TrialSequences {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let sequences: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(
            check = sequences.check.len(),
            a = sequences.a.len(),
            b = sequences.b.len(),
            "[Config] Loaded trial sequences from {:?}",
            path
        );
        Ok(sequences)
    }

    /// Check runs always use the check list. Main runs alternate between the
    /// group's own list on odd sets and the other group's list on even sets.
    pub fn select(&self, run_type: RunType, group: Group, set_index: u32) -> &[TrialSpec] {
        if run_type == RunType::Check {
            return &self.check;
        }
        let group = if set_index % 2 == 1 { group } else { group.other() };
        match group {
            Group::A => &self.a,
            Group::B => &self.b,
        }
    }
}

impl Default for TrialSequences {
    fn default() -> Self {
        use TrialMode::*;
        let trial = |time: &str, mode, question: &str| TrialSpec::new(time, mode, question);
        Self {
            check: vec![
                trial("10:15:30", Uniform, "What time was shown?"),
                trial("07:42:09", SecondsEmphasized, "How many seconds were shown?"),
            ],
            a: vec![
                trial("09:05:17", Uniform, "What time was shown?"),
                trial("14:38:52", MinutesEmphasized, "How many minutes were shown?"),
                trial("23:59:58", SecondsEmphasized, "How many seconds were shown?"),
                trial("06:21:44", MinutesEmphasized, "How many minutes were shown?"),
            ],
            b: vec![
                trial("11:47:03", SecondsEmphasized, "How many seconds were shown?"),
                trial("03:12:39", Uniform, "What time was shown?"),
                trial("18:56:21", MinutesEmphasized, "How many minutes were shown?"),
                trial("12:00:59", SecondsEmphasized, "How many seconds were shown?"),
            ],
        }
    }
}
