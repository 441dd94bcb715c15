use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// `check` runs exercise the equipment with a short fixed list; `main` runs
/// are the counterbalanced experiment proper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    #[default]
    Check,
    Main,
}

impl FromStr for RunType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "check" => Ok(RunType::Check),
            "main" => Ok(RunType::Main),
            _ => Err(ParseError::UnknownRunType(s.to_string())),
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunType::Check => "check",
            RunType::Main => "main",
        })
    }
}

/// Counterbalancing group assigned to a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Group {
    #[default]
    A,
    B,
}

impl Group {
    pub fn other(&self) -> Self {
        match self {
            Group::A => Group::B,
            Group::B => Group::A,
        }
    }
}

impl FromStr for Group {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Group::A),
            "B" | "b" => Ok(Group::B),
            _ => Err(ParseError::UnknownGroup(s.to_string())),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Group::A => "A",
            Group::B => "B",
        })
    }
}

/// Label attached to every artifact of a run: `check`, `A` or `B`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunLabel {
    #[serde(rename = "check")]
    Check,
    A,
    B,
}

impl RunLabel {
    /// Check runs ignore the group entirely.
    pub fn for_run(run_type: RunType, group: Group) -> Self {
        match (run_type, group) {
            (RunType::Check, _) => RunLabel::Check,
            (RunType::Main, Group::A) => RunLabel::A,
            (RunType::Main, Group::B) => RunLabel::B,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunLabel::Check => "check",
            RunLabel::A => "A",
            RunLabel::B => "B",
        }
    }
}

impl fmt::Display for RunLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multi-set progress of one run. Lives in memory for the duration of the
/// process only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// 1-based.
    pub set_index: u32,
    pub total_sets: u32,
    pub all_sets_done: bool,
}

impl RunState {
    pub fn new(total_sets: u32) -> Self {
        Self {
            set_index: 1,
            total_sets: total_sets.max(1),
            all_sets_done: false,
        }
    }

    pub fn is_last_set(&self) -> bool {
        self.set_index >= self.total_sets
    }

    /// Moves to the next set, or marks the run done when the current set was
    /// the last one. Returns `true` when a new set index was selected.
    pub fn advance(&mut self) -> bool {
        if self.all_sets_done {
            return false;
        }
        if self.is_last_set() {
            self.all_sets_done = true;
            false
        } else {
            self.set_index += 1;
            true
        }
    }
}
