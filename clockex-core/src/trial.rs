use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Which field of the clock face is emphasized while the trial is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TrialMode {
    /// All three fields at the same size.
    Uniform = 1,
    /// Minutes drawn larger than hours and seconds.
    MinutesEmphasized = 2,
    /// Seconds drawn larger than hours and minutes.
    SecondsEmphasized = 3,
}

impl TryFrom<u8> for TrialMode {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TrialMode::Uniform),
            2 => Ok(TrialMode::MinutesEmphasized),
            3 => Ok(TrialMode::SecondsEmphasized),
            other => Err(ParseError::InvalidMode(other)),
        }
    }
}

impl From<TrialMode> for u8 {
    fn from(mode: TrialMode) -> Self {
        mode as u8
    }
}

/// One entry of an ordered trial list: the time to display, how to display
/// it, and the question asked once it has been hidden again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub time: String,
    pub mode: TrialMode,
    #[serde(default)]
    pub question: String,
}

impl TrialSpec {
    pub fn new(time: impl Into<String>, mode: TrialMode, question: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            mode,
            question: question.into(),
        }
    }
}

/// The time currently shown on the clock face.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClockTime {
    /// Nothing published yet, rendered as `--:--:--`.
    #[default]
    Blank,
    Time(NaiveTime),
    /// A trial time that is not `HH:MM:SS`; shown verbatim and never ticked.
    Raw(String),
}

impl ClockTime {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if !s.contains(':') {
            return ClockTime::Raw(s.to_string());
        }
        match NaiveTime::parse_from_str(s, "%H:%M:%S") {
            Ok(t) => ClockTime::Time(t),
            Err(_) => ClockTime::Raw(s.to_string()),
        }
    }

    /// Moves the displayed time forward by one second, wrapping at midnight.
    pub fn advance_one_second(&mut self) {
        if let ClockTime::Time(t) = self {
            let (next, _) = t.overflowing_add_signed(chrono::Duration::seconds(1));
            *t = next;
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, ClockTime::Blank)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockTime::Blank => f.write_str("--:--:--"),
            ClockTime::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            ClockTime::Raw(s) => f.write_str(s),
        }
    }
}
