pub mod config;
pub mod cue;
pub mod frontend;
pub mod progression;
pub mod scheduler;
pub mod sequence;

pub use config::{ConfigError, EndpointConfig, ExperimentConfig, TimingConfig};
pub use cue::CueTone;
pub use frontend::{HeadlessFrontend, TrialFrontend};
pub use progression::{CaptureSessions, Participant, RunProgression, SetReport};
pub use scheduler::{DisplayState, SchedulerEvent, SchedulerState, SchedulerTimer, TrialScheduler};
pub use sequence::TrialSequences;
