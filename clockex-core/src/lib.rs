pub mod error;
pub mod phase;
pub mod run;
pub mod timeline;
pub mod trial;

pub use error::ParseError;
pub use phase::DisplayPhase;
pub use run::{Group, RunLabel, RunState, RunType};
pub use timeline::{payload, EventPayload, SessionMeta, TimelineEvent};
pub use trial::{ClockTime, TrialMode, TrialSpec};
