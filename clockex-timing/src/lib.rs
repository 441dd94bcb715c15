pub mod clock;
pub mod queue;
pub mod sync;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use queue::{Timer, TimerId, TimerQueue};
pub use sync::{ClockOffset, ClockSync, SyncError, TimeSource};
