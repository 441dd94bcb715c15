use crate::cue::CueTone;
use crate::progression::SetReport;
use crate::scheduler::DisplayState;

/// The presentation side of a run: draws the clock, plays the cue and asks
/// the question. Every method defaults to doing nothing.
pub trait TrialFrontend: Send {
    fn show(&mut self, _display: &DisplayState, _trial_index: usize) {}

    fn tick(&mut self, _display: &DisplayState) {}

    fn hide(&mut self) {}

    fn play_cue(&mut self, _cue: &CueTone) {}

    fn speak(&mut self, _question: &str, _trial_index: usize) {}

    /// The set has ended and its sessions have been delivered.
    fn set_finished(&mut self, _report: &SetReport) {}

    fn run_done(&mut self) {}
}

/// Runs without presenting anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessFrontend;

impl TrialFrontend for HeadlessFrontend {}
