use std::io::{self, Write};

use clockex_core::{ClockTime, TrialMode};
use clockex_experiment::{CueTone, DisplayState, SetReport, TrialFrontend};

/// Draws the clock face as one line on stdout. The emphasized field of a
/// trial is wrapped in brackets.
#[derive(Debug, Default)]
pub struct TerminalFrontend {
    bell: bool,
    trial_index: usize,
}

impl TerminalFrontend {
    pub fn new(bell: bool) -> Self {
        Self {
            bell,
            trial_index: 0,
        }
    }

    fn redraw(&self, line: &str) {
        let mut out = io::stdout().lock();
        let _ = write!(out, "\r\x1b[2K{line}");
        let _ = out.flush();
    }
}

/// Renders the clock with the mode's emphasis applied.
pub fn render_face(time: &ClockTime, mode: Option<TrialMode>) -> String {
    let text = time.to_string();
    if !matches!(time, ClockTime::Time(_)) {
        return text;
    }
    let fields: Vec<&str> = text.split(':').collect();
    let [h, m, s] = fields.as_slice() else {
        return text;
    };
    match mode {
        Some(TrialMode::MinutesEmphasized) => format!("{h}:[{m}]:{s}"),
        Some(TrialMode::SecondsEmphasized) => format!("{h}:{m}:[{s}]"),
        _ => text.clone(),
    }
}

impl TrialFrontend for TerminalFrontend {
    fn show(&mut self, display: &DisplayState, trial_index: usize) {
        self.trial_index = trial_index;
        self.tick(display);
    }

    fn tick(&mut self, display: &DisplayState) {
        let face = render_face(&display.time, display.mode);
        self.redraw(&format!("#{}  {face}", self.trial_index));
    }

    fn hide(&mut self) {
        self.redraw("");
    }

    fn play_cue(&mut self, _cue: &CueTone) {
        if self.bell {
            let mut out = io::stdout().lock();
            let _ = out.write_all(b"\x07");
            let _ = out.flush();
        }
    }

    fn speak(&mut self, question: &str, trial_index: usize) {
        self.redraw("");
        println!("Q{trial_index}: {question}  (type your answer and press Enter)");
    }

    fn set_finished(&mut self, report: &SetReport) {
        self.redraw("");
        let status = if report.all_ok() { "saved" } else { "saved with problems" };
        println!("Set {} finished ({status}).", report.set_index);
    }

    fn run_done(&mut self) {
        println!("All sets done. Thank you!");
    }
}
