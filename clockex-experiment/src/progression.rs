//! Multi-set runs: which trials each set uses, when capture sessions begin
//! and end, and the async driver that turns scheduler deadlines into sleeps.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clockex_capture::filename::format_timestamp;
use clockex_capture::{CaptureSession, FinishOutcome};
use clockex_core::{EventPayload, Group, RunLabel, RunState, RunType, SessionMeta, payload};
use clockex_timing::Clock;
use serde_json::json;

use crate::config::ExperimentConfig;
use crate::cue::CueTone;
use crate::frontend::TrialFrontend;
use crate::scheduler::{SchedulerEvent, TrialScheduler};
use crate::sequence::TrialSequences;

/// Who is being tested and in which condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub run_type: RunType,
    pub group: Group,
}

impl Participant {
    pub fn run_label(&self) -> RunLabel {
        RunLabel::for_run(self.run_type, self.group)
    }
}

/// One session per capture kind, finished in field order.
pub struct CaptureSessions {
    pub audio: CaptureSession,
    pub speech: CaptureSession,
    pub log: CaptureSession,
}

/// How each capture kind fared at the end of a set.
#[derive(Debug, Clone, PartialEq)]
pub struct SetReport {
    pub set_index: u32,
    pub last_set: bool,
    pub audio: FinishOutcome,
    pub speech: FinishOutcome,
    pub log: FinishOutcome,
}

impl SetReport {
    pub fn all_ok(&self) -> bool {
        self.audio.is_ok() && self.speech.is_ok() && self.log.is_ok()
    }
}

pub struct RunProgression {
    config: ExperimentConfig,
    sequences: TrialSequences,
    participant: Participant,
    run: RunState,
    scheduler: TrialScheduler,
    sessions: CaptureSessions,
    clock: Arc<dyn Clock>,
    cue: CueTone,
}

impl RunProgression {
    pub fn new(
        config: ExperimentConfig,
        sequences: TrialSequences,
        participant: Participant,
        sessions: CaptureSessions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            run: RunState::new(config.total_sets),
            scheduler: TrialScheduler::new(config.timing.clone()),
            config,
            sequences,
            participant,
            sessions,
            clock,
            cue: CueTone::default(),
        }
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    pub fn scheduler(&self) -> &TrialScheduler {
        &self.scheduler
    }

    pub fn sessions(&self) -> &CaptureSessions {
        &self.sessions
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    fn session_meta(&self, set_index: u32, ts: String) -> SessionMeta {
        SessionMeta {
            run_type: Some(self.participant.run_type),
            group: Some(self.participant.group),
            ts: Some(ts),
            ..SessionMeta::for_set(&self.participant.name, set_index, self.participant.run_label())
        }
    }

    /// Loads the set's trials, begins all capture sessions with one shared
    /// timestamp and starts the scheduler. Returns the events of the start.
    pub async fn start_set(&mut self, set_index: u32) -> Vec<SchedulerEvent> {
        let trials = self
            .sequences
            .select(self.participant.run_type, self.participant.group, set_index)
            .to_vec();
        let total_trials = trials.len();
        self.scheduler.load_set(set_index, trials);

        let meta = self.session_meta(set_index, format_timestamp(&Local::now().naive_local()));
        for session in [
            &mut self.sessions.audio,
            &mut self.sessions.speech,
            &mut self.sessions.log,
        ] {
            session.begin(meta.clone()).await;
        }
        self.sessions.log.push(
            "SET_START",
            payload(json!({
                "set": set_index,
                "totalSets": self.run.total_sets,
                "totalTrials": total_trials,
                "runLabel": self.participant.run_label(),
            })),
        );

        tracing::info!(
            set_index,
            total_sets = self.run.total_sets,
            total_trials,
            label = %self.participant.run_label(),
            "[Run] set started"
        );
        self.scheduler.start(self.clock.now_ms())
    }

    /// Runs the current set to its end: sleeps until each scheduler
    /// deadline, fires it and dispatches what it produced.
    pub async fn run_set(&mut self, frontend: &mut dyn TrialFrontend) -> SetReport {
        let set_index = self.run.set_index;
        let events = self.start_set(set_index).await;
        if let Some(report) = self.dispatch(events, frontend).await {
            return report;
        }

        loop {
            let Some(deadline) = self.scheduler.next_deadline() else {
                tracing::warn!(set_index, "[Run] scheduler stopped without ending the set");
                let report = self.finalize(set_index).await;
                frontend.set_finished(&report);
                return report;
            };
            let now = self.clock.now_ms();
            if deadline > now {
                tokio::time::sleep(Duration::from_millis(deadline - now)).await;
            }
            let Some((_, events)) = self.scheduler.fire_next() else {
                continue;
            };
            if let Some(report) = self.dispatch(events, frontend).await {
                return report;
            }
        }
    }

    /// Runs every remaining set with the configured pause in between.
    pub async fn run_all(&mut self, frontend: &mut dyn TrialFrontend) -> Vec<SetReport> {
        let mut reports = Vec::new();
        loop {
            reports.push(self.run_set(frontend).await);
            if !self.advance_or_finish() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(self.config.inter_set_pause_ms)).await;
        }
        reports
    }

    /// Moves to the next set. Returns `false` once every set is done.
    pub fn advance_or_finish(&mut self) -> bool {
        let advanced = self.run.advance();
        if advanced {
            tracing::info!(set_index = self.run.set_index, "[Run] advancing to next set");
        } else {
            tracing::info!(total_sets = self.run.total_sets, "[Run] all sets done");
        }
        advanced
    }

    /// Leaves the current set early: the abort is logged, audio and speech
    /// are discarded and the partial interaction log is still delivered.
    ///
    /// A set whose end already fired is not aborted. Its pending deliveries
    /// are awaited and the sessions it had not finished yet are finished
    /// normally. Returns `None` when no set was in progress.
    pub async fn abort(&mut self, reason: &str) -> Option<FinishOutcome> {
        let running = self.scheduler.abort(reason);
        for (tag, session) in [
            ("[REC]", &mut self.sessions.audio),
            ("[STT]", &mut self.sessions.speech),
        ] {
            if let Some(outcome) = session.settle().await {
                log_outcome(tag, &outcome);
            }
        }
        if let Some(outcome) = self.sessions.log.settle().await {
            log_outcome("[LOG]", &outcome);
            return Some(outcome);
        }
        if !running && self.scheduler.state().locked_for_end {
            let sessions = &self.sessions;
            if !(sessions.audio.is_active() || sessions.speech.is_active() || sessions.log.is_active()) {
                return None;
            }
            let set_index = self.scheduler.set_index();
            tracing::warn!(set_index, "[Run] set had already ended; completing its delivery");
            return Some(self.finalize(set_index).await.log);
        }
        if !running && !self.sessions.log.is_active() {
            return None;
        }
        tracing::warn!(set_index = self.run.set_index, "[Run] aborting set: {reason}");
        self.sessions.log.abort(reason);
        self.sessions.audio.force_stop().await;
        self.sessions.speech.force_stop().await;
        let outcome = self.sessions.log.finish().await;
        log_outcome("[LOG]", &outcome);
        Some(outcome)
    }

    async fn dispatch(
        &mut self,
        events: Vec<SchedulerEvent>,
        frontend: &mut dyn TrialFrontend,
    ) -> Option<SetReport> {
        for event in events {
            match event {
                SchedulerEvent::Cue => {
                    self.sessions.log.push("CUE", EventPayload::new());
                    frontend.play_cue(&self.cue);
                }
                SchedulerEvent::Shown {
                    trial_index,
                    trial,
                    time,
                } => {
                    self.sessions.speech.push(
                        "que",
                        payload(json!({
                            "text": trial.question,
                            "trialIndex": trial_index,
                            "mode": trial.mode,
                            "time": trial.time,
                        })),
                    );
                    self.sessions.log.push(
                        "SHOW",
                        payload(json!({
                            "trialIndex": trial_index,
                            "time": time.to_string(),
                            "mode": trial.mode,
                        })),
                    );
                    frontend.show(self.scheduler.display(), trial_index);
                }
                SchedulerEvent::Tick { .. } => frontend.tick(self.scheduler.display()),
                SchedulerEvent::Hidden => {
                    let trial_index = self.scheduler.state().trials_consumed;
                    self.sessions
                        .log
                        .push("HIDE", payload(json!({ "trialIndex": trial_index })));
                    frontend.hide();
                }
                SchedulerEvent::Speak {
                    question,
                    trial_index,
                } => {
                    self.sessions.log.push(
                        "ASK",
                        payload(json!({ "trialIndex": trial_index, "text": question })),
                    );
                    frontend.speak(&question, trial_index);
                }
                SchedulerEvent::EndLocked { set_index } => {
                    tracing::debug!(set_index, "[Run] end of set locked");
                }
                SchedulerEvent::EndOfSet { set_index } => {
                    let report = self.finalize(set_index).await;
                    frontend.set_finished(&report);
                    if report.last_set {
                        frontend.run_done();
                    }
                    return Some(report);
                }
            }
        }
        None
    }

    /// Delivers every session of the set: audio, then speech, then the
    /// interaction log. Whether this was the last set is decided from the
    /// set index captured when the end was locked.
    async fn finalize(&mut self, set_index: u32) -> SetReport {
        let last_set = set_index >= self.run.total_sets;

        let audio = self.sessions.audio.finish().await;
        log_outcome("[REC]", &audio);
        let speech = self.sessions.speech.finish().await;
        log_outcome("[STT]", &speech);
        let log = self.sessions.log.finish().await;
        log_outcome("[LOG]", &log);

        if last_set {
            self.run.all_sets_done = true;
        }
        tracing::info!(set_index, last_set, "[Run] set finalized");
        SetReport {
            set_index,
            last_set,
            audio,
            speech,
            log,
        }
    }
}

fn log_outcome(tag: &str, outcome: &FinishOutcome) {
    match outcome {
        FinishOutcome::Skipped => tracing::debug!("{tag} finish skipped: no active session"),
        FinishOutcome::Uploaded { filename, .. } => tracing::info!("{tag} finished: {filename}"),
        FinishOutcome::SavedLocally { path, error, .. } => {
            tracing::warn!("{tag} upload failed ({error}); saved to {}", path.display())
        }
        FinishOutcome::Failed { filename, error } => {
            tracing::error!("{tag} {filename} was not delivered: {error}")
        }
    }
}
