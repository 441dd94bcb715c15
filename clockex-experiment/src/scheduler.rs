//! The hidden/visible trial cycle of one set.
//!
//! The scheduler never sleeps. It keeps its timers in a [`TimerQueue`] and a
//! driver pops them in deadline order and hands them back to [`TrialScheduler::fire`],
//! which returns the events the transition produced. Follow-up timers are
//! scheduled relative to the deadline of the timer that fired, so the cycle
//! does not drift when the driver wakes late.

use clockex_core::{ClockTime, DisplayPhase, TrialMode, TrialSpec};
use clockex_timing::{Timer, TimerId, TimerQueue};

use crate::config::TimingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerTimer {
    Cue,
    Show,
    Hide,
    Tick,
    Ask,
    /// Carries the set index that was current when the end was locked.
    EndOfSet { set_index: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// Play the cue; the clock appears one beep lead later.
    Cue,
    Shown {
        /// 1-based.
        trial_index: usize,
        trial: TrialSpec,
        time: ClockTime,
    },
    Tick { time: ClockTime },
    Hidden,
    /// Ask the question of the trial that was just hidden.
    Speak { question: String, trial_index: usize },
    /// The last question was asked; every other timer is cancelled and the
    /// set will end after the end delay.
    EndLocked { set_index: u32 },
    EndOfSet { set_index: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerState {
    pub phase: DisplayPhase,
    /// Index of the next trial to show. Only moves forward within a set.
    pub trial_cursor: usize,
    pub trials_consumed: usize,
    pub total_trials: usize,
    /// Set at most once per set; guards end-of-set finalization.
    pub locked_for_end: bool,
    pub started: bool,
}

/// What the clock face should currently show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub phase: DisplayPhase,
    pub time: ClockTime,
    pub mode: Option<TrialMode>,
    pub question: String,
}

#[derive(Debug, Default)]
struct TimerSlots {
    cue: Option<TimerId>,
    show: Option<TimerId>,
    hide: Option<TimerId>,
    tick: Option<TimerId>,
    ask: Option<TimerId>,
    end: Option<TimerId>,
}

impl TimerSlots {
    fn slot(&mut self, kind: SchedulerTimer) -> &mut Option<TimerId> {
        match kind {
            SchedulerTimer::Cue => &mut self.cue,
            SchedulerTimer::Show => &mut self.show,
            SchedulerTimer::Hide => &mut self.hide,
            SchedulerTimer::Tick => &mut self.tick,
            SchedulerTimer::Ask => &mut self.ask,
            SchedulerTimer::EndOfSet { .. } => &mut self.end,
        }
    }
}

#[derive(Debug)]
pub struct TrialScheduler {
    timing: TimingConfig,
    trials: Vec<TrialSpec>,
    set_index: u32,
    state: SchedulerState,
    display: DisplayState,
    queue: TimerQueue<SchedulerTimer>,
    slots: TimerSlots,
}

impl TrialScheduler {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            trials: Vec::new(),
            set_index: 1,
            state: SchedulerState::default(),
            display: DisplayState::default(),
            queue: TimerQueue::new(),
            slots: TimerSlots::default(),
        }
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn set_index(&self) -> u32 {
        self.set_index
    }

    pub fn is_started(&self) -> bool {
        self.state.started
    }

    pub fn pending_timers(&self) -> usize {
        self.queue.len()
    }

    /// Discards the current set and loads the next one. The scheduler is
    /// left stopped.
    pub fn load_set(&mut self, set_index: u32, trials: Vec<TrialSpec>) {
        self.reset();
        self.set_index = set_index;
        self.state.total_trials = trials.len();
        self.trials = trials;
        tracing::debug!(set_index, total = self.trials.len(), "[Scheduler] set loaded");
    }

    /// Cancels every timer, stale or pending, and rewinds the loaded set.
    pub fn reset(&mut self) {
        self.queue.reset();
        self.slots = TimerSlots::default();
        self.state = SchedulerState {
            total_trials: self.trials.len(),
            ..SchedulerState::default()
        };
        self.display = DisplayState::default();
    }

    /// Stops the cycle without finishing the set. Returns `false` when it
    /// was not running.
    pub fn abort(&mut self, reason: &str) -> bool {
        if !self.state.started {
            return false;
        }
        self.queue.reset();
        self.slots = TimerSlots::default();
        self.state.started = false;
        self.state.phase = DisplayPhase::Hidden;
        self.display.phase = DisplayPhase::Hidden;
        tracing::info!(set_index = self.set_index, "[Scheduler] aborted: {reason}");
        true
    }

    /// Starts the cycle in the hidden phase at `now_ms`. An empty set ends
    /// immediately.
    pub fn start(&mut self, now_ms: u64) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        if self.state.started {
            return events;
        }
        self.state.started = true;
        tracing::info!(
            set_index = self.set_index,
            total = self.state.total_trials,
            "[Scheduler] started"
        );

        if self.state.total_trials == 0 {
            self.state.locked_for_end = true;
            self.state.started = false;
            events.push(SchedulerEvent::EndLocked {
                set_index: self.set_index,
            });
            events.push(SchedulerEvent::EndOfSet {
                set_index: self.set_index,
            });
            return events;
        }

        self.enter_hidden(now_ms);
        events
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.next_deadline()
    }

    /// Pops and fires the earliest timer, returning its deadline with the
    /// events it produced.
    pub fn fire_next(&mut self) -> Option<(u64, Vec<SchedulerEvent>)> {
        let timer = self.queue.pop_next()?;
        let due_ms = timer.due_ms;
        Some((due_ms, self.fire(timer)))
    }

    /// Fires every timer due at or before `now_ms`, in order.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        while let Some(timer) = self.queue.pop_due(now_ms) {
            events.extend(self.fire(timer));
        }
        events
    }

    /// Applies one timer. Timers from before a reset, and timers whose slot
    /// no longer holds them, are ignored.
    pub fn fire(&mut self, timer: Timer<SchedulerTimer>) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        if !self.queue.is_current(&timer) {
            tracing::trace!(kind = ?timer.kind, "[Scheduler] stale timer ignored");
            return events;
        }
        let slot = self.slots.slot(timer.kind);
        if *slot != Some(timer.id) {
            tracing::trace!(kind = ?timer.kind, "[Scheduler] cancelled timer ignored");
            return events;
        }
        *slot = None;

        let at = timer.due_ms;
        match timer.kind {
            SchedulerTimer::Cue => {
                events.push(SchedulerEvent::Cue);
                self.slots.show = Some(
                    self.queue
                        .schedule(at + self.timing.beep_lead_ms, SchedulerTimer::Show),
                );
            }
            SchedulerTimer::Show => self.enter_visible(at, &mut events),
            SchedulerTimer::Tick => {
                if self.state.phase.is_visible() {
                    self.display.time.advance_one_second();
                    events.push(SchedulerEvent::Tick {
                        time: self.display.time.clone(),
                    });
                    self.schedule_tick(at);
                }
            }
            SchedulerTimer::Hide => {
                self.queue.cancel_slot(&mut self.slots.tick);
                self.state.phase = DisplayPhase::Hidden;
                self.display.phase = DisplayPhase::Hidden;
                events.push(SchedulerEvent::Hidden);

                self.queue.cancel_slot(&mut self.slots.ask);
                self.slots.ask = Some(
                    self.queue
                        .schedule(at + self.timing.ask_delay_ms, SchedulerTimer::Ask),
                );
                self.enter_hidden(at);
            }
            SchedulerTimer::Ask => self.ask(at, &mut events),
            SchedulerTimer::EndOfSet { set_index } => {
                self.state.started = false;
                tracing::info!(set_index, "[Scheduler] set finished");
                events.push(SchedulerEvent::EndOfSet { set_index });
            }
        }
        events
    }

    fn enter_hidden(&mut self, at: u64) {
        self.state.phase = DisplayPhase::Hidden;
        self.display.phase = DisplayPhase::Hidden;
        if self.state.trial_cursor >= self.state.total_trials {
            self.queue.cancel_slot(&mut self.slots.cue);
            self.queue.cancel_slot(&mut self.slots.show);
            self.queue.cancel_slot(&mut self.slots.tick);
            return;
        }
        self.slots.cue = Some(
            self.queue
                .schedule(at + self.timing.cue_delay_ms(), SchedulerTimer::Cue),
        );
    }

    fn enter_visible(&mut self, at: u64, events: &mut Vec<SchedulerEvent>) {
        let Some(trial) = self.trials.get(self.state.trial_cursor).cloned() else {
            return;
        };
        self.state.trial_cursor += 1;
        self.state.trials_consumed += 1;
        self.state.phase = DisplayPhase::Visible;

        self.display = DisplayState {
            phase: DisplayPhase::Visible,
            time: ClockTime::parse(&trial.time),
            mode: Some(trial.mode),
            question: trial.question.clone(),
        };
        tracing::debug!(
            trial = self.state.trials_consumed,
            time = %self.display.time,
            "[Scheduler] show"
        );
        events.push(SchedulerEvent::Shown {
            trial_index: self.state.trials_consumed,
            time: self.display.time.clone(),
            trial,
        });

        self.queue.cancel_slot(&mut self.slots.tick);
        self.schedule_tick(at);
        self.slots.hide = Some(
            self.queue
                .schedule(at + self.timing.show_duration_ms, SchedulerTimer::Hide),
        );
    }

    fn schedule_tick(&mut self, at: u64) {
        if self.timing.tick_interval_ms == 0 {
            return;
        }
        self.slots.tick = Some(
            self.queue
                .schedule(at + self.timing.tick_interval_ms, SchedulerTimer::Tick),
        );
    }

    fn ask(&mut self, at: u64, events: &mut Vec<SchedulerEvent>) {
        events.push(SchedulerEvent::Speak {
            question: self.display.question.clone(),
            trial_index: self.state.trials_consumed,
        });

        if self.state.trials_consumed < self.state.total_trials || self.state.locked_for_end {
            return;
        }
        self.state.locked_for_end = true;
        for slot in [
            &mut self.slots.cue,
            &mut self.slots.show,
            &mut self.slots.hide,
            &mut self.slots.tick,
            &mut self.slots.ask,
        ] {
            self.queue.cancel_slot(slot);
        }
        self.state.phase = DisplayPhase::Hidden;
        self.display.phase = DisplayPhase::Hidden;

        let set_index = self.set_index;
        self.slots.end = Some(self.queue.schedule(
            at + self.timing.end_delay_ms,
            SchedulerTimer::EndOfSet { set_index },
        ));
        tracing::info!(
            set_index,
            end_in_ms = self.timing.end_delay_ms,
            "[Scheduler] last question asked, end of set locked"
        );
        events.push(SchedulerEvent::EndLocked { set_index });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trials(n: usize) -> Vec<TrialSpec> {
        (0..n)
            .map(|i| TrialSpec::new(format!("10:00:{:02}", i), TrialMode::Uniform, format!("q{}", i + 1)))
            .collect()
    }

    fn scheduler(n: usize) -> TrialScheduler {
        let mut s = TrialScheduler::new(TimingConfig::default());
        s.load_set(1, trials(n));
        s
    }

    /// Runs the set to completion and returns every event with its time.
    fn run(s: &mut TrialScheduler) -> Vec<(u64, SchedulerEvent)> {
        let mut log: Vec<_> = s.start(0).into_iter().map(|e| (0, e)).collect();
        while let Some((at, events)) = s.fire_next() {
            log.extend(events.into_iter().map(|e| (at, e)));
        }
        log
    }

    fn label(e: &SchedulerEvent) -> &'static str {
        match e {
            SchedulerEvent::Cue => "cue",
            SchedulerEvent::Shown { .. } => "show",
            SchedulerEvent::Tick { .. } => "tick",
            SchedulerEvent::Hidden => "hide",
            SchedulerEvent::Speak { .. } => "speak",
            SchedulerEvent::EndLocked { .. } => "lock",
            SchedulerEvent::EndOfSet { .. } => "end",
        }
    }

    #[test]
    fn two_trial_set_follows_the_cycle_timings() {
        let mut s = scheduler(2);
        let log: Vec<_> = run(&mut s)
            .iter()
            .filter(|(_, e)| !matches!(e, SchedulerEvent::Tick { .. }))
            .map(|(at, e)| (*at, label(e)))
            .collect();
        assert_eq!(
            log,
            vec![
                (7500, "cue"),
                (8000, "show"),
                (10000, "hide"),
                (13000, "speak"),
                (17500, "cue"),
                (18000, "show"),
                (20000, "hide"),
                (23000, "speak"),
                (23000, "lock"),
                (38000, "end"),
            ]
        );
        assert!(s.state().locked_for_end);
        assert!(!s.is_started());
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn visible_count_and_single_end_for_any_length() {
        for n in 0..=6 {
            let mut s = scheduler(n);
            let log = run(&mut s);
            let shows = log.iter().filter(|(_, e)| label(e) == "show").count();
            let ends = log.iter().filter(|(_, e)| label(e) == "end").count();
            let locks = log.iter().filter(|(_, e)| label(e) == "lock").count();
            assert_eq!(shows, n, "n = {n}");
            assert_eq!(ends, 1, "n = {n}");
            assert_eq!(locks, 1, "n = {n}");
            assert_eq!(s.state().trial_cursor, n);
        }
    }

    #[test]
    fn empty_set_ends_on_start() {
        let mut s = scheduler(0);
        let events = s.start(0);
        assert_eq!(
            events,
            vec![
                SchedulerEvent::EndLocked { set_index: 1 },
                SchedulerEvent::EndOfSet { set_index: 1 },
            ]
        );
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn cue_precedes_show_by_exactly_the_lead() {
        let mut s = scheduler(4);
        let log = run(&mut s);
        let cues: Vec<u64> = log.iter().filter(|(_, e)| label(e) == "cue").map(|(t, _)| *t).collect();
        let shows: Vec<u64> = log.iter().filter(|(_, e)| label(e) == "show").map(|(t, _)| *t).collect();
        assert_eq!(cues.len(), shows.len());
        for (cue, show) in cues.iter().zip(&shows) {
            assert_eq!(show - cue, 500);
        }
    }

    #[test]
    fn duplicate_firings_are_ignored() {
        let mut s = scheduler(3);
        s.start(0);
        let mut shows = 0;
        let mut ends = 0;
        while let Some(timer) = s.queue.pop_next() {
            let again = timer.clone();
            for e in s.fire(timer).into_iter().chain(s.fire(again)) {
                match e {
                    SchedulerEvent::Shown { .. } => shows += 1,
                    SchedulerEvent::EndOfSet { .. } => ends += 1,
                    _ => {}
                }
            }
        }
        assert_eq!(shows, 3);
        assert_eq!(ends, 1);
    }

    #[test]
    fn timers_from_before_reset_are_stale() {
        let mut s = scheduler(2);
        s.start(0);
        let cue = s.queue.pop_next().unwrap();
        s.reset();
        assert!(s.fire(cue).is_empty());
        assert_eq!(s.state().trial_cursor, 0);
        assert!(!s.is_started());
    }

    #[test]
    fn end_lock_is_taken_once() {
        let mut s = scheduler(1);
        s.start(0);
        let mut locks = 0;
        while let Some((_, events)) = s.fire_next() {
            if events.iter().any(|e| matches!(e, SchedulerEvent::EndLocked { .. })) {
                locks += 1;
                assert!(s.state().locked_for_end);
                assert_eq!(s.display().phase, DisplayPhase::Hidden);
                // Only the end timer survives the lock.
                assert_eq!(s.pending_timers(), 1);
            }
        }
        assert_eq!(locks, 1);
    }

    #[test]
    fn clock_ticks_only_while_visible() {
        let mut s = scheduler(1);
        let log = run(&mut s);
        let ticks: Vec<_> = log
            .iter()
            .filter_map(|(at, e)| match e {
                SchedulerEvent::Tick { time } => Some((*at, time.to_string())),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![(9000, "10:00:01".to_string())]);
    }

    #[test]
    fn longer_visible_period_ticks_every_second() {
        let timing = TimingConfig {
            show_duration_ms: 3500,
            ..TimingConfig::default()
        };
        let mut s = TrialScheduler::new(timing);
        s.load_set(1, vec![TrialSpec::new("23:59:58", TrialMode::SecondsEmphasized, "")]);
        let times: Vec<String> = run(&mut s)
            .into_iter()
            .filter_map(|(_, e)| match e {
                SchedulerEvent::Tick { time } => Some(time.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(times, ["23:59:59", "00:00:00", "00:00:01"]);
    }

    #[test]
    fn shown_event_carries_trial_and_display() {
        let mut s = scheduler(2);
        s.start(0);
        let events = s.advance_to(8000);
        assert_eq!(events.len(), 2);
        match &events[1] {
            SchedulerEvent::Shown { trial_index, trial, time } => {
                assert_eq!(*trial_index, 1);
                assert_eq!(trial.question, "q1");
                assert_eq!(time.to_string(), "10:00:00");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(s.display().phase.is_visible());
        assert_eq!(s.display().mode, Some(TrialMode::Uniform));
    }

    #[test]
    fn speak_asks_the_trial_just_hidden() {
        let mut s = scheduler(2);
        s.start(0);
        let events = s.advance_to(13000);
        let speak = events.iter().find_map(|e| match e {
            SchedulerEvent::Speak { question, trial_index } => Some((question.clone(), *trial_index)),
            _ => None,
        });
        assert_eq!(speak, Some(("q1".to_string(), 1)));
    }

    #[test]
    fn abort_stops_without_end_of_set() {
        let mut s = scheduler(2);
        s.start(0);
        s.advance_to(9000);
        assert!(s.abort("navigation"));
        assert!(!s.abort("again"));
        assert_eq!(s.next_deadline(), None);
        assert!(s.display().phase.is_hidden());
        assert!(!s.state().locked_for_end);
    }

    #[test]
    fn start_twice_is_a_no_op() {
        let mut s = scheduler(2);
        s.start(0);
        let pending = s.pending_timers();
        assert!(s.start(100).is_empty());
        assert_eq!(s.pending_timers(), pending);
    }

    #[test]
    fn load_set_rewinds_for_the_next_set() {
        let mut s = scheduler(1);
        run(&mut s);
        s.load_set(2, trials(3));
        assert_eq!(s.set_index(), 2);
        assert_eq!(
            *s.state(),
            SchedulerState {
                total_trials: 3,
                ..SchedulerState::default()
            }
        );
        assert!(s.display().time.is_blank());
    }
}
