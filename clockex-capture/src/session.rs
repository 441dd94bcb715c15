use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clockex_core::{EventPayload, SessionMeta, TimelineEvent, payload};
use clockex_timing::{Clock, ClockOffset, ClockSync, TimeSource};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::capability::{Capture, CaptureArtifact, CaptureKind, CapturedEvent};
use crate::error::UploadError;
use crate::fallback::LocalFallback;
use crate::filename::build_filename;
use crate::sink::{AudioUpload, UploadReceipt, UploadSink};

/// Result of `CaptureSession::finish`.
#[derive(Debug, Clone, PartialEq)]
pub enum FinishOutcome {
    /// The session was not active; nothing happened.
    Skipped,
    Uploaded {
        filename: String,
        receipt: UploadReceipt,
    },
    /// Upload failed; the payload was written to the fallback directory.
    SavedLocally {
        filename: String,
        path: PathBuf,
        error: String,
    },
    /// Upload failed and there was no usable fallback.
    Failed { filename: String, error: String },
}

impl FinishOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, FinishOutcome::Skipped | FinishOutcome::Uploaded { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FinishOutcome::Skipped)
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            FinishOutcome::Skipped => None,
            FinishOutcome::Uploaded { filename, .. }
            | FinishOutcome::SavedLocally { filename, .. }
            | FinishOutcome::Failed { filename, .. } => Some(filename.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Completed,
    Aborted {
        reason: String,
        at_ms: Option<i64>,
    },
}

impl SessionStatus {
    pub fn is_aborted(&self) -> bool {
        matches!(self, SessionStatus::Aborted { .. })
    }

    fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Completed => "ok",
            SessionStatus::Aborted { .. } => "aborted",
        }
    }
}

#[derive(Serialize)]
struct FinishedMeta<'a> {
    #[serde(flatten)]
    meta: &'a SessionMeta,
    started_at_ms: Option<i64>,
    ended_at_ms: Option<i64>,
    count: usize,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    abort_reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aborted_at_ms: Option<i64>,
}

/// Everything that exists only between `begin` and `finish`/`force_stop`.
#[derive(Debug)]
struct ActiveSession {
    meta: SessionMeta,
    timeline: Vec<TimelineEvent>,
    clock_offset: Option<ClockOffset>,
    start_local_ms: u64,
    started_at_ms: Option<i64>,
    status: SessionStatus,
}

impl ActiveSession {
    fn absolute(&self, local_ms: u64) -> Option<i64> {
        self.clock_offset.map(|offset| offset.to_absolute(local_ms))
    }

    fn record(&mut self, local_ms: u64, kind: impl Into<String>, payload: EventPayload) {
        let floor = self.timeline.last().map_or(0, |e| e.relative_ms);
        let relative_ms = local_ms.saturating_sub(self.start_local_ms).max(floor);
        let absolute_ms = self.absolute(local_ms);
        self.timeline
            .push(TimelineEvent::new(relative_ms, absolute_ms, kind, payload));
    }

    fn absorb(&mut self, events: Vec<CapturedEvent>) {
        for event in events {
            self.record(event.at_local_ms, event.kind, event.payload);
        }
    }

    fn payload(&self, ended_at_ms: Option<i64>) -> Value {
        let (abort_reason, aborted_at_ms) = match &self.status {
            SessionStatus::Aborted { reason, at_ms } => (Some(reason.as_str()), *at_ms),
            SessionStatus::Completed => (None, None),
        };
        json!({
            "meta": FinishedMeta {
                meta: &self.meta,
                started_at_ms: self.started_at_ms,
                ended_at_ms,
                count: self.timeline.len(),
                status: self.status.as_str(),
                abort_reason,
                aborted_at_ms,
            },
            "timeline": self.timeline,
        })
    }
}

/// One recording/logging stream with a single begin → finish lifecycle.
///
/// The lifecycle is the same for every capture kind; only the capability
/// behind it differs. Double invocations are no-ops: `begin` while active,
/// `push`/`abort` while inactive, and `finish` while inactive.
pub struct CaptureSession {
    capture: Box<dyn Capture>,
    clock: Arc<dyn Clock>,
    time_source: Option<Arc<dyn TimeSource>>,
    sink: Arc<dyn UploadSink>,
    fallback: Option<LocalFallback>,
    state: Option<ActiveSession>,
    in_flight: Option<InFlight>,
}

impl CaptureSession {
    pub fn new(capture: Box<dyn Capture>, clock: Arc<dyn Clock>, sink: Arc<dyn UploadSink>) -> Self {
        Self {
            capture,
            clock,
            time_source: None,
            sink,
            fallback: None,
            state: None,
            in_flight: None,
        }
    }

    /// Probe this source once at every `begin` to align absolute times.
    pub fn with_time_source(mut self, source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(source);
        self
    }

    /// Write payloads here when their upload fails.
    pub fn with_fallback(mut self, fallback: LocalFallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn kind(&self) -> CaptureKind {
        self.capture.kind()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn meta(&self) -> Option<&SessionMeta> {
        self.state.as_ref().map(|s| &s.meta)
    }

    pub fn timeline(&self) -> &[TimelineEvent] {
        self.state.as_ref().map_or(&[][..], |s| s.timeline.as_slice())
    }

    pub fn clock_offset(&self) -> Option<ClockOffset> {
        self.state.as_ref().and_then(|s| s.clock_offset)
    }

    pub fn session_start_local_ms(&self) -> Option<u64> {
        self.state.as_ref().map(|s| s.start_local_ms)
    }

    pub fn status(&self) -> Option<&SessionStatus> {
        self.state.as_ref().map(|s| &s.status)
    }

    /// Starts a new session. Unsupported or failing capabilities leave the
    /// session inactive; check `is_active` afterwards.
    pub async fn begin(&mut self, meta: SessionMeta) {
        let kind = self.kind();
        let tag = kind.tag();
        if self.state.is_some() {
            tracing::debug!("{tag} begin ignored: session already active");
            return;
        }
        if let Some(outcome) = self.settle().await {
            tracing::info!("{tag} earlier delivery settled: {:?}", outcome.filename());
        }
        if !self.capture.is_supported() {
            tracing::warn!("{tag} {kind} capture is not supported here; continuing without it");
            return;
        }

        let clock_offset = match &self.time_source {
            Some(source) => match ClockSync::sync(source.as_ref(), self.clock.as_ref()).await {
                Ok(offset) => Some(offset),
                Err(e) => {
                    tracing::warn!("{tag} clock sync failed (ok): {e}");
                    None
                }
            },
            None => None,
        };

        let start_local_ms = self.clock.now_ms();
        if let Err(e) = self.capture.start().await {
            tracing::warn!("{tag} start failed: {e}");
            return;
        }

        self.state = Some(ActiveSession {
            meta,
            timeline: Vec::new(),
            clock_offset,
            start_local_ms,
            started_at_ms: clock_offset.map(|o| o.to_absolute(start_local_ms)),
            status: SessionStatus::Completed,
        });
        tracing::info!(synced = clock_offset.is_some(), "{tag} session started");
    }

    /// Appends an event stamped now. Pending capability events go first.
    pub fn push(&mut self, kind: &str, payload: EventPayload) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.absorb(self.capture.drain_events());
        state.record(self.clock.now_ms(), kind, payload);
    }

    /// Marks the session aborted and logs one `SET_ABORT` event. The session
    /// stays active so the partial data can still be finished.
    pub fn abort(&mut self, reason: &str) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if state.status.is_aborted() {
            return;
        }
        state.absorb(self.capture.drain_events());
        let now = self.clock.now_ms();
        state.status = SessionStatus::Aborted {
            reason: reason.to_string(),
            at_ms: state.absolute(now),
        };
        state.record(now, "SET_ABORT", payload(json!({ "reason": reason })));
        tracing::info!("{} session aborted: {reason}", self.kind().tag());
    }

    /// Stops the capability and delivers the session. The session is
    /// inactive before the first await, so a second call is skipped and no
    /// outcome leaves it stuck active.
    ///
    /// The upload runs on its own task. If this future is dropped while the
    /// upload is pending, the upload still completes; the next `finish`,
    /// `settle` or `begin` collects its outcome.
    pub async fn finish(&mut self) -> FinishOutcome {
        if let Some(outcome) = self.settle().await {
            return outcome;
        }
        let Some(mut state) = self.state.take() else {
            return FinishOutcome::Skipped;
        };
        let kind = self.kind();
        let tag = kind.tag();

        let artifact = match self.capture.stop().await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!("{tag} stop failed: {e}");
                CaptureArtifact::Nothing
            }
        };
        state.absorb(self.capture.drain_events());

        let now = self.clock.now_ms();
        if kind == CaptureKind::InteractionLog {
            let reason = if state.status.is_aborted() { "aborted" } else { "completed" };
            let before = state.timeline.len();
            state.record(
                now,
                "SET_END",
                payload(json!({ "reason": reason, "eventCountBefore": before })),
            );
        }

        let filename = {
            let mut rng = rand::rng();
            build_filename(&state.meta, kind.extension(), Local::now().naive_local(), &mut rng)
        };

        let parcel = match artifact {
            CaptureArtifact::Audio(blob) => Parcel::Audio(AudioUpload {
                blob,
                filename: filename.clone(),
                participant: state.meta.participant.clone(),
                set: state.meta.set,
                session_id: state.meta.session_id.clone(),
                run_label: state.meta.run_label,
            }),
            CaptureArtifact::Nothing if kind == CaptureKind::Audio => {
                tracing::warn!("{tag} nothing recorded; skipping upload");
                return FinishOutcome::Failed {
                    filename,
                    error: UploadError::NoAudio.to_string(),
                };
            }
            CaptureArtifact::Nothing => Parcel::Json(state.payload(state.absolute(now))),
        };

        let delivery = Delivery {
            tag,
            sink: self.sink.clone(),
            fallback: self.fallback.clone(),
        };
        self.in_flight = Some(InFlight {
            task: tokio::spawn(delivery.deliver(filename.clone(), parcel)),
            filename,
        });
        self.settle().await.unwrap_or(FinishOutcome::Skipped)
    }

    /// Waits for a delivery whose `finish` was dropped before it returned.
    /// Returns `None` when nothing is in flight.
    pub async fn settle(&mut self) -> Option<FinishOutcome> {
        let in_flight = self.in_flight.as_mut()?;
        let outcome = match (&mut in_flight.task).await {
            Ok(outcome) => outcome,
            Err(e) => FinishOutcome::Failed {
                filename: in_flight.filename.clone(),
                error: format!("delivery task failed: {e}"),
            },
        };
        self.in_flight = None;
        Some(outcome)
    }

    /// Safety teardown without upload, for abnormal termination.
    pub async fn force_stop(&mut self) {
        if self.state.take().is_none() {
            return;
        }
        let tag = self.kind().tag();
        if let Err(e) = self.capture.stop().await {
            tracing::debug!("{tag} stop during force stop failed: {e}");
        }
        self.capture.drain_events();
        tracing::info!("{tag} force stopped");
    }
}

/// Where a finished payload goes. Detached from the session so the upload
/// runs on its own task and survives a cancelled `finish`.
struct Delivery {
    tag: &'static str,
    sink: Arc<dyn UploadSink>,
    fallback: Option<LocalFallback>,
}

enum Parcel {
    Json(Value),
    Audio(AudioUpload),
}

struct InFlight {
    filename: String,
    task: JoinHandle<FinishOutcome>,
}

impl Delivery {
    async fn deliver(self, filename: String, parcel: Parcel) -> FinishOutcome {
        let tag = self.tag;
        let uploaded = match &parcel {
            Parcel::Json(payload) => self.sink.upload_json(&filename, payload).await,
            Parcel::Audio(upload) => self.sink.upload_audio(upload).await,
        };
        let e = match uploaded {
            Ok(receipt) => {
                tracing::info!(
                    "{tag} uploaded {}",
                    receipt.filename.as_deref().unwrap_or(&filename)
                );
                return FinishOutcome::Uploaded { filename, receipt };
            }
            Err(e) => e,
        };

        tracing::warn!("{tag} upload failed: {e}");
        let Some(fallback) = &self.fallback else {
            return FinishOutcome::Failed {
                filename,
                error: e.to_string(),
            };
        };
        let saved = match &parcel {
            Parcel::Json(payload) => fallback.save_json(&filename, payload).await,
            Parcel::Audio(upload) => fallback.save_bytes(&filename, &upload.blob.bytes).await,
        };
        match saved {
            Ok(path) => FinishOutcome::SavedLocally {
                filename,
                path,
                error: e.to_string(),
            },
            Err(io) => {
                tracing::error!("{tag} fallback save failed: {io}");
                FinishOutcome::Failed {
                    filename,
                    error: format!("{e}; fallback save failed: {io}"),
                }
            }
        }
    }
}
