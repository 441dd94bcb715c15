use std::fmt;

use async_trait::async_trait;
use clockex_core::EventPayload;

use crate::error::CaptureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    Audio,
    SpeechText,
    InteractionLog,
}

impl CaptureKind {
    /// Log prefix used by every message about this kind of capture.
    pub fn tag(&self) -> &'static str {
        match self {
            CaptureKind::Audio => "[REC]",
            CaptureKind::SpeechText => "[STT]",
            CaptureKind::InteractionLog => "[LOG]",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            CaptureKind::Audio => "webm",
            CaptureKind::SpeechText | CaptureKind::InteractionLog => "json",
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CaptureKind::Audio => "audio",
            CaptureKind::SpeechText => "speech-text",
            CaptureKind::InteractionLog => "interaction-log",
        })
    }
}

/// Encoded audio handed back by a microphone capture when it stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// What a capability leaves behind once stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureArtifact {
    Nothing,
    Audio(AudioBlob),
}

/// An event produced by the capability itself (e.g. a recognized utterance),
/// stamped with the local clock when it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    pub at_local_ms: u64,
    pub kind: String,
    pub payload: EventPayload,
}

/// The device or service behind one capture session.
#[async_trait]
pub trait Capture: Send {
    fn kind(&self) -> CaptureKind;

    fn is_supported(&self) -> bool;

    async fn start(&mut self) -> Result<(), CaptureError>;

    async fn stop(&mut self) -> Result<CaptureArtifact, CaptureError>;

    /// Events produced since the last drain, oldest first.
    fn drain_events(&mut self) -> Vec<CapturedEvent> {
        Vec::new()
    }
}
