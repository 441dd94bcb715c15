use async_trait::async_trait;

use crate::capability::{AudioBlob, Capture, CaptureArtifact, CaptureKind};
use crate::error::CaptureError;

/// A microphone that records one encoded clip between `open` and `close`.
#[async_trait]
pub trait AudioInput: Send {
    fn is_available(&self) -> bool;

    async fn open(&mut self) -> Result<(), CaptureError>;

    async fn close(&mut self) -> Result<AudioBlob, CaptureError>;
}

/// Stand-in for hosts without a microphone backend. Sessions built on it
/// stay inactive and the run continues without audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableMicrophone;

#[async_trait]
impl AudioInput for UnavailableMicrophone {
    fn is_available(&self) -> bool {
        false
    }

    async fn open(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::Unsupported(CaptureKind::Audio))
    }

    async fn close(&mut self) -> Result<AudioBlob, CaptureError> {
        Err(CaptureError::Unsupported(CaptureKind::Audio))
    }
}

pub struct AudioCapture<I> {
    input: I,
    recording: bool,
}

impl<I: AudioInput> AudioCapture<I> {
    pub fn new(input: I) -> Self {
        Self {
            input,
            recording: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

#[async_trait]
impl<I: AudioInput> Capture for AudioCapture<I> {
    fn kind(&self) -> CaptureKind {
        CaptureKind::Audio
    }

    fn is_supported(&self) -> bool {
        self.input.is_available()
    }

    async fn start(&mut self) -> Result<(), CaptureError> {
        self.input.open().await?;
        self.recording = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<CaptureArtifact, CaptureError> {
        if !self.recording {
            return Ok(CaptureArtifact::Nothing);
        }
        self.recording = false;
        let blob = self.input.close().await?;
        if blob.bytes.is_empty() {
            return Ok(CaptureArtifact::Nothing);
        }
        Ok(CaptureArtifact::Audio(blob))
    }
}
