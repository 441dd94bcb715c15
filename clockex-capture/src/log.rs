use async_trait::async_trait;

use crate::capability::{Capture, CaptureArtifact, CaptureKind};
use crate::error::CaptureError;

/// Pure event logger: no device, always available. Everything it records
/// arrives through `CaptureSession::push`.
#[derive(Debug, Default)]
pub struct InteractionLog {
    running: bool,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[async_trait]
impl Capture for InteractionLog {
    fn kind(&self) -> CaptureKind {
        CaptureKind::InteractionLog
    }

    fn is_supported(&self) -> bool {
        true
    }

    async fn start(&mut self) -> Result<(), CaptureError> {
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<CaptureArtifact, CaptureError> {
        self.running = false;
        Ok(CaptureArtifact::Nothing)
    }
}
