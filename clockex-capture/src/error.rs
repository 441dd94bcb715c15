use thiserror::Error;

use crate::capability::CaptureKind;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{0} capture is not supported on this system")]
    Unsupported(CaptureKind),

    #[error("{kind} capture failed to start: {reason}")]
    StartFailed { kind: CaptureKind, reason: String },

    #[error("{kind} capture failed to stop: {reason}")]
    StopFailed { kind: CaptureKind, reason: String },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Request(String),

    #[error("upload returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upload rejected: {0}")]
    Rejected(String),

    #[error("upload response is not JSON: {0}")]
    InvalidResponse(String),

    #[error("no audio was captured")]
    NoAudio,
}
