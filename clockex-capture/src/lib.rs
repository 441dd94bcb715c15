//! Capture sessions for one experimental set: audio recording, speech-to-text
//! and the interaction log all share the same begin → finish lifecycle and
//! the same upload path.

pub mod audio;
pub mod capability;
pub mod error;
pub mod fallback;
pub mod filename;
pub mod http;
pub mod log;
pub mod session;
pub mod sink;
pub mod speech;

pub use audio::{AudioCapture, AudioInput, UnavailableMicrophone};
pub use capability::{AudioBlob, Capture, CaptureArtifact, CaptureKind, CapturedEvent};
pub use error::{CaptureError, UploadError};
pub use fallback::LocalFallback;
pub use filename::{build_filename, sanitize};
pub use http::{HttpTimeSource, HttpUploadSink};
pub use log::InteractionLog;
pub use session::{CaptureSession, FinishOutcome, SessionStatus};
pub use sink::{AudioUpload, UploadReceipt, UploadSink};
pub use speech::{Recognition, RecognitionSink, Recognizer, SpeechTextCapture};
