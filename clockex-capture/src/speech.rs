use std::sync::Arc;

use async_trait::async_trait;
use clockex_core::payload;
use clockex_timing::Clock;
use serde_json::json;
use tokio::sync::mpsc;

use crate::capability::{Capture, CaptureArtifact, CaptureKind, CapturedEvent};
use crate::error::CaptureError;

/// A final recognition result.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: Option<f32>,
}

impl Recognition {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Handle a recognizer uses to report results. Stamps each result with the
/// local clock at delivery.
#[derive(Debug, Clone)]
pub struct RecognitionSink {
    tx: mpsc::UnboundedSender<CapturedEvent>,
    clock: Arc<dyn Clock>,
}

impl RecognitionSink {
    /// Returns `false` once the capture has gone away. Blank results are
    /// dropped.
    pub fn deliver(&self, recognition: Recognition) -> bool {
        let text = recognition.text.trim();
        if text.is_empty() {
            return !self.tx.is_closed();
        }
        let event = CapturedEvent {
            at_local_ms: self.clock.now_ms(),
            kind: "ans".to_string(),
            payload: payload(json!({
                "text": text,
                "confidence": recognition.confidence,
            })),
        };
        self.tx.send(event).is_ok()
    }
}

/// External speech recognition service. Transcription itself happens behind
/// this trait.
#[async_trait]
pub trait Recognizer: Send {
    fn is_supported(&self) -> bool;

    async fn start(&mut self, sink: RecognitionSink) -> Result<(), CaptureError>;

    async fn stop(&mut self) -> Result<(), CaptureError>;
}

/// Records what the participant says as `ans` timeline events.
pub struct SpeechTextCapture<R> {
    recognizer: R,
    clock: Arc<dyn Clock>,
    results: Option<mpsc::UnboundedReceiver<CapturedEvent>>,
}

impl<R: Recognizer> SpeechTextCapture<R> {
    pub fn new(recognizer: R, clock: Arc<dyn Clock>) -> Self {
        Self {
            recognizer,
            clock,
            results: None,
        }
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }
}

#[async_trait]
impl<R: Recognizer> Capture for SpeechTextCapture<R> {
    fn kind(&self) -> CaptureKind {
        CaptureKind::SpeechText
    }

    fn is_supported(&self) -> bool {
        self.recognizer.is_supported()
    }

    async fn start(&mut self) -> Result<(), CaptureError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.results = Some(rx);
        let sink = RecognitionSink {
            tx,
            clock: self.clock.clone(),
        };
        if let Err(e) = self.recognizer.start(sink).await {
            self.results = None;
            return Err(e);
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<CaptureArtifact, CaptureError> {
        // Results delivered while stopping stay queued for the final drain.
        self.recognizer.stop().await?;
        Ok(CaptureArtifact::Nothing)
    }

    fn drain_events(&mut self) -> Vec<CapturedEvent> {
        let mut events = Vec::new();
        if let Some(rx) = self.results.as_mut() {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        events
    }
}
