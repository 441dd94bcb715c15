use std::io::{self, BufRead};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use async_trait::async_trait;
use clockex_capture::{CaptureError, Recognition, RecognitionSink, Recognizer};

type Attached = Arc<Mutex<Option<RecognitionSink>>>;

/// Treats each line typed on stdin as a recognized answer. Stands in for a
/// speech recognition service on hosts without one.
///
/// One reader thread lives for the whole process and blocks on stdin;
/// `start` and `stop` only attach and detach the set's sink. Lines typed
/// while no set is listening are dropped.
#[derive(Debug)]
pub struct StdinRecognizer {
    attached: Attached,
}

impl StdinRecognizer {
    /// Starts the stdin reader thread. Call once per process.
    pub fn spawn() -> io::Result<Self> {
        let recognizer = Self::detached();
        let attached = recognizer.attached.clone();
        thread::Builder::new()
            .name("stdin-lines".into())
            .spawn(move || forward_lines(io::stdin().lock(), &attached))?;
        Ok(recognizer)
    }

    fn detached() -> Self {
        Self {
            attached: Arc::default(),
        }
    }

    fn attach(&self, sink: Option<RecognitionSink>) {
        *self.attached.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }
}

fn forward_lines<B: BufRead>(input: B, attached: &Mutex<Option<RecognitionSink>>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("[STT] stdin read failed: {e}");
                return;
            }
        };
        let mut slot = attached.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(sink) => {
                if !sink.deliver(Recognition::new(line)) {
                    *slot = None;
                }
            }
            None => tracing::debug!("[STT] no set is listening; line dropped"),
        }
    }
    tracing::debug!("[STT] stdin closed");
}

#[async_trait]
impl Recognizer for StdinRecognizer {
    fn is_supported(&self) -> bool {
        true
    }

    async fn start(&mut self, sink: RecognitionSink) -> Result<(), CaptureError> {
        self.attach(Some(sink));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.attach(None);
        Ok(())
    }
}
