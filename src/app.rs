use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clockex_capture::filename::{random_id, RANDOM_ID_LEN};
use clockex_capture::{
    AudioCapture, Capture, CaptureSession, HttpTimeSource, HttpUploadSink, InteractionLog, LocalFallback,
    SpeechTextCapture, UnavailableMicrophone,
};
use clockex_experiment::{
    CaptureSessions, ExperimentConfig, Participant, RunProgression, SetReport, TrialSequences,
};
use clockex_timing::{Clock, MonotonicClock, TimeSource};

use crate::cli::Cli;
use crate::recognizer::StdinRecognizer;
use crate::terminal::TerminalFrontend;

pub struct App {
    progression: RunProgression,
    frontend: TerminalFrontend,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        let mut config = load_config(&cli.config);
        if let Some(sets) = cli.sets {
            config.total_sets = sets;
        }

        let sequences = match &cli.sequences {
            Some(path) => TrialSequences::load(path)
                .with_context(|| format!("loading trial sequences from {}", path.display()))?,
            None => {
                tracing::info!("[Config] No sequence file given, using built-in trial lists");
                TrialSequences::default()
            }
        };

        let participant = Participant {
            name: cli
                .participant
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| format!("anon{}", random_id(&mut rand::rng(), RANDOM_ID_LEN))),
            run_type: cli.run_type,
            group: cli.group,
        };

        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let time_source: Option<Arc<dyn TimeSource>> = if cli.no_sync {
            None
        } else {
            let source = HttpTimeSource::new(&config.endpoints.time_url, config.endpoints.request_timeout())
                .context("building clock sync client")?;
            Some(Arc::new(source))
        };

        let session = |capture: Box<dyn Capture>, url: &str| -> Result<CaptureSession> {
            let sink = HttpUploadSink::new(url, config.endpoints.request_timeout())
                .with_context(|| format!("building upload client for {url}"))?;
            let mut session = CaptureSession::new(capture, clock.clone(), Arc::new(sink));
            if let Some(source) = &time_source {
                session = session.with_time_source(source.clone());
            }
            if config.auto_download_on_upload_fail {
                session = session.with_fallback(LocalFallback::new(&config.fallback_dir));
            }
            Ok(session)
        };

        let recognizer = StdinRecognizer::spawn().context("starting the stdin reader")?;
        let sessions = CaptureSessions {
            audio: session(
                Box::new(AudioCapture::new(UnavailableMicrophone)),
                &config.endpoints.audio_upload_url,
            )?,
            speech: session(
                Box::new(SpeechTextCapture::new(recognizer, clock.clone())),
                &config.endpoints.text_upload_url,
            )?,
            log: session(Box::new(InteractionLog::new()), &config.endpoints.log_upload_url)?,
        };

        tracing::info!(
            participant = %participant.name,
            label = %participant.run_label(),
            total_sets = config.total_sets,
            "[Run] ready"
        );
        let progression = RunProgression::new(config, sequences, participant, sessions, clock);

        Ok(Self {
            progression,
            frontend: TerminalFrontend::new(true),
        })
    }

    pub async fn run(mut self) -> Result<()> {
        println!("=== CLOCK RECALL ===");
        println!(
            "Participant: {}  Run: {}",
            self.progression.participant().name,
            self.progression.participant().run_label()
        );
        println!("Watch the clock. Answer each question when it is asked. Ctrl-C stops the run.\n");

        let interrupted = tokio::select! {
            reports = self.progression.run_all(&mut self.frontend) => {
                summarize(&reports);
                false
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for Ctrl-C")?;
                true
            }
        };

        if interrupted {
            println!();
            if let Some(outcome) = self.progression.abort("interrupted").await {
                tracing::info!(ok = outcome.is_ok(), "[Run] interaction log delivered after interrupt");
            }
        }
        Ok(())
    }
}

/// A missing config file is normal and quietly means defaults; an unreadable
/// one is warned about.
fn load_config(path: &Path) -> ExperimentConfig {
    if path.exists() {
        ExperimentConfig::load_from_file(path)
    } else {
        tracing::info!("[Config] {} not found, using defaults", path.display());
        ExperimentConfig::default()
    }
}

fn summarize(reports: &[SetReport]) {
    for report in reports {
        for (tag, outcome) in [
            ("[REC]", &report.audio),
            ("[STT]", &report.speech),
            ("[LOG]", &report.log),
        ] {
            tracing::info!(
                set = report.set_index,
                ok = outcome.is_ok(),
                file = outcome.filename().unwrap_or("-"),
                "{tag} set summary"
            );
        }
    }
}
