//! A speech capability built from microphone capture and an STT provider.
//!
//! Each recognizer runs a background loop: record a window, skip it if it
//! holds no speech, transcribe it, emit the text as a final result. The loop
//! ends with [`SpeechEvent::End`] after `capture.silence_windows` quiet
//! windows in a row, or with [`SpeechEvent::Error`] when capture or
//! transcription fails.
//!
//! The configured grammar hint is passed to the STT provider as a prompt
//! with every window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use voxnav_types::{CaptureConfig, RecognitionConfig};

use crate::capability::{EventSink, RecognitionResult, Recognizer, SpeechCapability, SpeechEvent};
use crate::capture::{window_has_speech, AudioCapture, AudioSource};
use crate::stt::{create_stt_provider, grammar_prompt, SttProvider};
use crate::{VoiceError, VoiceResult};

/// Capture + STT speech capability.
pub struct CaptureSpeech {
    source: Arc<dyn AudioSource>,
    stt: Arc<dyn SttProvider>,
}

impl CaptureSpeech {
    pub fn new(source: Arc<dyn AudioSource>, stt: Arc<dyn SttProvider>) -> Self {
        Self { source, stt }
    }

    /// Probe for a recorder and build the configured STT provider.
    ///
    /// Fails with [`VoiceError::Unsupported`] when no recorder is installed.
    pub async fn detect(config: &RecognitionConfig) -> VoiceResult<Self> {
        let capture = AudioCapture::detect(&config.capture).await?;
        let stt = create_stt_provider(&config.stt, config.primary_language())?;
        Ok(Self::new(Arc::new(capture), Arc::from(stt)))
    }
}

impl SpeechCapability for CaptureSpeech {
    fn name(&self) -> &str {
        "capture"
    }

    fn create(&self, config: &RecognitionConfig) -> VoiceResult<Box<dyn Recognizer>> {
        Ok(Box::new(CaptureRecognizer {
            source: self.source.clone(),
            stt: self.stt.clone(),
            capture: config.capture.clone(),
            prompt: grammar_prompt(config.effective_grammar_hint()),
            listening: Arc::new(AtomicBool::new(false)),
            task: None,
            started: false,
        }))
    }
}

struct CaptureRecognizer {
    source: Arc<dyn AudioSource>,
    stt: Arc<dyn SttProvider>,
    capture: CaptureConfig,
    prompt: Option<String>,
    listening: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    started: bool,
}

impl Recognizer for CaptureRecognizer {
    fn start(&mut self, sink: EventSink) -> VoiceResult<()> {
        if self.started {
            return Err(VoiceError::StartError(
                "recognizer has already been started".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| VoiceError::Runtime(e.to_string()))?;

        self.started = true;
        self.listening.store(true, Ordering::SeqCst);
        tracing::debug!(
            source = self.source.name(),
            stt = self.stt.name(),
            window_secs = self.capture.window_secs,
            "capture recognizer listening"
        );
        self.task = Some(runtime.spawn(listen_loop(
            self.source.clone(),
            self.stt.clone(),
            self.capture.clone(),
            self.prompt.clone(),
            self.listening.clone(),
            sink,
        )));
        Ok(())
    }

    fn stop(&mut self) {
        self.listening.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CaptureRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn listen_loop(
    source: Arc<dyn AudioSource>,
    stt: Arc<dyn SttProvider>,
    capture: CaptureConfig,
    prompt: Option<String>,
    listening: Arc<AtomicBool>,
    sink: EventSink,
) {
    let mut quiet_windows = 0u32;

    while listening.load(Ordering::SeqCst) {
        let audio = match source.record_window(capture.window_secs).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "audio capture failed");
                finish(&listening, &sink, SpeechEvent::Error(e.to_string()));
                return;
            }
        };

        if !window_has_speech(&audio, &capture) {
            quiet_windows += 1;
            if capture.silence_windows > 0 && quiet_windows >= capture.silence_windows {
                finish(&listening, &sink, SpeechEvent::End);
                return;
            }
            continue;
        }
        quiet_windows = 0;

        match stt.transcribe(&audio, prompt.as_deref()).await {
            Ok(text) if text.trim().is_empty() => {}
            Ok(text) => {
                tracing::debug!(transcript = %text, "heard speech");
                let event = SpeechEvent::Result(vec![RecognitionResult::final_text(text)]);
                if !sink.emit(event) {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                finish(&listening, &sink, SpeechEvent::Error(e.to_string()));
                return;
            }
        }
    }

    listening.store(false, Ordering::SeqCst);
}

fn finish(listening: &AtomicBool, sink: &EventSink, event: SpeechEvent) {
    if listening.swap(false, Ordering::SeqCst) {
        sink.emit(event);
    }
}
