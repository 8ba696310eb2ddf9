//! The speech engine seen from the supervisor.
//!
//! A [`SpeechCapability`] creates [`Recognizer`] instances. Each instance is
//! started at most once; it reports what it hears through an [`EventSink`]
//! and eventually emits [`SpeechEvent::End`] or [`SpeechEvent::Error`]. The
//! supervisor never reuses an instance after either signal.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use voxnav_types::RecognitionConfig;

use crate::VoiceResult;

/// One candidate transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub transcript: String,
    /// Engine confidence in `0.0..=1.0`.
    pub confidence: f32,
}

/// One recognized utterance with its candidates, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub alternatives: Vec<Alternative>,
    /// `false` for interim results.
    pub is_final: bool,
}

impl RecognitionResult {
    /// A final result with a single alternative.
    pub fn final_text(transcript: impl Into<String>) -> Self {
        Self {
            alternatives: vec![Alternative {
                transcript: transcript.into(),
                confidence: 1.0,
            }],
            is_final: true,
        }
    }
}

/// What a recognizer reports.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// Accumulated results for the session so far.
    Result(Vec<RecognitionResult>),
    /// The engine stopped listening on its own.
    End,
    /// The engine failed.
    Error(String),
}

impl SpeechEvent {
    /// The top alternative of the latest result, trimmed and lowercased.
    ///
    /// `None` for `End`, `Error`, and results with nothing usable in them.
    pub fn transcript(&self) -> Option<String> {
        let SpeechEvent::Result(results) = self else {
            return None;
        };
        let top = results.last()?.alternatives.first()?;
        let text = top.transcript.trim().to_lowercase();
        (!text.is_empty()).then_some(text)
    }
}

/// Delivers events from a recognizer to whoever started it.
///
/// Cheap to clone. [`emit`](Self::emit) returns `false` once the receiver
/// is gone, which a recognizer should treat as a request to stop.
#[derive(Clone)]
pub struct EventSink {
    deliver: Arc<dyn Fn(SpeechEvent) -> bool + Send + Sync>,
}

impl EventSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(SpeechEvent) -> bool + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// A sink backed by an unbounded channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SpeechEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(move |event| tx.send(event).is_ok()), rx)
    }

    pub fn emit(&self, event: SpeechEvent) -> bool {
        (self.deliver)(event)
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

/// One continuous listening activation.
pub trait Recognizer: Send {
    /// Begin listening. Returns once the request is accepted; events follow
    /// through `sink`.
    fn start(&mut self, sink: EventSink) -> VoiceResult<()>;

    /// Stop listening. Idempotent.
    fn stop(&mut self);
}

/// A speech-to-text engine that can produce recognizers.
pub trait SpeechCapability: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Create a fresh recognizer for `config`. Recognition is always
    /// continuous.
    ///
    /// Returns [`VoiceError::Unsupported`](crate::VoiceError::Unsupported)
    /// when the platform has no usable engine.
    fn create(&self, config: &RecognitionConfig) -> VoiceResult<Box<dyn Recognizer>>;
}
