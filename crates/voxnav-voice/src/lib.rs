//! Continuous speech recognition for voxnav.
//!
//! Keeps one recognition session alive, restarting it after the engine
//! ends or fails, and feeds every transcript to a
//! [`Dispatcher`](voxnav_commands::Dispatcher).
//!
//! # Modules
//!
//! - [`capability`]: the [`SpeechCapability`] / [`Recognizer`] traits and the
//!   events a recognizer emits.
//! - [`supervisor`]: the session state machine and the
//!   [`start_voice_recognition`] / [`stop_voice_recognition`] control API.
//! - [`capture`]: microphone capture via system commands (SoX `rec`, `arecord`)
//!   and energy-based voice activity detection.
//! - [`stt`]: speech-to-text providers (Whisper API, local whisper.cpp).
//! - [`engine`]: a [`SpeechCapability`] built from capture + STT.

pub mod capability;
pub mod capture;
pub mod engine;
pub mod stt;
pub mod supervisor;

pub use capability::{
    Alternative, EventSink, RecognitionResult, Recognizer, SpeechCapability, SpeechEvent,
};
pub use engine::CaptureSpeech;
pub use supervisor::{
    start_voice_recognition, start_voice_recognition_with_grammar, stop_voice_recognition,
    SessionHandle, SessionState, RESTART_DELAY,
};

/// Errors that can occur during voice operations.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// The platform offers no speech capability. Never retried.
    #[error("speech recognition unsupported: {0}")]
    Unsupported(String),

    /// Audio capture failed.
    #[error("audio capture error: {0}")]
    CaptureError(String),

    /// Speech-to-text transcription failed.
    #[error("STT error: {0}")]
    SttError(String),

    /// The recognizer refused to start.
    #[error("recognizer failed to start: {0}")]
    StartError(String),

    /// Invalid recognition configuration.
    #[error(transparent)]
    Config(#[from] voxnav_types::ConfigError),

    /// A provider setting is missing or unusable.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Called outside a tokio runtime.
    #[error("no tokio runtime available: {0}")]
    Runtime(String),

    /// HTTP request error.
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience alias for voice operation results.
pub type VoiceResult<T> = Result<T, VoiceError>;
