//! Recognition configuration.
//!
//! [`RecognitionConfig`] is created by the caller, validated, and handed to
//! the session supervisor, which keeps its own copy for the lifetime of the
//! session. Every field carries a serde default so an empty TOML document
//! (or `{}` in JSON) yields the defaults.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Grammar hint passed to the speech engine when the config does not set one.
pub const DEFAULT_GRAMMAR_HINT: &str = "#JSGF V1.0; grammar commands; public <command> = click on | focus | navigate to | back | forward | fill out | clear | scroll down | scroll up | refresh ;";

// ---------------------------------------------------------------------------
// RecognitionConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for a voice recognition session.
///
/// Recognition is always continuous; there is deliberately no field to turn
/// that off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// BCP-47 language tag for the speech engine.
    #[serde(default = "default_language")]
    pub language: String,

    /// Whether the engine should report interim (non-final) results.
    #[serde(default)]
    pub interim_results: bool,

    /// Grammar hint for the engine. `None` uses [`DEFAULT_GRAMMAR_HINT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grammar_hint: Option<String>,

    /// Pixels scrolled by "scroll up" / "scroll down".
    #[serde(default = "default_scroll_amount")]
    pub scroll_amount: u32,

    /// Start listening as soon as the session handle is created.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    /// Microphone capture settings for the capture engine.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Speech-to-text provider settings for the capture engine.
    #[serde(default)]
    pub stt: SttConfig,

    /// Browser document host settings.
    #[serde(default)]
    pub browser: BrowserConfig,
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_scroll_amount() -> u32 {
    500
}

fn default_auto_start() -> bool {
    true
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            interim_results: false,
            grammar_hint: None,
            scroll_amount: default_scroll_amount(),
            auto_start: default_auto_start(),
            capture: CaptureConfig::default(),
            stt: SttConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl RecognitionConfig {
    /// The grammar hint to hand to the engine.
    pub fn effective_grammar_hint(&self) -> &str {
        self.grammar_hint.as_deref().unwrap_or(DEFAULT_GRAMMAR_HINT)
    }

    /// Primary language subtag ("en-US" -> "en"), as STT backends expect.
    pub fn primary_language(&self) -> &str {
        self.language
            .split(['-', '_'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("en")
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.language.trim().is_empty() {
            return Err(ConfigError::Invalid("language must not be empty".into()));
        }
        if self.scroll_amount == 0 {
            return Err(ConfigError::Invalid(
                "scroll_amount must be greater than zero".into(),
            ));
        }
        if self.capture.sample_rate == 0 {
            return Err(ConfigError::Invalid(
                "capture.sample_rate must be greater than zero".into(),
            ));
        }
        if self.capture.window_secs == 0 {
            return Err(ConfigError::Invalid(
                "capture.window_secs must be greater than zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.capture.vad_threshold) {
            return Err(ConfigError::Invalid(format!(
                "capture.vad_threshold must be within 0.0..=1.0, got {}",
                self.capture.vad_threshold
            )));
        }
        let attr = &self.browser.key_attribute;
        if attr.is_empty()
            || !attr
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "browser.key_attribute {attr:?} is not a valid attribute name"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Microphone capture and voice activity settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Audio sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Number of audio channels.
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// RMS energy threshold (0.0 - 1.0) above which a frame counts as speech.
    #[serde(default = "default_vad_threshold")]
    pub vad_threshold: f32,

    /// Fraction of speech frames a window needs before it is transcribed.
    #[serde(default = "default_min_voice_ratio")]
    pub min_voice_ratio: f32,

    /// Length of one recording window, in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Consecutive silent windows after which the engine ends the session.
    /// 0 never ends on silence.
    #[serde(default = "default_silence_windows")]
    pub silence_windows: u32,
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_vad_threshold() -> f32 {
    0.02
}

fn default_min_voice_ratio() -> f32 {
    0.1
}

fn default_window_secs() -> u64 {
    3
}

fn default_silence_windows() -> u32 {
    5
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            vad_threshold: default_vad_threshold(),
            min_voice_ratio: default_min_voice_ratio(),
            window_secs: default_window_secs(),
            silence_windows: default_silence_windows(),
        }
    }
}

// ---------------------------------------------------------------------------
// STT
// ---------------------------------------------------------------------------

/// Available STT provider types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SttProviderKind {
    /// OpenAI Whisper API.
    #[default]
    Whisper,
    /// Local whisper.cpp binary.
    Local,
}

impl std::fmt::Display for SttProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SttProviderKind::Whisper => write!(f, "whisper"),
            SttProviderKind::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for SttProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whisper" => Ok(SttProviderKind::Whisper),
            "local" => Ok(SttProviderKind::Local),
            other => Err(format!("unknown STT provider {other:?} (expected whisper or local)")),
        }
    }
}

/// Speech-to-text settings.
///
/// API keys are never stored here; only the name of the environment
/// variable that holds one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default)]
    pub provider: SttProviderKind,

    /// Environment variable holding the API key (cloud providers).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model name override (provider-specific).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Path to the whisper.cpp binary (local provider).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whisper_bin: Option<String>,

    /// Path to the GGML model file (local provider).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whisper_model: Option<String>,
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            provider: SttProviderKind::default(),
            api_key_env: default_api_key_env(),
            model: None,
            whisper_bin: None,
            whisper_model: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

/// Settings for the CDP-backed document host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Attribute whose value is the command key of an element.
    #[serde(default = "default_key_attribute")]
    pub key_attribute: String,

    /// Per-command CDP timeout in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

fn default_key_attribute() -> String {
    "data-cmd".to_string()
}

fn default_command_timeout_ms() -> u64 {
    30_000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            key_attribute: default_key_attribute(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}
