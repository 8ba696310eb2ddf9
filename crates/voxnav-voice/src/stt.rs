//! Speech-to-text providers.
//!
//! - [`WhisperStt`]: OpenAI Whisper transcription API.
//! - [`LocalStt`]: whisper.cpp run as a subprocess, fully offline.
//!
//! API keys are read from the environment variable named in
//! [`SttConfig::api_key_env`] and never stored in configuration files.
//!
//! Both providers accept a prompt that biases recognition toward the command
//! vocabulary; [`grammar_prompt`] derives one from the configured grammar
//! hint.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::process::Command;
use voxnav_types::{SttConfig, SttProviderKind};

use crate::{VoiceError, VoiceResult};

/// Turns one WAV window into text.
#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Transcribe 16-bit PCM WAV audio, biased toward the words in
    /// `prompt`. An empty string means nothing was recognized.
    async fn transcribe(&self, audio: &[u8], prompt: Option<&str>) -> VoiceResult<String>;

    fn name(&self) -> &str;
}

/// Read the API key named by `config.api_key_env` through `lookup`.
pub fn resolve_api_key_with<F>(config: &SttConfig, lookup: F) -> VoiceResult<String>
where
    F: FnOnce(&str) -> Option<String>,
{
    match lookup(&config.api_key_env) {
        Some(key) if !key.trim().is_empty() => Ok(key),
        Some(_) => Err(VoiceError::ConfigError(format!(
            "API key is empty: environment variable {}",
            config.api_key_env
        ))),
        None => Err(VoiceError::ConfigError(format!(
            "missing API key: environment variable {} is not set",
            config.api_key_env
        ))),
    }
}

/// Turn a grammar hint into prompt text for a transcription model.
///
/// A JSGF rule such as `public <command> = click on | back ;` becomes
/// `click on, back`. Any other hint is used as-is. `None` when nothing is
/// left.
pub fn grammar_prompt(hint: &str) -> Option<String> {
    let hint = hint.trim();
    let prompt = match hint.rsplit_once('=') {
        Some((_, alternatives)) if hint.starts_with("#JSGF") => alternatives
            .trim()
            .trim_end_matches(';')
            .split('|')
            .map(str::trim)
            .filter(|phrase| !phrase.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => hint.to_string(),
    };
    (!prompt.is_empty()).then_some(prompt)
}

/// Read the API key from the process environment.
pub fn resolve_api_key(config: &SttConfig) -> VoiceResult<String> {
    resolve_api_key_with(config, |var| std::env::var(var).ok())
}

// ---------------------------------------------------------------------------
// Whisper API
// ---------------------------------------------------------------------------

const DEFAULT_WHISPER_MODEL: &str = "whisper-1";
const WHISPER_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// OpenAI Whisper API provider.
pub struct WhisperStt {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    language: String,
}

impl WhisperStt {
    pub fn new(api_key: String, model: Option<String>, language: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: WHISPER_API_URL.to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_WHISPER_MODEL.to_string()),
            language: language.to_string(),
        }
    }

    /// Build from configuration, resolving the API key immediately.
    pub fn from_config(config: &SttConfig, language: &str) -> VoiceResult<Self> {
        let api_key = resolve_api_key(config)?;
        Ok(Self::new(api_key, config.model.clone(), language))
    }

    /// Send requests to `endpoint` instead of the public API.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Text fields sent alongside the audio part.
    fn text_fields(&self, prompt: Option<&str>) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("model", self.model.clone()),
            ("language", self.language.clone()),
            ("response_format", "text".to_string()),
        ];
        if let Some(prompt) = prompt {
            fields.push(("prompt", prompt.to_string()));
        }
        fields
    }

    fn form(&self, audio: &[u8], prompt: Option<&str>) -> VoiceResult<reqwest::multipart::Form> {
        let file = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::SttError(format!("failed to build upload: {e}")))?;
        let mut form = reqwest::multipart::Form::new().part("file", file);
        for (name, value) in self.text_fields(prompt) {
            form = form.text(name, value);
        }
        Ok(form)
    }
}

#[async_trait]
impl SttProvider for WhisperStt {
    async fn transcribe(&self, audio: &[u8], prompt: Option<&str>) -> VoiceResult<String> {
        tracing::debug!(
            model = %self.model,
            language = %self.language,
            prompted = prompt.is_some(),
            audio_bytes = audio.len(),
            "sending audio to Whisper API"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(self.form(audio, prompt)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(VoiceError::SttError(format!(
                "Whisper API returned {status}: {body}"
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| VoiceError::SttError(format!("failed to read response: {e}")))?;
        Ok(text.trim().to_string())
    }

    fn name(&self) -> &str {
        "whisper"
    }
}

// ---------------------------------------------------------------------------
// whisper.cpp
// ---------------------------------------------------------------------------

const DEFAULT_WHISPER_BIN: &str = "whisper-cpp";

static NEXT_UPLOAD: AtomicU64 = AtomicU64::new(0);

/// Local whisper.cpp provider.
pub struct LocalStt {
    whisper_bin: String,
    model_path: String,
    language: String,
}

impl LocalStt {
    pub fn new(whisper_bin: String, model_path: String, language: &str) -> Self {
        Self {
            whisper_bin,
            model_path,
            language: language.to_string(),
        }
    }

    /// Build from configuration. `whisper_model` is required.
    pub fn from_config(config: &SttConfig, language: &str) -> VoiceResult<Self> {
        let model_path = config.whisper_model.clone().ok_or_else(|| {
            VoiceError::ConfigError(
                "stt.whisper_model is required for the local provider".to_string(),
            )
        })?;
        let whisper_bin = config
            .whisper_bin
            .clone()
            .unwrap_or_else(|| DEFAULT_WHISPER_BIN.to_string());
        Ok(Self::new(whisper_bin, model_path, language))
    }

    fn args(&self, input: &str, prompt: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            self.model_path.clone(),
            "-l".to_string(),
            self.language.clone(),
            "-f".to_string(),
            input.to_string(),
            "--no-timestamps".to_string(),
        ];
        if let Some(prompt) = prompt {
            args.extend(["--prompt".to_string(), prompt.to_string()]);
        }
        args
    }
}

#[async_trait]
impl SttProvider for LocalStt {
    async fn transcribe(&self, audio: &[u8], prompt: Option<&str>) -> VoiceResult<String> {
        let n = NEXT_UPLOAD.fetch_add(1, Ordering::Relaxed);
        let input =
            std::env::temp_dir().join(format!("voxnav_stt_{}_{n}.wav", std::process::id()));
        tokio::fs::write(&input, audio)
            .await
            .map_err(|e| VoiceError::SttError(format!("failed to write temp audio file: {e}")))?;

        tracing::debug!(
            bin = %self.whisper_bin,
            model = %self.model_path,
            audio_bytes = audio.len(),
            "transcribing with whisper.cpp"
        );

        let output = Command::new(&self.whisper_bin)
            .args(self.args(&input.to_string_lossy(), prompt))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;
        let _ = tokio::fs::remove_file(&input).await;

        let output = output
            .map_err(|e| VoiceError::SttError(format!("failed to run {}: {e}", self.whisper_bin)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::SttError(format!(
                "whisper.cpp exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(join_transcript_lines(&String::from_utf8_lossy(&output.stdout)))
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Collapse whisper.cpp output lines into one utterance.
fn join_transcript_lines(stdout: &str) -> String {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the provider selected by `config.provider`.
///
/// `language` is a primary language subtag such as `en`.
pub fn create_stt_provider(
    config: &SttConfig,
    language: &str,
) -> VoiceResult<Box<dyn SttProvider>> {
    let provider: Box<dyn SttProvider> = match config.provider {
        SttProviderKind::Whisper => Box::new(WhisperStt::from_config(config, language)?),
        SttProviderKind::Local => Box::new(LocalStt::from_config(config, language)?),
    };
    tracing::info!(provider = provider.name(), language, "speech-to-text provider ready");
    Ok(provider)
}
