//! Microphone capture through system recorders.
//!
//! Audio is recorded in fixed-length windows by running SoX `rec` or ALSA
//! `arecord` as a subprocess. Each window is a 16-bit signed PCM WAV file,
//! read back into memory and deleted.
//!
//! The energy helpers at the bottom of this module decide whether a window
//! holds speech before it is sent to a transcription provider.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::process::Command;
use voxnav_types::CaptureConfig;

use crate::{VoiceError, VoiceResult};

/// System recorder used for capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBackend {
    /// SoX `rec`.
    Sox,
    /// ALSA `arecord`.
    Arecord,
}

impl CaptureBackend {
    /// Executable name on `PATH`.
    pub fn program(self) -> &'static str {
        match self {
            CaptureBackend::Sox => "rec",
            CaptureBackend::Arecord => "arecord",
        }
    }
}

impl std::fmt::Display for CaptureBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureBackend::Sox => write!(f, "sox"),
            CaptureBackend::Arecord => write!(f, "arecord"),
        }
    }
}

/// Find a recorder on this system, preferring SoX.
pub async fn detect_backend() -> Option<CaptureBackend> {
    for backend in [CaptureBackend::Sox, CaptureBackend::Arecord] {
        if command_exists(backend.program()).await {
            return Some(backend);
        }
    }
    None
}

async fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// A source of fixed-length WAV windows.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Record `secs` seconds and return the WAV bytes.
    async fn record_window(&self, secs: u64) -> VoiceResult<Vec<u8>>;

    fn name(&self) -> &str;
}

static NEXT_WINDOW: AtomicU64 = AtomicU64::new(0);

/// Records windows from the default microphone.
#[derive(Debug, Clone)]
pub struct AudioCapture {
    backend: CaptureBackend,
    sample_rate: u32,
    channels: u16,
    scratch_dir: PathBuf,
}

impl AudioCapture {
    pub fn new(config: &CaptureConfig, backend: CaptureBackend) -> Self {
        Self {
            backend,
            sample_rate: config.sample_rate,
            channels: config.channels,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Detect a recorder and build a capture for it.
    ///
    /// Fails with [`VoiceError::Unsupported`] when neither recorder is
    /// installed.
    pub async fn detect(config: &CaptureConfig) -> VoiceResult<Self> {
        let backend = detect_backend().await.ok_or_else(|| {
            VoiceError::Unsupported(
                "no audio capture backend found; install SoX (rec) or ALSA (arecord)".to_string(),
            )
        })?;
        tracing::info!(backend = %backend, "detected audio capture backend");
        Ok(Self::new(config, backend))
    }

    /// Write temporary recordings under `dir` instead of the system temp dir.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn backend(&self) -> CaptureBackend {
        self.backend
    }

    /// Recorder arguments for a `secs`-second window written to `output`.
    pub fn recorder_args(&self, output: &Path, secs: u64) -> Vec<String> {
        let rate = self.sample_rate.to_string();
        let channels = self.channels.to_string();
        let output = output.to_string_lossy().into_owned();
        match self.backend {
            CaptureBackend::Sox => {
                let mut args = vec![
                    "-q".to_string(),
                    "-r".to_string(),
                    rate,
                    "-c".to_string(),
                    channels,
                    "-b".to_string(),
                    "16".to_string(),
                    "-e".to_string(),
                    "signed-integer".to_string(),
                    output,
                ];
                if secs > 0 {
                    args.extend(["trim".to_string(), "0".to_string(), secs.to_string()]);
                }
                args
            }
            CaptureBackend::Arecord => {
                let mut args = vec![
                    "-q".to_string(),
                    "-f".to_string(),
                    "S16_LE".to_string(),
                    "-r".to_string(),
                    rate,
                    "-c".to_string(),
                    channels,
                    "-t".to_string(),
                    "wav".to_string(),
                ];
                if secs > 0 {
                    args.extend(["-d".to_string(), secs.to_string()]);
                }
                args.push(output);
                args
            }
        }
    }

    fn scratch_path(&self) -> PathBuf {
        let n = NEXT_WINDOW.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir
            .join(format!("voxnav_capture_{}_{n}.wav", std::process::id()))
    }

    async fn record_to(&self, output: &Path, secs: u64) -> VoiceResult<()> {
        let program = self.backend.program();
        tracing::debug!(
            backend = %self.backend,
            output = %output.display(),
            secs,
            "recording audio window"
        );

        let status = Command::new(program)
            .args(self.recorder_args(output, secs))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| VoiceError::CaptureError(format!("failed to run {program}: {e}")))?;

        if !status.success() {
            return Err(VoiceError::CaptureError(format!(
                "{program} exited with status: {status}"
            )));
        }
        Ok(())
    }
}

/// Removes a scratch recording when dropped, including when the recording
/// future is cancelled mid-window.
struct ScratchFile(PathBuf);

impl ScratchFile {
    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(
                    path = %self.0.display(),
                    error = %e,
                    "failed to remove scratch audio"
                );
            }
        }
    }
}

#[async_trait]
impl AudioSource for AudioCapture {
    async fn record_window(&self, secs: u64) -> VoiceResult<Vec<u8>> {
        let scratch = ScratchFile(self.scratch_path());
        self.record_to(scratch.path(), secs).await?;
        tokio::fs::read(scratch.path())
            .await
            .map_err(|e| VoiceError::CaptureError(format!("failed to read recorded audio: {e}")))
    }

    fn name(&self) -> &str {
        self.backend.program()
    }
}

// ---------------------------------------------------------------------------
// Voice activity detection
// ---------------------------------------------------------------------------

const WAV_HEADER_SIZE: usize = 44;

/// Normalized RMS energy of 16-bit samples, in `0.0..=1.0`. Zero for empty
/// input.
pub fn compute_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_of_squares: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    let rms = (sum_of_squares / samples.len() as f64).sqrt();
    (rms / f64::from(i16::MAX)) as f32
}

/// Little-endian PCM samples after a canonical 44-byte WAV header.
pub fn wav_to_samples(wav_data: &[u8]) -> Vec<i16> {
    let Some(pcm) = wav_data.get(WAV_HEADER_SIZE..) else {
        return Vec::new();
    };
    pcm.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Fraction of `frame_size`-sample frames whose energy exceeds `threshold`.
pub fn voice_activity_ratio(samples: &[i16], threshold: f32, frame_size: usize) -> f32 {
    if samples.is_empty() || frame_size == 0 {
        return 0.0;
    }
    let mut total = 0usize;
    let mut active = 0usize;
    for frame in samples.chunks(frame_size) {
        total += 1;
        if compute_rms(frame) > threshold {
            active += 1;
        }
    }
    active as f32 / total as f32
}

/// Samples in a 30 ms frame at `sample_rate`.
pub fn frame_size_for(sample_rate: u32) -> usize {
    (sample_rate as usize * 30 / 1000).max(1)
}

/// Whether a WAV window holds enough speech to transcribe.
pub fn window_has_speech(wav: &[u8], config: &CaptureConfig) -> bool {
    let samples = wav_to_samples(wav);
    let ratio = voice_activity_ratio(
        &samples,
        config.vad_threshold,
        frame_size_for(config.sample_rate),
    );
    ratio >= config.min_voice_ratio && ratio > 0.0
}

#[cfg(test)]
pub(crate) fn wav_from_samples(samples: &[i16]) -> Vec<u8> {
    let mut data = vec![0u8; WAV_HEADER_SIZE];
    for s in samples {
        data.extend_from_slice(&s.to_le_bytes());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(backend: CaptureBackend) -> AudioCapture {
        AudioCapture::new(&CaptureConfig::default(), backend)
    }

    #[tokio::test]
    async fn scratch_file_removed_when_recording_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("window.wav");
        std::fs::write(&path, b"RIFF partial").unwrap();

        let scratch = ScratchFile(path.clone());
        let task = tokio::spawn(async move {
            let _scratch = scratch;
            std::future::pending::<()>().await;
        });
        tokio::task::yield_now().await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert!(!path.exists());
    }

    #[test]
    fn scratch_file_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        drop(ScratchFile(dir.path().join("never-written.wav")));
    }

    #[test]
    fn backend_names() {
        assert_eq!(CaptureBackend::Sox.to_string(), "sox");
        assert_eq!(CaptureBackend::Sox.program(), "rec");
        assert_eq!(CaptureBackend::Arecord.program(), "arecord");
    }

    #[test]
    fn sox_args_trim_to_window() {
        let args = capture(CaptureBackend::Sox).recorder_args(Path::new("/tmp/w.wav"), 3);
        assert_eq!(
            args,
            [
                "-q", "-r", "16000", "-c", "1", "-b", "16", "-e", "signed-integer", "/tmp/w.wav",
                "trim", "0", "3"
            ]
        );
    }

    #[test]
    fn arecord_args_put_output_last() {
        let config = CaptureConfig {
            sample_rate: 44100,
            channels: 2,
            ..CaptureConfig::default()
        };
        let args = AudioCapture::new(&config, CaptureBackend::Arecord)
            .recorder_args(Path::new("/tmp/w.wav"), 2);
        assert_eq!(
            args,
            ["-q", "-f", "S16_LE", "-r", "44100", "-c", "2", "-t", "wav", "-d", "2", "/tmp/w.wav"]
        );
    }

    #[test]
    fn zero_window_records_without_limit() {
        let args = capture(CaptureBackend::Arecord).recorder_args(Path::new("o.wav"), 0);
        assert!(!args.iter().any(|a| a == "-d"));
    }

    #[test]
    fn scratch_paths_are_unique() {
        let c = capture(CaptureBackend::Sox).with_scratch_dir("/scratch");
        let a = c.scratch_path();
        let b = c.scratch_path();
        assert_ne!(a, b);
        assert!(a.starts_with("/scratch"));
    }

    #[test]
    fn rms_bounds() {
        assert_eq!(compute_rms(&[]), 0.0);
        assert_eq!(compute_rms(&[0; 64]), 0.0);
        assert!((compute_rms(&[i16::MAX; 64]) - 1.0).abs() < 0.001);
    }

    #[test]
    fn rms_ignores_sign() {
        let alternating: Vec<i16> = (0..100).map(|i| if i % 2 == 0 { 5000 } else { -5000 }).collect();
        let expected = 5000.0 / 32767.0;
        assert!((compute_rms(&alternating) - expected).abs() < 0.001);
    }

    #[test]
    fn wav_parsing_skips_header_and_odd_byte() {
        assert!(wav_to_samples(&[0u8; 20]).is_empty());
        assert!(wav_to_samples(&[0u8; 44]).is_empty());

        let mut data = wav_from_samples(&[1000, -1000]);
        data.push(0xFF);
        assert_eq!(wav_to_samples(&data), vec![1000, -1000]);
    }

    #[test]
    fn activity_ratio_counts_frames() {
        let mut samples = vec![10_000i16; 480];
        samples.extend(vec![0i16; 480]);
        assert!((voice_activity_ratio(&samples, 0.02, 480) - 0.5).abs() < f32::EPSILON);
        assert_eq!(voice_activity_ratio(&[], 0.02, 480), 0.0);
        assert_eq!(voice_activity_ratio(&samples, 0.02, 0), 0.0);
    }

    #[test]
    fn frame_size_is_thirty_millis() {
        assert_eq!(frame_size_for(16_000), 480);
        assert_eq!(frame_size_for(8_000), 240);
        assert_eq!(frame_size_for(0), 1);
    }

    #[test]
    fn speech_gate_uses_config() {
        let config = CaptureConfig::default();
        assert!(!window_has_speech(&wav_from_samples(&vec![0; 16_000]), &config));
        assert!(window_has_speech(&wav_from_samples(&vec![8_000; 16_000]), &config));
        assert!(!window_has_speech(&[], &config));
    }
}
