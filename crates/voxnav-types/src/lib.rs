//! Shared types for the voxnav workspace.
//!
//! - [`config`]: [`RecognitionConfig`] and the nested capture, STT, and
//!   browser sections.
//! - [`config_loader`]: layered TOML + environment loading with provenance.
//! - [`error`]: [`ConfigError`], returned by loading and validation.

pub mod config;
pub mod config_loader;
pub mod error;

pub use config::{
    BrowserConfig, CaptureConfig, RecognitionConfig, SttConfig, SttProviderKind,
    DEFAULT_GRAMMAR_HINT,
};
pub use config_loader::{ConfigLoader, ConfigSource, EffectiveConfig};
pub use error::ConfigError;
