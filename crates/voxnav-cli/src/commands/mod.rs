pub mod config;
pub mod dispatch;
pub mod grammar;
pub mod listen;
pub mod parse;

use anyhow::Context;
use voxnav_types::{ConfigLoader, EffectiveConfig};

use crate::GlobalArgs;

/// Load the layered configuration and apply command-line overrides.
pub fn load_config(global: &GlobalArgs) -> anyhow::Result<EffectiveConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &global.config {
        loader = loader.with_file(path.clone());
    }
    let mut effective = loader.load().context("failed to load configuration")?;

    if let Some(language) = &global.language {
        effective.config.language = language.clone();
        effective.record_cli_override("language", "--language");
    }
    if let Some(amount) = global.scroll_amount {
        effective.config.scroll_amount = amount;
        effective.record_cli_override("scroll_amount", "--scroll-amount");
    }
    effective
        .config
        .validate()
        .context("invalid command-line override")?;

    Ok(effective)
}

/// Runtime for the async subcommands.
pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
}
