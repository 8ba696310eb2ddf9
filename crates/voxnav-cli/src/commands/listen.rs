//! `voxnav listen` -- continuous voice control of a browser page.

use std::sync::Arc;

use anyhow::Context;
use voxnav_browser::BrowserDocument;
use voxnav_voice::{start_voice_recognition, CaptureSpeech};

use crate::commands::{load_config, runtime};
use crate::GlobalArgs;

pub fn run(global: &GlobalArgs, cdp_url: &str) -> anyhow::Result<()> {
    let effective = load_config(global)?;
    let config = effective.config;

    runtime()?.block_on(async {
        let document = BrowserDocument::connect(cdp_url, &config.browser)
            .await
            .with_context(|| format!("failed to connect to browser at {cdp_url}"))?;
        let speech = CaptureSpeech::detect(&config)
            .await
            .context("speech recognition is not available")?;

        let handle = start_voice_recognition(Arc::new(speech), Arc::new(document), config)
            .context("failed to start voice recognition")?;
        // `listen` always listens, whatever `auto_start` says.
        handle.start_listening();

        let mut states = handle.subscribe();
        let watcher = tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                tracing::info!(%state, "recognition session");
            }
        });

        println!("Listening. Press Ctrl-C to stop.");
        tokio::signal::ctrl_c()
            .await
            .context("failed to wait for Ctrl-C")?;

        println!("Stopping...");
        handle.stop_and_wait().await;
        watcher.abort();
        anyhow::Ok(())
    })
}
