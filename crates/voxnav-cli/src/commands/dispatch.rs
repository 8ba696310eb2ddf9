//! `voxnav dispatch` -- run one transcript against a live page.

use anyhow::{bail, Context};
use voxnav_browser::BrowserDocument;
use voxnav_commands::{dispatch, EffectOutcome};

use crate::commands::{load_config, runtime};
use crate::GlobalArgs;

pub fn run(global: &GlobalArgs, cdp_url: &str, transcript: &str) -> anyhow::Result<()> {
    let effective = load_config(global)?;
    let config = effective.config;

    let result = runtime()?.block_on(async {
        let document = BrowserDocument::connect(cdp_url, &config.browser)
            .await
            .with_context(|| format!("failed to connect to browser at {cdp_url}"))?;
        anyhow::Ok(dispatch(&document, transcript, &config).await)
    })?;

    let command = &result.command;
    match &result.outcome {
        EffectOutcome::Performed => {
            println!("performed: {} {}", command.kind, command.argument);
        }
        EffectOutcome::TargetMissing => {
            println!(
                "no element with {}=\"{}\" for {}",
                config.browser.key_attribute, command.argument, command.kind
            );
        }
        EffectOutcome::Ignored => {
            println!("ignored: {} {}", command.kind, command.argument);
        }
        EffectOutcome::Failed(reason) => {
            bail!("{} failed: {reason}", command.kind);
        }
    }
    Ok(())
}
