//! `voxnav config` -- effective configuration with per-field provenance.

use anyhow::Context;
use voxnav_types::EffectiveConfig;

use crate::commands::load_config;
use crate::GlobalArgs;

pub fn show(global: &GlobalArgs) -> anyhow::Result<()> {
    let effective = load_config(global)?;

    if effective.source_files.is_empty() {
        println!("# no config files found");
    } else {
        for path in &effective.source_files {
            println!("# loaded {}", path.display());
        }
    }

    for line in annotated_lines(&effective)? {
        println!("{line}");
    }
    Ok(())
}

/// `path = value  # source` for every leaf field.
fn annotated_lines(effective: &EffectiveConfig) -> anyhow::Result<Vec<String>> {
    let value = toml::Value::try_from(&effective.config)
        .context("failed to serialize configuration")?;
    let mut leaves = Vec::new();
    flatten("", &value, &mut leaves);

    if effective.config.grammar_hint.is_none() {
        leaves.push((
            "grammar_hint".to_string(),
            "(built-in JSGF grammar)".to_string(),
        ));
    }
    leaves.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(leaves
        .into_iter()
        .map(|(path, value)| {
            let source = effective.source_of(&path);
            format!("{path} = {value}  # {source}")
        })
        .collect())
}

fn flatten(prefix: &str, value: &toml::Value, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, child, out);
            }
        }
        leaf => out.push((prefix.to_string(), leaf.to_string())),
    }
}
