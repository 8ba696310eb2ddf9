use voxnav_commands::Grammar;

use crate::commands::load_config;
use crate::GlobalArgs;

/// Print the prefix table in match order, then the engine grammar hint.
pub fn run(global: &GlobalArgs) -> anyhow::Result<()> {
    let effective = load_config(global)?;
    let grammar = Grammar::builtin();

    println!("Commands (matched in order):");
    for rule in grammar.rules() {
        let mut line = format!("  {:<14} {}", rule.prefix, rule.kind);
        if rule.kind.takes_argument() {
            line.push_str(" <argument>");
        }
        if !rule.kind.has_effector() {
            line.push_str("  (not performed)");
        }
        println!("{line}");
    }

    println!();
    println!("Grammar hint:");
    println!("  {}", effective.config.effective_grammar_hint());
    Ok(())
}
