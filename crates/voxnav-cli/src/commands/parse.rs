//! `voxnav parse` -- show how a transcript maps onto the grammar.

use voxnav_commands::lookup;

pub fn run(transcript: &str, json: bool) -> anyhow::Result<()> {
    let parsed = lookup(transcript);

    if json {
        println!("{}", serde_json::to_string(&parsed)?);
        return Ok(());
    }

    println!("command:  {}", parsed.kind);
    if !parsed.argument.is_empty() {
        println!("argument: {}", parsed.argument);
    }
    if !parsed.kind.has_effector() {
        println!("note:     recognized but not performed");
    }
    Ok(())
}
