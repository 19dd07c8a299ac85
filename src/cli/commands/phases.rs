//! CLI implementation for `kompile phases`

use anyhow::Result;

use crate::cli::output::{is_json, print_json};
use crate::core::phase::PhaseRegistry;

/// Execute the phases command
pub async fn execute() -> Result<()> {
    let registry = PhaseRegistry::with_defaults();
    if is_json() {
        return print_json(&registry.names());
    }
    for (i, name) in registry.names().iter().enumerate() {
        println!("{:>2}. {name}", i + 1);
    }
    Ok(())
}
