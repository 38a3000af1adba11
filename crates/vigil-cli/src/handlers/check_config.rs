//! Check-config command handler.

use std::io::Write;

use vigil_core::VigilConfig;

use crate::error::CliError;

/// Print the effective configuration after defaults are applied.
pub fn execute(config: &VigilConfig, out: &mut impl Write) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(config).map_err(|e| CliError::Core(e.to_string()))?;
    writeln!(out, "{json}")?;
    writeln!(out, "Configuration is valid.")?;
    Ok(())
}
