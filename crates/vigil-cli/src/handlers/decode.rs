//! Decode command handler.
//!
//! Runs an existing log through the decoder offline, one JSON event per
//! line. Useful for checking decoding rules against captured logs.

use std::io::Write;
use std::path::Path;

use vigil_runtime::LogLineDecoder;

use crate::error::CliError;

/// Decode every line of `file` and write the events to `out`.
///
/// Returns the number of events written.
pub fn execute(file: &Path, out: &mut impl Write) -> Result<usize, CliError> {
    let bytes = std::fs::read(file)
        .map_err(|e| CliError::Io(format!("{}: {e}", file.display())))?;
    let text = String::from_utf8_lossy(&bytes);
    let decoder = LogLineDecoder::new().map_err(|e| CliError::Core(e.to_string()))?;

    let mut count = 0;
    for line in text.lines() {
        let Some(event) = decoder.decode(line.trim_end_matches('\r')) else {
            continue;
        };
        let json = serde_json::to_string(&event).map_err(|e| CliError::Core(e.to_string()))?;
        writeln!(out, "{json}")?;
        count += 1;
    }
    Ok(count)
}
