//! Log line decoder.
//!
//! Turns one raw server log line into zero or one [`LogEvent`]. Decoding is
//! pure: the decoder holds only its compiled rule table.

mod rules;

use thiserror::Error;
use tracing::{debug, warn};
use vigil_core::LogEvent;

use rules::{Rule, build_rules};

/// Errors from decoding a single line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// A rule's pattern failed to compile.
    #[error("Pattern for rule '{rule}' is invalid: {reason}")]
    Pattern { rule: &'static str, reason: String },

    /// A matching rule did not capture a required field.
    #[error("Matched line is missing field '{0}'")]
    MissingField(&'static str),

    /// A captured value could not be converted to its field type.
    #[error("Field '{field}' has invalid value '{value}'")]
    Coercion { field: &'static str, value: String },
}

/// Ordered, first-match-wins decoder for the server log format.
pub struct LogLineDecoder {
    rules: Vec<Rule>,
}

impl std::fmt::Debug for LogLineDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogLineDecoder")
            .field("rules", &self.rule_names())
            .finish()
    }
}

impl LogLineDecoder {
    /// Compile the rule table.
    pub fn new() -> Result<Self, DecodeError> {
        Ok(Self {
            rules: build_rules()?,
        })
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Decode a line, exposing coercion failures.
    ///
    /// Returns `Ok(None)` when no rule matches.
    pub fn try_decode(&self, line: &str) -> Result<Option<LogEvent>, DecodeError> {
        for rule in &self.rules {
            if let Some(caps) = rule.pattern.captures(line) {
                return (rule.build)(&caps).map(Some);
            }
        }
        Ok(None)
    }

    /// Decode a line. Failures are logged and the line is skipped.
    pub fn decode(&self, line: &str) -> Option<LogEvent> {
        match self.try_decode(line) {
            Ok(Some(event)) => {
                debug!(kind = event.kind(), "Decoded log line");
                Some(event)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, line = %line, "Skipping undecodable log line");
                None
            }
        }
    }
}
