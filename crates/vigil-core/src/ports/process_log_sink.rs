//! Destination for the supervised process's stdout/stderr and mirrored log
//! lines.

/// Port for appending process output lines to a sink.
pub trait ProcessLogSink: Send + Sync {
    /// Append one line.
    ///
    /// * `stream_type` - `"stdout"`, `"stderr"` or `"log"` for mirrored lines
    /// * `line` - the line without its trailing newline
    fn append(&self, stream_type: &str, line: &str);
}

/// Sink that drops every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogSink;

impl ProcessLogSink for NoopLogSink {
    fn append(&self, _stream_type: &str, _line: &str) {}
}
