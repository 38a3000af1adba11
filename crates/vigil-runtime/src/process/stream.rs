//! Readers for the supervised process's stdout/stderr.
//!
//! Game servers can emit non-UTF8 bytes. `BufReader::lines()` would end the
//! reader on the first invalid byte, so lines are read as bytes and decoded
//! lossily.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;
use vigil_core::ProcessLogSink;

pub fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    stream_type: &'static str,
    sink: Arc<dyn ProcessLogSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }

                    let line = String::from_utf8_lossy(&buf);
                    debug!(%stream_type, "{}", line);
                    sink.append(stream_type, &line);
                }
                Err(e) => {
                    debug!(%stream_type, error = %e, "process output reader exiting on read error");
                    break;
                }
            }
        }

        debug!(%stream_type, "process output reader exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<(String, String)>>);

    impl ProcessLogSink for Collect {
        fn append(&self, stream_type: &str, line: &str) {
            self.0
                .lock()
                .unwrap()
                .push((stream_type.to_string(), line.to_string()));
        }
    }

    #[tokio::test]
    async fn test_reader_survives_invalid_utf8() {
        let sink = Arc::new(Collect::default());
        let input: &[u8] = b"hello\r\n\xfe\xffworld\nlast";
        spawn_stream_reader(input, "stdout", sink.clone())
            .await
            .unwrap();

        let lines = sink.0.lock().unwrap().clone();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], ("stdout".to_string(), "hello".to_string()));
        assert!(lines[1].1.ends_with("world"));
        assert_eq!(lines[2].1, "last");
    }
}
