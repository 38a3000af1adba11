//! Offset-based tail cursor over a growing file.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

/// Bytes from the start of the file compared on every poll to detect an
/// in-place rewrite that grew past the old offset.
const HEAD_LEN: u64 = 64;

/// Outcome of one poll of the file.
#[derive(Debug)]
pub(super) enum Poll {
    /// Complete lines read since the last poll (possibly none).
    Lines(Vec<String>),
    /// The file no longer exists.
    Vanished,
}

/// Reads newly appended bytes and splits them into complete lines.
///
/// Remembers the byte offset, the identity of the file and its first bytes
/// so truncation and recreation restart reading from offset zero, even when
/// the new content is already longer than the old offset.
#[derive(Debug)]
pub(super) struct TailCursor {
    path: PathBuf,
    offset: u64,
    pending: Vec<u8>,
    file_id: Option<u64>,
    head: Vec<u8>,
}

impl TailCursor {
    pub(super) fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            offset: 0,
            pending: Vec::new(),
            file_id: None,
            head: Vec::new(),
        }
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }

    /// Read whatever was appended since the last call.
    pub(super) async fn poll(&mut self) -> io::Result<Poll> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Poll::Vanished),
            Err(e) => return Err(e),
        };

        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Poll::Vanished),
            Err(e) => return Err(e),
        };

        let len = meta.len();
        let file_id = file_identity(&meta);
        let head = read_head(&mut file).await?;
        let recreated = matches!((self.file_id, file_id), (Some(old), Some(new)) if old != new);
        let rewritten = self.offset > 0 && !shares_prefix(&self.head, &head);
        if recreated || rewritten || len < self.offset {
            debug!(
                path = %self.path.display(),
                offset = self.offset,
                len,
                recreated,
                rewritten,
                "Log file truncated or recreated, reading from start"
            );
            self.offset = 0;
            self.pending.clear();
        }
        self.file_id = file_id;
        self.head = head;

        if len <= self.offset {
            return Ok(Poll::Lines(Vec::new()));
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let read = file.read_to_end(&mut self.pending).await?;
        self.offset += read as u64;

        Ok(Poll::Lines(drain_lines(&mut self.pending)))
    }
}

async fn read_head(file: &mut tokio::fs::File) -> io::Result<Vec<u8>> {
    let mut head = Vec::new();
    (&mut *file).take(HEAD_LEN).read_to_end(&mut head).await?;
    file.seek(SeekFrom::Start(0)).await?;
    Ok(head)
}

/// Whether two head samples agree on their common length.
fn shares_prefix(a: &[u8], b: &[u8]) -> bool {
    let n = a.len().min(b.len());
    a[..n] == b[..n]
}

#[cfg(unix)]
fn file_identity(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
const fn file_identity(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}

/// Split off every newline-terminated line, leaving a partial trailing
/// line in `buf`. Invalid UTF-8 is replaced and a trailing `\r` stripped.
pub(super) fn drain_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
        return Vec::new();
    };

    let rest = buf.split_off(last_newline + 1);
    let complete = std::mem::replace(buf, rest);

    complete[..last_newline]
        .split(|b| *b == b'\n')
        .map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            String::from_utf8_lossy(line).into_owned()
        })
        .collect()
}
