//! Incremental read state for one watched file.
//!
//! [`WatchState`] remembers how much of the file has already been turned
//! into messages (the read cursor) and when the file last changed. Each call
//! to [`WatchState::poll`] re-stats the file and, if it changed, reads only
//! the bytes between the cursor and the length observed by that stat.
//!
//! # Invariants
//!
//! - The cursor never decreases.
//! - The cursor never exceeds the file length observed at the last poll.
//! - The cursor only ever sits just after a `\n`, or at the position the
//!   watcher started from. A trailing line without a terminator is left for
//!   a later poll.
//! - A poll emits at most `line_limit` lines. Whatever is left over is read
//!   by the next poll even if the file has not changed again.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use tc_core::Message;

use crate::error::WatchError;
use crate::events::LineBatch;

/// Lines read by one poll unless [`WatchState::with_line_limit`] says otherwise.
pub const DEFAULT_LINE_LIMIT: usize = 4096;

/// Read cursor and change-detection baseline for one file.
///
/// Created from the file's current size and modification time, so content
/// already present when watching starts is never emitted.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use tc_watcher::WatchState;
///
/// # fn example() -> Result<(), tc_watcher::WatchError> {
/// let mut state = WatchState::open(Utf8Path::new("access.log"))?;
///
/// // ... something appends to access.log ...
///
/// for message in state.poll()? {
///     println!("{}", message.payload());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WatchState {
    path: Utf8PathBuf,
    last_modified: SystemTime,
    last_len: u64,
    cursor: u64,
    line_limit: usize,
    backlog: bool,
}

impl WatchState {
    /// Captures the current size and modification time of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if the path doesn't exist,
    /// [`WatchError::NotAFile`] if it is not a regular file, and
    /// [`WatchError::Io`] if it cannot be stat'ed.
    pub fn open(path: &Utf8Path) -> Result<Self, WatchError> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(WatchError::path_not_found(path));
            }
            Err(e) => return Err(WatchError::Io(e)),
        };

        if !metadata.is_file() {
            return Err(WatchError::not_a_file(path));
        }

        let len = metadata.len();
        Ok(Self {
            path: path.to_owned(),
            last_modified: metadata.modified()?,
            last_len: len,
            cursor: len,
            line_limit: DEFAULT_LINE_LIMIT,
            backlog: false,
        })
    }

    /// Caps the number of lines a single poll reads. Zero is treated as one.
    #[must_use]
    pub fn with_line_limit(mut self, line_limit: usize) -> Self {
        self.line_limit = line_limit.max(1);
        self
    }

    /// Returns the watched path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the byte offset up to which content has been consumed.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Returns `true` if the last poll stopped at the line limit with
    /// complete lines still unread.
    #[inline]
    #[must_use]
    pub const fn has_backlog(&self) -> bool {
        self.backlog
    }

    /// Runs one poll cycle.
    ///
    /// The file is scanned when its modification time moved forward or its
    /// length changed since the last cycle. The scan always reads from the
    /// cursor to the length just observed, however many writes happened in
    /// between, stopping early once the line limit is reached.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::CursorBeyondEof`] if the file is now shorter than
    /// the cursor, or [`WatchError::Io`] if the stat or read failed. On an I/O
    /// error the cursor and baseline are left untouched so the next poll
    /// retries the same region.
    pub fn poll(&mut self) -> Result<LineBatch, WatchError> {
        let metadata = fs::metadata(&self.path)?;
        let len = metadata.len();
        let modified = metadata.modified()?;

        if len < self.cursor {
            return Err(WatchError::CursorBeyondEof {
                path: self.path.clone(),
                cursor: self.cursor,
                len,
            });
        }

        if !self.backlog && modified <= self.last_modified && len == self.last_len {
            return Ok(LineBatch::new());
        }

        let batch = self.scan(len)?;

        self.last_modified = self.last_modified.max(modified);
        self.last_len = len;

        Ok(batch)
    }

    /// Reads complete lines between the cursor and `len`.
    fn scan(&mut self, len: u64) -> Result<LineBatch, WatchError> {
        let start = self.cursor;
        let backlog = self.backlog;
        let result = self.scan_from(start, len);
        if result.is_err() {
            self.cursor = start;
            self.backlog = backlog;
        }
        result
    }

    fn scan_from(&mut self, start: u64, len: u64) -> Result<LineBatch, WatchError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;
        let mut reader = BufReader::new(file.take(len - start));

        let mut batch = LineBatch::new();
        let mut buf = Vec::new();

        self.backlog = false;
        loop {
            if batch.len() >= self.line_limit {
                // Anything past the cursor is left for the next poll
                self.backlog = self.cursor < len;
                break;
            }

            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;

            // EOF, or a trailing line still waiting for its terminator
            if read == 0 || buf.last() != Some(&b'\n') {
                break;
            }

            let offset = self.cursor;
            self.cursor += read as u64;
            batch.push(Message::new(offset, decode_line(&buf)));
        }

        if !batch.is_empty() {
            tracing::trace!(
                path = %self.path,
                lines = batch.len(),
                cursor = self.cursor,
                "Scanned appended lines"
            );
        }

        Ok(batch)
    }
}

/// Strips the line terminator and decodes the line, replacing invalid UTF-8.
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn temp_file(contents: &str) -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = Utf8Path::from_path(dir.path())
            .expect("Invalid path")
            .join("access.log");
        fs::write(&path, contents).expect("Failed to write file");
        (dir, path)
    }

    fn append(path: &Utf8Path, contents: &str) {
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .expect("Failed to open file for append");
        file.write_all(contents.as_bytes())
            .expect("Failed to append");
    }

    #[test]
    fn test_open_missing_path() {
        let result = WatchState::open(Utf8Path::new("/nonexistent/access.log"));
        match result {
            Err(WatchError::PathNotFound(path)) => {
                assert_eq!(path.as_str(), "/nonexistent/access.log");
            }
            other => panic!("Expected PathNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_open_directory() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = Utf8Path::from_path(dir.path()).expect("Invalid path");
        assert!(matches!(
            WatchState::open(path),
            Err(WatchError::NotAFile(_))
        ));
    }

    #[test]
    fn test_existing_content_is_not_replayed() {
        let (_dir, path) = temp_file("old line 1\nold line 2\n");
        let mut state = WatchState::open(&path).expect("open");
        assert_eq!(state.cursor(), 22);

        append(&path, "new line\n");
        let batch = state.poll().expect("poll");
        assert_eq!(batch.lines(), vec!["new line"]);
        assert_eq!(batch.end_offset(), Some(22));
    }

    #[test]
    fn test_poll_without_changes_is_empty() {
        let (_dir, path) = temp_file("");
        let mut state = WatchState::open(&path).expect("open");
        assert!(state.poll().expect("poll").is_empty());
        assert!(state.poll().expect("poll").is_empty());
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn test_lines_across_polls_no_loss_no_duplication() {
        let (_dir, path) = temp_file("");
        let mut state = WatchState::open(&path).expect("open");

        let mut seen = Vec::new();
        append(&path, "one\ntwo\n");
        seen.extend(state.poll().expect("poll"));
        append(&path, "three\n");
        seen.extend(state.poll().expect("poll"));
        seen.extend(state.poll().expect("poll"));
        append(&path, "four\nfive\nsix\n");
        seen.extend(state.poll().expect("poll"));

        let lines: Vec<&str> = seen.iter().map(Message::line).collect();
        assert_eq!(lines, vec!["one", "two", "three", "four", "five", "six"]);

        let offsets: Vec<u64> = seen.iter().map(Message::offset).collect();
        assert_eq!(offsets, vec![0, 4, 8, 14, 19, 24]);
        assert_eq!(state.cursor(), 28);
    }

    #[test]
    fn test_partial_line_is_deferred() {
        let (_dir, path) = temp_file("");
        let mut state = WatchState::open(&path).expect("open");

        append(&path, "hello\n");
        let batch = state.poll().expect("poll");
        assert_eq!(batch.lines(), vec!["hello"]);
        assert_eq!(state.cursor(), 6);

        append(&path, "world");
        assert!(state.poll().expect("poll").is_empty());
        assert_eq!(state.cursor(), 6);

        append(&path, "\n");
        let batch = state.poll().expect("poll");
        assert_eq!(batch.lines(), vec!["world"]);
        assert_eq!(batch.end_offset(), Some(6));
        assert_eq!(state.cursor(), 12);
    }

    #[test]
    fn test_crlf_terminator_is_stripped() {
        let (_dir, path) = temp_file("");
        let mut state = WatchState::open(&path).expect("open");

        append(&path, "windows\r\nunix\n");
        let batch = state.poll().expect("poll");
        assert_eq!(batch.lines(), vec!["windows", "unix"]);
        assert_eq!(state.cursor(), 14);
    }

    #[test]
    fn test_empty_lines_are_emitted() {
        let (_dir, path) = temp_file("");
        let mut state = WatchState::open(&path).expect("open");

        append(&path, "\n\nx\n");
        let batch = state.poll().expect("poll");
        assert_eq!(batch.lines(), vec!["", "", "x"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let (_dir, path) = temp_file("");
        let mut state = WatchState::open(&path).expect("open");

        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .expect("open for append");
        file.write_all(b"bad \xff byte\n").expect("append");

        let batch = state.poll().expect("poll");
        assert_eq!(batch.lines(), vec!["bad \u{fffd} byte"]);
        assert_eq!(state.cursor(), 11);
    }

    #[test]
    fn test_truncation_is_reported() {
        let (_dir, path) = temp_file("");
        let mut state = WatchState::open(&path).expect("open");

        append(&path, "some content\n");
        state.poll().expect("poll");
        fs::write(&path, "x\n").expect("truncate");

        match state.poll() {
            Err(WatchError::CursorBeyondEof { cursor, len, .. }) => {
                assert_eq!(cursor, 13);
                assert_eq!(len, 2);
            }
            other => panic!("Expected CursorBeyondEof, got {other:?}"),
        }
        // Nothing was consumed by the failed poll
        assert_eq!(state.cursor(), 13);
    }

    #[test]
    fn test_removed_file_is_recoverable_io_error() {
        let (_dir, path) = temp_file("");
        let mut state = WatchState::open(&path).expect("open");
        fs::remove_file(&path).expect("remove");

        let err = state.poll().expect_err("stat must fail");
        assert!(err.is_recoverable());
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn test_line_limit_drains_backlog_over_polls() {
        let (_dir, path) = temp_file("");
        let mut state = WatchState::open(&path).expect("open").with_line_limit(2);

        append(&path, "a\nb\nc\nd\ne\npartial");

        let batch = state.poll().expect("poll");
        assert_eq!(batch.lines(), vec!["a", "b"]);
        assert!(state.has_backlog());

        // No further writes: the backlog alone triggers the next reads
        let batch = state.poll().expect("poll");
        assert_eq!(batch.lines(), vec!["c", "d"]);
        assert!(state.has_backlog());

        let batch = state.poll().expect("poll");
        assert_eq!(batch.lines(), vec!["e"]);
        assert_eq!(batch.end_offset(), Some(8));
        assert!(!state.has_backlog());
        assert_eq!(state.cursor(), 10);

        assert!(state.poll().expect("poll").is_empty());
    }

    #[test]
    fn test_line_limit_exactly_reached_has_no_backlog() {
        let (_dir, path) = temp_file("");
        let mut state = WatchState::open(&path).expect("open").with_line_limit(2);

        append(&path, "a\nb\n");
        assert_eq!(state.poll().expect("poll").len(), 2);
        assert!(!state.has_backlog());
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"abc\n"), "abc");
        assert_eq!(decode_line(b"abc\r\n"), "abc");
        assert_eq!(decode_line(b"\n"), "");
        assert_eq!(decode_line(b"no terminator"), "no terminator");
    }
}
