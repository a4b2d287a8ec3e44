//! Bounded reads from the end of append-only log files.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

/// Return the last `max_bytes` bytes of the file at `path` as text.
///
/// Only the window is read, never the whole file. A multi-byte character cut
/// by the window start decodes to U+FFFD. An empty, missing, or unreadable
/// file yields `""`.
pub fn read_tail(path: &Path, max_bytes: u64) -> String {
    match try_read_tail(path, max_bytes) {
        Ok(text) => text,
        Err(e) => {
            debug!(?path, error = %e, "tail read failed");
            String::new()
        }
    }
}

fn try_read_tail(path: &Path, max_bytes: u64) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let start = size.saturating_sub(max_bytes);
    let _ = file.seek(SeekFrom::Start(start))?;

    let len = usize::try_from(size - start).unwrap_or(usize::MAX);
    let mut buf = Vec::with_capacity(len);
    let _ = file.take(size - start).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn returns_exact_suffix() {
        let f = file_with(b"0123456789");
        assert_eq!(read_tail(f.path(), 4), "6789");
    }

    #[test]
    fn budget_larger_than_file_returns_everything() {
        let f = file_with(b"short");
        assert_eq!(read_tail(f.path(), 1024), "short");
    }

    #[test]
    fn budget_equal_to_file_size() {
        let f = file_with(b"abc");
        assert_eq!(read_tail(f.path(), 3), "abc");
    }

    #[test]
    fn empty_file_is_empty() {
        let f = file_with(b"");
        assert_eq!(read_tail(f.path(), 100), "");
    }

    #[test]
    fn missing_file_is_empty() {
        assert_eq!(read_tail(Path::new("/nonexistent/session.jsonl"), 100), "");
    }

    #[test]
    fn zero_budget_is_empty() {
        let f = file_with(b"data");
        assert_eq!(read_tail(f.path(), 0), "");
    }

    #[test]
    fn split_multibyte_char_is_replaced() {
        // "é" is two bytes; a 2-byte window starting mid-character keeps "x"
        let f = file_with("éx".as_bytes());
        let text = read_tail(f.path(), 2);
        assert!(text.ends_with('x'));
        assert!(text.starts_with('\u{FFFD}'));
    }

    #[test]
    fn directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_tail(dir.path(), 100), "");
    }
}
