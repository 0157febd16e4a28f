//! Shared handling of append-only JSON-lines files.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

/// Cut a torn final line left by a writer that died mid-append, so the next
/// line starts on its own. Returns the number of bytes dropped.
pub(crate) fn repair_tail(path: &Path) -> io::Result<usize> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return Ok(0);
    }
    let keep = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |pos| pos + 1);
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(keep as u64)?;
    file.sync_data()?;
    Ok(bytes.len() - keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn torn_line_is_cut_back_to_last_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, "{\"a\":1}\n{\"a\":").unwrap();
        assert_eq!(repair_tail(&path).unwrap(), 5);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}\n");
        assert_eq!(repair_tail(&path).unwrap(), 0);
        assert_eq!(repair_tail(&dir.path().join("missing")).unwrap(), 0);
    }
}
