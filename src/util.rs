//! Utility functions for snowgate.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::error::{Result, SnowgateError};

/// Prefix shared by every report processor log line.
pub const LOG_PREFIX: &str = "servicenow report processor";

/// Maximum size of a report or settings file read into memory (32 MB).
///
/// Reports for very large catalogs run to a few megabytes; anything past
/// this is almost certainly the wrong file.
pub const MAX_FILE_SIZE: u64 = 32 * 1024 * 1024;

/// Format a log message with the report processor prefix.
pub fn log_entry(msg: &str) -> String {
    format!("{}: {}", LOG_PREFIX, msg)
}

/// Read a file into a string, refusing files larger than `MAX_FILE_SIZE`.
pub fn read_to_string_limited(path: &Path) -> Result<String> {
    read_to_string_with_limit(path, MAX_FILE_SIZE)
}

/// Read a file into a string with a custom size limit.
pub fn read_to_string_with_limit(path: &Path, max_size: u64) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| SnowgateError::storage(path, e))?;

    let size = metadata.len();
    if size > max_size {
        return Err(SnowgateError::config(format!(
            "file {} is too large ({} bytes, max {} bytes)",
            path.display(),
            size,
            max_size
        )));
    }

    fs::read_to_string(path).map_err(|e| SnowgateError::storage(path, e))
}

/// Read all of stdin.
pub fn read_stdin() -> Result<String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| SnowgateError::storage("<stdin>", e))?;
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_log_entry() {
        assert_eq!(
            log_entry("decision: Do not create incident"),
            "servicenow report processor: decision: Do not create incident"
        );
    }

    #[test]
    fn test_read_to_string_limited_success() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.json");
        fs::write(&path, "{}").unwrap();

        assert_eq!(read_to_string_limited(&path).unwrap(), "{}");
    }

    #[test]
    fn test_read_to_string_limited_nonexistent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.json");

        let err = read_to_string_limited(&path).unwrap_err();
        assert!(matches!(err, SnowgateError::Storage { .. }));
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_read_to_string_with_limit_exceeds() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("large.json");

        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&[b'x'; 1000]).unwrap();

        let err = read_to_string_with_limit(&path, 500).unwrap_err().to_string();
        assert!(err.contains("too large"));
        assert!(err.contains("1000 bytes"));
        assert!(err.contains("max 500 bytes"));
    }

    #[test]
    fn test_read_to_string_with_limit_at_boundary() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("boundary.json");
        fs::write(&path, "x".repeat(100)).unwrap();

        assert!(read_to_string_with_limit(&path, 100).is_ok());
        assert!(read_to_string_with_limit(&path, 99).is_err());
    }
}
