//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents with standardized error handling.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Read a file, returning None when it does not exist or is unreadable.
///
/// Used for best-effort reads like onion hostname files that Tor may not
/// have created yet.
pub fn read_file_optional(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok()
}

/// Write content to file with standardized error handling.
pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write content to a file and set its mode bits in one operation.
///
/// Config files readable by the service group (0640) and service units
/// (0644) both flow through here so permission handling stays in one place.
#[cfg(unix)]
pub fn write_file_with_mode(path: &Path, content: &str, mode: u32, operation: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    write_file(path, content, operation)?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{} (chmod)", operation))))
}

/// Write content to file atomically (write to .tmp, then rename).
///
/// The rename is atomic on POSIX filesystems, so readers always see either
/// the old content or the new content, never a partial write.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    let filename = path.file_name().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));

    fs::write(&tmp_path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("{} (write temp)", operation)))
    })?;

    fs::rename(&tmp_path, path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{} (rename)", operation))))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn read_file_succeeds_for_existing_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "test content").unwrap();

        let content = read_file(temp.path(), "test read").unwrap();
        assert!(content.contains("test content"));
    }

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let result = read_file(Path::new("/nonexistent/path.txt"), "test read");
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code.as_str(), "internal.io_error");
    }

    #[test]
    fn read_file_optional_returns_none_for_missing_file() {
        assert!(read_file_optional(Path::new("/nonexistent/path.txt")).is_none());
    }

    #[test]
    fn write_file_with_mode_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("unit.service");
        write_file_with_mode(&path, "[Unit]\n", 0o644, "test write").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn write_file_atomic_replaces_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        write_file_atomic(&path, "old", "test write").unwrap();
        write_file_atomic(&path, "new", "test write").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }
}
