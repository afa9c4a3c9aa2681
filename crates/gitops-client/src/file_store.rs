//! Line-oriented file store used for shared pipeline state

use log::debug;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// File operations the pipeline core depends on
pub trait FileStore: Send + Sync {
    /// Read all lines of `path`; an absent file reads as no lines
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Replace `path` with `lines`, one per line, atomically
    fn write_lines(&self, path: &Path, lines: &[String]) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Remove everything inside `path`, keeping the directory itself
    ///
    /// Succeeds when the directory does not exist.
    fn clear_directory(&self, path: &Path) -> io::Result<()>;
}

/// `FileStore` on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn write_lines(&self, path: &Path, lines: &[String]) -> io::Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        // Write next to the target and rename over it so readers never see a partial file
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        for line in lines {
            writeln!(tmp, "{}", line)?;
        }
        // Temp files are created owner-only; the target keeps its own mode
        let permissions = match fs::metadata(path) {
            Ok(meta) => Some(meta.permissions()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => new_file_permissions(),
            Err(e) => return Err(e),
        };
        if let Some(permissions) = permissions {
            tmp.as_file().set_permissions(permissions)?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!("Wrote {} line(s) to {}", lines.len(), path.display());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn clear_directory(&self, path: &Path) -> io::Result<()> {
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        debug!("Cleared {}", path.display());
        Ok(())
    }
}

/// Mode of a newly created shared file
#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_absent_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let lines = LocalFileStore.read_lines(&dir.path().join("missing")).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_write_then_read_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("locked");
        let lines = vec!["develop".to_string(), "release/1.0".to_string()];

        LocalFileStore.write_lines(&path, &lines).unwrap();

        assert!(LocalFileStore.exists(&path));
        assert_eq!(fs::read_to_string(&path).unwrap(), "develop\nrelease/1.0\n");
        assert_eq!(LocalFileStore.read_lines(&path).unwrap(), lines);
    }

    #[test]
    fn test_write_empty_list_leaves_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked");
        LocalFileStore
            .write_lines(&path, &["master".to_string()])
            .unwrap();
        LocalFileStore.write_lines(&path, &[]).unwrap();

        assert!(LocalFileStore.exists(&path));
        assert!(LocalFileStore.read_lines(&path).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_lines_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked");
        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;

        LocalFileStore.write_lines(&path, &["develop".to_string()]).unwrap();
        assert_eq!(mode(&path), 0o644);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o664)).unwrap();
        LocalFileStore.write_lines(&path, &["master".to_string()]).unwrap();
        assert_eq!(mode(&path), 0o664);
        assert_eq!(LocalFileStore.read_lines(&path).unwrap(), vec!["master".to_string()]);
    }

    #[test]
    fn test_clear_directory_keeps_root() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("ws");
        fs::create_dir_all(ws.join("sub/deeper")).unwrap();
        fs::write(ws.join("a.txt"), "a").unwrap();
        fs::write(ws.join("sub/deeper/b.txt"), "b").unwrap();

        LocalFileStore.clear_directory(&ws).unwrap();

        assert!(ws.exists());
        assert_eq!(fs::read_dir(&ws).unwrap().count(), 0);
        // Idempotent, also for a missing directory
        LocalFileStore.clear_directory(&ws).unwrap();
        LocalFileStore
            .clear_directory(&dir.path().join("absent"))
            .unwrap();
    }
}
