//! PID file handling.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write this process's id to `path`. An empty path does nothing.
pub fn store_pid_file(path: &str) -> std::io::Result<Option<PathBuf>> {
    if path.is_empty() {
        return Ok(None);
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }

    let mut file = options.open(path)?;
    writeln!(file, "{}", std::process::id())?;

    Ok(Some(PathBuf::from(path)))
}

pub fn remove_pid_file(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
