use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tracing::error;

use super::SyncMode;

/// One failed step while flushing a target. Every variant carries the
/// target path and the OS error, formatted the way the errors reach stderr.
#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("error opening \"{path}\": {source}")]
    Open { path: String, source: io::Error },
    #[error("couldn't reset non-blocking mode \"{path}\": {source}")]
    ClearNonblock { path: String, source: io::Error },
    #[error("error syncing \"{path}\": {source}")]
    Sync { path: String, source: io::Error },
    #[error("failed to close \"{path}\": {source}")]
    Close { path: String, source: io::Error },
}

/// Flush one target according to `mode`, reporting every failed step.
/// Returns whether all steps succeeded.
///
/// A failure to clear `O_NONBLOCK` skips the sync itself, but the
/// descriptor is still closed and the close result still counts.
pub fn flush_path(mode: SyncMode, path: &Path) -> bool {
    let mut ok = true;

    let file = match open_target(path) {
        Ok(file) => file,
        Err(err) => {
            error!("{err}");
            return false;
        }
    };

    match clear_nonblock(&file, path) {
        Ok(()) => {
            if let Err(err) = sync_file(mode, &file, path) {
                error!("{err}");
                ok = false;
            }
        }
        Err(err) => {
            error!("{err}");
            ok = false;
        }
    }

    if let Err(err) = close_file(file, path) {
        error!("{err}");
        ok = false;
    }

    ok
}

/// Flush every dirty buffer on the machine. sync(2) cannot fail.
pub fn flush_system() {
    unsafe { libc::sync() };
}

fn open_target(path: &Path) -> Result<File, FlushError> {
    // O_NONBLOCK keeps the open from hanging on a fifo with no writer.
    let read_side = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path);
    match read_side {
        Ok(file) => Ok(file),
        Err(read_err) => {
            // Maybe the target is writable only (a fifo, a write-only
            // device). If both sides fail, the read-side error is the
            // one reported; it is the accurate one for directories.
            match OpenOptions::new()
                .write(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(path)
            {
                Ok(file) => Ok(file),
                Err(_) => Err(FlushError::Open {
                    path: path.display().to_string(),
                    source: read_err,
                }),
            }
        }
    }
}

fn clear_nonblock(file: &File, path: &Path) -> Result<(), FlushError> {
    let fd = file.as_raw_fd();
    let failed = |source| FlushError::ClearNonblock {
        path: path.display().to_string(),
        source,
    };

    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(failed(io::Error::last_os_error()));
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
        return Err(failed(io::Error::last_os_error()));
    }
    Ok(())
}

fn sync_file(mode: SyncMode, file: &File, path: &Path) -> Result<(), FlushError> {
    let result = match mode {
        SyncMode::File => file.sync_all(),
        SyncMode::DataOnly => file.sync_data(),
        SyncMode::FileSystem => {
            if unsafe { libc::syncfs(file.as_raw_fd()) } < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(())
            }
        }
        SyncMode::WholeSystem => unreachable!("whole-system flush takes no path"),
    };
    result.map_err(|source| FlushError::Sync {
        path: path.display().to_string(),
        source,
    })
}

fn close_file(file: File, path: &Path) -> Result<(), FlushError> {
    // Dropping the File would discard the close result.
    let fd = file.into_raw_fd();
    if unsafe { libc::close(fd) } < 0 {
        return Err(FlushError::Close {
            path: path.display().to_string(),
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn flushes_a_regular_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "payload").unwrap();

        assert!(flush_path(SyncMode::File, file.path()));
        assert!(flush_path(SyncMode::DataOnly, file.path()));
        assert!(flush_path(SyncMode::FileSystem, file.path()));
    }

    #[test]
    fn flushes_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(flush_path(SyncMode::File, dir.path()));
    }

    #[test]
    fn missing_target_reports_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("no-such-file");
        assert!(!flush_path(SyncMode::File, &gone));
    }

    #[test]
    fn fifo_opens_without_hanging_and_fails_the_sync_step() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fifo");
        let c_path = std::ffi::CString::new(path.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        // fsync(2) rejects fifos with EINVAL; the open itself must return
        // immediately even though the fifo has no writer.
        assert!(!flush_path(SyncMode::File, &path));
    }

    #[test]
    fn open_error_carries_read_side_errno() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("no-such-file");
        let err = open_target(&gone).unwrap_err();
        match err {
            FlushError::Open { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn error_text_names_the_target() {
        let err = FlushError::Sync {
            path: "/data/journal".into(),
            source: io::Error::from_raw_os_error(libc::EIO),
        };
        let text = err.to_string();
        assert!(text.starts_with("error syncing \"/data/journal\":"), "{text}");
    }

    #[test]
    fn whole_system_flush_never_fails() {
        flush_system();
    }
}
