//! Single instance guard, only one driver may claim the USB interfaces

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use directories::ProjectDirs;

/// Held for as long as this process drives the device; removes the file on drop
pub struct Lock {
    _file: File,
    path: PathBuf,
}

impl Lock {
    /// Lock `g19.lock` in the config directory.
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] naming the holder's pid.
    pub fn acquire() -> io::Result<Self> {
        let dirs = ProjectDirs::from("", "", "g19-driver").ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no config directory for the g19 lock file")
        })?;
        Self::acquire_at(dirs.config_dir().join("g19.lock"))
    }

    fn acquire_at(path: PathBuf) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        // keep the holder's pid readable until we own the lock
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock() {
            Ok(()) => {},
            Err(TryLockError::WouldBlock) => {
                let mut holder = String::new();
                file.read_to_string(&mut holder)?;
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("g19 is already driven by pid {}", holder.trim()),
                ));
            },
            Err(TryLockError::Error(e)) => return Err(e),
        }

        file.set_len(0)?;
        writeln!(file, "{}", process::id())?;
        Ok(Self { _file: file, path })
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_driver_is_refused_with_holder_pid() {
        let path = std::env::temp_dir().join(format!("g19-lock-test-{}", process::id()));
        let first = Lock::acquire_at(path.clone()).unwrap();

        let err = Lock::acquire_at(path.clone()).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(err.to_string().ends_with(&process::id().to_string()), "{err}");

        drop(first);
        assert!(!path.exists());
        drop(Lock::acquire_at(path).unwrap());
    }
}
