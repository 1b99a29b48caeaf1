//! Exclusive run lock on the unchecked tree.
//!
//! Fixes and transfers rewrite files below the unchecked root, so one run at
//! a time owns it. The owner writes its pid into the lock file so a refused
//! run can name the holder.

use crate::config::Settings;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::thread;
use std::time::{Duration, Instant};

/// Name of the lock file under the unchecked root. Hidden, so never walked.
pub const LOCK_FILE_NAME: &str = ".isimip-qc.lock";

const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Held for the whole run. Dropping it clears the pid and releases the lock.
pub struct RunLock {
    file: File,
}

impl RunLock {
    /// Lock the unchecked root of `settings`, waiting up to
    /// `lock_timeout_secs` for a running check to finish.
    pub fn acquire(settings: &Settings) -> Result<Self> {
        let root = &settings.unchecked_path;
        if !root.is_dir() {
            anyhow::bail!("Unchecked path does not exist: {}", root.display());
        }

        let path = root.join(LOCK_FILE_NAME);
        // no truncate: the holder's pid must survive until we own the lock
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        let patience = Duration::from_secs(settings.lock_timeout_secs);
        let locked = try_lock_within(&file, patience)
            .with_context(|| format!("Failed to lock {}", path.display()))?;
        if !locked {
            let holder = holder_pid(&mut file)
                .map(|pid| format!(" (pid {pid})"))
                .unwrap_or_default();
            anyhow::bail!(
                "Another isimip-qc run is working on {}{holder}. \
                 Retry when it has finished or raise [lock] timeout_secs \
                 (gave up after {}s).",
                root.display(),
                settings.lock_timeout_secs
            );
        }

        file.set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()))
            .with_context(|| format!("Failed to write lock file: {}", path.display()))?;
        Ok(Self { file })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = self.file.unlock();
    }
}

/// Poll for the lock until `patience` runs out. `Ok(false)` means another
/// process still holds it.
fn try_lock_within(file: &File, patience: Duration) -> io::Result<bool> {
    let deadline = Instant::now() + patience;
    let contended = fs2::lock_contended_error().kind();
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(true),
            Err(e) if e.kind() == contended => {}
            Err(e) => return Err(e),
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Ok(false);
        }
        thread::sleep(RETRY_DELAY.min(left));
    }
}

fn holder_pid(file: &mut File) -> Option<u32> {
    let mut text = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut text).ok()?;
    text.trim().parse().ok()
}
