//! Scratch files for multi-step data rewrites.
//!
//! Scratch paths live next to the target so the final rename stays on one
//! filesystem and replaces the original atomically. Anything still present
//! when the guard drops is removed, on success and on failure alike.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub struct ScratchFiles {
    paths: Vec<PathBuf>,
    live: bool,
}

impl ScratchFiles {
    /// `live == false` tracks the paths without touching the filesystem.
    pub fn new(paths: Vec<PathBuf>, live: bool) -> Self {
        Self { paths, live }
    }

    /// Remove scratch files left behind by an earlier aborted run.
    pub fn clear_leftovers(&self) -> Result<(), (PathBuf, io::Error)> {
        if !self.live {
            return Ok(());
        }
        for path in &self.paths {
            match fs::remove_file(path) {
                Ok(()) => tracing::warn!(path = %path.display(), "removed leftover scratch file"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err((path.clone(), err)),
            }
        }
        Ok(())
    }

    /// Atomically move a finished scratch file over `dest`.
    pub fn publish(&self, scratch: &Path, dest: &Path) -> Result<(), (PathBuf, io::Error)> {
        if !self.live {
            tracing::info!(
                scratch = %scratch.display(),
                dest = %dest.display(),
                "dry run: would replace"
            );
            return Ok(());
        }
        fs::rename(scratch, dest).map_err(|err| (dest.to_path_buf(), err))
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        if !self.live {
            return;
        }
        for path in &self.paths {
            if path.exists() {
                let _ = fs::remove_file(path);
            }
        }
    }
}
