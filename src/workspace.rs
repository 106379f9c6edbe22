//! Per-job scratch directories
//!
//! Every job gets a fresh `<work_dir>/job-<seq>/`. The directory is removed
//! when the [`JobWorkspace`] is dropped, including on fatal errors. Anything
//! left over from a killed process is swept at startup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Prefix of every per-job directory
pub const JOB_DIR_PREFIX: &str = "job-";

/// Scratch directory owned by one job
#[derive(Debug)]
pub struct JobWorkspace {
    path: PathBuf,
}

impl JobWorkspace {
    /// Create `<work_dir>/job-<seq>/`, replacing any stale copy.
    pub fn create(work_dir: &Path, seq: u64) -> io::Result<Self> {
        let path = work_dir.join(format!("{}{}", JOB_DIR_PREFIX, seq));
        if path.exists() {
            tracing::warn!(path = %path.display(), "replacing stale job directory");
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the archive is extracted into: `<job>/<author>/`
    pub fn source_root(&self, author: &str) -> PathBuf {
        self.path.join(author)
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to remove job directory");
            }
        }
    }
}

/// Job directories under `work_dir` left behind by an earlier process
pub fn find_orphans(work_dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !work_dir.exists() {
        return Ok(Vec::new());
    }

    let mut orphans = Vec::new();
    for entry in fs::read_dir(work_dir)? {
        let entry = entry?;
        let is_job_dir = entry
            .file_name()
            .to_str()
            .and_then(|name| name.strip_prefix(JOB_DIR_PREFIX))
            .is_some_and(|seq| !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_digit()));
        if is_job_dir && entry.file_type()?.is_dir() {
            orphans.push(entry.path());
        }
    }
    orphans.sort();
    Ok(orphans)
}

/// Remove orphaned job directories; returns the bytes reclaimed.
pub fn cleanup_orphans(work_dir: &Path) -> io::Result<u64> {
    let mut total_size = 0u64;
    for path in find_orphans(work_dir)? {
        let size = dir_size(&path)?;
        total_size += size;
        tracing::warn!(path = %path.display(), bytes = size, "cleaning up orphaned job directory");
        fs::remove_dir_all(&path)?;
    }
    Ok(total_size)
}

fn dir_size(path: &Path) -> io::Result<u64> {
    let mut size = 0u64;
    for entry in walkdir::WalkDir::new(path) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            size += entry.metadata().map_err(io::Error::other)?.len();
        }
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_workspace_lifecycle() {
        let dir = TempDir::new().unwrap();
        let path = {
            let ws = JobWorkspace::create(dir.path(), 7).unwrap();
            assert_eq!(ws.path(), dir.path().join("job-7"));
            assert_eq!(ws.source_root("elm"), dir.path().join("job-7/elm"));
            fs::create_dir_all(ws.source_root("elm").join("core-1.0.5")).unwrap();
            fs::write(ws.path().join("core-1.0.5.zip"), b"zip").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_create_replaces_stale_directory() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join("job-3");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("leftover.zip"), b"old").unwrap();

        let ws = JobWorkspace::create(dir.path(), 3).unwrap();
        assert_eq!(fs::read_dir(ws.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cleanup_orphans() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("job-1/elm")).unwrap();
        fs::write(dir.path().join("job-1/elm/file"), b"12345").unwrap();
        fs::create_dir_all(dir.path().join("job-22")).unwrap();
        fs::create_dir_all(dir.path().join("job-notes")).unwrap();
        fs::create_dir_all(dir.path().join("blobs")).unwrap();
        fs::write(dir.path().join("job-5"), b"a file, not a dir").unwrap();

        assert_eq!(
            find_orphans(dir.path()).unwrap(),
            vec![dir.path().join("job-1"), dir.path().join("job-22")]
        );
        assert_eq!(cleanup_orphans(dir.path()).unwrap(), 5);
        assert!(!dir.path().join("job-1").exists());
        assert!(!dir.path().join("job-22").exists());
        assert!(dir.path().join("job-notes").exists());
        assert!(dir.path().join("blobs").exists());
        assert!(dir.path().join("job-5").exists());
    }

    #[test]
    fn test_cleanup_missing_work_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(cleanup_orphans(&dir.path().join("absent")).unwrap(), 0);
    }
}
