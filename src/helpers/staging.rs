use std::{
    fs,
    path::{Path, PathBuf},
};

/// A transient staging directory for a multi-part download.
///
/// The layout is `{root}/{name}/{name}/` so that packaging the outer
/// directory yields an archive with a single top-level folder. The whole
/// tree is removed when the guard drops, whether packaging succeeded or not,
/// so a failed download never leaves partial state behind.
pub struct StagingDir {
    outer: PathBuf,
    inner: PathBuf,
}

impl StagingDir {
    /// Creates `{root}/{name}/{name}/`, replacing any leftover tree from a
    /// previous run.
    pub fn create(root: &Path, name: &str) -> Result<Self, std::io::Error> {
        let outer = root.join(name);
        match fs::remove_dir_all(&outer) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            other => other?,
        }

        let inner = outer.join(name);
        fs::create_dir_all(&inner)?;

        Ok(Self { outer, inner })
    }

    /// The outer directory, the one that gets packaged.
    pub fn outer(&self) -> &Path {
        &self.outer
    }

    /// The inner directory, where fetched parts land.
    pub fn inner(&self) -> &Path {
        &self.inner
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.outer);
    }
}
