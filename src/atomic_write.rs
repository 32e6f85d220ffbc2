//! Atomic file rewrites: temp file + fsync + rename.
//!
//! Used for the artifact manifest and the checkpoint so a failed rewrite
//! always leaves the previous file intact.

use std::io::Write;

use anyhow::{Context, Result};
use camino::Utf8Path;
use tempfile::NamedTempFile;

use crate::paths::ensure_dir_all;

/// Atomically replace `path` with `content`.
///
/// The temporary file is created in the target's parent directory so the
/// final rename never crosses a filesystem boundary.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    ensure_dir_all(parent).with_context(|| format!("failed to create directory {parent}"))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temporary file in {parent}"))?;

    tmp.write_all(content.as_bytes())
        .with_context(|| format!("failed to write temporary file for {path}"))?;

    tmp.as_file()
        .sync_all()
        .with_context(|| format!("failed to fsync temporary file for {path}"))?;

    tmp.persist(path.as_std_path())
        .map_err(|e| anyhow::Error::from(e.error))
        .with_context(|| format!("failed to rename temporary file over {path}"))?;

    Ok(())
}
