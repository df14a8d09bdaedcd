//! File persistence for completed uploads.
//!
//! Files land under an `MPV` subfolder of the configured documents
//! directory. Names are preserved as received; collisions are resolved with
//! a timestamp suffix, never by overwriting.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Subfolder of the documents directory that receives imports.
pub const IMPORT_DIR: &str = "MPV";

/// Writes uploaded files into the import folder.
///
/// Destination-path resolution and the final rename are serialized under one
/// lock, so two concurrent uploads of the same filename cannot race the
/// collision check.
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(documents_dir: &Path) -> Self {
        Self {
            root: documents_dir.join(IMPORT_DIR),
            write_lock: Mutex::new(()),
        }
    }

    /// Directory imported files are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Atomically persist one uploaded file, returning its final path.
    ///
    /// The bytes are staged in a temp file inside the destination directory
    /// and renamed into place, so a partial file is never visible at the
    /// final path.
    pub fn save(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create import folder: {:?}", self.root))?;

        let _guard = self.write_lock.lock();
        let dest = self.unique_path(filename);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .context("Failed to create staging file")?;
        tmp.write_all(data).context("Failed to write upload data")?;
        tmp.persist(&dest)
            .with_context(|| format!("Failed to move upload into place: {:?}", dest))?;

        tracing::info!(path = ?dest, bytes = data.len(), "Saved upload");
        Ok(dest)
    }

    /// Resolve a destination path that does not collide with an existing
    /// file. On collision a millisecond-timestamp suffix is inserted before
    /// the extension. Must be called with `write_lock` held.
    fn unique_path(&self, filename: &str) -> PathBuf {
        let name = sanitize(filename);
        let candidate = self.root.join(&name);
        if !candidate.exists() {
            return candidate;
        }

        let path = Path::new(&name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| name.clone());
        let ext = path.extension().map(|e| e.to_string_lossy().to_string());

        let mut millis = chrono::Utc::now().timestamp_millis();
        loop {
            let disambiguated = match &ext {
                Some(ext) => format!("{stem}-{millis}.{ext}"),
                None => format!("{stem}-{millis}"),
            };
            let candidate = self.root.join(disambiguated);
            if !candidate.exists() {
                return candidate;
            }
            millis += 1;
        }
    }
}

/// Reduce a client-supplied filename to a safe final path component.
fn sanitize(filename: &str) -> String {
    let trimmed = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "upload.bin".to_string()
    } else {
        trimmed.to_string()
    }
}
