//! Upload folder
//!
//! Files posted to the `*-by-file` endpoints are stored here under generated
//! names and served back at `/uploads/<name>`. The folder only holds assets
//! for the current run and is emptied at startup.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// URL prefix the folder is served under
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Longest extension kept from a client file name
const MAX_EXTENSION_LEN: usize = 10;

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    public_url: String,
    max_bytes: usize,
}

impl UploadStore {
    /// `public_url` is prepended to `/uploads/<name>` in the `src` handed to
    /// display clients; empty keeps the path relative to this server.
    pub fn new(dir: impl Into<PathBuf>, public_url: &str, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            public_url: public_url.trim().trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Request body limit for upload routes
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Create the folder if needed and delete files left by a previous run.
    /// Returns the number of files removed.
    pub fn prepare(&self) -> io::Result<usize> {
        std::fs::create_dir_all(&self.dir)?;

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
            }
        }

        debug!("Upload folder {} ready", self.dir.display());
        Ok(removed)
    }

    /// Fresh stored name, keeping a sane extension from the client name
    pub fn file_name_for(original: Option<&str>) -> String {
        let extension = original
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();

        format!("{}{}", Uuid::new_v4().simple(), extension)
    }

    /// On-disk location of a stored file
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// `src` value clients use to fetch a stored file
    pub fn public_src(&self, name: &str) -> String {
        format!("{}{}/{}", self.public_url, UPLOADS_ROUTE, name)
    }
}
