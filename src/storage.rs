//! Output storage for synchronously produced stickers
//!
//! File names are derived from the content (SHA-256), never from anything the
//! client sent.

use crate::error::{Result, StickerError};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a stored sticker ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOutput {
    /// Server-generated storage key
    pub key: String,
    /// Location on disk, for file-backed storage
    pub path: Option<PathBuf>,
}

/// Persists finished stickers
#[async_trait]
pub trait OutputStorage: Send + Sync {
    /// Store PNG bytes, returning where they went (`None` when nothing is kept)
    ///
    /// # Errors
    /// - Storage I/O failures
    async fn save(&self, png: &[u8]) -> Result<Option<StoredOutput>>;
}

/// Storage key for PNG bytes: `sticker_<sha256-hex>.png`
#[must_use]
pub fn content_key(png: &[u8]) -> String {
    let digest = Sha256::digest(png);
    let mut key = String::with_capacity(8 + digest.len() * 2 + 4);
    key.push_str("sticker_");
    for byte in digest {
        let _ = write!(key, "{byte:02x}");
    }
    key.push_str(".png");
    key
}

/// Writes stickers into a directory under content-addressed names
///
/// Identical stickers map to the same file.
#[derive(Debug, Clone)]
pub struct ContentAddressedStorage {
    dir: PathBuf,
}

impl ContentAddressedStorage {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl OutputStorage for ContentAddressedStorage {
    async fn save(&self, png: &[u8]) -> Result<Option<StoredOutput>> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StickerError::file_io_error("create output directory", &self.dir, &e))?;

        let key = content_key(png);
        let path = self.dir.join(&key);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %path.display(), "sticker already stored");
        } else {
            // Readers never observe a partially written file
            let tmp = self.dir.join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4()));
            tokio::fs::write(&tmp, png)
                .await
                .map_err(|e| StickerError::file_io_error("write sticker", &tmp, &e))?;
            tokio::fs::rename(&tmp, &path)
                .await
                .map_err(|e| StickerError::file_io_error("store sticker", &path, &e))?;
            debug!(path = %path.display(), bytes = png.len(), "sticker stored");
        }

        Ok(Some(StoredOutput {
            key,
            path: Some(path),
        }))
    }
}

/// Keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardStorage;

#[async_trait]
impl OutputStorage for DiscardStorage {
    async fn save(&self, _png: &[u8]) -> Result<Option<StoredOutput>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_key_format() {
        let key = content_key(b"abc");
        assert_eq!(
            key,
            "sticker_ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad.png"
        );
    }

    #[tokio::test]
    async fn test_discard_storage_keeps_nothing() {
        assert_eq!(DiscardStorage.save(b"png").await.unwrap(), None);
    }
}
