//! Content-addressed attachment storage
//!
//! Image attachments of graphic notes are kept out of the database and stored
//! here under their SHA-256 hash, fanned out over two directory levels:
//! hash "abcd1234..." lives at "attachments/ab/cd/abcd1234...".
//!
//! Identical images are stored once, so a blob may be referenced by several
//! notes; [`BlobStore::collect_garbage`] removes only unreferenced ones.

use crate::error::{AppError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root directory if needed
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("Attachment store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Store bytes and return their hash. Writing existing content is a no-op.
    pub async fn write(&self, data: &[u8]) -> Result<String> {
        let hash = hash_bytes(data);
        let path = self.path_for(&hash)?;

        if path.exists() {
            tracing::debug!("Attachment already stored: {}", hash);
            return Ok(hash);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Temp file then rename so a crash never leaves a truncated blob
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(temp_path, &path).await?;

        tracing::debug!("Stored attachment: {} ({} bytes)", hash, data.len());

        Ok(hash)
    }

    pub async fn read(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.path_for(hash)?;

        if !path.exists() {
            return Err(AppError::BlobStore(format!("Attachment not found: {}", hash)));
        }

        let data = fs::read(&path).await?;

        // Catch on-disk corruption before it reaches the canvas
        if hash_bytes(&data) != hash {
            return Err(AppError::BlobStore(format!(
                "Attachment content does not match its hash: {}",
                hash
            )));
        }

        Ok(data)
    }

    pub async fn exists(&self, hash: &str) -> Result<bool> {
        Ok(self.path_for(hash)?.exists())
    }

    /// Delete a blob; deleting a missing blob is not an error
    pub async fn delete(&self, hash: &str) -> Result<()> {
        let path = self.path_for(hash)?;

        if !path.exists() {
            return Ok(());
        }

        fs::remove_file(&path).await?;
        tracing::debug!("Deleted attachment: {}", hash);

        Ok(())
    }

    /// Delete every stored blob not in `referenced`. Returns how many went.
    pub async fn collect_garbage(&self, referenced: &HashSet<String>) -> Result<usize> {
        let mut removed = 0;

        for hash in self.list_all().await? {
            if !referenced.contains(&hash) {
                self.delete(&hash).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!("Removed {} unreferenced attachments", removed);
        }

        Ok(removed)
    }

    /// All stored hashes
    pub async fn list_all(&self) -> Result<Vec<String>> {
        let mut hashes = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            if !dir.exists() {
                continue;
            }

            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();

                if path.is_dir() {
                    pending.push(path);
                } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if is_valid_hash(name) {
                        hashes.push(name.to_string());
                    }
                }
            }
        }

        Ok(hashes)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, hash: &str) -> Result<PathBuf> {
        if !is_valid_hash(hash) {
            return Err(AppError::BlobStore(format!("Invalid attachment hash: {:?}", hash)));
        }

        Ok(self.root.join(&hash[0..2]).join(&hash[2..4]).join(hash))
    }
}

fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit())
}
