//! Per-session history area on disk
//!
//! Every session owns `<root>/<session_id>/`. Uploaded images are written
//! there so the engine can reference them by path.

use crate::types::ImageError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct HistoryStore {
    root: PathBuf,
}

impl HistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Wipes and recreates the session's directory.
    pub async fn prepare(&self, session_id: &str) -> io::Result<PathBuf> {
        let path = self.path_for(session_id);
        remove_dir_if_exists(&path).await?;
        tokio::fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// Deletes the session's directory. Missing directories are fine.
    pub async fn remove(&self, session_id: &str) -> io::Result<()> {
        remove_dir_if_exists(&self.path_for(session_id)).await
    }

    /// Decodes a `data:<mime>;base64,<payload>` URL and stores it as a JPEG
    /// file in the session directory.
    pub async fn store_image(&self, session_id: &str, data_url: &str) -> Result<PathBuf, ImageError> {
        let bytes = decode_data_url(data_url)?;
        let dir = self.path_for(session_id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(format!("{}.jpg", Uuid::new_v4()));
        tokio::fs::write(&path, &bytes).await?;
        tracing::info!("[HISTORY {}] saved image to {}", session_id, path.display());
        Ok(path)
    }

    /// Best-effort removal of a stored image
    pub async fn discard(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("[HISTORY] failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

fn decode_data_url(data_url: &str) -> Result<Vec<u8>, ImageError> {
    let (_header, encoded) = data_url.split_once(',').ok_or(ImageError::MissingHeader)?;
    Ok(STANDARD.decode(encoded.trim())?)
}

async fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_wipes_previous_content() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = HistoryStore::new(root.path());

        let dir = store.prepare("s1").await?;
        tokio::fs::write(dir.join("old.jpg"), b"x").await?;

        let dir = store.prepare("s1").await?;
        assert!(dir.is_dir());
        assert!(!dir.join("old.jpg").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = HistoryStore::new(root.path());

        store.prepare("s1").await?;
        store.remove("s1").await?;
        store.remove("s1").await?;
        assert!(!store.path_for("s1").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_store_image_decodes_data_url() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let store = HistoryStore::new(root.path());
        let url = format!("data:image/jpeg;base64,{}", STANDARD.encode(b"\xff\xd8jpeg"));

        let path = store.store_image("s1", &url).await?;
        assert_eq!(tokio::fs::read(&path).await?, b"\xff\xd8jpeg");
        assert!(path.starts_with(store.path_for("s1")));

        store.discard(&path).await;
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_store_image_rejects_bad_payloads() {
        let root = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(root.path());

        assert!(matches!(
            store.store_image("s1", "no-comma-here").await,
            Err(ImageError::MissingHeader)
        ));
        assert!(matches!(
            store.store_image("s1", "data:image/jpeg;base64,@@@").await,
            Err(ImageError::Decode(_))
        ));
    }
}
