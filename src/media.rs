use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

/// Where uploaded item images live. The store hands back a key relative
/// to the media root; the app serves the root at `/media`.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Local-disk store rooted at `MEDIA_ROOT`.
#[derive(Clone)]
pub struct LocalMedia {
    root: PathBuf,
}

impl LocalMedia {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl MediaStore for LocalMedia {
    async fn put(&self, key: &str, body: Bytes) -> anyhow::Result<()> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("create media directory")?;
        }
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write media file {}", path.display()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let path = self.root.join(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove media file {}", path.display())),
        }
    }
}

/// Key for an item image: namespaced per item, original extension kept.
pub fn image_key(item_id: Uuid, filename: &str) -> String {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    format!("items/{}/{}.{}", item_id, Uuid::new_v4(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_key_is_namespaced_and_keeps_extension() {
        let item = Uuid::new_v4();
        let key = image_key(item, "bike.JPG");
        assert!(key.starts_with(&format!("items/{}/", item)));
        assert!(key.ends_with(".JPG"));
    }

    #[test]
    fn image_key_falls_back_without_extension() {
        let key = image_key(Uuid::new_v4(), "photo");
        assert!(key.ends_with(".bin"));
    }

    #[tokio::test]
    async fn local_media_roundtrip() {
        let dir = std::env::temp_dir().join(format!("bazar-media-{}", Uuid::new_v4()));
        let store = LocalMedia::new(dir.clone());
        store
            .put("items/x/y.png", Bytes::from_static(b"png"))
            .await
            .expect("put");
        let on_disk = tokio::fs::read(dir.join("items/x/y.png")).await.expect("read");
        assert_eq!(on_disk, b"png");
        store.delete("items/x/y.png").await.expect("delete");
        store.delete("items/x/y.png").await.expect("idempotent delete");
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
