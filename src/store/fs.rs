//! Filesystem object store
//!
//! Objects live at `{root}/{key}`; content type and metadata sit next to
//! them in `{root}/{key}.meta.json`.

use super::{ObjectStore, StoreError, StoreResult, StoredObject};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Sidecar {
    content_type: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a key to a path, refusing anything that could escape the root
    fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(key);
        let is_clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_clean || key.ends_with(".meta.json") {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        let path = self.root.join(relative);
        if !path.starts_with(&self.root) {
            tracing::error!("Path traversal attempt detected: {:?} escapes {:?}", path, self.root);
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        Ok(path)
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, object: StoredObject) -> StoreResult<()> {
        let path = self.object_path(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                tracing::error!(
                    "Failed to create storage directory {:?}: {} (kind: {:?})",
                    parent,
                    e,
                    e.kind()
                );
                e
            })?;
        }

        let sidecar = Sidecar {
            content_type: object.content_type,
            metadata: object.metadata,
        };

        fs::write(&path, &object.body).await?;
        fs::write(Self::sidecar_path(&path), serde_json::to_vec(&sidecar)?).await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        let path = self.object_path(key)?;

        let body = match fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let sidecar = match fs::read(Self::sidecar_path(&path)).await {
            Ok(raw) => serde_json::from_slice::<Sidecar>(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Object {} has no metadata sidecar", key);
                Sidecar {
                    content_type: "application/octet-stream".to_string(),
                    metadata: BTreeMap::new(),
                }
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Some(StoredObject {
            body,
            content_type: sidecar.content_type,
            metadata: sidecar.metadata,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_object() -> StoredObject {
        StoredObject {
            body: b"%PDF-1.5 body".to_vec(),
            content_type: "application/pdf".to_string(),
            metadata: BTreeMap::from([
                ("submissionId".to_string(), "AJ-1".to_string()),
                ("originalFilename".to_string(), "paper.pdf".to_string()),
            ]),
        }
    }

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        store
            .put("submissions/AJ-1/paper.pdf", pdf_object())
            .await
            .unwrap();

        assert!(dir.path().join("submissions/AJ-1/paper.pdf").exists());
        assert!(dir
            .path()
            .join("submissions/AJ-1/paper.pdf.meta.json")
            .exists());

        let fetched = store.get("submissions/AJ-1/paper.pdf").await.unwrap();
        assert_eq!(fetched, Some(pdf_object()));
    }

    #[tokio::test]
    async fn test_missing_object_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        assert_eq!(store.get("submissions/none/paper.pdf").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        for key in ["../escape.pdf", "/etc/passwd", "a/../../b", "", "x.meta.json"] {
            assert!(
                matches!(store.get(key).await, Err(StoreError::InvalidKey(_))),
                "key {:?} should be rejected",
                key
            );
        }
    }
}
