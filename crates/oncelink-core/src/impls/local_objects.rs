//! LocalObjectStore - ローカルディレクトリに保存するオブジェクトストア
//!
//! # レイアウト
//! - `<root>/<ulid>`      本体
//! - `<root>/<ulid>.type` content type

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ulid::Ulid;

use crate::domain::{MediaRef, ObjectStoreError};
use crate::ports::object_store::{is_valid_key, media_key, media_url};
use crate::ports::{ObjectStore, StoredObject};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub struct LocalObjectStore {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStore {
    /// Creates `root` if it does not exist yet.
    pub async fn open(
        root: impl Into<PathBuf>,
        public_base: impl Into<String>,
    ) -> Result<Self, ObjectStoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_base: public_base.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn paths(&self, key: &str) -> (PathBuf, PathBuf) {
        (self.root.join(key), self.root.join(format!("{key}.type")))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<MediaRef, ObjectStoreError> {
        if bytes.is_empty() {
            return Err(ObjectStoreError::EmptyPayload);
        }
        let key = Ulid::new().to_string();
        let (data_path, type_path) = self.paths(&key);

        // type を先に書く: fetch は本体の有無で存在を判定する
        tokio::fs::write(&type_path, content_type.as_bytes()).await?;
        tokio::fs::write(&data_path, &bytes).await?;

        tracing::debug!(key = %key, size = bytes.len(), "stored object");
        Ok(media_url(&self.public_base, &key))
    }

    async fn fetch(&self, key: &str) -> Result<Option<StoredObject>, ObjectStoreError> {
        if !is_valid_key(key) {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        let (data_path, type_path) = self.paths(key);

        let bytes = match tokio::fs::read(&data_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = match tokio::fs::read_to_string(&type_path).await {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            Ok(_) => DEFAULT_CONTENT_TYPE.to_string(),
            Err(e) if e.kind() == ErrorKind::NotFound => DEFAULT_CONTENT_TYPE.to_string(),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(StoredObject {
            bytes,
            content_type,
        }))
    }

    async fn delete(&self, media_ref: &MediaRef) -> Result<bool, ObjectStoreError> {
        let Some(key) = media_key(&self.public_base, media_ref) else {
            return Ok(false);
        };
        let (data_path, type_path) = self.paths(key);

        // 本体を先に消す: 本体がなければ fetch は None を返す
        let removed = match tokio::fs::remove_file(&data_path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        match tokio::fs::remove_file(&type_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(key = %key, removed, "deleted object");
        Ok(removed)
    }
}
