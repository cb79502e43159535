//! InMemoryObjectStore - 開発・テスト用のオブジェクトストア

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::domain::{MediaRef, ObjectStoreError};
use crate::ports::object_store::{media_key, media_url};
use crate::ports::{ObjectStore, StoredObject};

pub struct InMemoryObjectStore {
    objects: DashMap<String, StoredObject>,
    public_base: String,
}

impl InMemoryObjectStore {
    /// `public_base` is the origin that serves `/media/<key>`.
    pub fn new(public_base: impl Into<String>) -> Self {
        Self {
            objects: DashMap::new(),
            public_base: public_base.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<MediaRef, ObjectStoreError> {
        if bytes.is_empty() {
            return Err(ObjectStoreError::EmptyPayload);
        }
        let key = Ulid::new().to_string();
        self.objects.insert(
            key.clone(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(media_url(&self.public_base, &key))
    }

    async fn fetch(&self, key: &str) -> Result<Option<StoredObject>, ObjectStoreError> {
        Ok(self.objects.get(key).map(|object| object.value().clone()))
    }

    async fn delete(&self, media_ref: &MediaRef) -> Result<bool, ObjectStoreError> {
        Ok(media_key(&self.public_base, media_ref)
            .and_then(|key| self.objects.remove(key))
            .is_some())
    }
}
