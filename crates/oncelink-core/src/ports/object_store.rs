//! ObjectStore port - アップロードされたメディアの保存先
//!
//! バイナリを受け取り、安定して参照できる URL（MediaRef）を返します。
//! ライフサイクル側はこの URL を不透明な値として扱います。
//!
//! オブジェクトの寿命はグラントに従います：消費された時点、または TTL 経過後の
//! 回収時に `delete` されます。
//!
//! # 実装
//! - **InMemoryObjectStore**: 開発・テスト用
//! - **LocalObjectStore**: ローカルディレクトリ
//! - リモートサービス（S3 など）はこの trait を実装して差し込む

use async_trait::async_trait;

use crate::domain::{MediaRef, ObjectStoreError};

/// Bytes plus the content type they were uploaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` and return a stable, dereferenceable reference.
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<MediaRef, ObjectStoreError>;

    /// Look up an object by the key embedded in its reference.
    async fn fetch(&self, key: &str) -> Result<Option<StoredObject>, ObjectStoreError>;

    /// Drop the object behind `media_ref`. References this store did not issue
    /// are ignored. Returns whether anything was removed.
    async fn delete(&self, media_ref: &MediaRef) -> Result<bool, ObjectStoreError>;
}

/// Object keys are ULIDs rendered in Crockford base32.
pub(crate) fn is_valid_key(key: &str) -> bool {
    ulid::Ulid::from_string(key).is_ok()
}

/// Inverse of `media_url`: the key, if `media_ref` points into `public_base`.
pub(crate) fn media_key<'a>(public_base: &str, media_ref: &'a MediaRef) -> Option<&'a str> {
    let prefix = format!("{}/media/", public_base.trim_end_matches('/'));
    media_ref
        .as_str()
        .strip_prefix(prefix.as_str())
        .filter(|key| is_valid_key(key))
}

/// `<public_base>/media/<key>`, without doubling the slash.
pub(crate) fn media_url(public_base: &str, key: &str) -> MediaRef {
    MediaRef::new(format!("{}/media/{}", public_base.trim_end_matches('/'), key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_key_inverts_media_url() {
        let key = ulid::Ulid::new().to_string();
        let media_ref = media_url("https://once.example/", &key);
        assert_eq!(media_key("https://once.example", &media_ref), Some(key.as_str()));
    }

    #[test]
    fn foreign_references_have_no_key() {
        let key = ulid::Ulid::new().to_string();
        let media_ref = media_url("https://other.example", &key);
        assert_eq!(media_key("https://once.example", &media_ref), None);
        assert_eq!(media_key("https://once.example", &MediaRef::new("img123")), None);
        assert_eq!(
            media_key("https://once.example", &MediaRef::new("https://once.example/media/../x")),
            None
        );
    }
}
