//! Typed access to the non-task namespaces.
//!
//! Preview pages, status pages, ZIP downloads, and encoded images are
//! produced by subsystems outside this crate; what they share is how the
//! blobs are cached. [`ArtifactStore`] pins each artifact class to its
//! namespace and TTL so those callers never touch raw keys.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::TtlConfig;
use crate::keys::Namespace;
use crate::store::{KeyValueStore, KvStore};

/// An encoded image with its MIME type, stored as one JSON envelope.
///
/// The bytes ride inside the JSON as base64 so an image stays a single
/// value under `image:<id>` with a single TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    /// Raw image bytes.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
}

impl StoredImage {
    /// Parses a `data:<mime>;base64,<payload>` URL into an image, or a bare
    /// base64 payload as `image/png`.
    pub fn from_data_url(input: &str) -> Option<Self> {
        use base64::Engine as _;

        let (mime_type, payload) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',')?;
                let mime_type = header.split(';').next()?.to_string();
                (mime_type, payload)
            }
            None => ("image/png".to_string(), input),
        };
        let data = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()?;
        Some(Self { data, mime_type })
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Best-effort cache for rendered artifacts, one shared store underneath.
#[derive(Debug, Clone)]
pub struct ArtifactStore<S = KvStore> {
    store: Arc<S>,
    ttl: TtlConfig,
}

impl<S: KeyValueStore> ArtifactStore<S> {
    /// Wraps the shared store with the configured per-namespace TTLs.
    pub fn new(store: Arc<S>, ttl: TtlConfig) -> Self {
        Self { store, ttl }
    }

    async fn put(&self, namespace: Namespace, id: &str, bytes: &[u8]) -> bool {
        let ttl = self.ttl.for_namespace(namespace);
        self.store
            .set(&namespace.key(id), bytes, Some(ttl))
            .await
    }

    async fn get_utf8(&self, namespace: Namespace, id: &str) -> Option<String> {
        let bytes = self.store.get(&namespace.key(id)).await?;
        match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(error) => {
                warn!(namespace = %namespace, id, %error, "stored page is not valid UTF-8");
                None
            }
        }
    }

    /// Caches a rendered preview page.
    pub async fn store_preview(&self, preview_id: &str, html: &str) -> bool {
        self.put(Namespace::Preview, preview_id, html.as_bytes()).await
    }

    /// Reads a cached preview page.
    pub async fn preview(&self, preview_id: &str) -> Option<String> {
        self.get_utf8(Namespace::Preview, preview_id).await
    }

    /// Caches a rendered status page.
    pub async fn store_status_page(&self, task_id: &str, html: &str) -> bool {
        self.put(Namespace::Status, task_id, html.as_bytes()).await
    }

    /// Reads a cached status page.
    pub async fn status_page(&self, task_id: &str) -> Option<String> {
        self.get_utf8(Namespace::Status, task_id).await
    }

    /// Caches a packaged ZIP download.
    pub async fn store_zip(&self, download_id: &str, bytes: &[u8]) -> bool {
        self.put(Namespace::Zip, download_id, bytes).await
    }

    /// Reads a cached ZIP download.
    pub async fn zip(&self, download_id: &str) -> Option<Vec<u8>> {
        self.store.get(&Namespace::Zip.key(download_id)).await
    }

    /// Caches an encoded image.
    pub async fn store_image(&self, image_id: &str, image: &StoredImage) -> bool {
        let ttl = self.ttl.for_namespace(Namespace::Image);
        self.store
            .set_json(&Namespace::Image.key(image_id), image, Some(ttl))
            .await
    }

    /// Reads a cached image.
    pub async fn image(&self, image_id: &str) -> Option<StoredImage> {
        self.store.get_json(&Namespace::Image.key(image_id)).await
    }
}
