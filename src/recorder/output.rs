//! Recording output
//!
//! The assembled recording blob and the `blob:` URLs that resolve to it.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

const BLOB_SCHEME: &str = "blob:";

/// Binary recording payload produced by one stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingBlob {
    data: Bytes,
    mime_type: String,
    created_at: DateTime<Utc>,
}

impl RecordingBlob {
    pub fn new(data: Bytes, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            created_at: Utc::now(),
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Resolvable locator for a blob registered in a `BlobStore`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobUrl {
    origin: String,
    id: Uuid,
}

impl BlobUrl {
    fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            id: Uuid::new_v4(),
        }
    }

    /// Parse a `blob:<origin>/<uuid>` string
    pub fn parse(s: &str) -> Result<Self, BlobUrlError> {
        let rest = s
            .strip_prefix(BLOB_SCHEME)
            .ok_or_else(|| BlobUrlError(s.to_string()))?;
        let (origin, id) = rest
            .rsplit_once('/')
            .ok_or_else(|| BlobUrlError(s.to_string()))?;
        let origin = urlencoding::decode(origin).map_err(|_| BlobUrlError(s.to_string()))?;
        let id = Uuid::parse_str(id).map_err(|_| BlobUrlError(s.to_string()))?;

        Ok(Self {
            origin: origin.into_owned(),
            id,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}",
            BLOB_SCHEME,
            urlencoding::encode(&self.origin),
            self.id
        )
    }
}

impl From<BlobUrl> for String {
    fn from(url: BlobUrl) -> Self {
        url.to_string()
    }
}

impl TryFrom<String> for BlobUrl {
    type Error = BlobUrlError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        BlobUrl::parse(&s)
    }
}

/// A string that is not a valid blob URL
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid blob URL: {0}")]
pub struct BlobUrlError(pub String);

/// Registry mapping blob URLs to their data
#[derive(Debug)]
pub struct BlobStore {
    origin: String,
    entries: RwLock<HashMap<Uuid, RecordingBlob>>,
}

impl BlobStore {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a blob under a fresh URL
    pub fn register(&self, blob: RecordingBlob) -> BlobUrl {
        let url = BlobUrl::new(&self.origin);
        self.entries.write().insert(url.id, blob);
        url
    }

    /// Look up the blob behind a URL
    pub fn resolve(&self, url: &BlobUrl) -> Option<RecordingBlob> {
        if url.origin != self.origin {
            return None;
        }
        self.entries.read().get(&url.id).cloned()
    }

    /// Release the blob behind a URL; returns whether anything was removed
    pub fn revoke(&self, url: &BlobUrl) -> bool {
        if url.origin != self.origin {
            return false;
        }
        self.entries.write().remove(&url.id).is_some()
    }

    /// Number of live URLs
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for BlobStore {
    fn default() -> Self {
        Self::new("screen-session")
    }
}
