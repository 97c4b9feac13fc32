//! Core data types shared by the UFile SDK crates

use serde::{Deserialize, Serialize};

/// Bucket name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketName(String);

impl BucketName {
    /// Create a new bucket name with validation
    pub fn new(name: &str) -> crate::Result<Self> {
        if name.is_empty() {
            return Err(crate::UFileError::InvalidBucketName("empty name".to_string()));
        }

        // Bucket names end up as a DNS label of the object host
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::UFileError::InvalidBucketName(
                format!("invalid characters in '{}'", name)
            ));
        }

        Ok(BucketName(name.to_string()))
    }

    /// Get the bucket name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BucketName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object key within a bucket
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyName(String);

impl KeyName {
    /// Create a new key with validation
    pub fn new(key: &str) -> crate::Result<Self> {
        if key.is_empty() {
            return Err(crate::UFileError::InvalidKey("empty key".to_string()));
        }

        if key.chars().any(|c| c.is_control()) {
            return Err(crate::UFileError::InvalidKey(
                "control characters not allowed".to_string()
            ));
        }

        Ok(KeyName(key.to_string()))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KeyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote object description, as returned by a HEAD request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectProfile {
    pub bucket: BucketName,
    pub key: KeyName,
    pub content_length: u64,
    pub content_type: String,
    pub etag: String,
    pub accept_ranges: String,
    pub last_modified: String,
}

impl ObjectProfile {
    /// Whether the server advertised byte-range support
    pub fn supports_ranges(&self) -> bool {
        self.accept_ranges.eq_ignore_ascii_case("bytes")
    }
}

/// Result of a successful multipart Init call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartInfo {
    #[serde(rename = "UploadId")]
    pub upload_id: String,
    /// Part size hint chosen by the server
    #[serde(rename = "BlkSize")]
    pub blk_size: u32,
    #[serde(rename = "Bucket")]
    pub bucket: String,
    #[serde(rename = "Key")]
    pub key: String,
    /// Filled in by the client, the server does not echo it
    #[serde(skip)]
    pub mime_type: String,
}

/// One uploaded part of a multipart session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartState {
    pub index: u32,
    pub etag: String,
}

/// Response of a successful multipart Finish call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartCompletion {
    #[serde(rename = "Bucket", default)]
    pub bucket: String,
    #[serde(rename = "Key", default)]
    pub key: String,
    #[serde(rename = "FileSize", default)]
    pub file_size: u64,
    /// Whole-object ETag from the response header, if the server sent one
    #[serde(skip)]
    pub etag: Option<String>,
}

/// Result of a plain PUT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectResult {
    pub etag: String,
}

/// One entry of an object listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    #[serde(rename = "BucketName", default)]
    pub bucket_name: String,
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "Hash", default)]
    pub hash: String,
    #[serde(rename = "MimeType", default)]
    pub mime_type: String,
    #[serde(rename = "Size", default)]
    pub size: u64,
    #[serde(rename = "CreateTime", default)]
    pub create_time: u64,
    #[serde(rename = "ModifyTime", default)]
    pub modify_time: u64,
}

/// Page of an object listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectListing {
    #[serde(rename = "BucketName", default)]
    pub bucket_name: String,
    #[serde(rename = "BucketId", default)]
    pub bucket_id: String,
    /// Marker for the next page, empty when the listing is exhausted
    #[serde(rename = "NextMarker", default)]
    pub next_marker: String,
    #[serde(rename = "DataSet", default)]
    pub objects: Vec<ObjectInfo>,
}

impl ObjectListing {
    /// Check whether another page can be requested
    pub fn has_more(&self) -> bool {
        !self.next_marker.is_empty()
    }
}
