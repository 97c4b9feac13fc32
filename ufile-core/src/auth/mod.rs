//! Request authorization for object APIs
//!
//! Object requests carry an `Authorization: UCloud <public>:<signature>`
//! header; presigned URLs carry the same signature as query parameters.
//! Signatures are produced by an [`ObjectAuthorizer`]; [`LocalAuthorizer`]
//! signs with a private key held in process.

pub mod canonical;

pub use canonical::*;

use crate::Result;

/// Parameters that take part in an object request signature
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectAuthParam {
    pub method: String,
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub content_md5: String,
    /// `Date` header value, or the expiry timestamp for presigned URLs
    pub date: String,
    /// `X-UCloud-*` headers; names are lowercased when signing
    pub ucloud_headers: Vec<(String, String)>,
}

impl ObjectAuthParam {
    pub fn new(method: &str, bucket: &str, key: &str) -> Self {
        ObjectAuthParam {
            method: method.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    pub fn with_date(mut self, date: &str) -> Self {
        self.date = date.to_string();
        self
    }
}

/// Produces signatures for object requests
pub trait ObjectAuthorizer: Send + Sync {
    /// Value of the `Authorization` header
    fn authorization(&self, param: &ObjectAuthParam) -> Result<String>;

    /// Signature for a presigned URL; `param.date` holds the expiry
    fn private_url_signature(&self, param: &ObjectAuthParam) -> Result<String>;

    /// Public key placed in presigned URLs
    fn public_key(&self) -> &str;
}
