//! Canonical string construction and HMAC-SHA1 signing

use crate::auth::{ObjectAuthParam, ObjectAuthorizer};
use crate::{Result, UFileError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

const UCLOUD_HEADER_PREFIX: &str = "x-ucloud-";

/// The string an object request signature is computed over
///
/// ```text
/// METHOD\nContent-MD5\nContent-Type\nDate\n<x-ucloud headers>/<bucket>/<key>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringToSign(String);

impl StringToSign {
    pub fn build(param: &ObjectAuthParam) -> Self {
        let mut canonical = String::new();

        canonical.push_str(&param.method.to_uppercase());
        canonical.push('\n');
        canonical.push_str(&param.content_md5);
        canonical.push('\n');
        canonical.push_str(&param.content_type);
        canonical.push('\n');
        canonical.push_str(&param.date);
        canonical.push('\n');

        // Sorted by lowercased name; repeated names keep the last value
        let headers: BTreeMap<String, &str> = param
            .ucloud_headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.trim()))
            .filter(|(k, _)| k.starts_with(UCLOUD_HEADER_PREFIX))
            .collect();
        for (name, value) in headers {
            canonical.push_str(&name);
            canonical.push(':');
            canonical.push_str(value);
            canonical.push('\n');
        }

        canonical.push('/');
        canonical.push_str(&param.bucket);
        canonical.push('/');
        canonical.push_str(&param.key);

        StringToSign(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Signs requests with a locally held key pair
#[derive(Clone)]
pub struct LocalAuthorizer {
    public_key: String,
    private_key: String,
}

impl LocalAuthorizer {
    pub fn new(public_key: &str, private_key: &str) -> Result<Self> {
        if public_key.is_empty() || private_key.is_empty() {
            return Err(UFileError::Signature("empty key".to_string()));
        }
        Ok(LocalAuthorizer {
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
        })
    }

    /// Base64 HMAC-SHA1 of the canonical string
    pub fn sign(&self, string_to_sign: &StringToSign) -> Result<String> {
        let mut mac = HmacSha1::new_from_slice(self.private_key.as_bytes())
            .map_err(|e| UFileError::Signature(e.to_string()))?;
        mac.update(string_to_sign.as_str().as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for LocalAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAuthorizer")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl ObjectAuthorizer for LocalAuthorizer {
    fn authorization(&self, param: &ObjectAuthParam) -> Result<String> {
        let signature = self.sign(&StringToSign::build(param))?;
        Ok(format!("UCloud {}:{}", self.public_key, signature))
    }

    fn private_url_signature(&self, param: &ObjectAuthParam) -> Result<String> {
        self.sign(&StringToSign::build(param))
    }

    fn public_key(&self) -> &str {
        &self.public_key
    }
}

/// URI encode function (RFC 3986)
pub fn uri_encode(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

/// Like [`uri_encode`] but keeps `/` so object keys stay path-shaped
pub fn uri_encode_path(input: &str) -> String {
    input
        .split('/')
        .map(uri_encode)
        .collect::<Vec<_>>()
        .join("/")
}
