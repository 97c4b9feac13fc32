//! Object ETag computation
//!
//! An object's ETag is the URL-safe base64 of `[block_count: u32 LE][sha1]`
//! where the object is split into 4 MiB blocks. For a single block `sha1` is
//! the digest of the data itself, for more blocks it is the digest of the
//! concatenated per-block digests.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Block size used by the service when hashing objects
pub const ETAG_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Computed object ETag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ETag(String);

impl ETag {
    /// Hash an in-memory buffer
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = ETagHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Hash everything readable from `reader`
    pub fn from_reader<R: Read>(mut reader: R) -> crate::Result<Self> {
        let mut hasher = ETagHasher::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }

    /// Hash a file on disk
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Get the encoded ETag
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare with an ETag as sent by the server, ignoring surrounding quotes
    pub fn matches(&self, remote: &str) -> bool {
        self.0 == strip_quotes(remote)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ETag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remove the double quotes HTTP servers wrap around entity tags
pub fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Incremental ETag computation over arbitrarily sized updates
#[derive(Clone)]
pub struct ETagHasher {
    block: Sha1,
    block_fill: usize,
    blocks: u32,
    digests: Vec<u8>,
}

impl ETagHasher {
    pub fn new() -> Self {
        ETagHasher {
            block: Sha1::new(),
            block_fill: 0,
            blocks: 0,
            digests: Vec::new(),
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let room = ETAG_BLOCK_SIZE - self.block_fill;
            let take = room.min(data.len());
            self.block.update(&data[..take]);
            self.block_fill += take;
            data = &data[take..];

            if self.block_fill == ETAG_BLOCK_SIZE {
                self.close_block();
            }
        }
    }

    fn close_block(&mut self) {
        let digest = std::mem::replace(&mut self.block, Sha1::new()).finalize();
        self.digests.extend_from_slice(&digest);
        self.blocks += 1;
        self.block_fill = 0;
    }

    pub fn finalize(mut self) -> ETag {
        // A trailing partial block counts; an empty input still hashes as one block
        if self.block_fill > 0 || self.blocks == 0 {
            self.close_block();
        }

        let sha = if self.blocks == 1 {
            self.digests
        } else {
            Sha1::digest(&self.digests).to_vec()
        };

        let mut raw = Vec::with_capacity(4 + sha.len());
        raw.extend_from_slice(&self.blocks.to_le_bytes());
        raw.extend_from_slice(&sha);
        ETag(URL_SAFE.encode(raw))
    }
}

impl Default for ETagHasher {
    fn default() -> Self {
        Self::new()
    }
}
