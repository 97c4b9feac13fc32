//! Client and transfer configuration

use crate::planner::DEFAULT_PART_SIZE;
use crate::progress::ProgressConfig;
use crate::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use ufile_core::auth::uri_encode_path;

/// Worker threads per transfer when the caller does not pick a number
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Read buffer per worker
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Lifetime of the presigned URL used for downloads
pub const DEFAULT_URL_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Where objects live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub region: String,
    pub proxy_suffix: String,
    /// Replaces `http://{bucket}.{region}.{suffix}` when set
    #[serde(default)]
    pub custom_host: Option<String>,
}

impl ObjectConfig {
    pub fn new(region: &str, proxy_suffix: &str) -> Self {
        ObjectConfig {
            region: region.to_string(),
            proxy_suffix: proxy_suffix.to_string(),
            custom_host: None,
        }
    }

    pub fn with_custom_host(host: &str) -> Self {
        ObjectConfig {
            region: String::new(),
            proxy_suffix: String::new(),
            custom_host: Some(host.to_string()),
        }
    }

    /// Load from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ObjectConfig =
            serde_json::from_str(json).map_err(ufile_core::UFileError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match &self.custom_host {
            Some(host) if host.trim().is_empty() => {
                Err(ClientError::validation("custom host is empty"))
            }
            Some(_) => Ok(()),
            None if self.region.is_empty() || self.proxy_suffix.is_empty() => Err(
                ClientError::validation("region and proxy suffix are required without a custom host"),
            ),
            None => Ok(()),
        }
    }

    /// URL of `key` in `bucket`; an empty key addresses the bucket root
    pub fn final_host(&self, bucket: &str, key: &str) -> String {
        let key = uri_encode_path(key);
        match &self.custom_host {
            Some(host) => format!("{}/{}", host.trim_end_matches('/'), key),
            None => format!(
                "http://{}.{}.{}/{}",
                bucket, self.region, self.proxy_suffix, key
            ),
        }
    }
}

/// Caller-facing download settings; validated into a [`DownloadConfig`]
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub save_dir: PathBuf,
    pub save_name: String,
    /// Replace an existing file instead of picking a `-N` suffixed name
    pub overwrite: bool,
    pub concurrency: usize,
    pub part_size: u32,
    pub buffer_size: usize,
    /// `(offset, exclusive end)` within the object
    pub range: Option<(i64, i64)>,
    pub progress: ProgressConfig,
    pub url_expiry: Duration,
}

impl DownloadOptions {
    pub fn new(save_dir: impl Into<PathBuf>, save_name: &str) -> Self {
        DownloadOptions {
            save_dir: save_dir.into(),
            save_name: save_name.to_string(),
            ..Default::default()
        }
    }
}

impl Default for DownloadOptions {
    fn default() -> Self {
        DownloadOptions {
            save_dir: PathBuf::from("."),
            save_name: String::new(),
            overwrite: true,
            concurrency: DEFAULT_CONCURRENCY,
            part_size: DEFAULT_PART_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            range: None,
            progress: ProgressConfig::default(),
            url_expiry: DEFAULT_URL_EXPIRY,
        }
    }
}

/// Validated, immutable download settings
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    save_dir: PathBuf,
    save_name: String,
    overwrite: bool,
    concurrency: usize,
    part_size: u32,
    buffer_size: usize,
    range: Option<(i64, i64)>,
    progress: ProgressConfig,
    url_expiry: Duration,
}

impl DownloadConfig {
    pub fn new(options: DownloadOptions) -> Result<Self> {
        if options.concurrency == 0 {
            return Err(ClientError::validation("concurrency must be at least 1"));
        }
        if options.part_size == 0 {
            return Err(ClientError::validation("part size must be greater than zero"));
        }
        if options.buffer_size == 0 {
            return Err(ClientError::validation("buffer size must be greater than zero"));
        }
        if options.save_dir.as_os_str().is_empty() {
            return Err(ClientError::validation("save directory is empty"));
        }
        let name = options.save_name.trim();
        if name.is_empty() {
            return Err(ClientError::validation("save name is empty"));
        }
        if name.contains(['/', '\\']) {
            return Err(ClientError::validation(format!(
                "save name '{}' must not contain path separators",
                name
            )));
        }
        if options.url_expiry.is_zero() {
            return Err(ClientError::validation("url expiry must be positive"));
        }

        Ok(DownloadConfig {
            save_dir: options.save_dir,
            save_name: name.to_string(),
            overwrite: options.overwrite,
            concurrency: options.concurrency,
            part_size: options.part_size,
            buffer_size: options.buffer_size,
            range: options.range,
            progress: options.progress,
            url_expiry: options.url_expiry,
        })
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn save_name(&self) -> &str {
        &self.save_name
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn part_size(&self) -> u32 {
        self.part_size
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn range(&self) -> Option<(i64, i64)> {
        self.range
    }

    pub fn progress(&self) -> ProgressConfig {
        self.progress
    }

    pub fn url_expiry(&self) -> Duration {
        self.url_expiry
    }
}

/// Paging for object listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub marker: Option<String>,
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_from_region_and_suffix() {
        let config = ObjectConfig::new("cn-bj", "ufileos.com");
        assert_eq!(
            config.final_host("photos", "2024/a b.jpg"),
            "http://photos.cn-bj.ufileos.com/2024/a%20b.jpg"
        );
        assert_eq!(config.final_host("photos", ""), "http://photos.cn-bj.ufileos.com/");
    }

    #[test]
    fn custom_host_wins() {
        let config = ObjectConfig::with_custom_host("http://127.0.0.1:8080/");
        assert_eq!(config.final_host("b", "k"), "http://127.0.0.1:8080/k");
    }

    #[test]
    fn config_from_json() {
        let config = ObjectConfig::from_json(r#"{"region":"cn-sh2","proxy_suffix":"ufileos.com"}"#)
            .unwrap();
        assert_eq!(config.region, "cn-sh2");
        assert!(config.custom_host.is_none());

        assert!(ObjectConfig::from_json(r#"{"region":"","proxy_suffix":""}"#).is_err());
        assert!(ObjectConfig::from_json("not json").is_err());
    }

    #[test]
    fn download_defaults() {
        let config = DownloadConfig::new(DownloadOptions::new("/tmp/out", "file.bin")).unwrap();
        assert_eq!(config.concurrency(), 10);
        assert_eq!(config.part_size(), 4 * 1024 * 1024);
        assert_eq!(config.buffer_size(), 64 * 1024);
        assert!(config.overwrite());
        assert_eq!(config.progress(), ProgressConfig::Percent(1));
        assert_eq!(config.url_expiry(), Duration::from_secs(86_400));
    }

    #[test]
    fn download_validation() {
        let base = || DownloadOptions::new("/tmp/out", "file.bin");

        assert!(DownloadConfig::new(DownloadOptions { concurrency: 0, ..base() }).is_err());
        assert!(DownloadConfig::new(DownloadOptions { part_size: 0, ..base() }).is_err());
        assert!(DownloadConfig::new(DownloadOptions { buffer_size: 0, ..base() }).is_err());
        assert!(DownloadConfig::new(DownloadOptions { save_name: " ".into(), ..base() }).is_err());
        assert!(DownloadConfig::new(DownloadOptions { save_name: "a/b".into(), ..base() }).is_err());
        assert!(DownloadConfig::new(DownloadOptions { save_dir: PathBuf::new(), ..base() }).is_err());
    }
}
