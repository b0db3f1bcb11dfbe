//! Configuration for the index and its server.
//!
//! Two layers:
//! - [`SystemConfig`]: the tree depth and time bucket width of one index,
//!   stored as plain text in `<root>/system`. Every reader and writer of
//!   the directory must agree on it, so it lives with the data.
//! - [`ServerConfig`]: serving knobs (port, retry budget, timeouts), loaded
//!   from JSON or TOML.
use crate::error::{GeochromeError, Result};
use geochrome_types::address::MAX_DEPTH;
use geochrome_types::wire::DEFAULT_PORT;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file at the index root.
pub const SYSTEM_FILE: &str = "system";

/// Tree depth and time bucket width of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SystemConfig {
    depth: usize,
    bucket_width: i64,
}

impl SystemConfig {
    /// Validates `0 < depth < MAX_DEPTH` and `bucket_width > 0`.
    pub fn new(depth: usize, bucket_width: i64) -> Result<Self> {
        if depth == 0 || depth >= MAX_DEPTH {
            return Err(GeochromeError::InvalidDepth(depth as i64));
        }
        if bucket_width <= 0 {
            return Err(GeochromeError::InvalidBucketWidth(bucket_width));
        }
        Ok(Self {
            depth,
            bucket_width,
        })
    }

    /// Number of scales, and of scale files per bucket.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Width of a time bucket in seconds.
    pub fn bucket_width(&self) -> i64 {
        self.bucket_width
    }

    /// Parses two whitespace-separated integers: depth, then bucket width.
    pub fn parse(text: &str) -> Result<Self> {
        let mut fields = text.split_whitespace();
        let depth = fields
            .next()
            .ok_or_else(|| GeochromeError::Config("missing tree depth".into()))?;
        let width = fields
            .next()
            .ok_or_else(|| GeochromeError::Config("missing time bucket width".into()))?;

        let depth: i64 = depth
            .parse()
            .map_err(|_| GeochromeError::Config(format!("tree depth {depth:?} is not an integer")))?;
        let width: i64 = width.parse().map_err(|_| {
            GeochromeError::Config(format!("time bucket width {width:?} is not an integer"))
        })?;

        if depth <= 0 {
            return Err(GeochromeError::InvalidDepth(depth));
        }
        Self::new(depth as usize, width)
    }

    /// Reads `<root>/system`.
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let path = root.as_ref().join(SYSTEM_FILE);
        let text = fs::read_to_string(&path)
            .map_err(|source| GeochromeError::IoAccess { path, source })?;
        Self::parse(&text)
    }

    /// Writes `<root>/system`, creating the root directory if needed.
    pub fn store<P: AsRef<Path>>(&self, root: P) -> Result<()> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|source| GeochromeError::IoAccess {
            path: root.to_path_buf(),
            source,
        })?;
        let path = root.join(SYSTEM_FILE);
        fs::write(&path, format!("{} {}\n", self.depth, self.bucket_width))
            .map_err(|source| GeochromeError::IoAccess { path, source })
    }
}

/// Server configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,

    /// Consecutive stalled socket transfers tolerated before failing
    #[serde(default = "ServerConfig::default_retry_budget")]
    pub retry_budget: usize,

    /// Socket read/write timeout; each expiry consumes one retry
    #[serde(default = "ServerConfig::default_socket_timeout_ms")]
    pub socket_timeout_ms: u64,

    /// Largest accepted frame payload
    #[serde(default = "ServerConfig::default_max_frame_size")]
    pub max_frame_size: usize,
}

impl ServerConfig {
    const fn default_port() -> u16 {
        DEFAULT_PORT
    }

    const fn default_retry_budget() -> usize {
        3
    }

    const fn default_socket_timeout_ms() -> u64 {
        5_000
    }

    const fn default_max_frame_size() -> usize {
        crate::buffer::MAX_FRAME_SIZE
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_retry_budget(mut self, retries: usize) -> Self {
        assert!(retries > 0, "Retry budget must be greater than zero");
        self.retry_budget = retries;
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        assert!(size > 0, "Maximum frame size must be greater than zero");
        if size > crate::buffer::MAX_FRAME_SIZE {
            log::warn!(
                "Maximum frame size of {} bytes is above the default of {} and lets a single \
                client force large allocations",
                size,
                crate::buffer::MAX_FRAME_SIZE
            );
        }
        self.max_frame_size = size;
        self
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.retry_budget == 0 {
            return Err("Retry budget must be greater than zero".to_string());
        }

        if self.socket_timeout_ms == 0 {
            return Err("Socket timeout must be greater than zero".to_string());
        }

        if self.max_frame_size == 0 {
            return Err("Maximum frame size must be greater than zero".to_string());
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: ServerConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: ServerConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: Self::default_port(),
            retry_budget: Self::default_retry_budget(),
            socket_timeout_ms: Self::default_socket_timeout_ms(),
            max_frame_size: Self::default_max_frame_size(),
        }
    }
}
