//! Codec limits and their environment overrides.

/// Default cap on a single frame body (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Environment variable overriding [`CodecLimits::max_frame_len`].
pub const MAX_FRAME_LEN_ENV: &str = "STREAMRPC_MAX_FRAME_LEN";

/// Limits enforced by [`StreamCodec`](crate::StreamCodec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecLimits {
    /// Largest frame body accepted on read or produced on write.
    pub max_frame_len: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl CodecLimits {
    /// Defaults, with `STREAMRPC_MAX_FRAME_LEN` applied when it parses to a
    /// non-zero value.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(MAX_FRAME_LEN_ENV).ok().as_deref())
    }

    fn from_env_value(value: Option<&str>) -> Self {
        let max_frame_len = value
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_FRAME_LEN);
        Self { max_frame_len }
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }
}
