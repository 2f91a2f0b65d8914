//! Retry policy for identifier generation.

/// Attempts used when nothing else is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Configuration for the uniqueness guard's retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    /// Maximum insert attempts per create call. Always at least 1.
    pub max_attempts: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl GuardConfig {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Creates a GuardConfig from environment variables.
    ///
    /// Environment variables:
    /// - `IDSMITH_MAX_ATTEMPTS`: Maximum insert attempts (default: 5, must be >= 1)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_attempts: std::env::var("IDSMITH_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|n| *n >= 1)
                .unwrap_or(default.max_attempts),
        }
    }
}
