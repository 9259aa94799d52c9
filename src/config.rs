//! Configuration types.

use std::time::Duration;

/// Parameters for the chunked history-mining algorithm.
#[derive(Debug, Clone)]
pub struct MiningConfig {
    /// First year of the mining window (inclusive).
    pub min_year: i32,
    /// Last year of the mining window (inclusive).
    pub max_year: i32,
    /// Width of one mining chunk in years.
    pub chunk_years: i32,
    /// Pause between chunks so the upstream API is not hammered.
    pub chunk_pause: Duration,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_year: 1880,
            max_year: 2024,
            chunk_years: 10,
            chunk_pause: Duration::from_secs(1),
        }
    }
}

impl MiningConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        fn env_i32(key: &str, fallback: i32) -> i32 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback)
        }

        let pause_ms: u64 = std::env::var("CLUB_HISTORY_CHUNK_PAUSE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        Self {
            min_year: env_i32("CLUB_HISTORY_MIN_YEAR", defaults.min_year),
            max_year: env_i32("CLUB_HISTORY_MAX_YEAR", defaults.max_year),
            chunk_years: env_i32("CLUB_HISTORY_CHUNK_YEARS", defaults.chunk_years).max(1),
            chunk_pause: Duration::from_millis(pause_ms),
        }
    }
}

/// Basic-auth credentials guarding the `/api/admin` routes.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

impl AdminConfig {
    /// Build config from environment variables.
    /// Returns `None` if `ADMIN_USERNAME` or `ADMIN_PASSWORD` is not set
    /// (admin auth disabled).
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("ADMIN_USERNAME").ok()?;
        let password = std::env::var("ADMIN_PASSWORD").ok()?;
        Some(Self { username, password })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mining_defaults_cover_full_window() {
        let config = MiningConfig::default();
        assert_eq!(config.min_year, 1880);
        assert_eq!(config.max_year, 2024);
        assert_eq!(config.chunk_years, 10);
        assert_eq!(config.chunk_pause, Duration::from_secs(1));
    }
}
