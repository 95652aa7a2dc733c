use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://leprosorium.ru/api/";
const DEFAULT_DATA_DIR: &str = "./data/ledger";

/// Runtime knobs for one batch run. Everything has a sensible default;
/// the endpoint and data directory can be overridden from the environment.
pub struct AppConfig {
    pub base_url: String,
    pub data_dir: PathBuf,
    /// Minimum spacing between consecutive vote submissions.
    pub interval: Duration,
    /// Upper bound of the random extra delay added to each interval.
    pub jitter_ms: u64,
    /// Page size for the listing endpoints.
    pub per_page: usize,
    /// The vote value cast on every selected item.
    pub vote: i8,
    /// API error codes that mean an item can never be voted on. Anything
    /// else coming back from a vote call is treated as transient.
    pub permanent_codes: HashSet<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            // 12 actions per minute
            interval: Duration::from_millis(5000),
            jitter_ms: 100,
            per_page: 25,
            vote: -1,
            permanent_codes: ["voting_disabled".to_string()].into_iter().collect(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = dotenv::var("LEPRA_API_URL") {
            // The client joins paths by simple concatenation, so the base
            // must end with a slash.
            config.base_url = if url.ends_with('/') { url } else { format!("{}/", url) };
        }
        if let Ok(dir) = dotenv::var("LEPRA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.interval, Duration::from_millis(5000));
        assert_eq!(config.per_page, 25);
        assert_eq!(config.vote, -1);
        assert!(config.permanent_codes.contains("voting_disabled"));
        assert!(config.base_url.ends_with('/'));
    }
}
