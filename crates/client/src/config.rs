//! Client configuration from environment variables.

/// Endpoints the data layer talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL for REST requests.
    pub api_url: String,
    /// Base URL for the notification push channel.
    pub ws_url: String,
}

impl ClientConfig {
    /// Read configuration from the environment.
    ///
    /// Environment variables:
    /// - `JOBDASH_API_URL`: REST base URL (default: "http://localhost:8000")
    /// - `JOBDASH_WS_URL`: push channel base URL (default: "ws://localhost:8000")
    pub fn from_env() -> Self {
        let api_url = std::env::var("JOBDASH_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        let ws_url =
            std::env::var("JOBDASH_WS_URL").unwrap_or_else(|_| "ws://localhost:8000".to_string());
        Self { api_url, ws_url }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_with_local_defaults() {
        std::env::remove_var("JOBDASH_API_URL");
        std::env::remove_var("JOBDASH_WS_URL");
        let config = ClientConfig::from_env();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.ws_url, "ws://localhost:8000");

        std::env::set_var("JOBDASH_API_URL", "https://api.jobdash.example");
        std::env::set_var("JOBDASH_WS_URL", "wss://api.jobdash.example");
        let config = ClientConfig::from_env();
        assert_eq!(config.api_url, "https://api.jobdash.example");
        assert_eq!(config.ws_url, "wss://api.jobdash.example");

        std::env::remove_var("JOBDASH_API_URL");
        std::env::remove_var("JOBDASH_WS_URL");
    }
}
