/// Process-level configuration, loaded from environment variables.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen_addr: String,
    pub snapshot_path: String,
    pub initial_capital: f64,
    pub quote_base_url: String,
    pub advisor_base_url: String,
    pub advisor_api_key: Option<String>,
    pub strategy: String,
    pub risk_tolerance: String,
    pub snapshot_interval_seconds: u64,
}

impl AppConfig {
    pub fn default() -> AppConfig {
        AppConfig {
            listen_addr: "0.0.0.0:3000".to_string(),
            snapshot_path: "data/account.json".to_string(),
            initial_capital: 10_000.0,
            quote_base_url: "https://query1.finance.yahoo.com".to_string(),
            advisor_base_url: "https://api.openai.com/v1".to_string(),
            advisor_api_key: None,
            strategy: "balanced growth".to_string(),
            risk_tolerance: "medium".to_string(),
            snapshot_interval_seconds: 60,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> AppConfig {
        let mut config = AppConfig::default();

        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            if !addr.is_empty() {
                config.listen_addr = addr;
            }
        }

        if let Ok(path) = std::env::var("SNAPSHOT_PATH") {
            if !path.is_empty() {
                config.snapshot_path = path;
            }
        }

        if let Ok(capital) = std::env::var("INITIAL_CAPITAL") {
            match capital.parse::<f64>() {
                Ok(value) if value >= 0.0 && value.is_finite() => {
                    config.initial_capital = value;
                }
                Ok(value) => {
                    tracing::warn!(
                        "Invalid INITIAL_CAPITAL value: {} (must be non-negative), using default: {}",
                        value,
                        config.initial_capital
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse INITIAL_CAPITAL '{}': {}, using default: {}",
                        capital,
                        e,
                        config.initial_capital
                    );
                }
            }
        }

        if let Ok(url) = std::env::var("QUOTE_BASE_URL") {
            if !url.is_empty() {
                config.quote_base_url = url;
            }
        }

        if let Ok(url) = std::env::var("ADVISOR_BASE_URL") {
            if !url.is_empty() {
                config.advisor_base_url = url;
            }
        }

        if let Ok(key) = std::env::var("ADVISOR_API_KEY") {
            if !key.is_empty() {
                config.advisor_api_key = Some(key);
            }
        }

        if let Ok(strategy) = std::env::var("STRATEGY") {
            if !strategy.is_empty() {
                config.strategy = strategy;
            }
        }

        if let Ok(risk) = std::env::var("RISK_TOLERANCE") {
            match risk.to_lowercase().as_str() {
                "low" | "medium" | "high" => config.risk_tolerance = risk.to_lowercase(),
                other => {
                    tracing::warn!(
                        "Invalid RISK_TOLERANCE '{}' (expected low/medium/high), using default: {}",
                        other,
                        config.risk_tolerance
                    );
                }
            }
        }

        if let Ok(interval) = std::env::var("SNAPSHOT_INTERVAL_SECONDS") {
            if let Ok(value) = interval.parse::<u64>() {
                if value >= 5 && value <= 3600 {
                    config.snapshot_interval_seconds = value;
                }
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.initial_capital, 10_000.0);
        assert_eq!(config.risk_tolerance, "medium");
        assert!(config.advisor_api_key.is_none());
    }
}
