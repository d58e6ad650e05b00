//! API configuration.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Allowed origins; `*` allows any
    pub cors_origins: Vec<String>,
    pub max_body_size: usize,
    /// `production` hides internal error detail from clients
    pub environment: String,
    /// Bucket holding transcoded output
    pub processed_bucket: String,
    /// Lifetime of presigned playback URLs
    pub presign_ttl: Duration,
    /// Summary requests allowed per client IP within `summary_rate_window`
    pub summary_rate_limit: u32,
    pub summary_rate_window: Duration,
    /// Peers whose `X-Forwarded-For`/`X-Real-IP` headers are believed
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 1024 * 1024,
            environment: "development".to_string(),
            processed_bucket: "processed-videos".to_string(),
            presign_ttl: Duration::from_secs(3600),
            summary_rate_limit: 5,
            summary_rate_window: Duration::from_secs(60),
            trusted_proxies: vec![IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)],
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            host: env_or("API_HOST", d.host),
            port: env_or("API_PORT", d.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or(d.cors_origins),
            max_body_size: env_or("MAX_BODY_SIZE", d.max_body_size),
            environment: env_or("ENVIRONMENT", d.environment),
            processed_bucket: env_or("S3_PROCESSED_BUCKET", d.processed_bucket),
            presign_ttl: Duration::from_secs(env_or(
                "PRESIGN_TTL_SECS",
                d.presign_ttl.as_secs(),
            )),
            summary_rate_limit: env_or("SUMMARY_RATE_LIMIT", d.summary_rate_limit),
            summary_rate_window: Duration::from_secs(env_or(
                "SUMMARY_RATE_WINDOW_SECS",
                d.summary_rate_window.as_secs(),
            )),
            trusted_proxies: std::env::var("TRUSTED_PROXIES")
                .map(|s| parse_ip_list(&s))
                .unwrap_or(d.trusted_proxies),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Comma-separated addresses; entries that do not parse are skipped.
fn parse_ip_list(value: &str) -> Vec<IpAddr> {
    value
        .split(',')
        .filter_map(|ip| ip.trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.presign_ttl, Duration::from_secs(3600));
        assert_eq!(config.summary_rate_limit, 5);
        assert!(!config.is_production());
    }

    #[test]
    fn test_production_flag_ignores_case() {
        let config = ApiConfig {
            environment: "Production".to_string(),
            ..ApiConfig::default()
        };
        assert!(config.is_production());
    }

    #[test]
    fn test_trusted_proxy_list() {
        assert_eq!(
            parse_ip_list("10.0.0.5, ::1,bogus,"),
            vec![
                "10.0.0.5".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap()
            ]
        );
        assert!(parse_ip_list("").is_empty());
        assert_eq!(ApiConfig::default().trusted_proxies.len(), 2);
    }
}
