use serde::Deserialize;
use std::env;
use tracing::warn;

use salon_core::hold::HoldPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BusinessRules {
    /// One TTL for every hold entry point.
    #[serde(default = "default_hold_ttl")]
    pub hold_ttl_seconds: u64,
    #[serde(default = "default_min_duration")]
    pub min_duration_minutes: i64,
    #[serde(default = "default_max_duration")]
    pub max_duration_minutes: i64,
    /// Lifetime of the `booking_session` cookie; unrelated to the hold TTL.
    #[serde(default = "default_session_hours")]
    pub session_ttl_hours: i64,
}

fn default_hold_ttl() -> u64 { 600 }
fn default_min_duration() -> i64 { 15 }
fn default_max_duration() -> i64 { 480 }
fn default_session_hours() -> i64 { 24 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            hold_ttl_seconds: default_hold_ttl(),
            min_duration_minutes: default_min_duration(),
            max_duration_minutes: default_max_duration(),
            session_ttl_hours: default_session_hours(),
        }
    }
}

pub const MAX_HOLD_TTL_SECONDS: u64 = 24 * 60 * 60;
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

impl BusinessRules {
    /// Puts out-of-range values back to their defaults. Min and max duration
    /// are reset together so the pair stays ordered.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(1..=MAX_HOLD_TTL_SECONDS).contains(&self.hold_ttl_seconds) {
            warn!(
                "hold_ttl_seconds {} outside 1..={}, using {}",
                self.hold_ttl_seconds, MAX_HOLD_TTL_SECONDS, defaults.hold_ttl_seconds
            );
            self.hold_ttl_seconds = defaults.hold_ttl_seconds;
        }
        if self.min_duration_minutes < 1
            || self.min_duration_minutes > self.max_duration_minutes
            || self.max_duration_minutes > MAX_DURATION_MINUTES
        {
            warn!(
                "duration bounds {}-{} min rejected, using {}-{}",
                self.min_duration_minutes,
                self.max_duration_minutes,
                defaults.min_duration_minutes,
                defaults.max_duration_minutes
            );
            self.min_duration_minutes = defaults.min_duration_minutes;
            self.max_duration_minutes = defaults.max_duration_minutes;
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            warn!(
                "session_ttl_hours {} outside 1..={}, using {}",
                self.session_ttl_hours, MAX_SESSION_TTL_HOURS, defaults.session_ttl_hours
            );
            self.session_ttl_hours = defaults.session_ttl_hours;
        }
        self
    }

    pub fn hold_policy(&self) -> HoldPolicy {
        let ttl_seconds = self.hold_ttl_seconds.min(MAX_HOLD_TTL_SECONDS) as i64;
        HoldPolicy {
            ttl: chrono::Duration::seconds(ttl_seconds),
            min_duration_minutes: self.min_duration_minutes,
            max_duration_minutes: self.max_duration_minutes,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Marks the session cookie `Secure`; on in production.
    #[serde(default)]
    pub secure_cookies: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// Rate limiting is skipped when unset.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KafkaConfig {
    /// Slot events stay in-process when unset.
    pub brokers: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests: 60, window_seconds: 60 }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. SALON__DATABASE__URL, SALON__BUSINESS_RULES__HOLD_TTL_SECONDS
            .add_source(config::Environment::with_prefix("SALON").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn test_minimal_config_gets_defaults() {
        let raw = r#"
            [server]
            port = 8080

            [database]
            url = "postgres://localhost/salon"

            [auth]
            jwt_secret = "dev"
        "#;
        let config: Config = config::Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(!config.server.secure_cookies);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.business_rules, BusinessRules::default());
        assert!(config.redis.url.is_none());
        assert!(config.kafka.brokers.is_none());
        assert_eq!(config.rate_limit.requests, 60);
    }

    #[test]
    fn test_hold_policy_uses_canonical_ttl() {
        let policy = BusinessRules::default().hold_policy();
        assert_eq!(policy.ttl, chrono::Duration::minutes(10));
        assert_eq!(policy, HoldPolicy::default());
    }

    #[test]
    fn test_sanitized_resets_out_of_range_rules() {
        let rules = BusinessRules {
            hold_ttl_seconds: u64::MAX,
            min_duration_minutes: 120,
            max_duration_minutes: 30,
            session_ttl_hours: 0,
        }
        .sanitized();
        assert_eq!(rules, BusinessRules::default());

        let rules = BusinessRules {
            hold_ttl_seconds: 0,
            max_duration_minutes: i64::MAX,
            ..BusinessRules::default()
        }
        .sanitized();
        assert_eq!(rules, BusinessRules::default());
    }

    #[test]
    fn test_sanitized_keeps_sane_rules() {
        let rules = BusinessRules {
            hold_ttl_seconds: 300,
            min_duration_minutes: 30,
            max_duration_minutes: 30,
            session_ttl_hours: 48,
        };
        assert_eq!(rules.clone().sanitized(), rules);
    }

    #[test]
    fn test_hold_policy_never_overflows_ttl() {
        let rules = BusinessRules {
            hold_ttl_seconds: u64::MAX,
            ..BusinessRules::default()
        };
        let policy = rules.hold_policy();
        assert_eq!(policy.ttl, chrono::Duration::hours(24));
        assert_eq!(policy.ttl_seconds(), MAX_HOLD_TTL_SECONDS);
    }
}
