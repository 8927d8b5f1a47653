use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};

use crate::app_config::{BusinessRules, DatabaseConfig};

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_key: String,
    rule_value: Value,
}

impl DbClient {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlays rows of `business_rules` (`{"value": ...}`) on the file config.
    /// Out-of-range results fall back to defaults with a warning.
    pub async fn fetch_business_rules(&self, defaults: BusinessRules) -> Result<BusinessRules, sqlx::Error> {
        let rows = sqlx::query_as::<_, RuleRow>("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        Ok(apply_rules(defaults, rows.into_iter().map(|r| (r.rule_key, r.rule_value))))
    }
}

fn apply_rules(mut rules: BusinessRules, rows: impl IntoIterator<Item = (String, Value)>) -> BusinessRules {
    for (key, raw) in rows {
        let Some(v) = raw.get("value") else {
            warn!("business rule {} has no value", key);
            continue;
        };
        match key.as_str() {
            "hold_ttl_seconds" => {
                if let Some(u) = v.as_u64() {
                    rules.hold_ttl_seconds = u;
                }
            }
            "min_duration_minutes" => {
                if let Some(i) = v.as_i64() {
                    rules.min_duration_minutes = i;
                }
            }
            "max_duration_minutes" => {
                if let Some(i) = v.as_i64() {
                    rules.max_duration_minutes = i;
                }
            }
            "session_ttl_hours" => {
                if let Some(i) = v.as_i64() {
                    rules.session_ttl_hours = i;
                }
            }
            _ => {}
        }
    }
    rules.sanitized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rules_override_defaults() {
        let rules = apply_rules(
            BusinessRules::default(),
            vec![
                ("hold_ttl_seconds".to_string(), json!({"value": 300})),
                ("max_duration_minutes".to_string(), json!({"value": 240})),
                ("unknown".to_string(), json!({"value": 1})),
            ],
        );
        assert_eq!(rules.hold_ttl_seconds, 300);
        assert_eq!(rules.max_duration_minutes, 240);
        assert_eq!(rules.min_duration_minutes, 15);
    }

    #[test]
    fn test_malformed_rules_are_ignored() {
        let rules = apply_rules(
            BusinessRules::default(),
            vec![
                ("hold_ttl_seconds".to_string(), json!(300)),
                ("min_duration_minutes".to_string(), json!({"value": "ten"})),
            ],
        );
        assert_eq!(rules, BusinessRules::default());
    }

    #[test]
    fn test_out_of_range_rules_fall_back() {
        let rules = apply_rules(
            BusinessRules::default(),
            vec![
                ("hold_ttl_seconds".to_string(), json!({"value": u64::MAX})),
                ("min_duration_minutes".to_string(), json!({"value": 600})),
                ("session_ttl_hours".to_string(), json!({"value": 12})),
            ],
        );
        assert_eq!(rules.hold_ttl_seconds, 600);
        assert_eq!(rules.min_duration_minutes, 15);
        assert_eq!(rules.max_duration_minutes, 480);
        assert_eq!(rules.session_ttl_hours, 12);
    }
}
