use std::path::PathBuf;

use anyhow::{bail, Context};

// One year.
const MAX_JWT_TTL_HOURS: i64 = 24 * 365;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub dev_mode: bool,
    pub dev_user_id: Option<i32>,
    pub port: u16,
    pub db_pool_size: usize,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub pdf_font_dir: PathBuf,
    pub pdf_font_name: String,
    pub telegram_bot_token: Option<String>,
    pub export_row_limit: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup so parsing can be tested without
    /// touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let dev_mode = get("DEV_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if dev_mode => "dev-secret-do-not-use-in-production".to_string(),
            None => bail!("JWT_SECRET must be set in production"),
        };

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        if !database_url.starts_with("mysql://") {
            bail!("DATABASE_URL must be a mysql:// URL");
        }

        let jwt_ttl_hours: i64 = parse_or(get("JWT_TTL_HOURS"), "JWT_TTL_HOURS", 24)?;
        if !(1..=MAX_JWT_TTL_HOURS).contains(&jwt_ttl_hours) {
            bail!("JWT_TTL_HOURS must be between 1 and {MAX_JWT_TTL_HOURS}");
        }
        let db_pool_size: usize = parse_or(get("DB_POOL_SIZE"), "DB_POOL_SIZE", 10)?;
        if db_pool_size == 0 {
            bail!("DB_POOL_SIZE must be at least 1");
        }

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_ttl_hours,
            dev_mode,
            dev_user_id: get("DEV_USER_ID").and_then(|v| v.parse().ok()),
            port: parse_or(get("PORT"), "PORT", 8080)?,
            db_pool_size,
            upload_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./uploads")),
            max_upload_bytes: parse_or(get("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            pdf_font_dir: get("PDF_FONT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./fonts")),
            pdf_font_name: get("PDF_FONT_NAME").unwrap_or_else(|| "LiberationSans".to_string()),
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            export_row_limit: parse_or(get("EXPORT_ROW_LIMIT"), "EXPORT_ROW_LIMIT", 10_000)?,
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: '{v}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[
            ("DATABASE_URL", "mysql://helpdesk@localhost/helpdesk"),
            ("JWT_SECRET", "s3cret"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.jwt_ttl_hours, 24);
        assert_eq!(cfg.db_pool_size, 10);
        assert_eq!(cfg.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.upload_dir, PathBuf::from("./uploads"));
        assert!(cfg.telegram_bot_token.is_none());
        assert!(!cfg.dev_mode);
    }

    #[test]
    fn secret_required_outside_dev_mode() {
        let err = config(&[("DATABASE_URL", "mysql://localhost/helpdesk")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let cfg = config(&[
            ("DATABASE_URL", "mysql://localhost/helpdesk"),
            ("DEV_MODE", "1"),
        ])
        .unwrap();
        assert!(cfg.dev_mode);
        assert!(!cfg.jwt_secret.is_empty());
    }

    #[test]
    fn rejects_non_mysql_urls_and_bad_numbers() {
        assert!(config(&[("DATABASE_URL", "postgres://x/y"), ("JWT_SECRET", "s")]).is_err());

        let err = config(&[
            ("DATABASE_URL", "mysql://localhost/helpdesk"),
            ("JWT_SECRET", "s"),
            ("PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn ttl_and_pool_size_are_range_checked() {
        let base = [
            ("DATABASE_URL", "mysql://localhost/helpdesk"),
            ("JWT_SECRET", "s"),
        ];
        let with = |key: &'static str, value: &'static str| {
            let mut pairs = base.to_vec();
            pairs.push((key, value));
            config(&pairs)
        };

        for ttl in ["-5", "0", "8761", "9223372036854775807"] {
            let err = with("JWT_TTL_HOURS", ttl).unwrap_err();
            assert!(err.to_string().contains("JWT_TTL_HOURS"), "ttl {ttl}");
        }
        assert_eq!(with("JWT_TTL_HOURS", "8760").unwrap().jwt_ttl_hours, 8760);

        let err = with("DB_POOL_SIZE", "0").unwrap_err();
        assert!(err.to_string().contains("DB_POOL_SIZE"));
        assert_eq!(with("DB_POOL_SIZE", "1").unwrap().db_pool_size, 1);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[
            ("DATABASE_URL", "mysql://localhost/helpdesk"),
            ("JWT_SECRET", "s"),
            ("TELEGRAM_BOT_TOKEN", "  "),
        ])
        .unwrap();
        assert!(cfg.telegram_bot_token.is_none());
    }
}
