use std::collections::HashMap;

use anyhow::{bail, Context, Result};

/// Label of the CRM tag sales puts on qualified leads.
pub const DEFAULT_QUALIFIED_TAG: &str = "Квалифицирован";

/// Weeks refreshed by the history job when `HISTORY_WEEKS` is unset.
pub const DEFAULT_HISTORY_WEEKS: u32 = 8;

/// Application configuration loaded from environment variables.
/// Built once at startup and handed to every component.
#[derive(Debug, Clone)]
pub struct Config {
    // Databases
    pub database_url: String,
    pub inventory_database_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Auth
    pub users: HashMap<String, String>,
    pub session_secret: String,
    pub cron_secret: Option<String>,
    pub webhook_secret: Option<String>,

    // CRM
    pub crm: CrmConfig,

    // Jobs
    pub history_weeks: u32,
    pub sync_interval_minutes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CrmConfig {
    pub domain: Option<String>,
    pub access_token: Option<String>,
    pub qualified_tag: String,
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| var(key).with_context(|| format!("{key} environment variable is required"));

        let database_url = required("DATABASE_URL")?;
        let inventory_database_url =
            var("INVENTORY_DATABASE_URL").unwrap_or_else(|| database_url.clone());

        let web_port = match var("WEB_PORT") {
            Some(v) => v.parse().with_context(|| format!("WEB_PORT must be a port number, got {v:?}"))?,
            None => 3000,
        };

        let history_weeks = match var("HISTORY_WEEKS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("HISTORY_WEEKS must be a whole number, got {v:?}"))?,
            None => DEFAULT_HISTORY_WEEKS,
        };

        let sync_interval_minutes = match var("SYNC_INTERVAL_MINUTES") {
            Some(v) => {
                let minutes: u64 = v
                    .parse()
                    .with_context(|| format!("SYNC_INTERVAL_MINUTES must be a whole number, got {v:?}"))?;
                if minutes == 0 {
                    bail!("SYNC_INTERVAL_MINUTES must be greater than zero");
                }
                Some(minutes)
            }
            None => None,
        };

        Ok(Self {
            database_url,
            inventory_database_url,
            web_host: var("WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            web_port,
            users: parse_users(&var("USERS").unwrap_or_default()),
            session_secret: required("SESSION_SECRET")?,
            cron_secret: var("CRON_SECRET"),
            webhook_secret: var("GOOGLE_ADS_WEBHOOK_SECRET"),
            crm: CrmConfig {
                domain: var("AMOCRM_DOMAIN"),
                access_token: var("AMOCRM_ACCESS_TOKEN"),
                qualified_tag: var("AMOCRM_QUALIFIED_TAG")
                    .unwrap_or_else(|| DEFAULT_QUALIFIED_TAG.to_string()),
            },
            history_weeks,
            sync_interval_minutes,
        })
    }

    /// Log the loaded configuration with secrets reduced to a short prefix.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.char_indices().nth(4).map(|(i, _)| i).unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => preview(v),
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  WEB: {}:{}", self.web_host, self.web_port);
        tracing::info!("  USERS: {} configured", self.users.len());
        tracing::info!("  SESSION_SECRET: {}", preview(&self.session_secret));
        tracing::info!("  CRON_SECRET: {}", preview_opt(&self.cron_secret));
        tracing::info!("  GOOGLE_ADS_WEBHOOK_SECRET: {}", preview_opt(&self.webhook_secret));
        tracing::info!(
            "  AMOCRM_DOMAIN: {}",
            self.crm.domain.as_deref().unwrap_or("<not set>")
        );
        tracing::info!("  AMOCRM_ACCESS_TOKEN: {}", preview_opt(&self.crm.access_token));
        tracing::info!("  AMOCRM_QUALIFIED_TAG: {}", self.crm.qualified_tag);
        tracing::info!("  HISTORY_WEEKS: {}", self.history_weeks);
        match self.sync_interval_minutes {
            Some(m) => tracing::info!("  SYNC_INTERVAL_MINUTES: {m}"),
            None => tracing::info!("  SYNC_INTERVAL_MINUTES: <disabled>"),
        }

        if self.users.is_empty() {
            tracing::warn!("USERS is empty; nobody will be able to log in");
        }
    }
}

/// Parse `login:password` pairs separated by commas. Malformed pairs are skipped.
fn parse_users(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (login, password) = pair.split_once(':')?;
            let (login, password) = (login.trim(), password.trim());
            if login.is_empty() || password.is_empty() {
                return None;
            }
            Some((login.to_string(), password.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/dash"),
            ("SESSION_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.inventory_database_url, "postgres://localhost/dash");
        assert_eq!(config.web_port, 3000);
        assert_eq!(config.crm.qualified_tag, DEFAULT_QUALIFIED_TAG);
        assert_eq!(config.history_weeks, DEFAULT_HISTORY_WEEKS);
        assert!(config.cron_secret.is_none());
        assert!(config.sync_interval_minutes.is_none());
        assert!(config.users.is_empty());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = Config::from_vars(vars(&[("SESSION_SECRET", "x")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn bad_port_is_an_error() {
        let result = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/dash"),
            ("SESSION_SECRET", "x"),
            ("WEB_PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn zero_sync_interval_is_rejected() {
        let result = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/dash"),
            ("SESSION_SECRET", "x"),
            ("SYNC_INTERVAL_MINUTES", "0"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn blank_secrets_count_as_unset() {
        let config = Config::from_vars(vars(&[
            ("DATABASE_URL", "postgres://localhost/dash"),
            ("SESSION_SECRET", "x"),
            ("CRON_SECRET", "   "),
        ]))
        .unwrap();
        assert!(config.cron_secret.is_none());
    }

    #[test]
    fn parses_user_pairs() {
        let users = parse_users("alice:pw1, bob : pw2 ,broken,:nologin,carol:a:b");
        assert_eq!(users.len(), 3);
        assert_eq!(users["alice"], "pw1");
        assert_eq!(users["bob"], "pw2");
        assert_eq!(users["carol"], "a:b");
    }
}
