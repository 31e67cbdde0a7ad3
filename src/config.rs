use std::env;

use crate::error::TriggerError;

pub const DEFAULT_COOLDOWN_HOURS: i64 = 24;
pub const DEFAULT_SEND_DELAY_MS: u64 = 300;
pub const DEFAULT_SUBSCRIPTION_LIMIT: i64 = 200;
pub const DEFAULT_SENDER: &str = "Trendily <onboarding@resend.dev>";

/// Runtime knobs, loaded once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub alert_secret: Option<String>,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub serpapi_key: Option<String>,
    pub trend_geo: Option<String>,
    /// When set, the only address notifications may be delivered to.
    pub test_recipient: Option<String>,
    /// When set, keyword groups whose average interest sits below this
    /// floor are skipped. Unset means the gate is off.
    pub volume_floor: Option<i64>,
    pub cooldown_hours: i64,
    pub send_delay_ms: u64,
    pub subscription_limit: i64,
}

impl Config {
    /// Environment variables:
    /// - `ALERT_SECRET` (no default; the trigger rejects everything without it)
    /// - `RESEND_API_KEY` (no default; checked per run)
    /// - `EMAIL_FROM` (default: the Resend sandbox sender)
    /// - `SERPAPI_KEY` (no default; fetches fail per keyword without it)
    /// - `TREND_GEO` (optional region filter)
    /// - `TEST_RECIPIENT` (optional delivery allow-list of one address)
    /// - `VOLUME_FLOOR` (optional; unset disables the volume gate)
    /// - `COOLDOWN_HOURS` (default: 24)
    /// - `SEND_DELAY_MS` (default: 300)
    /// - `SUBSCRIPTION_LIMIT` (default: 200)
    pub fn from_env() -> Self {
        Config {
            alert_secret: non_empty(env::var("ALERT_SECRET").ok()),
            resend_api_key: non_empty(env::var("RESEND_API_KEY").ok()),
            email_from: env::var("EMAIL_FROM").unwrap_or_else(|_| DEFAULT_SENDER.to_string()),
            serpapi_key: non_empty(env::var("SERPAPI_KEY").ok()),
            trend_geo: non_empty(env::var("TREND_GEO").ok()),
            test_recipient: non_empty(env::var("TEST_RECIPIENT").ok()),
            volume_floor: env::var("VOLUME_FLOOR").ok().and_then(|s| s.parse().ok()),
            cooldown_hours: env::var("COOLDOWN_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_COOLDOWN_HOURS),
            send_delay_ms: env::var("SEND_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SEND_DELAY_MS),
            subscription_limit: env::var("SUBSCRIPTION_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SUBSCRIPTION_LIMIT),
        }
    }

    /// Fails closed: with no configured secret every presented key is refused.
    pub fn authorizes(&self, presented: Option<&str>) -> bool {
        match self.alert_secret.as_deref() {
            Some(secret) => presented == Some(secret),
            None => false,
        }
    }

    pub fn mailer_key(&self) -> Result<&str, TriggerError> {
        self.resend_api_key
            .as_deref()
            .ok_or(TriggerError::MissingCredential("RESEND_API_KEY"))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: &[&str] = &[
        "ALERT_SECRET",
        "RESEND_API_KEY",
        "EMAIL_FROM",
        "SERPAPI_KEY",
        "TREND_GEO",
        "TEST_RECIPIENT",
        "VOLUME_FLOOR",
        "COOLDOWN_HOURS",
        "SEND_DELAY_MS",
        "SUBSCRIPTION_LIMIT",
    ];

    #[test]
    fn defaults_then_overrides() {
        for var in ALL_VARS {
            env::remove_var(var);
        }

        let config = Config::from_env();
        assert!(config.alert_secret.is_none());
        assert!(config.resend_api_key.is_none());
        assert_eq!(config.email_from, DEFAULT_SENDER);
        assert!(config.volume_floor.is_none());
        assert_eq!(config.cooldown_hours, 24);
        assert_eq!(config.send_delay_ms, 300);
        assert_eq!(config.subscription_limit, 200);
        assert!(config.mailer_key().is_err());

        env::set_var("ALERT_SECRET", "s3cret");
        env::set_var("RESEND_API_KEY", "re_123");
        env::set_var("VOLUME_FLOOR", "40");
        env::set_var("COOLDOWN_HOURS", "6");
        env::set_var("SEND_DELAY_MS", "50");

        let config = Config::from_env();
        assert_eq!(config.volume_floor, Some(40));
        assert_eq!(config.cooldown_hours, 6);
        assert_eq!(config.send_delay_ms, 50);
        assert_eq!(config.mailer_key().unwrap(), "re_123");

        for var in ALL_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn authorization_fails_closed() {
        let mut config = Config {
            alert_secret: None,
            resend_api_key: None,
            email_from: DEFAULT_SENDER.to_string(),
            serpapi_key: None,
            trend_geo: None,
            test_recipient: None,
            volume_floor: None,
            cooldown_hours: DEFAULT_COOLDOWN_HOURS,
            send_delay_ms: DEFAULT_SEND_DELAY_MS,
            subscription_limit: DEFAULT_SUBSCRIPTION_LIMIT,
        };
        assert!(!config.authorizes(None));
        assert!(!config.authorizes(Some("anything")));

        config.alert_secret = Some("s3cret".to_string());
        assert!(config.authorizes(Some("s3cret")));
        assert!(!config.authorizes(Some("wrong")));
        assert!(!config.authorizes(None));
    }
}
