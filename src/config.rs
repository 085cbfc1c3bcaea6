use crate::error::ConfigurationError;
use crate::util;
use chrono_tz::Tz;
use std::env;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("tutoring".to_string())
}

fn default_public_content() -> PathBuf {
    PathBuf::from(env::var("PUBLIC_CONTENT_PATH").unwrap_or("./public".to_string()))
}

fn default_locales_path() -> PathBuf {
    PathBuf::from(env::var("LOCALES_PATH").unwrap_or("./locales".to_string()))
}

fn default_site_url() -> String {
    env::var("SITE_URL").unwrap_or("http://localhost:8000".to_string())
}

fn default_jwt_secret() -> String {
    env::var("AUTH_JWT_SECRET").unwrap_or_default()
}

fn default_subscribe_secret() -> String {
    env::var("SUBSCRIBE_SECRET").unwrap_or_else(|_| default_jwt_secret())
}

fn default_admin_emails() -> Vec<String> {
    vec![]
}

fn default_locales() -> Vec<String> {
    vec!["en".to_string(), "es".to_string()]
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_timezone() -> String {
    env::var("BUSINESS_TIMEZONE").unwrap_or("UTC".to_string())
}

fn default_lesson_minutes() -> u32 {
    60
}

fn default_slot_step_minutes() -> u32 {
    30
}

fn default_min_notice_hours() -> u32 {
    24
}

fn default_dashboard_poll_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    /// Receives contact form notifications.
    #[serde(default)]
    pub notify: Option<String>,
}

impl MailConfig {
    fn from_env() -> MailConfig {
        MailConfig {
            api_url: env::var("MAIL_API_URL").ok(),
            api_key: env::var("MAIL_API_KEY").ok(),
            from: env::var("MAIL_FROM").ok(),
            notify: env::var("ADMIN_NOTIFY_EMAIL").ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,

    #[serde(default = "default_public_content")]
    pub public_content: PathBuf,
    #[serde(default = "default_locales_path")]
    pub locales_path: PathBuf,

    /// Canonical public address, used for host redirects and mail links.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_subscribe_secret")]
    pub subscribe_secret: String,
    #[serde(default = "default_admin_emails")]
    pub admin_emails: Vec<String>,

    #[serde(default = "default_locales")]
    pub locales: Vec<String>,
    #[serde(default = "default_locale")]
    pub default_locale: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_lesson_minutes")]
    pub lesson_minutes: u32,
    #[serde(default = "default_slot_step_minutes")]
    pub slot_step_minutes: u32,
    #[serde(default = "default_min_notice_hours")]
    pub min_notice_hours: u32,

    #[serde(default = "default_true")]
    pub dashboard_feed: bool,
    #[serde(default = "default_dashboard_poll_secs")]
    pub dashboard_poll_secs: u64,

    #[serde(default = "MailConfig::from_env")]
    pub mail: MailConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            public_content: default_public_content(),
            locales_path: default_locales_path(),
            site_url: default_site_url(),
            jwt_secret: default_jwt_secret(),
            subscribe_secret: default_subscribe_secret(),
            admin_emails: default_admin_emails(),
            locales: default_locales(),
            default_locale: default_locale(),
            timezone: default_timezone(),
            lesson_minutes: default_lesson_minutes(),
            slot_step_minutes: default_slot_step_minutes(),
            min_notice_hours: default_min_notice_hours(),
            dashboard_feed: true,
            dashboard_poll_secs: default_dashboard_poll_secs(),
            mail: MailConfig::from_env(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    /// Checks values that can't be expressed through serde defaults.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigurationError::Invalid {
                key: "jwt_secret",
                reason: "auth provider JWT secret must be set".to_string(),
            });
        }
        if !self.locales.contains(&self.default_locale) {
            return Err(ConfigurationError::Invalid {
                key: "default_locale",
                reason: format!("'{}' isn't one of {:?}", self.default_locale, self.locales),
            });
        }
        self.business_timezone()?;
        if self.lesson_minutes == 0 || self.slot_step_minutes == 0 {
            return Err(ConfigurationError::Invalid {
                key: "slot_step_minutes",
                reason: "lesson length and slot step must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn business_timezone(&self) -> Result<Tz, ConfigurationError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigurationError::Invalid {
                key: "timezone",
                reason: e.to_string(),
            })
    }

    /// Host part of `site_url`, without port.
    pub fn canonical_host(&self) -> Option<&str> {
        let rest = self
            .site_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.site_url);
        let host = rest.split(['/', ':']).next()?;
        if host.is_empty() {
            None
        } else {
            Some(host)
        }
    }

    pub fn is_supported_locale(&self, locale: &str) -> bool {
        self.locales.iter().any(|it| it == locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_host_strips_scheme_port_and_path() {
        let mut c = Config::default();
        c.site_url = "https://www.example.com:8443/en".to_string();
        assert_eq!(c.canonical_host(), Some("www.example.com"));

        c.site_url = "example.com".to_string();
        assert_eq!(c.canonical_host(), Some("example.com"));
    }

    #[test]
    fn validate_rejects_unknown_default_locale() {
        let mut c = Config::default();
        c.jwt_secret = "secret".to_string();
        c.default_locale = "fr".to_string();
        assert!(matches!(
            c.validate(),
            Err(ConfigurationError::Invalid {
                key: "default_locale",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_bad_timezone() {
        let mut c = Config::default();
        c.jwt_secret = "secret".to_string();
        c.timezone = "Mars/Olympus".to_string();
        assert!(c.validate().is_err());

        c.timezone = "Europe/Madrid".to_string();
        assert!(c.validate().is_ok());
    }
}
