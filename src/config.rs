//! Process configuration, read from the environment.
//!
//! `YOUR_NAME`, `YOUR_EMAIL` and `GMAIL_APP_PASSWORD` are required for a
//! run. Everything else has a default. The server and batch settings live in
//! [`MailSettings`] and are only parsed by commands that talk to the mailbox.
//!
//! | variable                | default                  |
//! |-------------------------|--------------------------|
//! | `JOBREPLY_IMAP_HOST`    | imap.gmail.com           |
//! | `JOBREPLY_IMAP_PORT`    | 993                      |
//! | `JOBREPLY_SMTP_HOST`    | smtp.gmail.com           |
//! | `JOBREPLY_SMTP_PORT`    | 465                      |
//! | `JOBREPLY_MAX_MESSAGES` | 100                      |
//! | `JOBREPLY_DATA_DIR`     | platform data dir        |
//! | `JOBREPLY_RESUME_DIR`   | current directory        |
//! | `JOBREPLY_ROLES_FILE`   | built-in role table      |

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::resume::SecretSource;

pub const DEFAULT_MAX_MESSAGES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
    pub app_password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    name: Option<String>,
    email: Option<String>,
    app_password: Option<String>,
    pub data_dir: PathBuf,
    pub resume_dir: PathBuf,
    pub roles_file: Option<PathBuf>,
}

/// Mail servers and batch size, needed only by `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub max_messages: usize,
}

fn lookup(vars: &dyn SecretSource, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MailSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&crate::resume::EnvSecrets)
    }

    pub fn from_source(vars: &dyn SecretSource) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(vars, key);

        Ok(Self {
            imap_host: get("JOBREPLY_IMAP_HOST").unwrap_or_else(|| "imap.gmail.com".to_string()),
            imap_port: parse_or("JOBREPLY_IMAP_PORT", get("JOBREPLY_IMAP_PORT"), 993)?,
            smtp_host: get("JOBREPLY_SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            smtp_port: parse_or("JOBREPLY_SMTP_PORT", get("JOBREPLY_SMTP_PORT"), 465)?,
            max_messages: parse_or(
                "JOBREPLY_MAX_MESSAGES",
                get("JOBREPLY_MAX_MESSAGES"),
                DEFAULT_MAX_MESSAGES,
            )?,
        })
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_source(&crate::resume::EnvSecrets)
    }

    /// Never fails: everything here is optional text or a path.
    pub fn from_source(vars: &dyn SecretSource) -> Self {
        let get = |key: &str| lookup(vars, key);

        Self {
            name: get("YOUR_NAME"),
            email: get("YOUR_EMAIL"),
            app_password: get("GMAIL_APP_PASSWORD"),
            data_dir: get("JOBREPLY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            resume_dir: get("JOBREPLY_RESUME_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            roles_file: get("JOBREPLY_ROLES_FILE").map(PathBuf::from),
        }
    }

    /// The account we reply as. Lists every missing setting at once.
    pub fn identity(&self) -> Result<Identity, ConfigError> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("YOUR_NAME".to_string());
        }
        if self.email.is_none() {
            missing.push("YOUR_EMAIL".to_string());
        }
        if self.app_password.is_none() {
            missing.push("GMAIL_APP_PASSWORD".to_string());
        }

        match (&self.name, &self.email, &self.app_password) {
            (Some(name), Some(email), Some(app_password)) => Ok(Identity {
                name: name.clone(),
                email: email.clone(),
                app_password: app_password.clone(),
            }),
            _ => Err(ConfigError::Missing(missing)),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("processed_ids.json")
    }

    pub fn sent_log_path(&self) -> PathBuf {
        self.data_dir.join("sent_log.csv")
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            message: format!("'{}': {}", v, e),
        }),
    }
}

fn default_data_dir() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobreply") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let mail = MailSettings::from_source(&vars(&[])).unwrap();
        assert_eq!(mail.imap_host, "imap.gmail.com");
        assert_eq!(mail.imap_port, 993);
        assert_eq!(mail.smtp_port, 465);
        assert_eq!(mail.max_messages, 100);
        assert!(Config::from_source(&vars(&[])).roles_file.is_none());
    }

    #[test]
    fn test_all_missing_reported_together() {
        let config = Config::from_source(&vars(&[("YOUR_EMAIL", "me@example.com")]));
        match config.identity() {
            Err(ConfigError::Missing(keys)) => {
                assert_eq!(keys, vec!["YOUR_NAME", "GMAIL_APP_PASSWORD"]);
            }
            other => panic!("expected missing, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let config = Config::from_source(&vars(&[
            ("YOUR_NAME", "  "),
            ("YOUR_EMAIL", "me@example.com"),
            ("GMAIL_APP_PASSWORD", "abcd efgh"),
        ]));
        let err = config.identity().unwrap_err();
        assert_eq!(err.to_string(), "Missing required settings: YOUR_NAME");
    }

    #[test]
    fn test_identity_and_overrides() {
        let env = vars(&[
            ("YOUR_NAME", "Jane Doe"),
            ("YOUR_EMAIL", "jane@example.com"),
            ("GMAIL_APP_PASSWORD", "abcd efgh ijkl mnop"),
            ("JOBREPLY_MAX_MESSAGES", "25"),
            ("JOBREPLY_DATA_DIR", "/tmp/jobreply"),
        ]);
        let config = Config::from_source(&env);
        let identity = config.identity().unwrap();
        assert_eq!(identity.name, "Jane Doe");
        assert_eq!(MailSettings::from_source(&env).unwrap().max_messages, 25);
        assert_eq!(config.state_path(), PathBuf::from("/tmp/jobreply/processed_ids.json"));
        assert_eq!(config.sent_log_path(), PathBuf::from("/tmp/jobreply/sent_log.csv"));
    }

    #[test]
    fn test_invalid_number() {
        let err = MailSettings::from_source(&vars(&[("JOBREPLY_IMAP_PORT", "imap")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "JOBREPLY_IMAP_PORT"));
    }

    #[test]
    fn test_bad_mail_setting_does_not_block_paths() {
        let env = vars(&[
            ("JOBREPLY_IMAP_PORT", "abc"),
            ("JOBREPLY_DATA_DIR", "/tmp/jobreply"),
        ]);
        let config = Config::from_source(&env);
        assert_eq!(config.state_path(), PathBuf::from("/tmp/jobreply/processed_ids.json"));
        assert!(MailSettings::from_source(&env).is_err());
    }
}
