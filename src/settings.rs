use std::path::PathBuf;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::filter::{Thresholds, DEFAULT_COMMENT_RATE, DEFAULT_POST_RATE};
use crate::reddit::RedditCredentials;

const DEFAULT_FETCH_LIMIT: usize = 200;
const DEFAULT_TESSERACT_CMD: &str = "tesseract";
const DEFAULT_OCR_LANGUAGE: &str = "eng";

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    database_path: Option<PathBuf>,
    reddit_client_id: Option<String>,
    reddit_client_secret: Option<String>,
    reddit_user_agent: Option<String>,
    reddit_username: Option<String>,
    reddit_password: Option<String>,
    /// Comma separated.
    communities: Option<String>,
    fetch_limit: Option<usize>,
    post_rate: Option<f64>,
    comment_rate: Option<f64>,
    tesseract_cmd: Option<PathBuf>,
    ocr_language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub fetch_limit: usize,
    pub thresholds: Thresholds,
    pub tesseract_cmd: PathBuf,
    pub ocr_language: String,
    communities: Vec<String>,
    reddit_client_id: Option<String>,
    reddit_client_secret: Option<String>,
    reddit_user_agent: Option<String>,
    reddit_username: Option<String>,
    reddit_password: Option<String>,
}

impl Settings {
    /// Read `.env` (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_environment(Environment::default())
    }

    /// Values stay strings until deserialization so secrets like `007` keep
    /// their exact text; numeric fields are converted per field.
    fn from_environment(env: Environment) -> Result<Self, ConfigError> {
        let cfg = Config::builder().add_source(env.ignore_empty(true)).build()?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: Config) -> Result<Self, ConfigError> {
        let raw: RawSettings = cfg.try_deserialize()?;
        let database_path = raw
            .database_path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_PATH"))?;

        let communities = raw
            .communities
            .unwrap_or_default()
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        Ok(Self {
            database_path,
            fetch_limit: raw.fetch_limit.unwrap_or(DEFAULT_FETCH_LIMIT),
            thresholds: Thresholds {
                post_rate: raw.post_rate.unwrap_or(DEFAULT_POST_RATE),
                comment_rate: raw.comment_rate.unwrap_or(DEFAULT_COMMENT_RATE),
            },
            tesseract_cmd: raw
                .tesseract_cmd
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TESSERACT_CMD)),
            ocr_language: raw
                .ocr_language
                .unwrap_or_else(|| DEFAULT_OCR_LANGUAGE.to_string()),
            communities,
            reddit_client_id: raw.reddit_client_id,
            reddit_client_secret: raw.reddit_client_secret,
            reddit_user_agent: raw.reddit_user_agent,
            reddit_username: raw.reddit_username,
            reddit_password: raw.reddit_password,
        })
    }

    /// Communities to process: CLI overrides win over `COMMUNITIES`, order preserved.
    pub fn communities(&self, overrides: &[String]) -> Result<Vec<String>, ConfigError> {
        let list = if overrides.is_empty() {
            self.communities.clone()
        } else {
            overrides.to_vec()
        };
        if list.is_empty() {
            return Err(ConfigError::Missing("COMMUNITIES"));
        }
        Ok(list)
    }

    /// Only `scrape` needs API credentials.
    pub fn reddit_credentials(&self) -> Result<RedditCredentials, ConfigError> {
        let client_id = self
            .reddit_client_id
            .clone()
            .ok_or(ConfigError::Missing("REDDIT_CLIENT_ID"))?;
        let client_secret = self
            .reddit_client_secret
            .clone()
            .ok_or(ConfigError::Missing("REDDIT_CLIENT_SECRET"))?;
        let user_agent = self
            .reddit_user_agent
            .clone()
            .ok_or(ConfigError::Missing("REDDIT_USER_AGENT"))?;

        let login = match (&self.reddit_username, &self.reddit_password) {
            (Some(u), Some(p)) => Some((u.clone(), p.clone())),
            _ => None,
        };

        Ok(RedditCredentials {
            client_id,
            client_secret,
            user_agent,
            login,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pairs: &[(&str, &str)]) -> Config {
        let mut b = Config::builder();
        for (k, v) in pairs {
            b = b.set_override(*k, *v).unwrap();
        }
        b.build().unwrap()
    }

    #[test]
    fn missing_database_path_is_fatal() {
        let err = Settings::from_config(build(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_PATH")));
    }

    #[test]
    fn defaults_applied() {
        let s = Settings::from_config(build(&[("database_path", "data/reddit.sqlite")])).unwrap();
        assert_eq!(s.database_path, PathBuf::from("data/reddit.sqlite"));
        assert_eq!(s.fetch_limit, 200);
        assert_eq!(s.thresholds, Thresholds::default());
        assert_eq!(s.tesseract_cmd, PathBuf::from("tesseract"));
        assert_eq!(s.ocr_language, "eng");
    }

    #[test]
    fn communities_keep_order_and_cli_wins() {
        let s = Settings::from_config(build(&[
            ("database_path", "x.sqlite"),
            ("communities", "Bitcoin, dogecoin ,"),
        ]))
        .unwrap();
        assert_eq!(s.communities(&[]).unwrap(), vec!["Bitcoin", "dogecoin"]);
        assert_eq!(
            s.communities(&["rust".to_string()]).unwrap(),
            vec!["rust"]
        );
    }

    #[test]
    fn empty_community_list_rejected() {
        let s = Settings::from_config(build(&[("database_path", "x.sqlite")])).unwrap();
        assert!(matches!(s.communities(&[]), Err(ConfigError::Missing("COMMUNITIES"))));
    }

    #[test]
    fn credentials_with_and_without_login() {
        let base = [
            ("database_path", "x.sqlite"),
            ("reddit_client_id", "id"),
            ("reddit_client_secret", "secret"),
            ("reddit_user_agent", "scraper/0.1"),
        ];
        let s = Settings::from_config(build(&base)).unwrap();
        let c = s.reddit_credentials().unwrap();
        assert_eq!(c.client_id, "id");
        assert!(c.login.is_none());

        let mut with_login = base.to_vec();
        with_login.push(("reddit_username", "alice"));
        with_login.push(("reddit_password", "hunter2"));
        let s = Settings::from_config(build(&with_login)).unwrap();
        let c = s.reddit_credentials().unwrap();
        assert_eq!(c.login, Some(("alice".to_string(), "hunter2".to_string())));
    }

    #[test]
    fn credentials_require_client_id() {
        let s = Settings::from_config(build(&[("database_path", "x.sqlite")])).unwrap();
        assert!(matches!(
            s.reddit_credentials(),
            Err(ConfigError::Missing("REDDIT_CLIENT_ID"))
        ));
    }

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let map: config::Map<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().source(Some(map))
    }

    #[test]
    fn environment_values_parse_per_field() {
        let s = Settings::from_environment(env(&[
            ("DATABASE_PATH", "data/reddit.sqlite"),
            ("COMMUNITIES", "Bitcoin,dogecoin,CryptoCurrency"),
            ("FETCH_LIMIT", "50"),
            ("POST_RATE", "12.5"),
            ("COMMENT_RATE", "2"),
            ("OCR_LANGUAGE", ""),
        ]))
        .unwrap();
        assert_eq!(s.communities(&[]).unwrap(), vec!["Bitcoin", "dogecoin", "CryptoCurrency"]);
        assert_eq!(s.fetch_limit, 50);
        assert_eq!(s.thresholds.post_rate, 12.5);
        assert_eq!(s.thresholds.comment_rate, 2.0);
        assert_eq!(s.ocr_language, "eng");
    }

    #[test]
    fn numeric_looking_secrets_keep_their_text() {
        let s = Settings::from_environment(env(&[
            ("DATABASE_PATH", "x.sqlite"),
            ("REDDIT_CLIENT_ID", "0123"),
            ("REDDIT_CLIENT_SECRET", "1e5"),
            ("REDDIT_USER_AGENT", "scraper/0.1"),
            ("REDDIT_USERNAME", "alice"),
            ("REDDIT_PASSWORD", "007"),
        ]))
        .unwrap();
        let c = s.reddit_credentials().unwrap();
        assert_eq!(c.client_id, "0123");
        assert_eq!(c.client_secret, "1e5");
        assert_eq!(c.login, Some(("alice".to_string(), "007".to_string())));
    }

    #[test]
    fn single_numeric_community_is_a_name() {
        let s = Settings::from_environment(env(&[("DATABASE_PATH", "x.sqlite"), ("COMMUNITIES", "2007scape")]))
            .unwrap();
        assert_eq!(s.communities(&[]).unwrap(), vec!["2007scape"]);
    }
}
