//! Configuration loader and validator for the album scraper.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::model::AlbumSpec;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    #[serde(default)]
    pub remote: Remote,
    pub owner: Owner,
    #[serde(default)]
    pub albums: Vec<AlbumSpec>,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub concurrency: usize,
    pub max_pages: usize,
    pub metadata_batch_size: usize,
    pub request_timeout_secs: u64,
}

/// Remote service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Remote {
    pub base_url: String,
}

impl Default for Remote {
    fn default() -> Self {
        Self {
            base_url: crate::remote::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Whose library scraped albums are stored in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Owner {
    pub id: Uuid,
}

impl App {
    /// `data_dir` with a leading `~/` expanded.
    pub fn resolved_data_dir(&self) -> String {
        match (self.data_dir.strip_prefix("~/"), std::env::var("HOME")) {
            (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
            _ => self.data_dir.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    /// `DATABASE_URL` if set, otherwise a SQLite file inside `data_dir`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/albums.db", self.app.resolved_data_dir()))
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.remote.base_url)
            .map_err(|_| ConfigError::Invalid("remote.base_url must be an absolute URL"))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.concurrency == 0 {
        return Err(ConfigError::Invalid("app.concurrency must be > 0"));
    }
    if cfg.app.max_pages == 0 {
        return Err(ConfigError::Invalid("app.max_pages must be > 0"));
    }
    if cfg.app.metadata_batch_size == 0 {
        return Err(ConfigError::Invalid("app.metadata_batch_size must be > 0"));
    }
    if cfg.app.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("app.request_timeout_secs must be > 0"));
    }

    let base = cfg.base_url()?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid("remote.base_url must be http(s)"));
    }

    for album in &cfg.albums {
        if album.name.trim().is_empty() {
            return Err(ConfigError::Invalid("albums[].name must be non-empty"));
        }
        if album.url.trim().is_empty() {
            return Err(ConfigError::Invalid("albums[].url must be non-empty"));
        }
    }

    Ok(())
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  concurrency: 4
  max_pages: 1000
  metadata_batch_size: 500
  request_timeout_secs: 30

remote:
  base_url: "https://photos.google.com/"

owner:
  id: "6f1c2a9e-3b4d-4c5e-9f10-2a3b4c5d6e7f"

albums:
  - name: "Holiday 2023"
    url: "https://photos.app.goo.gl/AbCdEfGhIjKlMnOp1"
  - name: "Series"
    url: "https://photos.app.goo.gl/QrStUvWxYz0123456"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn example_cfg() -> Config {
        serde_yaml::from_str(example()).unwrap()
    }

    #[test]
    fn parse_example_ok() {
        let cfg = example_cfg();
        validate(&cfg).unwrap();
        assert_eq!(cfg.albums.len(), 2);
        assert_eq!(cfg.app.concurrency, 4);
    }

    #[test]
    fn remote_and_albums_default() {
        let yaml = r#"app:
  data_dir: "./data"
  concurrency: 1
  max_pages: 10
  metadata_batch_size: 10
  request_timeout_secs: 5
owner:
  id: "6f1c2a9e-3b4d-4c5e-9f10-2a3b4c5d6e7f"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert!(cfg.albums.is_empty());
        assert_eq!(cfg.remote.base_url, "https://photos.google.com/");
    }

    #[test]
    fn invalid_limits() {
        let mut cfg = example_cfg();
        cfg.app.concurrency = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("concurrency")),
            _ => panic!("wrong error"),
        }

        let mut cfg = example_cfg();
        cfg.app.max_pages = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(m)) if m.contains("max_pages")));

        let mut cfg = example_cfg();
        cfg.app.metadata_batch_size = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = example_cfg();
        cfg.app.request_timeout_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_base_url() {
        let mut cfg = example_cfg();
        cfg.remote.base_url = "not a url".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(m)) if m.contains("base_url")));

        cfg.remote.base_url = "ftp://photos.example/".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_album_entries() {
        let mut cfg = example_cfg();
        cfg.albums[0].name = " ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(m)) if m.contains("name")));

        let mut cfg = example_cfg();
        cfg.albums[1].url = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(m)) if m.contains("url")));
    }

    #[test]
    fn bad_owner_id_is_parse_error() {
        let yaml = example().replace("6f1c2a9e-3b4d-4c5e-9f10-2a3b4c5d6e7f", "nope");
        assert!(serde_yaml::from_str::<Config>(&yaml).is_err());
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg = example_cfg();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(
            cfg.owner.id,
            Uuid::parse_str("6f1c2a9e-3b4d-4c5e-9f10-2a3b4c5d6e7f").unwrap()
        );
        assert_eq!(cfg.albums[0].name, "Holiday 2023");
    }
}
