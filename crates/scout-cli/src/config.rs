use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use scout_tools::{CrawlerConfig, SerperConfig, ToolsConfig, DEFAULT_SERPER_URL};

const ENV_PREFIX: &str = "SCOUT_";

/// Unprefixed variables accepted for compatibility with `.env` setups.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("GEMINI_API_KEY", "api_key"),
    ("MODEL", "model"),
    ("SERPER_API_KEY", "serper_api_key"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini model name
    pub model: String,

    /// Gemini API key
    pub api_key: Option<String>,

    /// Override for the Gemini API base URL
    pub base_url: Option<String>,

    pub temperature: Option<f32>,

    /// Serper API key used by the search tool
    pub serper_api_key: Option<String>,

    /// Directory reports are written to (supports $VAR, ~)
    pub output_dir: String,

    /// Model calls per agent before it gives up
    pub max_iterations: usize,

    pub crawler: CrawlerSettings,

    pub search: SearchSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: scout_providers::gemini::DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            temperature: Some(0.5),
            serper_api_key: None,
            output_dir: "output".to_string(),
            max_iterations: 15,
            crawler: CrawlerSettings::default(),
            search: SearchSettings::default(),
        }
    }
}

/// Crawler tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerSettings {
    /// Linked pages fetched after the start page
    pub max_pages: usize,

    /// Pages with less text than this are skipped
    pub min_text_length: usize,

    pub timeout_secs: u64,

    /// Attempts per page before it is skipped
    pub max_retries: usize,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        let defaults = CrawlerConfig::default();
        Self {
            max_pages: defaults.max_pages,
            min_text_length: defaults.min_text_length,
            timeout_secs: defaults.timeout.as_secs(),
            max_retries: defaults.max_retries,
        }
    }
}

/// Search tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub endpoint: String,
    pub num_results: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SERPER_URL.to_string(),
            num_results: 10,
        }
    }
}

/// Expand environment variables in a path string
/// Supports: $VAR, ${VAR}, ~
pub fn expand_path(path: &str) -> PathBuf {
    let mut result = path.to_string();

    if result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    } else if result == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    let re = regex::Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("valid variable pattern");
    let expanded = re.replace_all(&result, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    });

    PathBuf::from(expanded.to_string())
}

impl Config {
    /// Load configuration: defaults, then the TOML file, then environment.
    ///
    /// `path` replaces the default `~/.config/scout/config.toml`. A missing
    /// default file is fine; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                anyhow::ensure!(path.exists(), "Config file not found: {}", path.display());
                Some(path.to_path_buf())
            }
            None => Self::config_path().ok().filter(|p| p.exists()),
        };
        Self::figment(file.as_deref(), ENV_PREFIX)
            .extract()
            .context("Invalid configuration")
    }

    fn figment(file: Option<&Path>, env_prefix: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment
            .merge(Env::raw().filter_map(|key| {
                LEGACY_ENV
                    .iter()
                    .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
                    .map(|(_, field)| (*field).into())
            }))
            .merge(Env::prefixed(env_prefix).split("__"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("scout"))
    }

    /// The Gemini API key, required for any model call.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No Gemini API key configured. Set GEMINI_API_KEY, SCOUT_API_KEY, \
                     or api_key in ~/.config/scout/config.toml"
                )
            })
    }

    pub fn output_dir(&self) -> PathBuf {
        expand_path(&self.output_dir)
    }

    pub fn tools_config(&self) -> ToolsConfig {
        ToolsConfig {
            crawler: CrawlerConfig {
                max_pages: self.crawler.max_pages,
                min_text_length: self.crawler.min_text_length,
                timeout: Duration::from_secs(self.crawler.timeout_secs),
                max_retries: self.crawler.max_retries,
                ..CrawlerConfig::default()
            },
            serper: SerperConfig {
                api_key: self.serper_api_key.clone().filter(|key| !key.is_empty()),
                endpoint: self.search.endpoint.clone(),
                num_results: self.search.num_results,
            },
        }
    }

    /// A copy safe to print: secrets replaced by a marker.
    pub fn redacted(&self) -> Self {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "(configured)".to_string());
        Self {
            api_key: redact(&self.api_key),
            serper_api_key: redact(&self.serper_api_key),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config: Config = Config::figment(None, "SCOUT_TEST_DEFAULTS_").extract().unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.temperature, Some(0.5));
        assert_eq!(config.output_dir, "output");
        assert_eq!(config.max_iterations, 15);
        assert_eq!(config.crawler.max_pages, 5);
        assert_eq!(config.search.num_results, 10);
    }

    #[test]
    fn test_parse_config_file() {
        let file = write_config(
            r#"
            model = "gemini-2.5-pro"
            api_key = "test-key"
            output_dir = "/tmp/reports"

            [crawler]
            max_pages = 2
        "#,
        );

        let config: Config = Config::figment(Some(file.path()), "SCOUT_TEST_FILE_")
            .extract()
            .unwrap();
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.api_key().unwrap(), "test-key");
        assert_eq!(config.output_dir(), PathBuf::from("/tmp/reports"));
        assert_eq!(config.crawler.max_pages, 2);
        assert_eq!(config.crawler.min_text_length, 100);
        assert_eq!(config.crawler.max_retries, 3);
    }

    #[test]
    fn test_prefixed_env_overrides_file() {
        let file = write_config("model = \"from-file\"\n");
        std::env::set_var("SCOUT_TEST_ENV_MODEL", "from-env");
        std::env::set_var("SCOUT_TEST_ENV_CRAWLER__MAX_PAGES", "9");

        let config: Config = Config::figment(Some(file.path()), "SCOUT_TEST_ENV_")
            .extract()
            .unwrap();

        std::env::remove_var("SCOUT_TEST_ENV_MODEL");
        std::env::remove_var("SCOUT_TEST_ENV_CRAWLER__MAX_PAGES");
        assert_eq!(config.model, "from-env");
        assert_eq!(config.crawler.max_pages, 9);
    }

    #[test]
    fn test_missing_api_key() {
        let config = Config::default();
        assert!(config.api_key().is_err());

        let config = Config {
            api_key: Some(String::new()),
            ..Config::default()
        };
        assert!(config.api_key().is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        assert!(Config::load(Some(Path::new("/nonexistent/scout.toml"))).is_err());
    }

    #[test]
    fn test_redacted() {
        let config = Config {
            api_key: Some("secret".to_string()),
            ..Config::default()
        };
        let redacted = config.redacted();
        assert_eq!(redacted.api_key.as_deref(), Some("(configured)"));
        assert!(redacted.serper_api_key.is_none());
        assert_eq!(redacted.model, config.model);
    }

    #[test]
    fn test_tools_config() {
        let config = Config {
            serper_api_key: Some("serper".to_string()),
            crawler: CrawlerSettings {
                max_retries: 5,
                ..CrawlerSettings::default()
            },
            ..Config::default()
        };
        let tools = config.tools_config();
        assert_eq!(tools.serper.api_key.as_deref(), Some("serper"));
        assert_eq!(tools.crawler.max_pages, 5);
        assert_eq!(tools.crawler.timeout, Duration::from_secs(30));
        assert_eq!(tools.crawler.max_retries, 5);
    }

    #[test]
    fn test_expand_path() {
        std::env::set_var("SCOUT_TEST_REPORT_DIR", "/data/reports");
        assert_eq!(
            expand_path("$SCOUT_TEST_REPORT_DIR/acme"),
            PathBuf::from("/data/reports/acme")
        );
        assert_eq!(expand_path("plain/dir"), PathBuf::from("plain/dir"));
    }
}
