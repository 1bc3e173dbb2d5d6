//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `linebot.toml`
//! - `yaml-config`: `linebot.yaml` / `linebot.yml`
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. A programmatic base config ([`ConfigLoader::merge`])
//! 3. Profile-specific file (`linebot.{profile}.toml`)
//! 4. Main file (`linebot.toml`)
//! 5. Environment variables (`LINEBOT_*`)
//! 6. Programmatic overrides ([`ConfigLoader::set`])
//!
//! # Environment Variable Mapping
//!
//! The `LINEBOT_` prefix is stripped and `__` separates nested keys:
//!
//! - `LINEBOT_CHANNEL__SECRET=...` → `channel.secret`
//! - `LINEBOT_SERVER__PORT=9000` → `server.port`
//! - `LINEBOT_LOGGING__LEVEL=debug` → `logging.level`
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .file("deploy/linebot.toml")
//!     .profile("production")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::LinebotConfig;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "LINEBOT_";

/// Directory name under the user config dir.
const CONFIG_DIR_NAME: &str = "linebot";

/// File stem of configuration files.
const FILE_STEM: &str = "linebot";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod` and `dev` are accepted as aliases.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `LINEBOT_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("LINEBOT_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
#[derive(Debug)]
pub struct ConfigLoader {
    base: Option<LinebotConfig>,
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader that searches the current and user config
    /// directories and reads the environment.
    pub fn new() -> Self {
        Self {
            base: None,
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    ///
    /// Once any path is added the default locations are no longer searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Replaces the built-in defaults. Files and the environment still
    /// override it.
    pub fn merge(mut self, config: LinebotConfig) -> Self {
        self.base = Some(config);
        self
    }

    /// Sets one dotted key, e.g. `"server.port"`, above every other source.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<LinebotConfig> {
        let profile = self.profile.clone();
        let config: LinebotConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            port = config.server.port,
            path = %config.server.path,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let base = self.base.take().unwrap_or_default();
        let mut figment = Figment::from(Serialized::defaults(base));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_file(figment, &path)?;
        } else {
            figment = self.merge_search_results(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(std::mem::take(&mut self.overrides)))
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(CONFIG_DIR_NAME));
        }
        paths
    }

    /// Merges the first directory that holds a main file, together with its
    /// profile file.
    fn merge_search_results(&self, mut figment: Figment) -> Figment {
        for dir in self.resolve_search_paths() {
            let Some(main) = enabled_extensions()
                .iter()
                .map(|ext| dir.join(format!("{FILE_STEM}.{ext}")))
                .find(|path| path.exists())
            else {
                continue;
            };

            for ext in enabled_extensions() {
                let profile_path = dir.join(format!("{FILE_STEM}.{}.{ext}", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_file(figment.clone(), &profile_path).unwrap_or(figment);
                }
            }

            info!(path = %main.display(), "Loading configuration file");
            return merge_file(figment.clone(), &main).unwrap_or(figment);
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

/// File extensions enabled through feature flags, in lookup order.
fn enabled_extensions() -> &'static [&'static str] {
    &[
        #[cfg(feature = "toml-config")]
        "toml",
        #[cfg(feature = "yaml-config")]
        "yaml",
        #[cfg(feature = "yaml-config")]
        "yml",
    ]
}

fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::ParseError(format!(
            "Unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<LinebotConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<LinebotConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn defaults_without_sources() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.server.path, "/webhook");
            assert_eq!(config.dispatch.handler_timeout_ms, 5000);
            assert!(config.dispatch.fetch_profile);
            assert_eq!(config.logging.level, LogLevel::Info);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn base_then_file_then_env_then_set() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "linebot.toml",
                r#"
                [channel]
                secret = "from-file"

                [server]
                port = 9000
                path = "/callback"
                "#,
            )?;
            jail.set_env("LINEBOT_SERVER__PORT", "9100");

            let mut base = LinebotConfig::default();
            base.channel.access_token = "from-base".into();
            base.server.port = 1234;

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(base)
                .set("logging.level", "debug")
                .set("channel.secret", "from-code")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.channel.access_token, "from-base");
            assert_eq!(config.channel.secret, "from-code");
            assert_eq!(config.server.port, 9100);
            assert_eq!(config.server.path, "/callback");
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("linebot.toml", "[server]\nport = 9000\n")?;
            jail.set_env("LINEBOT_SERVER__PORT", "9100");
            jail.set_env("LINEBOT_CHANNEL__SECRET", "s3cr3t");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 9100);
            assert_eq!(config.channel.secret, "s3cr3t");
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn profile_file_is_overridden_by_main_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "linebot.production.toml",
                "[server]\nport = 7000\nhost = \"127.0.0.1\"\n",
            )?;
            jail.create_file("linebot.toml", "[server]\nport = 9000\n")?;

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .profile("prod")
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 9000);
            assert_eq!(config.server.host, "127.0.0.1");
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = ConfigLoader::new()
            .file("/definitely/not/here/linebot.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn profile_aliases() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
