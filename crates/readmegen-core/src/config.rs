use crate::error::{ReadmeError, Result};
use crate::paths;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

impl ConfigWarning {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
    warnings.iter().any(|w| w.level == WarnLevel::Error)
}

// ---------------------------------------------------------------------------
// ProfileConfig
// ---------------------------------------------------------------------------

/// Static profile values substituted into the README next to the
/// GitHub activity text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub contact: String,
}

// ---------------------------------------------------------------------------
// GitHubConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub user: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Repositories updated fewer than this many days ago count as recent.
    #[serde(default = "default_max_recent_activity")]
    pub max_recent_activity: i64,
    #[serde(default = "default_max_repos_listed")]
    pub max_repos_listed: usize,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_recent_activity() -> i64 {
    14
}

fn default_max_repos_listed() -> usize {
    5
}

impl GitHubConfig {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            api_base: default_api_base(),
            timeout_seconds: default_timeout_seconds(),
            max_recent_activity: default_max_recent_activity(),
            max_repos_listed: default_max_repos_listed(),
        }
    }

    /// `owner/owner`, the special repository backing the profile page.
    pub fn profile_repo(&self) -> String {
        format!("{0}/{0}", self.user)
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub github: GitHubConfig,
    pub profile: ProfileConfig,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_readme")]
    pub readme: String,
}

fn default_version() -> u32 {
    1
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_readme() -> String {
    paths::DEFAULT_README.to_string()
}

impl Config {
    pub fn new(user: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            github: GitHubConfig::new(user),
            profile: ProfileConfig {
                name: name.into(),
                city: String::new(),
                contact: String::new(),
            },
            timezone: default_timezone(),
            readme: default_readme(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(ReadmeError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ReadmeError::InvalidTimezone(self.timezone.clone()))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.github.user.trim().is_empty() {
            warnings.push(ConfigWarning::error("github.user is empty"));
        }
        if self.tz().is_err() {
            warnings.push(ConfigWarning::error(format!(
                "unknown timezone '{}'",
                self.timezone
            )));
        }
        if self.github.max_repos_listed == 0 {
            warnings.push(ConfigWarning::warning(
                "github.max_repos_listed is 0: only the fallback project will be listed",
            ));
        }
        if self.github.max_recent_activity <= 0 {
            warnings.push(ConfigWarning::warning(
                "github.max_recent_activity is not positive: no repository counts as recent",
            ));
        }
        if self.github.timeout_seconds == 0 {
            warnings.push(ConfigWarning::error("github.timeout_seconds must be > 0"));
        }
        if !self.github.api_base.starts_with("http://")
            && !self.github.api_base.starts_with("https://")
        {
            warnings.push(ConfigWarning::error(format!(
                "github.api_base '{}' is not an http(s) URL",
                self.github.api_base
            )));
        }
        if self.readme.trim().is_empty() {
            warnings.push(ConfigWarning::error("readme file name is empty"));
        }
        if self.profile.name.trim().is_empty() {
            warnings.push(ConfigWarning::warning("profile.name is empty"));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_fill_missing_fields() {
        let yaml = "github:\n  user: nicojahn\nprofile:\n  name: Nico Jahn\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.timezone, "Europe/Berlin");
        assert_eq!(cfg.readme, "README.md");
        assert_eq!(cfg.github.api_base, "https://api.github.com");
        assert_eq!(cfg.github.timeout_seconds, 10);
        assert_eq!(cfg.github.max_recent_activity, 14);
        assert_eq!(cfg.github.max_repos_listed, 5);
        assert!(cfg.profile.city.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("octocat", "Mona");
        cfg.profile.city = "Berlin".to_string();
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn load_without_config_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(ReadmeError::NotInitialized)
        ));
    }

    #[test]
    fn profile_repo_is_user_slash_user() {
        assert_eq!(GitHubConfig::new("nicojahn").profile_repo(), "nicojahn/nicojahn");
    }

    #[test]
    fn validate_clean_config() {
        let cfg = Config::new("octocat", "Mona");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn validate_flags_bad_timezone_and_empty_user() {
        let mut cfg = Config::new("", "Mona");
        cfg.timezone = "Mars/Olympus".to_string();
        let warnings = cfg.validate();
        assert!(has_errors(&warnings));
        assert!(warnings.iter().any(|w| w.message.contains("github.user")));
        assert!(warnings.iter().any(|w| w.message.contains("Mars/Olympus")));
    }

    #[test]
    fn validate_warns_on_zero_limits() {
        let mut cfg = Config::new("octocat", "Mona");
        cfg.github.max_repos_listed = 0;
        cfg.github.max_recent_activity = 0;
        let warnings = cfg.validate();
        assert!(!has_errors(&warnings));
        assert_eq!(warnings.len(), 2);
    }
}
