//! Settings loaded from a TOML file. Every field has a default, so a missing
//! file or a partial one is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub files: FileSettings,
    pub api: ApiSettings,
    pub schedule: ScheduleSettings,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    /// Token files offered in the menu; the first is the default.
    pub token_files: Vec<PathBuf>,
    pub proxies: PathBuf,
}

impl Default for FileSettings {
    fn default() -> Self {
        FileSettings {
            token_files: vec![PathBuf::from("token.txt"), PathBuf::from("gentoken.txt")],
            proxies: PathBuf::from("proxy.txt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub status_url: String,
    pub checkin_url: String,
    pub upload_url: String,
    /// `{seed}` is replaced by a random number per upload.
    pub image_url_template: String,
    pub ip_url: String,
    pub origin: Option<String>,
    pub referer: Option<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            status_url: "https://merklev2.cess.network/merkle/task/status".into(),
            checkin_url: "https://merklev2.cess.network/merkle/task/checkin".into(),
            upload_url: "https://filepool.cess.network/group1/upload".into(),
            image_url_template: "https://picsum.photos/seed/{seed}/500/500".into(),
            ip_url: "https://api.ipify.org?format=json".into(),
            origin: Some("https://cess.network".into()),
            referer: Some("https://cess.network/".into()),
            user_agent: concat!("taskbot/", env!("CARGO_PKG_VERSION")).into(),
            timeout_secs: 60,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn image_url(&self, seed: u32) -> String {
        self.image_url_template.replace("{seed}", &seed.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub pass_interval_secs: u64,
    pub upload_count: u32,
    pub upload_pause_ms: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        ScheduleSettings {
            pass_interval_secs: 24 * 60 * 60,
            upload_count: 3,
            upload_pause_ms: 1000,
        }
    }
}

impl ScheduleSettings {
    pub fn pass_interval(&self) -> Duration {
        Duration::from_secs(self.pass_interval_secs)
    }

    pub fn upload_pause(&self) -> Duration {
        Duration::from_millis(self.upload_pause_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: 3,
            initial_backoff_ms: 2000,
            multiplier: 1.5,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            multiplier: self.multiplier,
        }
    }
}

/// Load settings from `path`. A file that does not exist yields defaults;
/// a file that exists but does not parse is an error.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let settings: Settings = toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(settings)
}

/// Config path: explicit flag, then the user config dir, then `./config.toml`.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(p) = explicit {
        return p;
    }
    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("taskbot").join("config.toml");
        if candidate.exists() {
            return candidate;
        }
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings.schedule.upload_count, 3);
        assert_eq!(settings.retry.policy(), RetryPolicy::default());
        assert_eq!(settings.schedule.pass_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[schedule]\nupload_count = 5\n\n[api]\nuser_agent = \"me\"\n").unwrap();
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.schedule.upload_count, 5);
        assert_eq!(settings.schedule.upload_pause_ms, 1000);
        assert_eq!(settings.api.user_agent, "me");
        assert_eq!(settings.files.proxies, PathBuf::from("proxy.txt"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[schedule\nupload_count = ").unwrap();
        assert!(load_settings(&path).is_err());
    }

    #[test]
    fn image_url_substitutes_seed() {
        let api = ApiSettings::default();
        assert_eq!(api.image_url(42), "https://picsum.photos/seed/42/500/500");
    }
}
