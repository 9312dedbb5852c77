use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::extractors::AudioCodec;
use crate::utils;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telegram Bot API settings
    pub telegram: TelegramConfig,

    /// Webhook HTTP server settings
    pub server: ServerConfig,

    /// Download and conversion settings
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot authentication token
    pub bot_token: String,

    /// Public base URL used to register the webhook at startup
    pub base_url: Option<String>,

    /// Secret Telegram echoes in `X-Telegram-Bot-Api-Secret-Token`
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Capacity of the inbound update queue
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directory for temporary audio files
    pub dir: PathBuf,

    /// yt-dlp executable
    pub yt_dlp_path: String,

    /// yt-dlp format selector
    pub format: String,

    /// Codec the post-processor converts to
    pub audio_codec: AudioCodec,

    /// Target bitrate in kbit/s
    pub audio_quality_kbps: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            queue_capacity: 256,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("downloads"),
            yt_dlp_path: "yt-dlp".to_string(),
            format: "bestaudio/best".to_string(),
            audio_codec: AudioCodec::Mp3,
            audio_quality_kbps: 192,
        }
    }
}

impl Config {
    /// Load and validate configuration
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let config = Self::load_unchecked(explicit_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file (if any), then apply environment overrides
    pub fn load_unchecked(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::read_file(path)?,
            None => match Self::config_path() {
                Some(path) => Self::read_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        tracing::debug!("Reading configuration from {}", path.display());

        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        serde_yaml::from_str(&content).context("Failed to parse config file")
    }

    /// Get configuration file path, if one exists
    fn config_path() -> Option<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir()
            .map(|dir| dir.join("cloud-music-bot").join("config.yaml"))
            .filter(|path| path.exists())
    }

    /// Override settings from environment variables
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(url) = lookup("BASE_URL") {
            self.telegram.base_url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(secret) = lookup("WEBHOOK_SECRET") {
            self.telegram.webhook_secret = Some(secret).filter(|s| !s.is_empty());
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {}", port))?;
        }
        if let Some(dir) = lookup("DOWNLOAD_DIR") {
            self.download.dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("YT_DLP_PATH") {
            self.download.yt_dlp_path = path;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("BOT_TOKEN must be set (environment or config file)");
        }

        if let Some(base_url) = &self.telegram.base_url {
            utils::webhook_endpoint(base_url)?;
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port must be non-zero");
        }

        if self.server.queue_capacity == 0 {
            anyhow::bail!("Update queue capacity must be at least 1");
        }

        if !(8..=320).contains(&self.download.audio_quality_kbps) {
            anyhow::bail!(
                "Audio quality must be between 8 and 320 kbps, got {}",
                self.download.audio_quality_kbps
            );
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Bot Token: {}", utils::mask_secret(&self.telegram.bot_token));
        match &self.telegram.base_url {
            Some(url) => println!("  Base URL: {}", url),
            None => println!("  Base URL: (not set, webhook is not registered)"),
        }
        println!(
            "  Webhook Secret: {}",
            if self.telegram.webhook_secret.is_some() { "set" } else { "not set" }
        );
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  Download Dir: {}", self.download.dir.display());
        println!(
            "  Audio: {} @ {} kbps",
            self.download.audio_codec, self.download.audio_quality_kbps
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_require_token() {
        let config = Config::default();
        assert!(config.validate().is_err());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.download.dir, PathBuf::from("downloads"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                ("BOT_TOKEN", "123:abc"),
                ("BASE_URL", "https://bot.example.com"),
                ("PORT", "9000"),
                ("DOWNLOAD_DIR", "/tmp/music"),
            ]))
            .unwrap();

        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.base_url.as_deref(), Some("https://bot.example.com"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.download.dir, PathBuf::from("/tmp/music"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_base_url_is_unset() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[("BASE_URL", "  ")]))
            .unwrap();
        assert!(config.telegram.base_url.is_none());
    }

    #[test]
    fn test_invalid_port() {
        let mut config = Config::default();
        assert!(config.apply_env_overrides(env(&[("PORT", "eighty")])).is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.telegram.bot_token = "t".to_string();
        config.telegram.base_url = Some("ftp://example.com".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_quality_bounds() {
        let mut config = Config::default();
        config.telegram.bot_token = "t".to_string();
        config.download.audio_quality_kbps = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs_err::write(
            &path,
            "telegram:\n  bot_token: from-file\ndownload:\n  audio_codec: opus\n",
        )
        .unwrap();

        let config = Config::read_file(&path).unwrap();
        assert_eq!(config.telegram.bot_token, "from-file");
        assert_eq!(config.download.audio_codec, AudioCodec::Opus);
        assert_eq!(config.download.audio_quality_kbps, 192);
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
