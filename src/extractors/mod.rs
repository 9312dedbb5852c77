use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod ytdlp;

use crate::config::DownloadConfig;
use crate::BotError;

/// Container extensions the extractor may report before post-processing
/// has converted the file to the target codec.
pub const INTERMEDIATE_CONTAINERS: &[&str] = &["webm", "m4a"];

/// A single track fetched by an extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedTrack {
    /// Display title of the matched entry
    pub title: String,

    /// File path as prepared by the extractor, before post-processing
    pub path: PathBuf,

    /// Source container reported by the extractor (webm, m4a, ...)
    pub container: Option<String>,
}

/// Audio codecs the post-processor can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Mp3,
    M4a,
    Opus,
    Flac,
    Wav,
}

impl AudioCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::M4a => "m4a",
            AudioCodec::Opus => "opus",
            AudioCodec::Flac => "flac",
            AudioCodec::Wav => "wav",
        }
    }

    /// File extension of the converted file
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioCodec::Mp3),
            "m4a" | "aac" => Some(AudioCodec::M4a),
            "opus" => Some(AudioCodec::Opus),
            "flac" => Some(AudioCodec::Flac),
            "wav" => Some(AudioCodec::Wav),
            _ => None,
        }
    }
}

impl std::str::FromStr for AudioCodec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| anyhow::anyhow!("Unsupported audio codec: {}", s))
    }
}

impl std::fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-processing step applied after download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessor {
    pub codec: AudioCodec,
    pub quality_kbps: u32,
}

/// Everything an extractor needs to know besides the query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Format selector, e.g. `bestaudio/best`
    pub format: String,

    /// Directory the output template writes into
    pub output_dir: PathBuf,

    /// Output template relative to `output_dir`
    pub output_template: String,

    pub no_playlist: bool,
    pub quiet: bool,
    pub post_processor: PostProcessor,
}

impl ExtractionOptions {
    pub fn from_config(download: &DownloadConfig) -> Self {
        Self {
            format: download.format.clone(),
            output_dir: download.dir.clone(),
            output_template: "%(title)s.%(ext)s".to_string(),
            no_playlist: true,
            quiet: true,
            post_processor: PostProcessor {
                codec: download.audio_codec,
                quality_kbps: download.audio_quality_kbps,
            },
        }
    }

    /// Full output template including the download directory
    pub fn output_path_template(&self) -> PathBuf {
        self.output_dir.join(&self.output_template)
    }

    /// Search expression asking for the single best match
    pub fn search_target(query: &str) -> String {
        format!("ytsearch1:{}", query)
    }
}

/// Trait for services that search, download and convert a track
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetch the best single match for `query` into the configured directory
    async fn retrieve(
        &self,
        query: &str,
        options: &ExtractionOptions,
    ) -> std::result::Result<RetrievedTrack, BotError>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}

/// Rewrite a known intermediate container extension to the target codec.
///
/// The post-processor changes the file extension after the extractor has
/// reported the filename, so `Song.webm` is delivered as `Song.mp3`. Any other
/// extension is left as is.
pub fn normalize_extension(path: &Path, codec: AudioCodec) -> PathBuf {
    let is_intermediate = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            INTERMEDIATE_CONTAINERS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false);

    if is_intermediate {
        path.with_extension(codec.extension())
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_intermediate_containers() {
        assert_eq!(
            normalize_extension(Path::new("downloads/Believer.webm"), AudioCodec::Mp3),
            PathBuf::from("downloads/Believer.mp3")
        );
        assert_eq!(
            normalize_extension(Path::new("downloads/Believer.m4a"), AudioCodec::Mp3),
            PathBuf::from("downloads/Believer.mp3")
        );
        assert_eq!(
            normalize_extension(Path::new("downloads/Loud.WEBM"), AudioCodec::Mp3),
            PathBuf::from("downloads/Loud.mp3")
        );
    }

    #[test]
    fn test_normalize_leaves_other_extensions() {
        for name in ["a/Song.mp3", "a/Song.opus", "a/Song.ogg", "a/Song"] {
            assert_eq!(normalize_extension(Path::new(name), AudioCodec::Mp3), PathBuf::from(name));
        }
    }

    #[test]
    fn test_normalize_keeps_dots_in_title() {
        assert_eq!(
            normalize_extension(Path::new("downloads/Mr. Brightside.webm"), AudioCodec::Mp3),
            PathBuf::from("downloads/Mr. Brightside.mp3")
        );
    }

    #[test]
    fn test_normalize_uses_target_codec() {
        assert_eq!(
            normalize_extension(Path::new("d/Song.webm"), AudioCodec::Opus),
            PathBuf::from("d/Song.opus")
        );
    }

    #[test]
    fn test_audio_codec_parsing() {
        assert_eq!("MP3".parse::<AudioCodec>().unwrap(), AudioCodec::Mp3);
        assert_eq!("aac".parse::<AudioCodec>().unwrap(), AudioCodec::M4a);
        assert!("midi".parse::<AudioCodec>().is_err());
    }

    #[test]
    fn test_options_from_config() {
        let download = DownloadConfig::default();
        let options = ExtractionOptions::from_config(&download);

        assert_eq!(options.format, "bestaudio/best");
        assert!(options.no_playlist);
        assert_eq!(options.post_processor.codec, AudioCodec::Mp3);
        assert_eq!(options.post_processor.quality_kbps, 192);
        assert_eq!(
            options.output_path_template(),
            PathBuf::from("downloads").join("%(title)s.%(ext)s")
        );
        assert_eq!(ExtractionOptions::search_target("abc"), "ytsearch1:abc");
    }
}
