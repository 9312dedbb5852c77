use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::{ExtractionOptions, Extractor, RetrievedTrack};
use crate::BotError;

/// Track extractor backed by the yt-dlp command line tool
pub struct YtDlpExtractor {
    yt_dlp_path: String,
}

impl YtDlpExtractor {
    pub fn new() -> Self {
        Self::with_path("yt-dlp")
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: path.into(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionOptions {
    /// Build the yt-dlp argument list for a search query
    pub fn to_args(&self, query: &str) -> Vec<String> {
        let mut args = vec![
            "--format".to_string(),
            self.format.clone(),
            "--output".to_string(),
            self.output_path_template().to_string_lossy().into_owned(),
        ];

        if self.no_playlist {
            args.push("--no-playlist".to_string());
        }
        if self.quiet {
            args.push("--quiet".to_string());
            args.push("--no-warnings".to_string());
        }

        args.extend([
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            self.post_processor.codec.as_str().to_string(),
            "--audio-quality".to_string(),
            format!("{}K", self.post_processor.quality_kbps),
            // Print the entry metadata while still downloading it
            "--dump-json".to_string(),
            "--no-simulate".to_string(),
            Self::search_target(query),
        ]);

        args
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn retrieve(
        &self,
        query: &str,
        options: &ExtractionOptions,
    ) -> Result<RetrievedTrack, BotError> {
        tracing::debug!("Running yt-dlp search for: {}", query);

        let output = Command::new(&self.yt_dlp_path)
            .args(options.to_args(query))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BotError::Network(format!("failed to launch {}: {}", self.yt_dlp_path, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            tracing::debug!("yt-dlp exited with {}", output.status);

            // The entry is printed before downloading, so a failed conversion still names its file
            return Err(match classify_failure(query, &error) {
                BotError::Transcode { message, .. } => BotError::Transcode {
                    message,
                    artifact: parse_entry(query, &stdout).ok().map(|track| track.path),
                },
                other => other,
            });
        }

        parse_entry(query, &stdout)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Map yt-dlp stderr output to a failure cause
pub fn classify_failure(query: &str, stderr: &str) -> BotError {
    let lower = stderr.to_lowercase();
    let message = stderr.trim().to_string();

    if lower.contains("ffmpeg") || lower.contains("ffprobe") || lower.contains("postprocessing") {
        BotError::Transcode {
            message,
            artifact: None,
        }
    } else if lower.contains("no video results") || lower.contains("no results") {
        BotError::NotFound(query.to_string())
    } else {
        BotError::Network(message)
    }
}

/// Parse the JSON entry printed by `--dump-json`
///
/// The path is taken from yt-dlp's own `_filename`, since the name it writes is
/// sanitized from the title. An entry without one counts as no usable match.
pub fn parse_entry(query: &str, stdout: &str) -> Result<RetrievedTrack, BotError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| BotError::NotFound(query.to_string()))?;

    let info: Value = serde_json::from_str(line)
        .map_err(|e| BotError::Network(format!("unreadable yt-dlp output: {}", e)))?;

    let title = info["title"]
        .as_str()
        .ok_or_else(|| BotError::NotFound(query.to_string()))?
        .to_string();
    let container = info["ext"].as_str().map(|s| s.to_string());

    let path = info["_filename"]
        .as_str()
        .or_else(|| info["filename"].as_str())
        .map(PathBuf::from)
        .ok_or_else(|| BotError::NotFound(query.to_string()))?;

    Ok(RetrievedTrack {
        title,
        path,
        container,
    })
}
