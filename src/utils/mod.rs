use anyhow::Result;
use url::Url;

/// Path the webhook endpoint is served on
pub const WEBHOOK_PATH: &str = "webhook";

/// Validate the public base URL and return the full webhook endpoint
pub fn webhook_endpoint(base_url: &str) -> Result<Url> {
    let mut parsed = Url::parse(base_url.trim())
        .map_err(|_| anyhow::anyhow!("Invalid base URL format: {}", base_url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("Base URL must use HTTP or HTTPS protocol");
    }

    // Url::join would drop the last path segment without a trailing slash
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }

    Ok(parsed.join(WEBHOOK_PATH)?)
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Hide all but the last few characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let visible = 4;
    let count = secret.chars().count();

    if count == 0 {
        return "(not set)".to_string();
    }
    if count <= visible * 2 {
        return "****".to_string();
    }

    let tail: String = secret.chars().skip(count - visible).collect();
    format!("****{}", tail)
}

/// Shorten text for log lines
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}

/// Check if the current environment has required tools
pub async fn check_dependencies(yt_dlp_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp_path).await {
        missing.push(format!("{} - required for searching and downloading tracks", yt_dlp_path));
    }

    // yt-dlp only needs ffmpeg for the audio conversion step
    if !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - required for converting downloads to audio".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
