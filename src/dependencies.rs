use crate::error::{Result, VidscrubError};
use log::info;
use tokio::process::Command;

/// Check if all required system dependencies are available
pub async fn validate_dependencies() -> Result<()> {
    info!("Validating system dependencies...");

    check_tool("ffmpeg", "Install FFmpeg: https://ffmpeg.org/download.html").await?;
    check_tool("ffprobe", "ffprobe ships with FFmpeg: https://ffmpeg.org/download.html").await?;

    info!("All dependencies validated successfully");
    Ok(())
}

/// Check a single binary responds to -version and log its version line
async fn check_tool(name: &str, suggestion: &str) -> Result<()> {
    let output = Command::new(name)
        .args(["-version"])
        .output()
        .await
        .map_err(|_| VidscrubError::MissingDependency {
            name: name.to_string(),
            suggestion: suggestion.to_string(),
        })?;

    if !output.status.success() {
        return Err(VidscrubError::MissingDependency {
            name: name.to_string(),
            suggestion: format!("{} is installed but not working properly", name),
        });
    }

    let version_info = String::from_utf8_lossy(&output.stdout);
    if let Some(version_line) = version_info.lines().next() {
        info!("{} found: {}", name, version_line);
    }

    Ok(())
}
