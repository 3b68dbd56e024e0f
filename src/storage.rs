use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Root directory for config and logs.
///
/// `$THINKVIEW_HOME` wins; otherwise `~/.thinkview`.
pub fn thinkview_dir() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("THINKVIEW_HOME") {
        return Ok(PathBuf::from(path));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("No home directory"))?;
    Ok(home.join(".thinkview"))
}

pub fn logs_dir() -> Result<PathBuf> {
    Ok(thinkview_dir()?.join("logs"))
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
    }
    Ok(())
}

/// Read a transcript file for the scripted provider.
pub fn read_transcript(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript {}", path.display()))
}
