//! Small helpers for logging and the file system.

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

const PROBE_FILE: &str = ".harvester_write_probe";

/// Shorten `s` to at most `max` bytes for a log line.
///
/// The cut backs off to a character boundary, and the number of dropped
/// bytes is appended: `"aaaaaaaaaa…(+490 bytes)"`.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let cut = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Create `dir` if needed, then prove it is writable with a probe file.
#[instrument(level = "debug", skip_all, fields(dir = %dir.display()))]
pub async fn ensure_writable_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir).await?;
    let probe = dir.join(PROBE_FILE);
    fs::write(&probe, b"").await?;
    if let Err(e) = fs::remove_file(&probe).await {
        debug!(error = %e, "Could not remove write probe");
    }
    debug!("Output directory is writable");
    Ok(())
}
