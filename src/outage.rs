use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::models::Verdict;

/// Appends one line per DOWN observation to
/// `<root>/<group>/<YYYY-MM-DD>/<port>_<service>.log`.
///
/// Files are append-only; rotation and retention are someone else's job.
pub struct OutageLogger {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl OutageLogger {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    fn log_file(&self, group: &str, verdict: &Verdict, when: DateTime<Local>) -> PathBuf {
        self.root
            .join(group)
            .join(when.format("%Y-%m-%d").to_string())
            .join(format!("{}_{}.log", verdict.port, verdict.service))
    }

    /// Append one outage record, creating intermediate directories as
    /// needed. The writer lock is held across open and write so concurrent
    /// cycles never interleave partial lines.
    pub async fn record(&self, group: &str, verdict: &Verdict, when: DateTime<Local>) -> Result<()> {
        let path = self.log_file(group, verdict, when);
        let line = format!(
            "{} | Service: {} | Port: {} | Status: {}\n",
            when.format("%Y-%m-%d %H:%M:%S"),
            verdict.service,
            verdict.port,
            verdict.status,
        );

        let _guard = self.write_lock.lock().await;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to {}", path.display()))?;
        Ok(())
    }
}
