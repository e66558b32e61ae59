use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use crate::contract::{TriggerBackend, TriggerPeriod};

/// Trigger backend over the user's crontab. Lines are matched by
/// command-signature substring, so install/remove stay idempotent even
/// when the tab carries unrelated entries.
#[derive(Clone, Debug, Default)]
pub struct CrontabBackend;

impl CrontabBackend {
    pub fn new() -> Self {
        Self
    }

    /// `crontab -l` exits non-zero when the user has no crontab yet;
    /// that is an empty tab, not an error.
    fn read_tab(&self) -> Result<Vec<String>> {
        let out = Command::new("crontab")
            .arg("-l")
            .output()
            .context("run crontab -l")?;
        if !out.status.success() {
            return Ok(vec![]);
        }
        Ok(String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(|l| l.to_string())
            .collect())
    }

    fn write_tab(&self, lines: &[String]) -> Result<()> {
        let mut child = Command::new("crontab")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("spawn crontab -")?;
        let mut body = lines.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("crontab stdin unavailable"))?
            .write_all(body.as_bytes())
            .context("write crontab body")?;
        let out = child.wait_with_output().context("wait for crontab")?;
        if !out.status.success() {
            return Err(anyhow!(
                "crontab write failed\nstdout:{}\nstderr:{}",
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr)
            ));
        }
        Ok(())
    }

    fn schedule_field(period: TriggerPeriod) -> String {
        match period {
            TriggerPeriod::EveryMinutes(m) => format!("*/{m} * * * *"),
            TriggerPeriod::EveryHours(h) => format!("0 */{h} * * *"),
        }
    }
}

impl TriggerBackend for CrontabBackend {
    fn install(&self, signature: &str, period: TriggerPeriod) -> Result<()> {
        let mut lines = self.read_tab()?;
        if lines.iter().any(|l| l.contains(signature)) {
            return Ok(());
        }
        let line = format!("{} {}", Self::schedule_field(period), signature);
        debug!(%line, "adding crontab entry");
        lines.push(line);
        self.write_tab(&lines)
    }

    fn remove(&self, signature: &str) -> Result<()> {
        let lines = self.read_tab()?;
        let kept: Vec<String> = lines
            .iter()
            .filter(|l| !l.contains(signature))
            .cloned()
            .collect();
        if kept.len() == lines.len() {
            return Ok(());
        }
        self.write_tab(&kept)
    }

    fn exists(&self, signature: &str) -> Result<bool> {
        Ok(self.read_tab()?.iter().any(|l| l.contains(signature)))
    }
}
