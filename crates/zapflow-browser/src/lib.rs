//! Link opener adapter.
//!
//! Opens compose links by spawning the platform URL handler (`xdg-open`,
//! `open`, or `rundll32`), or any program named in the configuration.

use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::{process::Command, time::timeout};

use zapflow_core::{channel::LinkOpener, errors::Error, Result};

const OPEN_TIMEOUT: Duration = Duration::from_secs(15);
const STDERR_PREVIEW_CHARS: usize = 300;

/// Special program name that prints links instead of opening them.
pub const PRINT_PROGRAM: &str = "print";

#[derive(Clone, Debug)]
pub struct SystemOpener {
    program: String,
    args: Vec<String>,
}

impl Default for SystemOpener {
    fn default() -> Self {
        let (program, args) = platform_default();
        Self { program, args }
    }
}

impl SystemOpener {
    /// Use `program` (split on whitespace for extra args) or the platform default.
    pub fn new(program: Option<&str>) -> Self {
        let Some(program) = program.map(str::trim).filter(|p| !p.is_empty()) else {
            return Self::default();
        };
        let mut parts = program.split_whitespace().map(str::to_string);
        let bin = parts.next().unwrap_or_default();
        Self {
            program: bin,
            args: parts.collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

fn platform_default() -> (String, Vec<String>) {
    if cfg!(target_os = "macos") {
        ("open".to_string(), Vec::new())
    } else if cfg!(windows) {
        (
            "rundll32".to_string(),
            vec!["url.dll,FileProtocolHandler".to_string()],
        )
    } else {
        ("xdg-open".to_string(), Vec::new())
    }
}

#[async_trait]
impl LinkOpener for SystemOpener {
    async fn open(&self, url: &str) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(OPEN_TIMEOUT, cmd.output()).await {
            Ok(res) => res?,
            Err(_) => {
                return Err(Error::External(format!(
                    "{} did not return within {}s",
                    self.program,
                    OPEN_TIMEOUT.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let preview = truncate_text(stderr.trim(), STDERR_PREVIEW_CHARS);
            if preview.is_empty() {
                return Err(Error::External(format!(
                    "{} exited with status {}",
                    self.program, output.status
                )));
            }
            return Err(Error::External(format!(
                "{} exited with status {}: {preview}",
                self.program, output.status
            )));
        }

        tracing::debug!(program = %self.program, "link handed to opener");
        Ok(())
    }
}

/// Prints each link to stdout for the operator to open by hand.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrintOpener;

#[async_trait]
impl LinkOpener for PrintOpener {
    async fn open(&self, url: &str) -> Result<()> {
        println!("open: {url}");
        Ok(())
    }
}

fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
