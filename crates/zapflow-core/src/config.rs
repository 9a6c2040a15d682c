use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    channel::direct_link::DEFAULT_COMPOSE_URL,
    domain::{ChannelMode, SessionConfig, DEFAULT_SERVER_URL},
    errors::Error,
    liaison::DEFAULT_POLL_INTERVAL,
    queue::{
        QueueTiming, DEFAULT_DIRECT_LINK_DELAY_SECS, DEFAULT_REMOTE_SERVER_DELAY_SECS,
        DEFAULT_WARMUP_SECS,
    },
    utils::DEFAULT_ACTIVITY_CAPACITY,
    Result,
};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_POLL_INTERVAL_MS: u64 = 100;
const MIN_HTTP_TIMEOUT_MS: u64 = 100;

/// Process-wide configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Channel
    pub mode: ChannelMode,
    pub server_url: String,
    pub compose_url: String,
    pub opener_program: Option<String>,

    // Timing
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub timing: QueueTiming,

    // Operator log
    pub log_capacity: usize,

    // Template
    pub template_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ChannelMode::DirectLink,
            server_url: DEFAULT_SERVER_URL.to_string(),
            compose_url: DEFAULT_COMPOSE_URL.to_string(),
            opener_program: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            timing: QueueTiming::default(),
            log_capacity: DEFAULT_ACTIVITY_CAPACITY,
            template_file: None,
        }
    }
}

impl Config {
    /// Load from the environment, after applying a `.env` file if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mode = match get("ZAPFLOW_MODE").and_then(non_empty) {
            Some(raw) => ChannelMode::parse(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "ZAPFLOW_MODE must be `web` or `server`, got `{raw}`"
                ))
            })?,
            None => ChannelMode::DirectLink,
        };

        let server_url = get("ZAPFLOW_SERVER_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        if mode == ChannelMode::RemoteServer && !is_http_url(&server_url) {
            return Err(Error::Config(format!(
                "ZAPFLOW_SERVER_URL must start with http:// or https://, got `{server_url}`"
            )));
        }

        let compose_url = get("ZAPFLOW_COMPOSE_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_COMPOSE_URL.to_string());
        let opener_program = get("ZAPFLOW_OPENER").and_then(non_empty);

        let poll_interval = Duration::from_millis(
            parse_u64(&get, "ZAPFLOW_POLL_INTERVAL_MS")
                .unwrap_or(DEFAULT_POLL_INTERVAL.as_millis() as u64)
                .max(MIN_POLL_INTERVAL_MS),
        );
        let http_timeout = Duration::from_millis(
            parse_u64(&get, "ZAPFLOW_HTTP_TIMEOUT_MS")
                .unwrap_or(DEFAULT_HTTP_TIMEOUT.as_millis() as u64)
                .max(MIN_HTTP_TIMEOUT_MS),
        );

        let timing = QueueTiming {
            warmup_secs: parse_u32(&get, "ZAPFLOW_WARMUP_SECS").unwrap_or(DEFAULT_WARMUP_SECS),
            direct_link_delay_secs: parse_u32(&get, "ZAPFLOW_WEB_DELAY_SECS")
                .unwrap_or(DEFAULT_DIRECT_LINK_DELAY_SECS),
            remote_server_delay_secs: parse_u32(&get, "ZAPFLOW_SERVER_DELAY_SECS")
                .unwrap_or(DEFAULT_REMOTE_SERVER_DELAY_SECS),
        };

        let log_capacity = parse_u64(&get, "ZAPFLOW_LOG_CAPACITY")
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_ACTIVITY_CAPACITY)
            .max(1);

        let template_file = get("ZAPFLOW_TEMPLATE_FILE")
            .and_then(non_empty)
            .map(PathBuf::from);

        Ok(Self {
            mode,
            server_url,
            compose_url,
            opener_program,
            poll_interval,
            http_timeout,
            timing,
            log_capacity,
            template_file,
        })
    }

    /// Initial session settings derived from the process configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            mode: self.mode,
            server_url: self.server_url.clone(),
        }
    }

    /// Template text from `template_file`, when configured.
    pub fn load_template(&self) -> Result<Option<String>> {
        let Some(path) = &self.template_file else {
            return Ok(None);
        };
        Ok(Some(fs::read_to_string(path)?))
    }
}

pub fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_u64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    get(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_u32(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u32> {
    get(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
