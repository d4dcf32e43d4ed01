//! Tracing setup: stderr plus an optional daily rolling log file.

use std::path::{Path, PathBuf};

use env_flags::env_flags;
use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{LoggingCfg, UserConfig};

const LOG_FILE: &str = "hangar-mcp.log";

static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    Json,
    Compact,
    Pretty,
    Full,
}

/// Resolved logging knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    pub json: bool,
    pub compact: bool,
    pub pretty: bool,
    pub to_file: bool,
    pub dir: Option<PathBuf>,
}

impl LogSettings {
    /// JSON wins, then compact, then pretty.
    pub fn style(&self) -> LogStyle {
        if self.json {
            LogStyle::Json
        } else if self.compact {
            LogStyle::Compact
        } else if self.pretty {
            LogStyle::Pretty
        } else {
            LogStyle::Full
        }
    }

    pub fn from_env(user: Option<&UserConfig>) -> Self {
        env_flags! {
            /// Tracing filter, e.g. "info", "debug", or targets format.
            RUST_LOG: &str = "info";
            /// Preferred filter env (alias). If set, overrides RUST_LOG.
            TRACING_FILTER: &str = "";
            /// Pretty formatting (ignored if TRACING_JSON=true).
            TRACING_PRETTY: bool = false;
            /// Compact single-line formatting (ignored if TRACING_JSON=true).
            TRACING_COMPACT: bool = true;
            /// JSON formatting for logs.
            TRACING_JSON: bool = false;
            /// Also log to file under <HANGAR_HOME>/logs or LOG_DIR.
            LOG_TO_FILE: bool = true;
            /// Optional explicit log directory.
            LOG_DIR: &str = "";
        }

        let mut settings = Self {
            filter: if !(*TRACING_FILTER).is_empty() {
                (*TRACING_FILTER).to_string()
            } else {
                (*RUST_LOG).to_string()
            },
            json: *TRACING_JSON,
            compact: *TRACING_COMPACT,
            pretty: *TRACING_PRETTY,
            to_file: *LOG_TO_FILE,
            dir: if !(*LOG_DIR).is_empty() {
                Some(PathBuf::from(*LOG_DIR))
            } else {
                None
            },
        };
        if let Some(cfg) = user.and_then(|c| c.logging.as_ref()) {
            let env_set = |k: &str| std::env::var_os(k).is_some();
            settings.apply(cfg, &env_set);
        }
        settings
    }

    /// Fill in config-file values for every knob whose env var is unset.
    fn apply(&mut self, cfg: &LoggingCfg, env_set: &dyn Fn(&str) -> bool) {
        if !(env_set("TRACING_FILTER") || env_set("RUST_LOG"))
            && let Some(level) = cfg.level.as_ref()
        {
            self.filter = level.clone();
        }
        if !env_set("TRACING_JSON")
            && let Some(v) = cfg.json
        {
            self.json = v;
        }
        if !env_set("TRACING_COMPACT")
            && let Some(v) = cfg.compact
        {
            self.compact = v;
        }
        if !env_set("TRACING_PRETTY")
            && let Some(v) = cfg.pretty
        {
            self.pretty = v;
        }
        if !env_set("LOG_TO_FILE")
            && let Some(v) = cfg.to_file
        {
            self.to_file = v;
        }
        if !env_set("LOG_DIR")
            && let Some(dir) = cfg.dir.as_ref()
        {
            self.dir = Some(crate::config::expand_home(dir));
        }
    }
}

fn fmt_layer<W>(style: LogStyle, writer: W, ansi: bool) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = tracing_subscriber::fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(writer);
    match style {
        LogStyle::Json => base.json().boxed(),
        LogStyle::Compact => base.compact().boxed(),
        LogStyle::Pretty => base.pretty().boxed(),
        LogStyle::Full => base.boxed(),
    }
}

/// Install the global subscriber. Logs always go to stderr so stdout stays
/// free for the binary's JSON output.
pub fn init_tracing(home: &Path, user: Option<&UserConfig>) {
    let settings = LogSettings::from_env(user);
    let style = settings.style();
    let filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers = vec![fmt_layer(style, std::io::stderr, true)];
    let mut dir_error = None;
    if settings.to_file {
        let dir = settings.dir.clone().unwrap_or_else(|| home.join("logs"));
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&dir, LOG_FILE);
                let (nb, guard) = tracing_appender::non_blocking(appender);
                let _ = FILE_GUARD.set(guard);
                layers.push(fmt_layer(style, nb, false));
            }
            Err(e) => dir_error = Some((dir, e)),
        }
    }

    if let Err(e) = tracing_subscriber::registry().with(layers).with(filter).try_init() {
        tracing::debug!("tracing already set: {:?}", e);
    }
    if let Some((dir, e)) = dir_error {
        tracing::warn!("failed to create log dir {}: {}", dir.display(), e);
    }
}
