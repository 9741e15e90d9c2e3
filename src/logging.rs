//! Log destination and filter selection.
//!
//! The REPL writes its transcript to stdout, so interactive sessions send
//! tracing output to a per-user log file. `--ask` runs and `--log-stderr`
//! log to stderr. A log file that cannot be opened falls back to stderr.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

/// Filter directives read before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "CORTEX_CHAT_LOG";

const LOG_FILE_NAME: &str = "cortex-chat.log";

/// Where tracing output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    pub fn for_cli(cli: &Cli) -> Self {
        if cli.logs_to_stderr() {
            Self::Stderr
        } else {
            Self::File(log_path())
        }
    }
}

/// Default directives when no filter variable is set. Debug mode raises
/// this crate to `debug` and leaves dependencies at `info`.
fn default_directives(debug: bool) -> &'static str {
    if debug {
        "info,cortex_chat=debug"
    } else {
        "info"
    }
}

/// Picks the first parseable filter from `CORTEX_CHAT_LOG`, then `RUST_LOG`.
fn select_filter(app_var: Option<&str>, rust_log: Option<&str>, debug: bool) -> EnvFilter {
    [app_var, rust_log]
        .into_iter()
        .flatten()
        .filter(|directives| !directives.trim().is_empty())
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(debug)))
}

fn env_filter(debug: bool) -> EnvFilter {
    let app_var = std::env::var(LOG_ENV_VAR).ok();
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    select_filter(app_var.as_deref(), rust_log.as_deref(), debug)
}

/// Creates the parent directory and truncates the log file.
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// Installs the global subscriber and returns the target actually used.
pub fn init(target: &LogTarget, debug: bool) -> LogTarget {
    let filter = env_filter(debug);

    if let LogTarget::File(path) = target {
        match open_log_file(path) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .init();
                return target.clone();
            }
            Err(e) => eprintln!("Warning: Could not open log file {}: {e}", path.display()),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    LogTarget::Stderr
}

/// Log file location: the platform state directory, then the config
/// directory, then the temp directory.
pub fn log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("cortex-chat").join(LOG_FILE_NAME))
        .unwrap_or_else(|| std::env::temp_dir().join(LOG_FILE_NAME))
}
