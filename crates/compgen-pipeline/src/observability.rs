use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::config::parse_bool;

pub const OBSERVABILITY_ENV: &str = "COMPGEN_OBSERVABILITY";
pub const LOG_LEVEL_ENV: &str = "COMPGEN_LOG_LEVEL";
pub const JSON_LOG_PATH_ENV: &str = "COMPGEN_JSON_LOG_PATH";

const DEFAULT_LOG_FILE: &str = "compgen.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

fn observability_enabled(lookup: impl Fn(&str) -> Option<String>) -> bool {
    lookup(OBSERVABILITY_ENV)
        .map(|value| parse_bool(&value).unwrap_or(true))
        .unwrap_or(true)
}

/// `COMPGEN_LOG_LEVEL` wins when it parses, then `RUST_LOG`, then `info`.
fn filter_directive(lookup: impl Fn(&str) -> Option<String>) -> String {
    if let Some(level) = lookup(LOG_LEVEL_ENV)
        && tracing_subscriber::EnvFilter::try_new(&level).is_ok()
    {
        return level;
    }
    if let Some(level) = lookup("RUST_LOG")
        && tracing_subscriber::EnvFilter::try_new(&level).is_ok()
    {
        return level;
    }
    "info".to_string()
}

fn resolve_env_filter() -> tracing_subscriber::EnvFilter {
    let directive = filter_directive(|key| std::env::var(key).ok());
    tracing_subscriber::EnvFilter::try_new(&directive)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `COMPGEN_OBSERVABILITY`: optional enable/disable flag (default enabled).
/// - `COMPGEN_LOG_LEVEL`: optional level/filter override (`info`, `debug`, etc.).
/// - `COMPGEN_JSON_LOG_PATH`: optional log file path. If set, logs are JSONL in that file.
///   If unset, logs go to stderr in a compact console format, leaving stdout
///   free for generated code and frames.
/// - `RUST_LOG`: optional filter override.
pub fn init_observability() {
    INIT.get_or_init(|| {
        if !observability_enabled(|key| std::env::var(key).ok()) {
            return;
        }

        let env_filter = resolve_env_filter();
        if let Ok(path_raw) = std::env::var(JSON_LOG_PATH_ENV) {
            let path = std::path::PathBuf::from(path_raw);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                let _ = std::fs::create_dir_all(parent);
            }
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(DEFAULT_LOG_FILE);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}
