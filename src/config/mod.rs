pub mod generate;
pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use parse::{load_config, parse_config, ConfigError};
pub use types::{
    Config, PipelineConfig, ReadStart, SinkConfig, SourceConfig, TimestampConfig,
    WriteFailureConfig, WriteFailurePolicy,
};

/// Matches `$env{VAR_NAME}` references.
pub(crate) fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
    })
}

/// Expands environment variables in a string.
/// Supports $env{VAR_NAME} syntax.
/// If an environment variable is not set, it's left unchanged.
pub fn expand_env_vars(text: &str) -> String {
    env_var_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
}

/// Expands a leading `~` in a path to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    // Only "~" and "~/..." are expanded; "~user" is left alone

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Resolves the config file path based on explicit argument or default locations.
/// Returns the first existing path from:
/// 1. Explicit path (if provided, with tilde expansion)
/// 2. ~/.config/logflow/config.yml
/// 3. /etc/logflow/config.yml
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    // Explicit path always wins
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    // Then the user config directory
    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/logflow/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    // Finally the system-wide location
    let system_config = PathBuf::from("/etc/logflow/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}
