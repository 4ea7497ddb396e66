//! Process-wide quiet switch for human-readable status lines

use std::sync::OnceLock;

const QUIET_ENV: &str = "BLOGSTORE_QUIET";

static QUIET: OnceLock<bool> = OnceLock::new();

/// Fix quiet mode for the rest of the process; `--quiet` wins over `BLOGSTORE_QUIET`.
///
/// Returns the effective setting, which is the first one chosen if quiet
/// mode was already read.
pub fn init_quiet(flag: bool) -> bool {
    *QUIET.get_or_init(|| flag || env_flag(QUIET_ENV))
}

pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| env_flag(QUIET_ENV))
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| truthy(&v))
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
