//! Default input and store locations.
//!
//! Paths come from the command line first, then the environment, then
//! these defaults (relative to the working directory).

use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable overriding the input directory.
pub const INPUT_DIR_ENV: &str = "TASK_ORDERS_INPUT_DIR";

/// Environment variable overriding the store file.
pub const STORE_ENV: &str = "TASK_ORDERS_STORE";

/// Returns the default `data/input/` directory scanned for PDFs.
#[must_use]
pub fn default_input_dir() -> PathBuf {
    PathBuf::from("data").join("input")
}

/// Returns the default store file, `data/output/task_orders.csv`.
#[must_use]
pub fn default_store_path() -> PathBuf {
    PathBuf::from("data").join("output").join("task_orders.csv")
}

/// Resolves the input directory from a CLI flag, `TASK_ORDERS_INPUT_DIR`,
/// or the default.
#[must_use]
pub fn resolve_input_dir(flag: Option<PathBuf>) -> PathBuf {
    resolve(flag, std::env::var_os(INPUT_DIR_ENV), default_input_dir)
}

/// Resolves the store file from a CLI flag, `TASK_ORDERS_STORE`, or the
/// default.
#[must_use]
pub fn resolve_store_path(flag: Option<PathBuf>) -> PathBuf {
    resolve(flag, std::env::var_os(STORE_ENV), default_store_path)
}

fn resolve(
    flag: Option<PathBuf>,
    env_value: Option<OsString>,
    default: fn() -> PathBuf,
) -> PathBuf {
    flag.or_else(|| env_value.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(default)
}
