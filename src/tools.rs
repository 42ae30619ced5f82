//! Runtime tool path resolution
//!
//! External tools resolve through a `{TOOL}_BIN` environment variable with a
//! PATH fallback, so packaged environments can pin exact binaries while
//! development machines rely on PATH lookup.

use std::env;

/// Get the path to an external tool.
///
/// Checks `{TOOL}_BIN` (uppercase tool name + "_BIN") and falls back to the
/// tool name itself, which relies on PATH.
pub fn get_tool_path(tool: &str) -> String {
    let env_var = format!("{}_BIN", tool.to_uppercase());
    env::var(&env_var).unwrap_or_else(|_| tool.to_string())
}
