//! Shell resolution and the child process environment.
//!
//! Everything here runs in the parent before the child is forked. Both
//! functions take an environment lookup closure so they stay pure and can be
//! tested without touching the real process environment.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use shellpane_core::{Dimensions, Error, Result};

/// Shell used when neither the settings nor `$SHELL` name one.
pub const FALLBACK_SHELL: &str = "/bin/sh";

/// Variables copied from the parent when present.
pub const INHERITED_VARS: [&str; 4] = ["PATH", "HOME", "USER", "LANG"];

/// Resolve the shell to an executable path.
///
/// The configured shell wins over `$SHELL`, which wins over [`FALLBACK_SHELL`].
/// A name without a `/` is searched on `$PATH`.
pub fn resolve_shell<F>(configured: Option<&str>, lookup: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let candidate = configured
        .map(str::to_string)
        .or_else(|| lookup("SHELL"))
        .filter(|shell| !shell.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_SHELL.to_string());

    if candidate.contains('/') {
        let path = PathBuf::from(&candidate);
        return if is_executable(&path) {
            Ok(path)
        } else {
            Err(Error::ShellNotFound(candidate))
        };
    }

    let search_path = lookup("PATH").unwrap_or_default();
    let found = search_path
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(&candidate))
        .find(|path| is_executable(path));

    found.ok_or(Error::ShellNotFound(candidate))
}

/// Build the complete environment for the child shell.
///
/// The result holds `PATH`, `HOME`, `USER` and `LANG` when the parent has
/// them, plus `SHELL`, `TERM`, `COLUMNS` and `LINES`. Nothing else is passed.
pub fn child_environment<F>(
    shell: &Path,
    dimensions: Dimensions,
    term: &str,
    lookup: F,
) -> Vec<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env: Vec<(String, String)> = INHERITED_VARS
        .iter()
        .filter_map(|key| lookup(key).map(|value| (key.to_string(), value)))
        .collect();

    env.push(("SHELL".to_string(), shell.to_string_lossy().into_owned()));
    env.push(("TERM".to_string(), term.to_string()));
    env.push(("COLUMNS".to_string(), dimensions.cols.to_string()));
    env.push(("LINES".to_string(), dimensions.rows.to_string()));
    env
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
