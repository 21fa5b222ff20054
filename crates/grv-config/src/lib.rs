//! `grvrc` configuration: scanning, parsing, and semantic validation
//! (spec.md §4.4), plus XDG-aware discovery of the config and history
//! file paths (spec.md §6).

pub mod eval;
pub mod parser;
pub mod scanner;

pub use eval::{apply, Applied, ConfigState, ThemeOverride, COLOR_WORDS, THEME_COMPONENTS};
pub use parser::{parse, ConfigError, Directive};

use std::path::PathBuf;

/// Result of loading a `grvrc` file end to end: the resulting state, every
/// applied directive in order, and every error collected along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadResult {
    pub state: ConfigState,
    pub applied: Vec<Applied>,
    pub errors: Vec<ConfigError>,
}

/// Parse and apply `source` against a fresh `ConfigState`.
pub fn load(source: &str) -> LoadResult {
    let (directives, mut errors) = parser::parse(source);
    let mut state = ConfigState::default();
    let (applied, semantic_errors) = eval::apply(&mut state, &directives);
    errors.extend(semantic_errors);
    LoadResult {
        state,
        applied,
        errors,
    }
}

/// Locate `$XDG_CONFIG_HOME/grv/grvrc`, falling back to
/// `$HOME/.config/grv/grvrc` when `XDG_CONFIG_HOME` is unset.
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("grvrc"))
}

/// `config_file_path()`, rendered the way it's shown to the user: with the
/// home directory shortened to `~` (spec.md §8: `~/.config/grv/grvrc:1:1
/// ...`), falling back to the bare file name if no config path resolves.
pub fn config_file_display_path() -> String {
    match config_file_path() {
        Some(path) => display_path(&path),
        None => "grvrc".to_string(),
    }
}

fn display_path(path: &std::path::Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(rel) = path.strip_prefix(&home) {
            return format!("~/{}", rel.display());
        }
    }
    path.display().to_string()
}

/// Render a `ConfigError` the way it's surfaced to the user, with the
/// grvrc path it came from prefixed on (spec.md §8: `ConfigError`'s own
/// `Display` is path-less; callers supply the path it applies to).
pub fn describe_error(path: &str, err: &ConfigError) -> String {
    format!("{path}:{err}")
}

/// Locate `$XDG_CONFIG_HOME/grv/history` (owned in practice by the
/// render crate's prompt history, but its path is discovered here
/// alongside the config file since both live under the same directory).
pub fn history_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("history"))
}

fn config_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg).join("grv"));
        }
    }
    dirs::home_dir().map(|home| home.join(".config").join("grv"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_applies_valid_directives_and_collects_errors() {
        let result = load("set tabWidth 4\nset tabWidth 0\n");
        assert_eq!(result.applied.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.state.variables.get("tabWidth"),
            Some(&"4".to_string())
        );
    }

    #[test]
    fn describe_error_prefixes_the_path_ahead_of_line_col_and_message() {
        let err = ConfigError {
            line: 1,
            col: 1,
            message: "Unexpected Option \"--name\"".to_string(),
        };
        assert_eq!(
            describe_error("~/.config/grv/grvrc", &err),
            "~/.config/grv/grvrc:1:1 Unexpected Option \"--name\""
        );
    }

    #[test]
    fn config_file_path_honors_xdg_config_home() {
        // SAFETY: test runs single-threaded within this process' test
        // harness invocation for this variable; no other test reads it.
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/grv-test-xdg");
        }
        let path = config_file_path().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/grv-test-xdg/grv/grvrc"));
        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
    }
}
