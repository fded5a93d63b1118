//! Runtime configuration and the `hostlink.conf` file parser.
//!
//! The file is line-oriented:
//!
//! | Line | Action |
//! |------|--------|
//! | `max_call_depth = <n>` | nesting limit for script function calls (n ≥ 1) |
//! | `echo_output = on\|off` | print script output to stdout as it is produced |
//! | `prelude = <path>` | script run during initialization; may repeat |
//! | Lines starting with `#` or `;` | comment, ignored |
//!
//! Errors on individual lines are collected and the rest of the file is still
//! applied.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;

/// Default nesting limit for script function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "HOSTLINK_CONFIG";

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Settings for one [`RuntimeHandle`](crate::runtime::RuntimeHandle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub max_call_depth: usize,
    pub echo_output: bool,
    pub prelude: Vec<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            echo_output: false,
            prelude: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth.max(1);
        self
    }

    pub fn with_echo_output(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }

    pub fn with_prelude(mut self, path: impl Into<PathBuf>) -> Self {
        self.prelude.push(path.into());
        self
    }

    /// Parse a config string on top of the defaults.
    ///
    /// Returns the config and a list of any errors on individual lines.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = RuntimeConfig::new();
        let errors = config.apply_str(s, None);
        (config, errors)
    }

    /// Read and parse a config file from disk.
    ///
    /// Relative `prelude` paths are resolved against the file's directory.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        let mut config = RuntimeConfig::new();
        let errors = config.apply_str(&s, path.parent());
        Ok((config, errors))
    }

    fn apply_str(&mut self, s: &str, base: Option<&Path>) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                errors.push(ConfigError {
                    line: lineno,
                    message: format!("expected 'key = value', found '{line}'"),
                });
                continue;
            };
            let value = unquote(value.trim());

            if let Err(message) = self.set(key.trim(), value, base) {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        errors
    }

    fn set(&mut self, key: &str, value: &str, base: Option<&Path>) -> Result<(), String> {
        match key {
            "max_call_depth" => {
                let n: usize = value
                    .parse()
                    .map_err(|_| format!("max_call_depth: '{value}' is not a number"))?;
                if n == 0 {
                    return Err("max_call_depth must be at least 1".to_owned());
                }
                self.max_call_depth = n;
            }
            "echo_output" => self.echo_output = parse_flag(value)?,
            "prelude" => {
                if value.is_empty() {
                    return Err("prelude: missing path".to_owned());
                }
                let path = PathBuf::from(value);
                let path = match base {
                    Some(dir) if path.is_relative() => dir.join(path),
                    _ => path,
                };
                self.prelude.push(path);
            }
            other => return Err(format!("unknown setting '{other}'")),
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(format!("expected on/off, found '{value}'")),
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Locate the user config file.
///
/// `$HOSTLINK_CONFIG` wins when set (even if the file is missing, so the
/// caller reports it); otherwise `hostlink.conf` in the platform config
/// directory, if it exists.
pub fn find_user_config() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(p));
    }
    ProjectDirs::from("", "", "hostlink")
        .map(|dirs| dirs.config_dir().join("hostlink.conf"))
        .filter(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let c = RuntimeConfig::default();
        assert_eq!(c.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
        assert!(!c.echo_output);
        assert!(c.prelude.is_empty());
    }

    #[test]
    fn builder() {
        let c = RuntimeConfig::new()
            .with_max_call_depth(0)
            .with_echo_output(true)
            .with_prelude("a.hl");
        assert_eq!(c.max_call_depth, 1);
        assert!(c.echo_output);
        assert_eq!(c.prelude, vec![PathBuf::from("a.hl")]);
    }

    #[test]
    fn all_keys() {
        let (c, errs) = RuntimeConfig::load_str(
            "max_call_depth = 64\necho_output = on\nprelude = one.hl\nprelude = \"two words.hl\"\n",
        );
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(c.max_call_depth, 64);
        assert!(c.echo_output);
        assert_eq!(
            c.prelude,
            vec![PathBuf::from("one.hl"), PathBuf::from("two words.hl")]
        );
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let (c, errs) = RuntimeConfig::load_str("# hash\n; semi\n\n   \necho_output=yes\n");
        assert!(errs.is_empty());
        assert!(c.echo_output);
    }

    #[test]
    fn bad_lines_collected_rest_applied() {
        let (c, errs) = RuntimeConfig::load_str(
            "max_call_depth = lots\nbogus = 1\nno equals here\necho_output = maybe\nmax_call_depth = 0\nmax_call_depth = 9\n",
        );
        assert_eq!(c.max_call_depth, 9);
        let lines: Vec<usize> = errs.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4, 5]);
        assert_eq!(errs[1].to_string(), "line 2: unknown setting 'bogus'");
    }

    #[test]
    fn load_file_resolves_relative_prelude() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostlink.conf");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "prelude = init.hl\nprelude = /abs/other.hl").unwrap();
        drop(f);

        let (c, errs) = RuntimeConfig::load_file(&path).unwrap();
        assert!(errs.is_empty());
        assert_eq!(c.prelude[0], dir.path().join("init.hl"));
        assert_eq!(c.prelude[1], PathBuf::from("/abs/other.hl"));
    }

    #[test]
    fn load_file_missing_is_io_error() {
        assert!(RuntimeConfig::load_file(Path::new("/definitely/not/here.conf")).is_err());
    }
}
