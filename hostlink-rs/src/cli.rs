//! Command-line argument parsing.
//!
//! Usage:
//!   hostlink [-d] [-q] [-l] [-f[<config>]] [-e<source>]... [<file>...]
//!
//! Boolean flags may be bundled (`-dq`).  `-e` and `-f` take the rest of the
//! bundle as their value, or the next argument when the bundle ends there.

use std::path::PathBuf;

pub const USAGE: &str = "Usage: hostlink [-d] [-q] [-l] [-f[<config>]] [-e<source>]... [<file>...]";

/// What the command line asked for.
#[derive(Debug, Default)]
pub struct CliArgs {
    pub config: ConfigFile,
    /// Inline sources, run in order before any file (`-e`).
    pub sources: Vec<String>,
    /// Script files, run after the inline sources.
    pub files: Vec<PathBuf>,
    /// Suppress echo of script `print` output (`-q`).
    pub quiet: bool,
    pub debug: bool,
    /// Use the Lua engine instead of the reference engine (`-l`).
    pub lua: bool,
}

/// Where configuration comes from.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// `$HOSTLINK_CONFIG`, then the platform config dir.
    #[default]
    Search,
    /// Bare `-f`: no config file at all.
    Skip,
    Explicit(PathBuf),
}

/// Parse `std::env::args()`.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse an argument list without the program name.
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut rest = argv.iter();

    while let Some(arg) = rest.next() {
        let Some(bundle) = arg.strip_prefix('-').filter(|b| !b.is_empty()) else {
            args.files.push(PathBuf::from(arg));
            continue;
        };
        if bundle == "-" {
            args.files.extend(rest.by_ref().map(PathBuf::from));
            break;
        }

        for (at, flag) in bundle.char_indices() {
            let tail = &bundle[at + flag.len_utf8()..];
            match flag {
                'd' => args.debug = true,
                'q' => args.quiet = true,
                'l' => args.lua = true,
                'e' => {
                    let src = if !tail.is_empty() {
                        tail.to_owned()
                    } else {
                        rest.next().ok_or("-e requires a source argument")?.clone()
                    };
                    args.sources.push(src);
                    break;
                }
                'f' => {
                    args.config = if !tail.is_empty() {
                        ConfigFile::Explicit(PathBuf::from(tail))
                    } else {
                        // Only a following non-flag argument is taken as the file.
                        match rest.as_slice().first() {
                            Some(next) if !next.starts_with('-') => {
                                rest.next();
                                ConfigFile::Explicit(PathBuf::from(next))
                            }
                            _ => ConfigFile::Skip,
                        }
                    };
                    break;
                }
                other => return Err(format!("unknown option: -{other}")),
            }
        }
    }

    Ok(args)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
