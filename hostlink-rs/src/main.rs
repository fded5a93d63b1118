use std::io::Read;
use std::process::ExitCode;

use tracing::Level;

use hostlink::cli::{self, ConfigFile, USAGE};
use hostlink::config::{self, RuntimeConfig};
use hostlink::{DynamicValue, RuntimeHandle, ScriptEngine, ValueKind};

/// Exit status when the runtime cannot be started.
const EXIT_INIT: u8 = 1;
/// Exit status when at least one script failed.
const EXIT_RUN: u8 = 2;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("hostlink: {e}");
            eprintln!("{USAGE}");
            return ExitCode::from(EXIT_INIT);
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if args.debug { Level::DEBUG } else { Level::WARN })
        .init();

    // ── Load configuration ────────────────────────────────────────────────────
    let path = match &args.config {
        ConfigFile::Skip => None,
        ConfigFile::Explicit(p) => Some(p.clone()),
        ConfigFile::Search => config::find_user_config(),
    };
    let mut config = match path {
        None => RuntimeConfig::default(),
        Some(path) => match RuntimeConfig::load_file(&path) {
            Ok((config, errors)) => {
                for e in errors {
                    eprintln!("hostlink: warning: {}: {e}", path.display());
                }
                config
            }
            Err(e) => {
                eprintln!("hostlink: warning: cannot read '{}': {e}", path.display());
                RuntimeConfig::default()
            }
        },
    };
    config.echo_output = !args.quiet;

    // ── Start the runtime ─────────────────────────────────────────────────────
    if args.lua {
        #[cfg(feature = "lua")]
        {
            use hostlink::lua::LuaEngine;
            return match RuntimeHandle::with_engine(config, LuaEngine::new) {
                Ok(rt) => session(rt, &args),
                Err(e) => init_failed(e),
            };
        }
        #[cfg(not(feature = "lua"))]
        {
            return init_failed(hostlink::BridgeError::init("built without the 'lua' feature"));
        }
    }
    match RuntimeHandle::new(config) {
        Ok(rt) => session(rt, &args),
        Err(e) => init_failed(e),
    }
}

fn init_failed(e: hostlink::BridgeError) -> ExitCode {
    eprintln!("Error {e}");
    ExitCode::from(EXIT_INIT)
}

/// Publish the host API, run every source, and report failures.
fn session<E: ScriptEngine>(mut rt: RuntimeHandle<E>, args: &cli::CliArgs) -> ExitCode {
    if let Err(e) = publish_host_api(&rt, args) {
        return init_failed(e);
    }

    let mut failures = 0usize;
    for src in &args.sources {
        let r = rt.run(src);
        failures += report(&mut rt, &r);
    }
    for file in &args.files {
        let r = rt.run_file(file);
        failures += report(&mut rt, &r);
    }
    if args.sources.is_empty() && args.files.is_empty() {
        let mut src = String::new();
        match std::io::stdin().read_to_string(&mut src) {
            Ok(_) => {
                let r = rt.run(&src);
                failures += report(&mut rt, &r);
            }
            Err(e) => {
                eprintln!("Error cannot read standard input: {e}");
                failures += 1;
            }
        }
    }

    rt.shutdown();
    if failures > 0 {
        ExitCode::from(EXIT_RUN)
    } else {
        ExitCode::SUCCESS
    }
}

/// Print a failed run's message; returns 1 on failure, 0 on success.
fn report<E: ScriptEngine>(rt: &mut RuntimeHandle<E>, result: &hostlink::RunResult) -> usize {
    // Output was already echoed live, or suppressed by -q.
    rt.take_output();
    match result.message() {
        Some(msg) => {
            eprintln!("Error {msg}");
            1
        }
        None => 0,
    }
}

fn publish_host_api<E: ScriptEngine>(
    rt: &RuntimeHandle<E>,
    args: &cli::CliArgs,
) -> hostlink::Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    rt.declare_foreign_variable("argv", args.files.len() as i64)?;
    rt.declare_foreign_variable("host", format!("hostlink {version}"))?;

    rt.register_foreign_function("host_print", vec![ValueKind::Any], |_, a| {
        println!("{}", a[0]);
        Ok(DynamicValue::Nil)
    })?;
    rt.register_foreign_function("host_version", vec![], move |_, _| {
        Ok(DynamicValue::from(version))
    })?;
    Ok(())
}
