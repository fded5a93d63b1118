//! Host entry points.
//!
//! A [`RuntimeHandle`] owns one initialized engine, the registry it resolves
//! `foreign` symbols through, and the result of the most recent run.  Handles
//! are independent of each other; the [`global`](crate::global) module wraps a
//! single per-thread handle for hosts that want free functions.
//!
//! ```rust
//! use hostlink::RuntimeHandle;
//!
//! let mut rt = RuntimeHandle::initialize().unwrap();
//! rt.declare_foreign_variable("name", "world").unwrap();
//! assert!(rt.run("foreign var name\nprint 'hello ' + name").is_ok());
//! assert_eq!(rt.take_output(), vec!["hello world"]);
//!
//! assert!(rt.run("print 1 / 0").is_failed());
//! assert_eq!(rt.last_error(), Some("runtime error: division by zero"));
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::engine::ScriptEngine;
use crate::error::{BridgeError, Result};
use crate::registry::ForeignRegistry;
use crate::script::Interpreter;
use crate::status::RunResult;
use crate::trampoline::{CallContext, FunctionHandle};
use crate::value::{DynamicValue, ValueKind};

/// Chunk name used for source passed to [`RuntimeHandle::run`].
pub const STRING_CHUNK: &str = "<string>";

/// One initialized script runtime.
pub struct RuntimeHandle<E: ScriptEngine = Interpreter> {
    engine: E,
    registry: Arc<ForeignRegistry>,
    config: RuntimeConfig,
    last: Option<RunResult>,
}

impl RuntimeHandle<Interpreter> {
    /// Start a runtime on the reference engine with default settings.
    pub fn initialize() -> Result<Self> {
        Self::new(RuntimeConfig::default())
    }

    /// Start a runtime on the reference engine.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_engine(config, |registry, config| Ok(Interpreter::new(registry, config)))
    }
}

impl<E: ScriptEngine> RuntimeHandle<E> {
    /// Start a runtime on an engine produced by `build`.
    ///
    /// `build` receives the registry the engine must resolve `foreign`
    /// symbols through.  Any failure while building, initializing, or
    /// running a prelude script is reported as [`BridgeError::Init`].
    pub fn with_engine<F>(config: RuntimeConfig, build: F) -> Result<Self>
    where
        F: FnOnce(Arc<ForeignRegistry>, &RuntimeConfig) -> Result<E>,
    {
        let registry = Arc::new(ForeignRegistry::new());
        let mut engine = build(Arc::clone(&registry), &config).map_err(as_init)?;
        engine.initialize().map_err(as_init)?;

        let mut handle = RuntimeHandle { engine, registry, config, last: None };
        handle.run_prelude()?;
        debug!(prelude = handle.config.prelude.len(), "runtime initialized");
        Ok(handle)
    }

    fn run_prelude(&mut self) -> Result<()> {
        for path in self.config.prelude.clone() {
            let chunk = path.display().to_string();
            let result = std::fs::read_to_string(&path)
                .map_err(|source| BridgeError::Io { path: path.clone(), source })
                .and_then(|src| self.engine.execute(&src, &chunk));
            if let Err(e) = result {
                return Err(BridgeError::init(format!("prelude '{chunk}': {e}")));
            }
        }
        Ok(())
    }

    // ── Running scripts ───────────────────────────────────────────────────────

    /// Run source text.  The returned result is also kept as the handle's
    /// last result.
    pub fn run(&mut self, source: &str) -> RunResult {
        let outcome = self.engine.execute(source, STRING_CHUNK);
        self.finish(STRING_CHUNK, outcome)
    }

    /// Run a script file.  An unreadable path is reported as
    /// [`BridgeError::Io`]; engine state is untouched in that case.
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> RunResult {
        let path = path.as_ref();
        let chunk = path.display().to_string();
        let outcome = match std::fs::read_to_string(path) {
            Ok(src) => self.engine.execute(&src, &chunk),
            Err(source) => Err(BridgeError::Io { path: path.to_path_buf(), source }),
        };
        self.finish(&chunk, outcome)
    }

    fn finish(&mut self, chunk: &str, outcome: Result<()>) -> RunResult {
        let result = match outcome {
            Ok(()) => {
                debug!(chunk, "run ok");
                RunResult::ok()
            }
            Err(e) => {
                warn!(chunk, kind = %e.kind(), "run failed: {e}");
                RunResult::failed(e)
            }
        };
        self.last = Some(result.clone());
        result
    }

    /// Message of the last run's failure; `None` if it succeeded or nothing
    /// has run yet.
    pub fn last_error(&self) -> Option<&str> {
        self.last.as_ref().and_then(RunResult::message)
    }

    pub fn last_result(&self) -> Option<&RunResult> {
        self.last.as_ref()
    }

    /// Call a script-defined function from the host.
    pub fn call(&mut self, name: &str, args: &[DynamicValue]) -> Result<DynamicValue> {
        self.engine.call(name, args)
    }

    /// Drain script output buffered since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        self.engine.take_output()
    }

    // ── Foreign symbols ───────────────────────────────────────────────────────

    /// Bind `name` for scripts that declare it `foreign var`.  Re-declaring
    /// replaces the previous value.
    pub fn declare_foreign_variable(
        &self,
        name: &str,
        value: impl Into<DynamicValue>,
    ) -> Result<()> {
        self.registry.declare(name, value)
    }

    /// Register a host callable for scripts that declare it `foreign fn`.
    ///
    /// The runtime keeps the callable alive until it is replaced and every
    /// returned handle is dropped.
    pub fn register_foreign_function<F>(
        &self,
        name: &str,
        signature: Vec<ValueKind>,
        f: F,
    ) -> Result<FunctionHandle>
    where
        F: Fn(&mut CallContext<'_>, &[DynamicValue]) -> Result<DynamicValue>
            + Send
            + Sync
            + 'static,
    {
        self.registry.register(name, signature, f)
    }

    /// Current value of a foreign binding, including values written back by
    /// scripts.
    pub fn foreign_variable(&self, name: &str) -> Option<DynamicValue> {
        self.registry.resolve(name).ok()
    }

    pub fn registry(&self) -> &Arc<ForeignRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Tear the runtime down.  Handles to registered functions held
    /// elsewhere stay callable.
    pub fn shutdown(self) {
        debug!(bindings = self.registry.len(), "runtime shutdown");
    }
}

fn as_init(e: BridgeError) -> BridgeError {
    match e {
        BridgeError::Init(_) => e,
        other => BridgeError::init(other.to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
