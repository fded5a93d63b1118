//! Process-global convenience entry points.
//!
//! A thin wrapper over one [`RuntimeHandle`] per thread (the reference
//! engine's values are not `Send`).  The handle is created by
//! [`initialize`], or lazily by the first other call.  Once initialization
//! has failed, every later call reports the same failure until
//! [`shutdown`].
//!
//! Callbacks running inside [`run`] may declare and register through this
//! module; a nested [`run`] on the same thread is refused.

use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::config::RuntimeConfig;
use crate::error::{BridgeError, Result};
use crate::registry::ForeignRegistry;
use crate::runtime::RuntimeHandle;
use crate::status::RunResult;
use crate::trampoline::{CallContext, FunctionHandle};
use crate::value::{DynamicValue, ValueKind};

enum Slot {
    Empty,
    Ready(RuntimeHandle),
    Failed(String),
}

thread_local! {
    static RUNTIME: RefCell<Slot> = const { RefCell::new(Slot::Empty) };
    static REGISTRY: RefCell<Option<Arc<ForeignRegistry>>> = const { RefCell::new(None) };
}

fn start(config: RuntimeConfig) -> Slot {
    match RuntimeHandle::new(config) {
        Ok(handle) => {
            let registry = Arc::clone(handle.registry());
            REGISTRY.with(|r| *r.borrow_mut() = Some(registry));
            Slot::Ready(handle)
        }
        Err(e) => {
            warn!("global runtime failed to start: {e}");
            match e {
                BridgeError::Init(msg) => Slot::Failed(msg),
                other => Slot::Failed(other.to_string()),
            }
        }
    }
}

fn with_handle<T>(f: impl FnOnce(&mut RuntimeHandle) -> T) -> Result<T> {
    RUNTIME.with(|cell| {
        let mut slot = cell
            .try_borrow_mut()
            .map_err(|_| BridgeError::fault("global runtime is busy"))?;
        if matches!(*slot, Slot::Empty) {
            *slot = start(RuntimeConfig::default());
        }
        match &mut *slot {
            Slot::Ready(handle) => Ok(f(handle)),
            Slot::Failed(msg) => Err(BridgeError::init(msg.clone())),
            Slot::Empty => Err(BridgeError::init("runtime not started")),
        }
    })
}

fn registry() -> Result<Arc<ForeignRegistry>> {
    if let Some(r) = REGISTRY.with(|r| r.borrow().clone()) {
        return Ok(r);
    }
    with_handle(|h| Arc::clone(h.registry()))
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Start the global runtime with default settings.
pub fn initialize() -> Result<()> {
    initialize_with(RuntimeConfig::default())
}

/// Start the global runtime.  Fails with `Init("already initialized")` if
/// it is already running, or with the original failure if an earlier start
/// failed.
pub fn initialize_with(config: RuntimeConfig) -> Result<()> {
    RUNTIME.with(|cell| {
        let mut slot = cell
            .try_borrow_mut()
            .map_err(|_| BridgeError::fault("global runtime is busy"))?;
        match &*slot {
            Slot::Ready(_) => return Err(BridgeError::init("already initialized")),
            Slot::Failed(msg) => return Err(BridgeError::init(msg.clone())),
            Slot::Empty => {}
        }
        *slot = start(config);
        match &*slot {
            Slot::Failed(msg) => Err(BridgeError::init(msg.clone())),
            _ => Ok(()),
        }
    })
}

pub fn run(source: &str) -> RunResult {
    with_handle(|h| h.run(source)).unwrap_or_else(RunResult::failed)
}

pub fn run_file(path: impl AsRef<Path>) -> RunResult {
    with_handle(|h| h.run_file(path)).unwrap_or_else(RunResult::failed)
}

pub fn declare_foreign_variable(name: &str, value: impl Into<DynamicValue>) -> Result<()> {
    registry()?.declare(name, value)
}

pub fn register_foreign_function<F>(
    name: &str,
    signature: Vec<ValueKind>,
    f: F,
) -> Result<FunctionHandle>
where
    F: Fn(&mut CallContext<'_>, &[DynamicValue]) -> Result<DynamicValue> + Send + Sync + 'static,
{
    registry()?.register(name, signature, f)
}

/// Message of the last run's failure, if any.  After a failed start this is
/// the initialization failure every run reports.
pub fn last_error() -> Option<String> {
    RUNTIME.with(|cell| match &*cell.try_borrow().ok()? {
        Slot::Ready(h) => h.last_error().map(str::to_owned),
        Slot::Failed(msg) => Some(BridgeError::init(msg.clone()).to_string()),
        Slot::Empty => None,
    })
}

pub fn take_output() -> Vec<String> {
    with_handle(|h| h.take_output()).unwrap_or_default()
}

/// Drop the global runtime.  The next call starts a fresh one.
pub fn shutdown() {
    REGISTRY.with(|r| r.borrow_mut().take());
    let old = RUNTIME.with(|cell| match cell.try_borrow_mut() {
        Ok(mut slot) => std::mem::replace(&mut *slot, Slot::Empty),
        Err(_) => Slot::Empty,
    });
    if let Slot::Ready(handle) = old {
        handle.shutdown();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
