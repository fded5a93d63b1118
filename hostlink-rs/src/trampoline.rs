//! Foreign function trampolines.
//!
//! A [`Trampoline`] wraps a host closure so script code can call it through
//! one uniform entry point.  The closure is held by `Arc`, owned by the
//! registry that registered it, and kept alive by every [`FunctionHandle`]
//! that refers to it; script code never sees a bare function address.
//!
//! Call sequence for a script-side call (see [`Trampoline::call`]):
//!
//! 1. argument count checked against the signature, nothing else runs on
//!    mismatch;
//! 2. each argument marshaled and checked against its signature slot, stopping
//!    at the first failure;
//! 3. the closure invoked, with panics caught and turned into faults;
//! 4. the return value marshaled back.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::marshal::{self, ScriptValue};
use crate::registry::ForeignRegistry;
use crate::value::{DynamicValue, ValueKind};

/// Signature every host callable is erased to.
pub type NativeFn =
    dyn Fn(&mut CallContext<'_>, &[DynamicValue]) -> Result<DynamicValue> + Send + Sync;

// ── CallContext ───────────────────────────────────────────────────────────────

/// Re-entry point into whichever engine is currently calling the host.
///
/// Implemented by every [`crate::engine::ScriptEngine`]; calls are nested and
/// synchronous on the calling thread.
pub trait ScriptCaller {
    /// Call a script-defined function by name.
    fn call_script(&mut self, name: &str, args: &[DynamicValue]) -> Result<DynamicValue>;
}

/// What a host callable can reach while it runs.
pub struct CallContext<'a> {
    caller: Option<&'a mut dyn ScriptCaller>,
    registry: &'a ForeignRegistry,
}

impl<'a> CallContext<'a> {
    pub fn new(caller: &'a mut dyn ScriptCaller, registry: &'a ForeignRegistry) -> Self {
        CallContext { caller: Some(caller), registry }
    }

    /// A context with no engine behind it (host-side direct invocation).
    pub fn detached(registry: &'a ForeignRegistry) -> Self {
        CallContext { caller: None, registry }
    }

    /// Call back into the script engine that invoked this callable.
    pub fn call_script(&mut self, name: &str, args: &[DynamicValue]) -> Result<DynamicValue> {
        match self.caller.as_mut() {
            Some(caller) => caller.call_script(name, args),
            None => Err(BridgeError::fault(format!(
                "cannot call script function '{name}': no engine is running"
            ))),
        }
    }

    /// The registry of the runtime this call belongs to.
    pub fn registry(&self) -> &ForeignRegistry {
        self.registry
    }
}

// ── Trampoline ────────────────────────────────────────────────────────────────

/// A registered host function plus the metadata needed to call it.
pub struct Trampoline {
    name: String,
    signature: Vec<ValueKind>,
    callable: Arc<NativeFn>,
}

impl Trampoline {
    pub fn new<F>(name: impl Into<String>, signature: Vec<ValueKind>, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>, &[DynamicValue]) -> Result<DynamicValue>
            + Send
            + Sync
            + 'static,
    {
        Trampoline { name: name.into(), signature, callable: Arc::new(f) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &[ValueKind] {
        &self.signature
    }

    pub fn arity(&self) -> usize {
        self.signature.len()
    }

    fn check_arity(&self, found: usize) -> Result<()> {
        if found != self.arity() {
            return Err(BridgeError::ArityMismatch {
                name: self.name.clone(),
                expected: self.arity(),
                found,
            });
        }
        Ok(())
    }

    fn check_kinds(&self, args: &[DynamicValue]) -> Result<()> {
        for (i, (arg, &kind)) in args.iter().zip(&self.signature).enumerate() {
            marshal::check_kind(arg, kind).map_err(|e| e.at_argument(i))?;
        }
        Ok(())
    }

    /// Call from script code with engine-side arguments.
    pub fn call(&self, ctx: &mut CallContext<'_>, args: &[ScriptValue]) -> Result<ScriptValue> {
        self.check_arity(args.len())?;
        let host_args = marshal::from_script_all(args)?;
        self.check_kinds(&host_args)?;
        let ret = self.dispatch(ctx, &host_args)?;
        Ok(marshal::to_script(&ret))
    }

    /// Call with host-side arguments.  Same checks as [`Trampoline::call`]
    /// minus the marshaling; used by engines with their own value
    /// conversion and by the host directly.
    pub fn invoke(&self, ctx: &mut CallContext<'_>, args: &[DynamicValue]) -> Result<DynamicValue> {
        self.check_arity(args.len())?;
        self.check_kinds(args)?;
        self.dispatch(ctx, args)
    }

    fn dispatch(&self, ctx: &mut CallContext<'_>, args: &[DynamicValue]) -> Result<DynamicValue> {
        debug!(function = %self.name, argc = args.len(), "foreign call");
        match panic::catch_unwind(AssertUnwindSafe(|| (*self.callable)(ctx, args))) {
            Ok(result) => result,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_owned());
                Err(BridgeError::fault(format!(
                    "foreign function '{}' panicked: {msg}",
                    self.name
                )))
            }
        }
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

// ── FunctionHandle ────────────────────────────────────────────────────────────

/// Shared, reference-counted reference to a [`Trampoline`].
///
/// This is the only form in which a host function crosses the boundary.
/// Equality is identity.
#[derive(Clone)]
pub struct FunctionHandle(Arc<Trampoline>);

impl FunctionHandle {
    pub fn new(trampoline: Trampoline) -> Self {
        FunctionHandle(Arc::new(trampoline))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn signature(&self) -> &[ValueKind] {
        self.0.signature()
    }

    pub fn call(&self, ctx: &mut CallContext<'_>, args: &[ScriptValue]) -> Result<ScriptValue> {
        self.0.call(ctx, args)
    }

    pub fn invoke(&self, ctx: &mut CallContext<'_>, args: &[DynamicValue]) -> Result<DynamicValue> {
        self.0.invoke(ctx, args)
    }

    pub fn ptr_eq(&self, other: &FunctionHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles (registry entry included).
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl PartialEq for FunctionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionHandle({})", self.name())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
