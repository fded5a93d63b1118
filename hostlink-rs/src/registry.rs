//! Foreign symbol registry.
//!
//! One flat name → value table per runtime.  Foreign functions live in the
//! same table as variables (their value is a [`DynamicValue::Function`]), so a
//! name is bound at most once.  Every write bumps a generation counter that
//! engines use to invalidate cached resolutions.
//!
//! The lock is held only while the table is read or updated; callers clone
//! what they need out of it before running any script or host code.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::trampoline::{CallContext, FunctionHandle, Trampoline};
use crate::value::{DynamicValue, ValueKind};

// ── ForeignBinding ────────────────────────────────────────────────────────────

/// Which side of the boundary last wrote a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HostToScript,
    ScriptToHost,
}

/// One entry of the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignBinding {
    pub name: String,
    pub value: DynamicValue,
    pub direction: Direction,
}

// ── ForeignRegistry ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Table {
    bindings: HashMap<String, ForeignBinding>,
    generation: u64,
}

/// Process-wide table of foreign symbols for one runtime.
#[derive(Debug, Default)]
pub struct ForeignRegistry {
    table: RwLock<Table>,
}

/// Returns `true` if `name` can be used as a foreign symbol.
pub fn is_valid_name(name: &str) -> bool {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"))
        .is_match(name)
}

fn validate(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(BridgeError::InvalidName(name.to_owned()))
    }
}

impl ForeignRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value` on behalf of the host.  Last write wins.
    pub fn declare(&self, name: &str, value: impl Into<DynamicValue>) -> Result<()> {
        self.write(name, value.into(), Direction::HostToScript)
    }

    /// Bind `name` to `value` on behalf of a running script.
    pub fn write_back(&self, name: &str, value: DynamicValue) -> Result<()> {
        self.write(name, value, Direction::ScriptToHost)
    }

    fn write(&self, name: &str, value: DynamicValue, direction: Direction) -> Result<()> {
        validate(name)?;
        let kind = value.kind();
        let binding = ForeignBinding { name: name.to_owned(), value, direction };
        let generation = {
            let mut table = self.table.write();
            table.bindings.insert(name.to_owned(), binding);
            table.generation += 1;
            table.generation
        };
        debug!(name, %kind, ?direction, generation, "foreign binding");
        Ok(())
    }

    /// Wrap `f` in a trampoline and bind it under `name`.
    pub fn register<F>(&self, name: &str, signature: Vec<ValueKind>, f: F) -> Result<FunctionHandle>
    where
        F: Fn(&mut CallContext<'_>, &[DynamicValue]) -> Result<DynamicValue>
            + Send
            + Sync
            + 'static,
    {
        validate(name)?;
        let handle = FunctionHandle::new(Trampoline::new(name, signature, f));
        self.declare(name, handle.clone())?;
        Ok(handle)
    }

    /// Look up a binding's value.
    pub fn resolve(&self, name: &str) -> Result<DynamicValue> {
        self.table
            .read()
            .bindings
            .get(name)
            .map(|b| b.value.clone())
            .ok_or_else(|| BridgeError::UnboundForeign(name.to_owned()))
    }

    /// Look up a binding that must be a function.
    pub fn function(&self, name: &str) -> Result<FunctionHandle> {
        match self.resolve(name)? {
            DynamicValue::Function(h) => Ok(h),
            other => Err(BridgeError::type_mismatch(
                ValueKind::Function,
                other.kind().to_string(),
            )),
        }
    }

    /// Full binding, including who wrote it last.
    pub fn binding(&self, name: &str) -> Option<ForeignBinding> {
        self.table.read().bindings.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().bindings.contains_key(name)
    }

    /// Remove a binding.  Returns `true` if it existed.
    pub fn remove(&self, name: &str) -> bool {
        let mut table = self.table.write();
        let existed = table.bindings.remove(name).is_some();
        if existed {
            table.generation += 1;
        }
        existed
    }

    /// Drop every binding.  Handles held elsewhere stay valid.
    pub fn clear(&self) {
        let mut table = self.table.write();
        table.bindings.clear();
        table.generation += 1;
    }

    /// All bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.read().bindings.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.table.read().bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().bindings.is_empty()
    }

    /// Counter bumped by every mutation.  A resolution cached under an older
    /// generation must be discarded.
    pub fn generation(&self) -> u64 {
        self.table.read().generation
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
