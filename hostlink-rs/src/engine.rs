//! The boundary between the runtime and a concrete script engine.

use crate::error::Result;
use crate::value::DynamicValue;

/// A script engine the runtime can drive.
///
/// Engines receive the runtime's shared
/// [`ForeignRegistry`](crate::registry::ForeignRegistry) when they are built
/// and resolve `foreign` symbols through it.  Every call is synchronous on the
/// calling thread; an engine never sees two top-level calls at once.
pub trait ScriptEngine {
    /// One-time setup after construction.  A failure here is an init failure.
    fn initialize(&mut self) -> Result<()>;

    /// Parse and run `source`.  `chunk_name` identifies the source in logs
    /// and engine diagnostics (a file path, `"<string>"`, …).
    fn execute(&mut self, source: &str, chunk_name: &str) -> Result<()>;

    /// Call a script-defined function from the host.
    fn call(&mut self, name: &str, args: &[DynamicValue]) -> Result<DynamicValue>;

    /// Drain buffered `print` output.
    fn take_output(&mut self) -> Vec<String>;
}
