//! Host-side bridge for embedding a dynamically-typed script runtime.
//!
//! The host owns a [`RuntimeHandle`], publishes values and callables into its
//! [`ForeignRegistry`](registry::ForeignRegistry), runs scripts, and reads back
//! a [`RunResult`] after each run.  Scripts see host symbols they declare
//! `foreign`; values cross the boundary through the [`marshal`] layer and
//! host callables through [`trampoline`]s.
//!
//! Layers, leaves first:
//!
//! | Module        | Role                                             |
//! |---------------|--------------------------------------------------|
//! | [`value`]     | host-side `DynamicValue`                          |
//! | [`marshal`]   | `DynamicValue` ⇄ script value                     |
//! | [`registry`]  | name → value table with generation counter        |
//! | [`trampoline`]| host callables invocable from script code         |
//! | [`status`]    | per-run outcome                                   |
//! | [`runtime`]   | `RuntimeHandle` entry points                      |
//! | [`global`]    | per-thread convenience wrapper                    |
//! | [`script`]    | reference engine                                  |
//! | [`lua`]       | Lua 5.4 engine (`lua` feature)                    |

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod global;
pub mod lua;
pub mod marshal;
pub mod registry;
pub mod runtime;
pub mod script;
pub mod status;
pub mod trampoline;
pub mod value;

pub use config::RuntimeConfig;
pub use engine::ScriptEngine;
pub use error::{BridgeError, FailureKind, Result};
pub use registry::ForeignRegistry;
pub use runtime::RuntimeHandle;
pub use status::{RunResult, RunStatus};
pub use trampoline::{CallContext, FunctionHandle};
pub use value::{DynamicValue, OpaqueHandle, ValueKind};
