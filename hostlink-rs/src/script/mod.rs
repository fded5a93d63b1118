//! Reference script engine.
//!
//! A small tree-walking interpreter used as the default [`ScriptEngine`]:
//!
//! - `var` / assignment, `print`, `if` … `else`, `while`
//! - `fn name(params) { … }` with `return`
//! - `foreign var` / `foreign fn` declarations resolved through the
//!   runtime's [`ForeignRegistry`](crate::registry::ForeignRegistry)
//! - integer, boolean, text, and list values; a handful of builtins
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use hostlink::config::RuntimeConfig;
//! use hostlink::engine::ScriptEngine;
//! use hostlink::registry::ForeignRegistry;
//! use hostlink::script::Interpreter;
//!
//! let registry = Arc::new(ForeignRegistry::new());
//! registry.declare("answer", 6i64).unwrap();
//! let mut interp = Interpreter::new(registry, &RuntimeConfig::default());
//! interp.execute("foreign var answer\nprint answer * 7", "<doc>").unwrap();
//! assert_eq!(interp.take_output(), vec!["42"]);
//! ```
//!
//! [`ScriptEngine`]: crate::engine::ScriptEngine

pub mod builtins;
pub mod expr;
pub mod interp;
pub mod stmt;
pub mod value;

// Re-exports for convenience.
pub use expr::EvalContext;
pub use interp::Interpreter;
pub use value::Value;
