//! Optional Lua 5.4 engine via the `mlua` crate.
//!
//! Enabled with the `lua` Cargo feature:
//! ```text
//! cargo build --features lua
//! cargo test  --features lua
//! ```
//!
//! # Foreign symbols
//!
//! Lua has no `foreign` declaration; instead the globals table gets a
//! metatable that falls back to the runtime's registry:
//!
//! | Lua operation                   | Effect                                       |
//! |---------------------------------|----------------------------------------------|
//! | read of an unset global `x`     | registry value of `x`, or `UnboundForeign`   |
//! | write to `x` bound in registry  | written back with direction `ScriptToHost`   |
//! | write to any other global       | ordinary Lua global                          |
//! | `print(...)`                    | captured as one output line (tab-separated)  |
//!
//! Foreign functions and opaque values appear in Lua as userdata; foreign
//! functions are callable.  Both cross back to the host by identity.

#[cfg(feature = "lua")]
pub use lua_impl::LuaEngine;

#[cfg(feature = "lua")]
mod lua_impl {
    use std::sync::{Arc, OnceLock};

    use mlua::prelude::*;
    use parking_lot::Mutex;
    use regex::Regex;
    use tracing::debug;

    use crate::config::RuntimeConfig;
    use crate::engine::ScriptEngine;
    use crate::error::{BridgeError, Result};
    use crate::registry::ForeignRegistry;
    use crate::trampoline::{CallContext, FunctionHandle, ScriptCaller};
    use crate::value::{DynamicValue, OpaqueHandle, ValueKind};

    // ── Userdata wrappers ─────────────────────────────────────────────────

    /// A foreign function as seen from Lua.
    struct LuaForeignFn {
        handle: FunctionHandle,
        registry: Arc<ForeignRegistry>,
    }

    impl LuaUserData for LuaForeignFn {
        fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
            methods.add_meta_method(LuaMetaMethod::Call, |lua, this, args: LuaMultiValue| {
                let expected = this.handle.signature().len();
                if args.len() != expected {
                    return Err(LuaError::external(BridgeError::ArityMismatch {
                        name: this.handle.name().to_owned(),
                        expected,
                        found: args.len(),
                    }));
                }
                let mut host = Vec::with_capacity(args.len());
                for (i, v) in args.into_iter().enumerate() {
                    host.push(from_lua(v).map_err(|e| LuaError::external(e.at_argument(i)))?);
                }
                let mut caller = LuaCaller { lua, registry: &this.registry };
                let mut ctx = CallContext::new(&mut caller, &this.registry);
                let ret = this.handle.invoke(&mut ctx, &host).map_err(LuaError::external)?;
                to_lua(lua, &this.registry, &ret)
            });
            methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
                Ok(format!("foreign fn {}", this.handle.name()))
            });
        }
    }

    /// An opaque host value as seen from Lua.
    struct LuaOpaque(OpaqueHandle);

    impl LuaUserData for LuaOpaque {}

    // ── Value conversion ──────────────────────────────────────────────────

    fn to_lua(lua: &Lua, registry: &Arc<ForeignRegistry>, value: &DynamicValue) -> LuaResult<LuaValue> {
        Ok(match value {
            DynamicValue::Nil => LuaValue::Nil,
            DynamicValue::Integer(n) => LuaValue::Integer(*n),
            DynamicValue::Boolean(b) => LuaValue::Boolean(*b),
            DynamicValue::Text(s) => LuaValue::String(lua.create_string(s)?),
            DynamicValue::Function(h) => LuaValue::UserData(lua.create_userdata(LuaForeignFn {
                handle: h.clone(),
                registry: Arc::clone(registry),
            })?),
            DynamicValue::Opaque(h) => LuaValue::UserData(lua.create_userdata(LuaOpaque(h.clone()))?),
        })
    }

    fn from_lua(value: LuaValue) -> Result<DynamicValue> {
        match value {
            LuaValue::Nil => Ok(DynamicValue::Nil),
            LuaValue::Boolean(b) => Ok(DynamicValue::Boolean(b)),
            LuaValue::Integer(n) => Ok(DynamicValue::Integer(n)),
            LuaValue::String(s) => match s.to_str() {
                Ok(text) => Ok(DynamicValue::Text((*text).to_owned())),
                Err(_) => Err(BridgeError::type_mismatch(ValueKind::Text, "non-UTF-8 string")),
            },
            LuaValue::UserData(ud) => {
                if let Ok(f) = ud.borrow::<LuaForeignFn>() {
                    return Ok(DynamicValue::Function(f.handle.clone()));
                }
                if let Ok(o) = ud.borrow::<LuaOpaque>() {
                    return Ok(DynamicValue::Opaque(o.0.clone()));
                }
                Err(BridgeError::type_mismatch(ValueKind::Any, "userdata (no host representation)"))
            }
            other => Err(BridgeError::type_mismatch(
                ValueKind::Any,
                format!("{} (no host representation)", other.type_name()),
            )),
        }
    }

    /// Recover a [`BridgeError`] from a Lua error, unwrapping callback layers.
    fn from_lua_error(e: &LuaError) -> BridgeError {
        match e {
            LuaError::SyntaxError { message, .. } => BridgeError::parse(syntax_line(message), message.clone()),
            LuaError::CallbackError { cause, .. } => from_lua_error(cause),
            LuaError::ExternalError(ext) => match ext.downcast_ref::<BridgeError>() {
                Some(b) => b.clone(),
                None => BridgeError::fault(ext.to_string()),
            },
            LuaError::RuntimeError(msg) => BridgeError::fault(msg.clone()),
            other => BridgeError::fault(other.to_string()),
        }
    }

    /// Line number from a message like `[string "<chunk>"]:3: unexpected symbol`.
    fn syntax_line(message: &str) -> usize {
        static LINE: OnceLock<Regex> = OnceLock::new();
        LINE.get_or_init(|| Regex::new(r#"\]:(\d+):"#).expect("line pattern"))
            .captures(message)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(1)
    }

    // ── Re-entry ──────────────────────────────────────────────────────────

    /// Calls back into Lua globals from inside a host callable.
    struct LuaCaller<'a> {
        lua: &'a Lua,
        registry: &'a Arc<ForeignRegistry>,
    }

    impl ScriptCaller for LuaCaller<'_> {
        fn call_script(&mut self, name: &str, args: &[DynamicValue]) -> Result<DynamicValue> {
            let lua_err = |e: LuaError| from_lua_error(&e);
            let global: LuaValue = self.lua.globals().raw_get(name).map_err(lua_err)?;
            let func = match global {
                LuaValue::Function(f) => f,
                _ => return Err(BridgeError::fault(format!("undefined function '{name}'"))),
            };
            let mut lua_args = Vec::with_capacity(args.len());
            for a in args {
                lua_args.push(to_lua(self.lua, self.registry, a).map_err(lua_err)?);
            }
            let ret = func
                .call::<LuaValue>(LuaMultiValue::from(lua_args))
                .map_err(lua_err)?;
            from_lua(ret)
        }
    }

    // ── LuaEngine ─────────────────────────────────────────────────────────

    /// A Lua 5.4 interpreter wired to a foreign registry.
    pub struct LuaEngine {
        lua: Lua,
        registry: Arc<ForeignRegistry>,
        echo: bool,
        output: Arc<Mutex<Vec<String>>>,
    }

    impl LuaEngine {
        pub fn new(registry: Arc<ForeignRegistry>, config: &RuntimeConfig) -> Result<Self> {
            Ok(LuaEngine {
                lua: Lua::new(),
                registry,
                echo: config.echo_output,
                output: Arc::new(Mutex::new(Vec::new())),
            })
        }

        /// Evaluate a Lua expression and convert the result for the host.
        pub fn eval(&self, expr: &str) -> Result<DynamicValue> {
            let v: LuaValue = self.lua.load(expr).eval().map_err(|e| from_lua_error(&e))?;
            from_lua(v)
        }

        fn install(&self) -> LuaResult<()> {
            let globals = self.lua.globals();

            // print(...) → one captured line
            {
                let output = Arc::clone(&self.output);
                let echo = self.echo;
                let print = self.lua.create_function(move |lua, args: LuaMultiValue| {
                    let tostring: LuaFunction = lua.globals().raw_get("tostring")?;
                    let mut parts = Vec::with_capacity(args.len());
                    for v in args {
                        parts.push(tostring.call::<String>(v)?);
                    }
                    let line = parts.join("\t");
                    if echo {
                        println!("{line}");
                    } else {
                        output.lock().push(line);
                    }
                    Ok(())
                })?;
                globals.raw_set("print", print)?;
            }

            let meta = self.lua.create_table()?;

            // __index: unset globals resolve through the registry
            {
                let registry = Arc::clone(&self.registry);
                meta.raw_set(
                    "__index",
                    self.lua.create_function(move |lua, (_, key): (LuaTable, LuaValue)| {
                        let LuaValue::String(key) = key else {
                            return Ok(LuaValue::Nil);
                        };
                        let name = String::from(&*key.to_str()?);
                        let value = registry.resolve(&name).map_err(LuaError::external)?;
                        to_lua(lua, &registry, &value)
                    })?,
                )?;
            }

            // __newindex: registry-bound names write back to the host
            {
                let registry = Arc::clone(&self.registry);
                meta.raw_set(
                    "__newindex",
                    self.lua.create_function(
                        move |_, (globals, key, value): (LuaTable, LuaValue, LuaValue)| {
                            if let LuaValue::String(name) = &key {
                                let name = String::from(&*name.to_str()?);
                                if registry.contains(&name) {
                                    let host = from_lua(value).map_err(LuaError::external)?;
                                    return registry.write_back(&name, host).map_err(LuaError::external);
                                }
                            }
                            globals.raw_set(key, value)
                        },
                    )?,
                )?;
            }

            globals.set_metatable(Some(meta));
            Ok(())
        }
    }

    impl ScriptEngine for LuaEngine {
        fn initialize(&mut self) -> Result<()> {
            self.install()
                .map_err(|e| BridgeError::init(format!("lua: {e}")))?;
            debug!("lua engine ready");
            Ok(())
        }

        fn execute(&mut self, source: &str, chunk_name: &str) -> Result<()> {
            debug!(chunk = chunk_name, bytes = source.len(), "execute (lua)");
            self.lua
                .load(source)
                .set_name(chunk_name)
                .exec()
                .map_err(|e| from_lua_error(&e))
        }

        fn call(&mut self, name: &str, args: &[DynamicValue]) -> Result<DynamicValue> {
            LuaCaller { lua: &self.lua, registry: &self.registry }.call_script(name, args)
        }

        fn take_output(&mut self) -> Vec<String> {
            std::mem::take(&mut *self.output.lock())
        }
    }

    // ── Tests ─────────────────────────────────────────────────────────────

}
