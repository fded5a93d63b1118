//! Tree-walking interpreter for the reference engine.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::RuntimeConfig;
use crate::engine::ScriptEngine;
use crate::error::{BridgeError, Result};
use crate::marshal;
use crate::registry::ForeignRegistry;
use crate::trampoline::{CallContext, ScriptCaller};
use crate::value::DynamicValue;

use super::builtins;
use super::expr::{eval_expr, EvalContext, Expr};
use super::stmt::{parse_script, Stmt};
use super::value::{ScriptFn, Value};

// ── ControlFlow ───────────────────────────────────────────────────────────────

/// Non-error control-flow signals that can unwind a block.
#[derive(Debug)]
pub enum ControlFlow {
    Return(Value),
}

/// Native stack a script may use below the point where the host entered the
/// interpreter.  Threads that run scripts need a little more than this.
pub const STACK_BUDGET: usize = 1024 * 1024;

fn stack_position() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

// ── Variable scope frame ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Frame {
    locals: HashMap<String, Value>,
}

// ── Foreign resolution cache ──────────────────────────────────────────────────

/// Marshaled foreign values, valid for one registry generation.
#[derive(Debug, Default)]
struct ForeignCache {
    generation: u64,
    values: HashMap<String, Value>,
}

// ── Interpreter ───────────────────────────────────────────────────────────────

/// The reference script interpreter.
pub struct Interpreter {
    registry: Arc<ForeignRegistry>,
    /// Global variable store; persists across `execute` calls.
    globals: HashMap<String, Value>,
    /// Names declared with `foreign var` / `foreign fn`.
    foreign: HashSet<String>,
    cache: ForeignCache,
    /// Local variable stack (innermost frame last).
    frames: Vec<Frame>,
    max_call_depth: usize,
    /// Stack position of the outermost host entry, while one is active.
    stack_base: Option<usize>,
    echo: bool,
    /// Lines produced by `print` when not echoing.
    output: Vec<String>,
}

impl Interpreter {
    pub fn new(registry: Arc<ForeignRegistry>, config: &RuntimeConfig) -> Self {
        Interpreter {
            registry,
            globals: HashMap::new(),
            foreign: HashSet::new(),
            cache: ForeignCache::default(),
            frames: Vec::new(),
            max_call_depth: config.max_call_depth,
            stack_base: None,
            echo: config.echo_output,
            output: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ForeignRegistry> {
        &self.registry
    }

    /// Get a global variable.
    pub fn get_global_var(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Current nesting depth of script function calls.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Parse and run a script.  The value of a top-level `return`, if any,
    /// is the result.
    pub fn exec_script(&mut self, src: &str) -> Result<Value> {
        let stmts = parse_script(src)?;
        match self.entered(|this| this.exec_block(&stmts))? {
            Some(ControlFlow::Return(v)) => Ok(v),
            None => Ok(Value::Nil),
        }
    }

    /// Run `f` with the stack budget measured from here, unless an outer
    /// host entry is already active.
    fn entered<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        if self.stack_base.is_some() {
            return f(self);
        }
        self.stack_base = Some(stack_position());
        let out = f(self);
        self.stack_base = None;
        out
    }

    /// Execute a pre-parsed block of statements.
    pub fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Option<ControlFlow>> {
        for stmt in stmts {
            if let Some(cf) = self.exec_stmt(stmt)? {
                return Ok(Some(cf));
            }
        }
        Ok(None)
    }

    /// Execute a single statement.
    pub fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Option<ControlFlow>> {
        match stmt {
            Stmt::Var { name, init } => {
                let value = match init {
                    Some(e) => self.eval(e)?,
                    None => Value::Nil,
                };
                self.define(name, value);
                Ok(None)
            }

            Stmt::Assign { name, value } => {
                let v = self.eval(value)?;
                self.assign(name, v)?;
                Ok(None)
            }

            Stmt::ForeignVar { name } | Stmt::ForeignFn { name } => {
                // Binding is checked when the name is used, not here.
                self.foreign.insert(name.clone());
                Ok(None)
            }

            Stmt::Print { value } => {
                let v = self.eval(value)?;
                self.emit(v.to_string());
                Ok(None)
            }

            Stmt::FnDef(func) => {
                self.define(&func.name, Value::Closure(Rc::clone(func)));
                Ok(None)
            }

            Stmt::Return { value } => {
                let v = match value {
                    Some(e) => self.eval(e)?,
                    None => Value::Nil,
                };
                Ok(Some(ControlFlow::Return(v)))
            }

            Stmt::If { cond, then_block, else_block } => {
                if self.eval(cond)?.is_truthy() {
                    self.exec_block(then_block)
                } else {
                    self.exec_block(else_block)
                }
            }

            Stmt::While { cond, body } => {
                while self.eval(cond)?.is_truthy() {
                    if let Some(cf) = self.exec_block(body)? {
                        return Ok(Some(cf));
                    }
                }
                Ok(None)
            }

            Stmt::Expr(e) => {
                self.eval(e)?;
                Ok(None)
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        eval_expr(expr, self)
    }

    fn emit(&mut self, line: String) {
        if self.echo {
            println!("{line}");
        } else {
            self.output.push(line);
        }
    }

    // ── Scopes ────────────────────────────────────────────────────────────────

    /// `var` / `fn`: bind in the innermost frame, or globally at top level.
    /// A global definition shadows an earlier `foreign` declaration.
    fn define(&mut self, name: &str, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.locals.insert(name.to_owned(), value);
            }
            None => {
                self.foreign.remove(name);
                self.globals.insert(name.to_owned(), value);
            }
        }
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        if let Some(slot) = self.frames.last_mut().and_then(|f| f.locals.get_mut(name)) {
            *slot = value;
            return Ok(());
        }
        if self.foreign.contains(name) {
            let host = marshal::from_script(&value)?;
            return self.registry.write_back(name, host);
        }
        match self.globals.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(BridgeError::fault(format!(
                "assignment to undeclared variable '{name}'"
            ))),
        }
    }

    fn lookup(&mut self, name: &str) -> Result<Option<Value>> {
        if let Some(v) = self.frames.last().and_then(|f| f.locals.get(name)) {
            return Ok(Some(v.clone()));
        }
        self.lookup_global(name)
    }

    /// Foreign bindings, then globals; locals of running calls are not seen.
    fn lookup_global(&mut self, name: &str) -> Result<Option<Value>> {
        if self.foreign.contains(name) {
            return self.resolve_foreign(name).map(Some);
        }
        Ok(self.globals.get(name).cloned())
    }

    /// Resolve a foreign symbol through the registry, reusing the marshaled
    /// value while the registry generation is unchanged.
    fn resolve_foreign(&mut self, name: &str) -> Result<Value> {
        let generation = self.registry.generation();
        if generation != self.cache.generation {
            trace!(from = self.cache.generation, to = generation, "foreign cache invalidated");
            self.cache.values.clear();
            self.cache.generation = generation;
        }
        if let Some(v) = self.cache.values.get(name) {
            return Ok(v.clone());
        }
        let v = marshal::to_script(&self.registry.resolve(name)?);
        self.cache.values.insert(name.to_owned(), v.clone());
        Ok(v)
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    fn call_script_fn(&mut self, func: &ScriptFn, args: Vec<Value>) -> Result<Value> {
        if args.len() != func.params.len() {
            return Err(BridgeError::ArityMismatch {
                name: func.name.clone(),
                expected: func.params.len(),
                found: args.len(),
            });
        }
        if self.frames.len() >= self.max_call_depth {
            return Err(BridgeError::fault(format!(
                "maximum call depth ({}) exceeded in '{}'",
                self.max_call_depth, func.name
            )));
        }
        if let Some(base) = self.stack_base {
            if base.abs_diff(stack_position()) > STACK_BUDGET {
                return Err(BridgeError::fault(format!(
                    "script stack exhausted at depth {} in '{}'",
                    self.frames.len(),
                    func.name
                )));
            }
        }

        let locals = func.params.iter().cloned().zip(args).collect();
        self.frames.push(Frame { locals });
        let result = self.exec_block(&func.body);
        self.frames.pop();

        match result? {
            Some(ControlFlow::Return(v)) => Ok(v),
            None => Ok(Value::Nil),
        }
    }

    fn call_builtin(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        match builtins::call_builtin(name, &args) {
            Some(result) => result.map_err(BridgeError::RuntimeFault),
            None => Err(BridgeError::fault(format!("undefined function '{name}'"))),
        }
    }
}

// ── EvalContext ───────────────────────────────────────────────────────────────

impl EvalContext for Interpreter {
    fn get_var(&mut self, name: &str) -> Result<Value> {
        match self.lookup(name)? {
            Some(v) => Ok(v),
            None if builtins::is_builtin(name) => Err(BridgeError::fault(format!(
                "builtin '{name}' cannot be used as a value"
            ))),
            None => Err(BridgeError::fault(format!("undefined variable '{name}'"))),
        }
    }

    fn call_named(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        match self.lookup(name)? {
            Some(callee) => self.call_value(callee, args),
            None => self.call_builtin(name, args),
        }
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Closure(func) => self.call_script_fn(&func, args),
            Value::Foreign(handle) => {
                let registry = Arc::clone(&self.registry);
                let mut ctx = CallContext::new(self, &registry);
                handle.call(&mut ctx, &args)
            }
            other => Err(BridgeError::fault(format!("cannot call {}", other.type_name()))),
        }
    }
}

// ── Bridge traits ─────────────────────────────────────────────────────────────

impl ScriptCaller for Interpreter {
    /// Host-side calls name global functions, even from inside a callback
    /// whose caller has a local of the same name.
    fn call_script(&mut self, name: &str, args: &[DynamicValue]) -> Result<DynamicValue> {
        let args = marshal::to_script_all(args);
        let ret = self.entered(|this| match this.lookup_global(name)? {
            Some(callee) => this.call_value(callee, args),
            None => this.call_builtin(name, args),
        })?;
        marshal::from_script(&ret)
    }
}

impl ScriptEngine for Interpreter {
    fn initialize(&mut self) -> Result<()> {
        debug!(max_call_depth = self.max_call_depth, "reference engine ready");
        Ok(())
    }

    fn execute(&mut self, source: &str, chunk_name: &str) -> Result<()> {
        debug!(chunk = chunk_name, bytes = source.len(), "execute");
        self.exec_script(source).map(drop)
    }

    fn call(&mut self, name: &str, args: &[DynamicValue]) -> Result<DynamicValue> {
        self.call_script(name, args)
    }

    fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    fn interp() -> Interpreter {
        Interpreter::new(Arc::new(ForeignRegistry::new()), &RuntimeConfig::default())
    }

    fn output(src: &str) -> Vec<String> {
        let mut i = interp();
        i.execute(src, "<test>").expect("script failed");
        i.take_output()
    }

    #[test]
    fn print_basic() {
        assert_eq!(output("print 'hello'"), vec!["hello"]);
        assert_eq!(output("print 6 * 7"), vec!["42"]);
    }

    #[test]
    fn globals_persist_across_runs() {
        let mut i = interp();
        i.execute("var x = 1", "a").unwrap();
        i.execute("x = x + 1\nprint x", "b").unwrap();
        assert_eq!(i.take_output(), vec!["2"]);
        assert_eq!(i.get_global_var("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn if_else() {
        assert_eq!(output("if 1 < 2 { print 'yes' } else { print 'no' }"), vec!["yes"]);
        assert_eq!(output("if nil { print 'yes' } else { print 'no' }"), vec!["no"]);
    }

    #[test]
    fn while_loop() {
        assert_eq!(
            output("var i = 0\nwhile i < 3 {\n  print i\n  i = i + 1\n}"),
            vec!["0", "1", "2"]
        );
    }

    #[test]
    fn functions_and_recursion() {
        let src = "fn fact(n) {\n if n <= 1 { return 1 }\n return n * fact(n - 1)\n}\nprint fact(10)";
        assert_eq!(output(src), vec!["3628800"]);
    }

    #[test]
    fn local_scope_isolation() {
        let src = "var x = 'global'\nfn f() { var x = 'local'\n return x }\nprint f()\nprint x";
        assert_eq!(output(src), vec!["local", "global"]);
    }

    #[test]
    fn parameters_do_not_leak() {
        let mut i = interp();
        i.execute("fn f(a) { return a }\nf(1)", "t").unwrap();
        assert!(i.execute("print a", "t").is_err());
    }

    #[test]
    fn script_arity_mismatch() {
        let mut i = interp();
        let err = i.execute("fn f(a) { }\nf()", "t").unwrap_err();
        assert!(matches!(err, BridgeError::ArityMismatch { expected: 1, found: 0, .. }));
    }

    #[test]
    fn call_depth_is_bounded() {
        let config = RuntimeConfig::new().with_max_call_depth(16);
        let mut i = Interpreter::new(Arc::new(ForeignRegistry::new()), &config);
        let err = i.execute("fn loop(n) { return loop(n + 1) }\nloop(0)", "t").unwrap_err();
        match err {
            BridgeError::RuntimeFault(msg) => assert!(msg.contains("maximum call depth"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(i.depth(), 0);
    }

    #[test]
    fn undefined_names() {
        let mut i = interp();
        assert!(matches!(i.execute("print nope", "t"), Err(BridgeError::RuntimeFault(_))));
        assert!(matches!(i.execute("nope = 1", "t"), Err(BridgeError::RuntimeFault(_))));
        assert!(matches!(i.execute("nope()", "t"), Err(BridgeError::RuntimeFault(_))));
        assert!(matches!(i.execute("print len", "t"), Err(BridgeError::RuntimeFault(_))));
    }

    #[test]
    fn builtins_callable_and_shadowable() {
        assert_eq!(output("print len('abc')"), vec!["3"]);
        assert_eq!(output("fn len(x) { return 99 }\nprint len('abc')"), vec!["99"]);
    }

    #[test]
    fn foreign_variable_resolves_through_registry() {
        let reg = Arc::new(ForeignRegistry::new());
        reg.declare("hp", 40i64).unwrap();
        let mut i = Interpreter::new(Arc::clone(&reg), &RuntimeConfig::default());
        i.execute("foreign var hp\nprint hp + 2", "t").unwrap();
        assert_eq!(i.take_output(), vec!["42"]);
    }

    #[test]
    fn unbound_foreign_names_symbol() {
        let mut i = interp();
        match i.execute("foreign var x\nprint x", "t") {
            Err(BridgeError::UnboundForeign(name)) => assert_eq!(name, "x"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn undeclared_foreign_is_not_visible() {
        let reg = Arc::new(ForeignRegistry::new());
        reg.declare("secret", 1i64).unwrap();
        let mut i = Interpreter::new(reg, &RuntimeConfig::default());
        assert!(i.execute("print secret", "t").is_err());
    }

    #[test]
    fn assignment_writes_back() {
        let reg = Arc::new(ForeignRegistry::new());
        reg.declare("score", 1i64).unwrap();
        let mut i = Interpreter::new(Arc::clone(&reg), &RuntimeConfig::default());
        i.execute("foreign var score\nscore = score + 10", "t").unwrap();
        let b = reg.binding("score").unwrap();
        assert_eq!(b.value, DynamicValue::Integer(11));
        assert_eq!(b.direction, crate::registry::Direction::ScriptToHost);
    }

    #[test]
    fn assigning_list_to_foreign_is_type_mismatch() {
        let reg = Arc::new(ForeignRegistry::new());
        reg.declare("v", 1i64).unwrap();
        let mut i = Interpreter::new(Arc::clone(&reg), &RuntimeConfig::default());
        let err = i.execute("foreign var v\nv = [1]", "t").unwrap_err();
        assert!(matches!(err, BridgeError::TypeMismatch { .. }));
        assert_eq!(reg.resolve("v").unwrap(), DynamicValue::Integer(1));
    }

    #[test]
    fn foreign_function_call() {
        let reg = Arc::new(ForeignRegistry::new());
        reg.register("shout", vec![ValueKind::Text], |_, a| {
            Ok(DynamicValue::Text(a[0].as_text().unwrap_or("").to_uppercase()))
        })
        .unwrap();
        let mut i = Interpreter::new(reg, &RuntimeConfig::default());
        i.execute("foreign fn shout\nprint shout('hey')", "t").unwrap();
        assert_eq!(i.take_output(), vec!["HEY"]);
    }

    #[test]
    fn host_calls_script_function() {
        let mut i = interp();
        i.execute("fn add(a, b) { return a + b }", "t").unwrap();
        let r = ScriptEngine::call(&mut i, "add", &[DynamicValue::Integer(2), DynamicValue::Integer(3)]);
        assert_eq!(r.unwrap(), DynamicValue::Integer(5));
        let r = ScriptEngine::call(&mut i, "add", &[DynamicValue::from("a"), DynamicValue::from("b")]);
        assert_eq!(r.unwrap(), DynamicValue::from("ab"));
    }

    #[test]
    fn returning_a_list_to_host_fails() {
        let mut i = interp();
        i.execute("fn l() { return [1] }", "t").unwrap();
        assert!(matches!(
            ScriptEngine::call(&mut i, "l", &[]),
            Err(BridgeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn top_level_return_stops_script() {
        assert_eq!(output("print 1\nreturn\nprint 2"), vec!["1"]);
    }

    #[test]
    fn var_shadows_foreign_declaration() {
        let reg = Arc::new(ForeignRegistry::new());
        reg.declare("x", 5i64).unwrap();
        let mut i = Interpreter::new(reg, &RuntimeConfig::default());
        i.execute("foreign var x\nvar x = 1\nprint x", "t").unwrap();
        assert_eq!(i.take_output(), vec!["1"]);
    }

    fn recurse_forever(config: RuntimeConfig) -> String {
        let mut i = Interpreter::new(Arc::new(ForeignRegistry::new()), &config);
        match i.execute("fn down(n) { return down(n + 1) }\ndown(0)", "t") {
            Err(BridgeError::RuntimeFault(msg)) => {
                assert_eq!(i.depth(), 0);
                msg
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn default_call_depth_fits_a_spawned_thread() {
        let msg = std::thread::spawn(|| recurse_forever(RuntimeConfig::default()))
            .join()
            .expect("recursion must not overflow the thread");
        assert!(msg.contains("in 'down'"), "{msg}");
    }

    #[test]
    fn stack_budget_applies_whatever_the_depth_limit() {
        let msg = std::thread::spawn(|| {
            recurse_forever(RuntimeConfig::new().with_max_call_depth(10_000_000))
        })
        .join()
        .expect("recursion must not overflow the thread");
        assert!(msg.starts_with("script stack exhausted at depth"), "{msg}");
    }

    #[test]
    fn host_call_skips_caller_locals() {
        let reg = Arc::new(ForeignRegistry::new());
        reg.register("cb", vec![ValueKind::Text], |ctx, a| {
            ctx.call_script(a[0].as_text().unwrap_or(""), &[])
        })
        .unwrap();
        let mut i = Interpreter::new(reg, &RuntimeConfig::default());
        let src = "foreign fn cb\nfn helper() { return 'global helper' }\n\
                   fn outer(helper) { return cb('helper') }\nprint outer(5)";
        i.execute(src, "t").unwrap();
        assert_eq!(i.take_output(), vec!["global helper"]);
    }
}
