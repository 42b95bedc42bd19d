//! Async tree-walking interpreter
//!
//! Evaluates a [`Program`] as the body of an async function against an
//! explicit global scope. Nothing outside that scope is reachable: there is
//! no filesystem, network, environment or process access unless the embedder
//! binds a [`crate::HostFunction`] for it.
//!
//! # Scheduling
//!
//! ```text
//! run ──→ exec_stmts ──→ eval ──→ call_value ──┬─→ closure (inline)
//!                                              ├─→ async closure ──→ spawned task ──→ Promise
//!                                              └─→ host function ──→ spawned task ──→ Promise
//! ```
//!
//! Promises start running when created, like JavaScript's. Spawned tasks
//! belong to the interpreter and are aborted by [`Interpreter::shutdown`].
//! Loops and calls pass a checkpoint that enforces the deadline and yields to
//! the runtime, so CPU-bound scripts still observe their time limit.

use crate::ast::{
    AssignOp, BinaryOp, DeclKind, Element, Expr, FunctionBody, FunctionDef, LogicalOp, ObjectMember,
    Param, Pattern, Program, PropKey, Stmt, TemplatePart, UnaryOp,
};
use crate::builtins::{self, MAX_ARRAY_LEN};
use crate::error::ScriptError;
use crate::scope::{Scope, ScopeError};
use crate::value::{Closure, Function, HostFn, Promise, Value};
use async_recursion::async_recursion;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Abrupt completion of an evaluation
#[derive(Debug, Clone)]
pub(crate) enum Interrupt {
    /// Script-visible exception
    Throw(Value),
    /// Deadline passed; never catchable by scripts
    Timeout,
}

impl Interrupt {
    pub(crate) fn error(name: &str, message: impl Into<String>) -> Self {
        Self::Throw(Value::error(name, message))
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::error("TypeError", message)
    }

    pub(crate) fn range_error(message: impl Into<String>) -> Self {
        Self::error("RangeError", message)
    }

    fn into_script_error(self) -> ScriptError {
        match self {
            Self::Timeout => ScriptError::DeadlineExceeded,
            Self::Throw(value) => match value.error_parts() {
                Some((name, message)) => ScriptError::Uncaught {
                    name: Some(name),
                    message,
                },
                None => ScriptError::Uncaught {
                    name: None,
                    message: value.to_js_string(),
                },
            },
        }
    }
}

impl From<ScopeError> for Interrupt {
    fn from(e: ScopeError) -> Self {
        let name = match e {
            ScopeError::Undefined(_) => "ReferenceError",
            ScopeError::Constant(_) => "TypeError",
            ScopeError::Redeclared(_) => "SyntaxError",
        };
        Self::error(name, e.to_string())
    }
}

pub(crate) type Eval<T> = Result<T, Interrupt>;

/// Statement completion
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Evaluation environment: current scope plus call depth on this task
#[derive(Clone)]
pub(crate) struct Env {
    pub(crate) scope: Scope,
    pub(crate) depth: usize,
}

impl Env {
    fn child(&self) -> Self {
        Self {
            scope: self.scope.child(),
            depth: self.depth,
        }
    }
}

/// Aborts a run's tasks and empties its scopes, including when the run is dropped
struct Teardown<'a> {
    interpreter: &'a Interpreter,
    scope: Scope,
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        self.interpreter.shutdown();
        self.scope.release();
    }
}

/// Interpreter limits
#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// Instant after which evaluation fails with [`ScriptError::DeadlineExceeded`]
    pub deadline: Option<Instant>,
    /// Loop iterations and calls between cooperative yields
    pub yield_every: u32,
    /// Maximum nesting of synchronous calls
    pub max_call_depth: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            deadline: None,
            yield_every: 128,
            max_call_depth: 128,
        }
    }
}

struct Context {
    globals: Scope,
    options: InterpreterOptions,
    tasks: Mutex<JoinSet<()>>,
    steps: AtomicU64,
}

/// Script interpreter bound to one global scope
///
/// Cheap to clone; clones share globals, limits and spawned tasks.
#[derive(Clone)]
pub struct Interpreter {
    ctx: Arc<Context>,
}

/// Builder for [`Interpreter`]
#[derive(Debug, Default)]
pub struct InterpreterBuilder {
    globals: Vec<(String, Value)>,
    skip_intrinsics: bool,
    options: InterpreterOptions,
}

impl InterpreterBuilder {
    /// Bind a global name
    #[must_use]
    pub fn global(mut self, name: impl Into<String>, value: Value) -> Self {
        self.globals.push((name.into(), value));
        self
    }

    /// Bind several global names
    #[must_use]
    pub fn globals(mut self, globals: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.globals.extend(globals);
        self
    }

    /// Do not install `JSON`, `Math`, `Promise` and the other intrinsics
    #[must_use]
    pub fn without_intrinsics(mut self) -> Self {
        self.skip_intrinsics = true;
        self
    }

    /// Fail evaluation after `deadline`
    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.options.deadline = Some(deadline);
        self
    }

    /// Fail evaluation once `timeout` has elapsed from now
    ///
    /// A timeout too large to represent leaves the run without a deadline.
    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.deadline(deadline),
            None => self,
        }
    }

    /// Yield to the runtime every `n` loop iterations or calls
    #[must_use]
    pub fn yield_every(mut self, n: u32) -> Self {
        self.options.yield_every = n.max(1);
        self
    }

    /// Limit synchronous call nesting
    #[must_use]
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.options.max_call_depth = depth;
        self
    }

    /// Build the interpreter; embedder globals shadow intrinsics
    #[must_use]
    pub fn build(self) -> Interpreter {
        let mut globals = if self.skip_intrinsics {
            Vec::new()
        } else {
            builtins::intrinsics()
        };
        globals.extend(self.globals);

        Interpreter {
            ctx: Arc::new(Context {
                globals: Scope::with_bindings(globals),
                options: self.options,
                tasks: Mutex::new(JoinSet::new()),
                steps: AtomicU64::new(0),
            }),
        }
    }
}

impl Interpreter {
    /// Start building an interpreter
    #[must_use]
    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::default()
    }

    /// Global scope
    #[must_use]
    pub fn globals(&self) -> &Scope {
        &self.ctx.globals
    }

    /// Run a program to completion
    ///
    /// The program body behaves like an async function body: top-level
    /// `return` yields the result, a returned promise is awaited, and no
    /// `return` yields `undefined`. Promises still pending when the program
    /// finishes are aborted.
    ///
    /// # Errors
    /// Returns [`ScriptError::Uncaught`] for exceptions that escape the
    /// program and [`ScriptError::DeadlineExceeded`] when the deadline
    /// passes first.
    pub async fn run(&self, program: &Program) -> Result<Value, ScriptError> {
        let env = Env {
            scope: self.ctx.globals.tracked_child(),
            depth: 0,
        };
        let _teardown = Teardown {
            interpreter: self,
            scope: env.scope.clone(),
        };

        let outcome = match self.exec_stmts(&program.body, &env).await {
            Ok(Flow::Return(value)) => self.resolve(value).await,
            Ok(_) => Ok(Value::Undefined),
            Err(e) => Err(e),
        };
        outcome.map_err(Interrupt::into_script_error)
    }

    /// Abort every task spawned for pending promises
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.ctx.tasks.lock());
        drop(tasks);
    }

    /// Number of spawned tasks not yet reaped
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.ctx.tasks.lock().len()
    }

    // -----------------------------------------------------------------------
    // Scheduling

    /// Spawn `future` as a running promise
    pub(crate) fn spawn<F>(&self, future: F) -> Promise
    where
        F: Future<Output = Eval<Value>> + Send + 'static,
    {
        let promise = Promise::new(future);
        let mut tasks = self.ctx.tasks.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(promise.driver());
        promise
    }

    /// Await promises until a plain value remains
    pub(crate) async fn resolve(&self, mut value: Value) -> Eval<Value> {
        while let Value::Promise(promise) = value {
            value = promise.settle().await?;
        }
        Ok(value)
    }

    async fn checkpoint(&self) -> Eval<()> {
        if let Some(deadline) = self.ctx.options.deadline {
            if Instant::now() >= deadline {
                return Err(Interrupt::Timeout);
            }
        }
        let steps = self.ctx.steps.fetch_add(1, Ordering::Relaxed) + 1;
        if steps % u64::from(self.ctx.options.yield_every) == 0 {
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Statements

    #[async_recursion]
    async fn exec_stmts(&self, stmts: &[Stmt], env: &Env) -> Eval<Flow> {
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    env.scope.declare(name, closure(def, &env.scope), true, true)?;
                }
            }
        }

        for stmt in stmts {
            match self.exec_stmt(stmt, env).await? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    #[async_recursion]
    async fn exec_stmt(&self, stmt: &Stmt, env: &Env) -> Eval<Flow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr, env).await?;
                Ok(Flow::Normal)
            }
            Stmt::Declare { kind, declarators } => {
                for (pattern, init) in declarators {
                    let value = match init {
                        Some(init) => self.eval(init, env).await?,
                        None => Value::Undefined,
                    };
                    self.bind(pattern, value, env, *kind).await?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                if self.eval(test, env).await?.truthy() {
                    self.exec_stmt(then, env).await
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise, env).await
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { test, body } => {
                loop {
                    self.checkpoint().await?;
                    if !self.eval(test, env).await?.truthy() {
                        break;
                    }
                    match self.exec_stmt(body, env).await? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, test } => {
                loop {
                    self.checkpoint().await?;
                    match self.exec_stmt(body, env).await? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(test, env).await?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let mut loop_env = env.child();
                if let Some(init) = init {
                    self.exec_stmt(init, &loop_env).await?;
                }
                let per_iteration = matches!(
                    init.as_deref(),
                    Some(Stmt::Declare {
                        kind: DeclKind::Let,
                        ..
                    })
                );

                loop {
                    self.checkpoint().await?;
                    if let Some(test) = test {
                        if !self.eval(test, &loop_env).await?.truthy() {
                            break;
                        }
                    }
                    match self.exec_stmt(body, &loop_env).await? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if per_iteration {
                        loop_env = Env {
                            scope: loop_env.scope.fork(),
                            depth: loop_env.depth,
                        };
                    }
                    if let Some(update) = update {
                        self.eval(update, &loop_env).await?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForEach {
                kind,
                pattern,
                iterable,
                keys,
                body,
            } => {
                let source = self.eval(iterable, env).await?;
                let items = if *keys {
                    builtins::keys_of(&source)
                } else {
                    builtins::iterate(&source)?
                };

                for item in items {
                    self.checkpoint().await?;
                    let iteration = env.child();
                    self.bind(pattern, item, &iteration, *kind).await?;
                    match self.exec_stmt(body, &iteration).await? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts) => self.exec_stmts(stmts, &env.child()).await,
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env).await?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Throw(expr) => Err(Interrupt::Throw(self.eval(expr, env).await?)),
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                let mut outcome = self.exec_stmts(block, &env.child()).await;

                let caught = match (&outcome, handler) {
                    (Err(Interrupt::Throw(thrown)), Some(handler)) => {
                        Some((thrown.clone(), handler))
                    }
                    _ => None,
                };
                if let Some((thrown, (binding, body))) = caught {
                    let catch_env = env.child();
                    outcome = match binding {
                        Some(pattern) => {
                            match self.bind(pattern, thrown, &catch_env, DeclKind::Let).await {
                                Ok(()) => self.exec_stmts(body, &catch_env).await,
                                Err(e) => Err(e),
                            }
                        }
                        None => self.exec_stmts(body, &catch_env).await,
                    };
                }

                if matches!(outcome, Err(Interrupt::Timeout)) {
                    return outcome;
                }
                if let Some(finalizer) = finalizer {
                    match self.exec_stmts(finalizer, &env.child()).await? {
                        Flow::Normal => {}
                        abrupt => return Ok(abrupt),
                    }
                }
                outcome
            }
        }
    }

    /// Bind `value` to `pattern` in the current scope
    #[async_recursion]
    async fn bind(&self, pattern: &Pattern, value: Value, env: &Env, kind: DeclKind) -> Eval<()> {
        let redeclare = kind == DeclKind::Var;
        match pattern {
            Pattern::Ident(name) => {
                env.scope.declare(name, value, kind.is_mutable(), redeclare)?;
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(Interrupt::type_error(format!(
                        "Cannot destructure '{}' as it is {}.",
                        value.to_js_string(),
                        value.to_js_string()
                    )));
                }
                let mut used = Vec::with_capacity(props.len());
                for prop in props {
                    let key = self.prop_key(&prop.key, env).await?;
                    let mut item = get_member(&value, &key)?;
                    if matches!(item, Value::Undefined) {
                        if let Some(default) = &prop.default {
                            item = self.eval(default, env).await?;
                        }
                    }
                    self.bind(&prop.target, item, env, kind).await?;
                    used.push(key);
                }
                if let Some(rest) = rest {
                    let remaining: IndexMap<String, Value> = match &value {
                        Value::Object(obj) => obj
                            .read()
                            .iter()
                            .filter(|(k, _)| !used.contains(k))
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                        _ => IndexMap::new(),
                    };
                    env.scope
                        .declare(rest, Value::object(remaining), kind.is_mutable(), redeclare)?;
                }
            }
            Pattern::Array { items, rest } => {
                let values = builtins::iterate(&value)?;
                for (i, item) in items.iter().enumerate() {
                    let Some(element) = item else {
                        continue;
                    };
                    let mut item = values.get(i).cloned().unwrap_or_default();
                    if matches!(item, Value::Undefined) {
                        if let Some(default) = &element.default {
                            item = self.eval(default, env).await?;
                        }
                    }
                    self.bind(&element.target, item, env, kind).await?;
                }
                if let Some(rest) = rest {
                    let tail = values.get(items.len()..).map(<[Value]>::to_vec).unwrap_or_default();
                    env.scope
                        .declare(rest, Value::array(tail), kind.is_mutable(), redeclare)?;
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Expressions

    #[async_recursion]
    async fn eval(&self, expr: &Expr, env: &Env) -> Eval<Value> {
        Ok(match expr {
            Expr::Number(n) => Value::Number(*n),
            Expr::Str(s) => Value::String(s.clone()),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Null => Value::Null,
            Expr::Undefined => Value::Undefined,
            Expr::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(expr) => {
                            out.push_str(&self.eval(expr, env).await?.to_js_string());
                        }
                    }
                }
                Value::String(out)
            }
            Expr::Ident(name) => lookup(name, env)?,
            Expr::Array(elements) => Value::array(self.eval_elements(elements, env).await?),
            Expr::Object(members) => self.eval_object(members, env).await?,
            Expr::Function(def) => closure(def, &env.scope),
            Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => {
                self.eval_chain(expr, env).await?.unwrap_or_default()
            }
            Expr::New { path, args } => {
                let constructor = resolve_path(path, env)?;
                let args = self.eval_elements(args, env).await?;
                match constructor {
                    Value::Function(Function::Native(native)) if native.is_constructor() => {
                        self.call_native(native, args, env.depth).await?
                    }
                    _ => {
                        return Err(Interrupt::type_error(format!(
                            "{} is not a constructor",
                            path.join(".")
                        )))
                    }
                }
            }
            Expr::Unary { op, operand } => {
                if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, operand.as_ref()) {
                    if !env.scope.contains(name) {
                        return Ok(Value::string("undefined"));
                    }
                }
                let value = self.eval(operand, env).await?;
                match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::string(value.type_of()),
                }
            }
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let old = self.eval(target, env).await?.to_number();
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign(target, Value::Number(new), env).await?;
                Value::Number(if *prefix { new } else { old })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, env).await?;
                let right = self.eval(right, env).await?;
                binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, env).await?;
                if short_circuits(*op, &left) {
                    left
                } else {
                    self.eval(right, env).await?
                }
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                if self.eval(test, env).await?.truthy() {
                    self.eval(then, env).await?
                } else {
                    self.eval(otherwise, env).await?
                }
            }
            Expr::Assign { op, target, value } => match op {
                AssignOp::Assign => {
                    let value = self.eval(value, env).await?;
                    self.assign(target, value.clone(), env).await?;
                    value
                }
                AssignOp::Compound(op) => {
                    let current = self.eval(target, env).await?;
                    let rhs = self.eval(value, env).await?;
                    let value = binary(*op, &current, &rhs);
                    self.assign(target, value.clone(), env).await?;
                    value
                }
                AssignOp::Logical(op) => {
                    let current = self.eval(target, env).await?;
                    if short_circuits(*op, &current) {
                        current
                    } else {
                        let value = self.eval(value, env).await?;
                        self.assign(target, value.clone(), env).await?;
                        value
                    }
                }
            },
            Expr::Await(inner) => {
                let value = self.eval(inner, env).await?;
                self.resolve(value).await?
            }
        })
    }

    /// Evaluate a member/index/call chain; `None` when optional chaining
    /// short-circuited
    #[async_recursion]
    async fn eval_chain(&self, expr: &Expr, env: &Env) -> Eval<Option<Value>> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(target) = self.eval_chain(object, env).await? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                get_member(&target, property).map(Some)
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                let Some(target) = self.eval_chain(object, env).await? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval(index, env).await?;
                get_index(&target, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional, env).await,
            other => self.eval(other, env).await.map(Some),
        }
    }

    async fn eval_call(
        &self,
        callee: &Expr,
        args: &[Element],
        optional: bool,
        env: &Env,
    ) -> Eval<Option<Value>> {
        let receiver = match callee {
            Expr::Member {
                object,
                property,
                optional: chained,
            } => {
                let Some(receiver) = self.eval_chain(object, env).await? else {
                    return Ok(None);
                };
                if *chained && receiver.is_nullish() {
                    return Ok(None);
                }
                Some((receiver, property.clone()))
            }
            Expr::Index {
                object,
                index,
                optional: chained,
            } => {
                let Some(receiver) = self.eval_chain(object, env).await? else {
                    return Ok(None);
                };
                if *chained && receiver.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval(index, env).await?.to_property_key();
                Some((receiver, key))
            }
            _ => None,
        };

        if let Some((receiver, key)) = receiver {
            let method = get_member(&receiver, &key)?;
            if optional && method.is_nullish() && !builtins::has_method(&receiver, &key) {
                return Ok(None);
            }
            let args = self.eval_elements(args, env).await?;
            if method.is_callable() {
                return self.call_value(method, args, env.depth).await.map(Some);
            }
            return match self.call_method(&receiver, &key, args, env.depth).await? {
                Some(value) => Ok(Some(value)),
                None => Err(Interrupt::type_error(format!(
                    "{} is not a function",
                    describe(callee)
                ))),
            };
        }

        let Some(function) = self.eval_chain(callee, env).await? else {
            return Ok(None);
        };
        if optional && function.is_nullish() {
            return Ok(None);
        }
        if !function.is_callable() {
            return Err(Interrupt::type_error(format!("{} is not a function", describe(callee))));
        }
        let args = self.eval_elements(args, env).await?;
        self.call_value(function, args, env.depth).await.map(Some)
    }

    /// Built-in method on a receiver; `None` when there is no such method
    async fn call_method(
        &self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        depth: usize,
    ) -> Eval<Option<Value>> {
        match receiver {
            Value::Array(array) => self.array_method(array, name, args, depth).await,
            Value::String(s) => builtins::string_method(s, name, &args).transpose(),
            Value::Number(n) => builtins::number_method(*n, name, &args).transpose(),
            Value::Promise(promise) => Ok(self.promise_method(promise, name, args)),
            Value::Object(obj) => Ok(match name {
                "hasOwnProperty" => {
                    let key = args.first().map(Value::to_property_key).unwrap_or_default();
                    Some(Value::Bool(obj.read().contains_key(&key)))
                }
                "toString" => Some(Value::String(receiver.to_js_string())),
                _ => None,
            }),
            _ => Ok(None),
        }
    }

    async fn eval_elements(&self, elements: &[Element], env: &Env) -> Eval<Vec<Value>> {
        let mut out = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                Element::Item(expr) => out.push(self.eval(expr, env).await?),
                Element::Spread(expr) => {
                    let value = self.eval(expr, env).await?;
                    out.extend(builtins::iterate(&value)?);
                }
            }
        }
        Ok(out)
    }

    async fn eval_object(&self, members: &[ObjectMember], env: &Env) -> Eval<Value> {
        let mut props = IndexMap::with_capacity(members.len());
        for member in members {
            match member {
                ObjectMember::Prop(key, value) => {
                    let key = self.prop_key(key, env).await?;
                    let value = self.eval(value, env).await?;
                    props.insert(key, value);
                }
                ObjectMember::Spread(expr) => match self.eval(expr, env).await? {
                    Value::Object(obj) => {
                        let snapshot = obj.read().clone();
                        props.extend(snapshot);
                    }
                    Value::Array(items) => {
                        let snapshot = items.read().clone();
                        let indexed = snapshot.into_iter().enumerate();
                        props.extend(indexed.map(|(i, v)| (i.to_string(), v)));
                    }
                    Value::String(s) => {
                        let indexed = s.chars().enumerate();
                        props.extend(
                            indexed.map(|(i, c)| (i.to_string(), Value::String(c.into()))),
                        );
                    }
                    _ => {}
                },
            }
        }
        Ok(Value::object(props))
    }

    async fn prop_key(&self, key: &PropKey, env: &Env) -> Eval<String> {
        match key {
            PropKey::Static(name) => Ok(name.clone()),
            PropKey::Computed(expr) => Ok(self.eval(expr, env).await?.to_property_key()),
        }
    }

    #[async_recursion]
    async fn assign(&self, target: &Expr, value: Value, env: &Env) -> Eval<()> {
        match target {
            Expr::Ident(name) => Ok(env.scope.assign(name, value)?),
            Expr::Member { object, property, .. } => {
                let object = self.eval(object, env).await?;
                set_member(&object, property, value)
            }
            Expr::Index { object, index, .. } => {
                let object = self.eval(object, env).await?;
                let key = self.eval(index, env).await?;
                set_index(&object, &key, value)
            }
            _ => Err(Interrupt::error("SyntaxError", "Invalid assignment target")),
        }
    }

    // -----------------------------------------------------------------------
    // Calls

    /// Call any callable value
    #[async_recursion]
    pub(crate) async fn call_value(
        &self,
        callee: Value,
        args: Vec<Value>,
        depth: usize,
    ) -> Eval<Value> {
        match callee {
            Value::Function(Function::Closure(closure)) => {
                self.call_closure(closure, args, depth).await
            }
            Value::Function(Function::Native(native)) => {
                self.call_native(native, args, depth).await
            }
            Value::Function(Function::Host(host)) => Ok(self.call_host(host, args)),
            other => Err(Interrupt::type_error(format!(
                "{} is not a function",
                other.type_of()
            ))),
        }
    }

    async fn call_closure(
        &self,
        closure: Arc<Closure>,
        args: Vec<Value>,
        depth: usize,
    ) -> Eval<Value> {
        if closure.def.is_async {
            let this = self.clone();
            let promise = self.spawn(async move {
                let value = this.invoke(&closure, args, 0).await?;
                this.resolve(value).await
            });
            return Ok(Value::Promise(promise));
        }
        self.invoke(&closure, args, depth).await
    }

    #[async_recursion]
    async fn invoke(&self, closure: &Closure, args: Vec<Value>, depth: usize) -> Eval<Value> {
        if depth >= self.ctx.options.max_call_depth {
            return Err(Interrupt::range_error("Maximum call stack size exceeded"));
        }
        self.checkpoint().await?;

        let env = Env {
            scope: closure.scope.child(),
            depth: depth + 1,
        };
        let mut args = args.into_iter();
        for param in &closure.def.params {
            match param {
                Param::Positional(element) => {
                    let mut value = args.next().unwrap_or_default();
                    if matches!(value, Value::Undefined) {
                        if let Some(default) = &element.default {
                            value = self.eval(default, &env).await?;
                        }
                    }
                    self.bind(&element.target, value, &env, DeclKind::Let).await?;
                }
                Param::Rest(name) => {
                    let rest: Vec<Value> = args.by_ref().collect();
                    env.scope.declare(name, Value::array(rest), true, false)?;
                }
            }
        }

        match &closure.def.body {
            FunctionBody::Expr(expr) => self.eval(expr, &env).await,
            FunctionBody::Block(stmts) => match self.exec_stmts(stmts, &env).await? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    fn call_host(&self, host: HostFn, args: Vec<Value>) -> Value {
        let args: Vec<serde_json::Value> = args.iter().map(Value::to_json_lossy).collect();
        let promise = self.spawn(async move {
            tracing::trace!(function = %host.name, "host call");
            host.function
                .call(args)
                .await
                .map(Value::from_json)
                .map_err(|message| Interrupt::error("Error", message))
        });
        Value::Promise(promise)
    }
}

/// Reject non-callable callback arguments
pub(crate) fn ensure_callable(value: &Value) -> Eval<()> {
    if value.is_callable() {
        Ok(())
    } else {
        Err(Interrupt::type_error(format!("{} is not a function", value.inspect())))
    }
}

fn closure(def: &Arc<FunctionDef>, scope: &Scope) -> Value {
    Value::Function(Function::Closure(Arc::new(Closure {
        def: Arc::clone(def),
        scope: scope.clone(),
    })))
}

fn lookup(name: &str, env: &Env) -> Eval<Value> {
    env.scope
        .get(name)
        .ok_or_else(|| Interrupt::from(ScopeError::Undefined(name.to_string())))
}

fn resolve_path(path: &[String], env: &Env) -> Eval<Value> {
    let Some((first, rest)) = path.split_first() else {
        return Err(Interrupt::type_error("missing constructor"));
    };
    let mut value = lookup(first, env)?;
    for segment in rest {
        value = get_member(&value, segment)?;
    }
    Ok(value)
}

/// Human readable form of a callee for error messages
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member { object, property, .. } => format!("{}.{property}", describe(object)),
        Expr::Index { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}

fn short_circuits(op: LogicalOp, left: &Value) -> bool {
    match op {
        LogicalOp::And => !left.truthy(),
        LogicalOp::Or => left.truthy(),
        LogicalOp::Nullish => !left.is_nullish(),
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Promise(_) => {
            Value::String(value.to_js_string())
        }
        other => other.clone(),
    }
}

/// Apply an arithmetic or comparison operator
pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if let (Value::Number(a), Value::Number(b)) = (left, right) {
                return Value::Number(a + b);
            }
            let (a, b) = (to_primitive(left), to_primitive(right));
            if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
                Value::String(a.to_js_string() + &b.to_js_string())
            } else {
                Value::Number(a.to_number() + b.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Pow => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_equals(right)),
        BinaryOp::LooseEq => Value::Bool(left.loose_equals(right)),
        BinaryOp::LooseNe => Value::Bool(!left.loose_equals(right)),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(CmpOrdering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(left, right),
            Some(CmpOrdering::Less | CmpOrdering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(CmpOrdering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(left, right),
            Some(CmpOrdering::Greater | CmpOrdering::Equal)
        )),
    }
}

fn compare(left: &Value, right: &Value) -> Option<CmpOrdering> {
    match (to_primitive(left), to_primitive(right)) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

/// Read `target.key`
pub(crate) fn get_member(target: &Value, key: &str) -> Eval<Value> {
    Ok(match target {
        Value::Undefined | Value::Null => {
            return Err(Interrupt::type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                target.to_js_string()
            )))
        }
        Value::Object(obj) => obj.read().get(key).cloned().unwrap_or_default(),
        Value::Array(items) => {
            let items = items.read();
            if key == "length" {
                Value::Number(len_to_number(items.len()))
            } else {
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default()
            }
        }
        Value::String(s) => {
            if key == "length" {
                Value::Number(len_to_number(s.chars().count()))
            } else {
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or_default()
            }
        }
        Value::Function(Function::Native(native)) => {
            builtins::native_static(*native, key).unwrap_or_default()
        }
        Value::Function(function) if key == "name" => Value::String(function.name()),
        _ => Value::Undefined,
    })
}

/// Read `target[key]`
pub(crate) fn get_index(target: &Value, key: &Value) -> Eval<Value> {
    if let (Value::Array(items), Value::Number(n)) = (target, key) {
        if let Some(i) = index_of(*n) {
            return Ok(items.read().get(i).cloned().unwrap_or_default());
        }
    }
    get_member(target, &key.to_property_key())
}

/// Write `target.key = value`
pub(crate) fn set_member(target: &Value, key: &str, value: Value) -> Eval<()> {
    match target {
        Value::Undefined | Value::Null => Err(Interrupt::type_error(format!(
            "Cannot set properties of {} (setting '{key}')",
            target.to_js_string()
        ))),
        Value::Object(obj) => {
            obj.write().insert(key.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            if key == "length" {
                let len = array_len(value.to_number())?;
                items.write().resize(len, Value::Undefined);
                Ok(())
            } else if let Ok(i) = key.parse::<usize>() {
                set_element(&mut items.write(), i, value)
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

/// Write `target[key] = value`
pub(crate) fn set_index(target: &Value, key: &Value, value: Value) -> Eval<()> {
    if let (Value::Array(items), Value::Number(n)) = (target, key) {
        if let Some(i) = index_of(*n) {
            return set_element(&mut items.write(), i, value);
        }
    }
    set_member(target, &key.to_property_key(), value)
}

fn set_element(items: &mut Vec<Value>, index: usize, value: Value) -> Eval<()> {
    if index >= items.len() {
        items.resize(array_len_for(index + 1)?, Value::Undefined);
    }
    items[index] = value;
    Ok(())
}

/// Array length for a script-supplied number
pub(crate) fn array_len(n: f64) -> Eval<usize> {
    index_of(n)
        .ok_or_else(|| Interrupt::range_error("Invalid array length"))
        .and_then(array_len_for)
}

fn array_len_for(len: usize) -> Eval<usize> {
    if len > MAX_ARRAY_LEN {
        return Err(Interrupt::range_error("Invalid array length"));
    }
    Ok(len)
}

/// Array index for a number, if it is a non-negative integer
pub(crate) fn index_of(n: f64) -> Option<usize> {
    if n >= 0.0 && n.fract() == 0.0 && n < 4_294_967_295.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = n as usize;
        Some(index)
    } else {
        None
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn len_to_number(len: usize) -> f64 {
    len as f64
}
