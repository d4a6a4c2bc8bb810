//! Tree-walking script interpreter with capability-based host bindings.
//!
//! The interpreter evaluates the parsed script against a
//! [`ScriptContext`]. All host access goes through the `pm`, `console`, and
//! `JSON` bindings; there is nothing else to resolve, so scripts cannot
//! reach the file system, the network, or the host runtime.
//!
//! Termination is enforced by a wall-clock deadline checked on a fixed
//! cadence in the evaluation path, plus an operation-count backstop, so a
//! `while (true)` loop returns control within the configured bound.

use super::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use super::context::ScriptContext;
use super::expect;
use super::value::{format_number, HostValue, ScopeKind, Value};
use crate::models::AssertionResult;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Deadline is checked every this many evaluation steps.
const DEADLINE_CHECK_INTERVAL: u64 = 64;

/// Hard ceiling on evaluation steps, as a backstop behind the deadline.
const MAX_OPS: u64 = 100_000_000;

/// Which script hook is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before the HTTP call; `pm.request` is writable, `pm.response` absent.
    PreRequest,
    /// After the HTTP call; `pm.response` is readable, `pm.request` frozen.
    PostResponse,
}

/// Errors that abort script evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// The wall-clock bound expired.
    Timeout,
    /// A runtime error (undefined identifier, bad operand, host misuse).
    Error(String),
    /// A `pm.expect` failure outside a `pm.test` block.
    AssertionFailed(String),
}

/// Statement outcome for control flow.
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Evaluates one script against a context.
pub struct Interpreter<'a> {
    ctx: &'a mut ScriptContext,
    phase: Phase,
    deadline: Instant,
    ops: u64,
    scopes: Vec<HashMap<String, Value>>,
}

impl<'a> Interpreter<'a> {
    /// Creates an interpreter bound to the context for one invocation.
    pub fn new(ctx: &'a mut ScriptContext, phase: Phase, timeout: Duration) -> Self {
        Self {
            ctx,
            phase,
            deadline: Instant::now() + timeout,
            ops: 0,
            scopes: vec![HashMap::new()],
        }
    }

    /// Runs the whole program. A top-level `return` ends the script early
    /// and is not an error.
    pub fn run(&mut self, program: &[Stmt]) -> Result<(), ScriptError> {
        for stmt in program {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                Flow::Return(_) => break,
                Flow::Break | Flow::Continue => {
                    return Err(ScriptError::Error(
                        "'break' or 'continue' outside of a loop".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Bumps the step counter and enforces the deadline.
    fn tick(&mut self) -> Result<(), ScriptError> {
        self.ops += 1;
        if self.ops % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= self.deadline {
            return Err(ScriptError::Timeout);
        }
        if self.ops > MAX_OPS {
            return Err(ScriptError::Timeout);
        }
        Ok(())
    }

    // ---- statements ----

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, ScriptError> {
        self.tick()?;

        match stmt {
            Stmt::Expr(expr) => {
                self.eval_expr(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::VarDecl { name, init } => {
                let value = match init {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Null,
                };
                self.scopes
                    .last_mut()
                    .expect("scope stack is never empty")
                    .insert(name.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(cond)?.truthy() {
                    self.exec_block(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_block(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                loop {
                    self.tick()?;
                    if !self.eval_expr(cond)?.truthy() {
                        break;
                    }
                    match self.exec_block(body)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                self.scopes.push(HashMap::new());
                let result = self.exec_for(init, cond, update, body);
                self.scopes.pop();
                result
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
        }
    }

    fn exec_for(
        &mut self,
        init: &Option<Box<Stmt>>,
        cond: &Option<Expr>,
        update: &Option<Expr>,
        body: &[Stmt],
    ) -> Result<Flow, ScriptError> {
        if let Some(init) = init {
            self.exec_stmt(init)?;
        }

        loop {
            self.tick()?;
            if let Some(cond) = cond {
                if !self.eval_expr(cond)?.truthy() {
                    break;
                }
            }
            match self.exec_block(body)? {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => break,
                flow @ Flow::Return(_) => return Ok(flow),
            }
            if let Some(update) = update {
                self.eval_expr(update)?;
            }
        }

        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, body: &[Stmt]) -> Result<Flow, ScriptError> {
        self.scopes.push(HashMap::new());
        let mut flow = Flow::Normal;
        for stmt in body {
            match self.exec_stmt(stmt) {
                Ok(Flow::Normal) => {}
                Ok(other) => {
                    flow = other;
                    break;
                }
                Err(err) => {
                    self.scopes.pop();
                    return Err(err);
                }
            }
        }
        self.scopes.pop();
        Ok(flow)
    }

    // ---- expressions ----

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        self.tick()?;

        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Ident(name) => self.lookup(name),
            Expr::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expr(element)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Object(properties) => {
                let mut values = Vec::with_capacity(properties.len());
                for (key, value) in properties {
                    values.push((key.clone(), self.eval_expr(value)?));
                }
                Ok(Value::Object(values))
            }
            Expr::Member { object, property } => {
                let object = self.eval_expr(object)?;
                self.get_member(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval_expr(object)?;
                let index = self.eval_expr(index)?;
                self.get_index(&object, &index)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::Unary { op, expr } => {
                let value = self.eval_expr(expr)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Neg => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(ScriptError::Error(format!(
                            "cannot negate {}",
                            other.inspect_string()
                        ))),
                    },
                }
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
            Expr::Assign { target, value } => {
                let value = self.eval_expr(value)?;
                self.assign(target, value.clone())?;
                Ok(value)
            }
            Expr::Function { params, body } => Ok(Value::Function {
                params: params.clone(),
                body: Rc::new(body.clone()),
            }),
        }
    }

    /// Resolves an identifier: script variables first, then the host roots.
    fn lookup(&self, name: &str) -> Result<Value, ScriptError> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Ok(value.clone());
            }
        }
        match name {
            "pm" => Ok(Value::Host(HostValue::Pm)),
            "console" => Ok(Value::Host(HostValue::Console)),
            "JSON" => Ok(Value::Host(HostValue::Json)),
            _ => Err(ScriptError::Error(format!("'{}' is not defined", name))),
        }
    }

    fn assign(&mut self, target: &Expr, value: Value) -> Result<(), ScriptError> {
        match target {
            Expr::Ident(name) => {
                for scope in self.scopes.iter_mut().rev() {
                    if scope.contains_key(name) {
                        scope.insert(name.clone(), value);
                        return Ok(());
                    }
                }
                self.scopes
                    .first_mut()
                    .expect("scope stack is never empty")
                    .insert(name.clone(), value);
                Ok(())
            }
            Expr::Member { object, property } => {
                let object = self.eval_expr(object)?;
                match object {
                    Value::Host(HostValue::Request) => self.set_request_field(property, value),
                    Value::Host(_) => Err(ScriptError::Error(format!(
                        "cannot assign to '{}'",
                        property
                    ))),
                    _ => Err(ScriptError::Error(format!(
                        "cannot assign to property '{}' of a value",
                        property
                    ))),
                }
            }
            _ => Err(ScriptError::Error("invalid assignment target".to_string())),
        }
    }

    fn set_request_field(&mut self, property: &str, value: Value) -> Result<(), ScriptError> {
        if self.phase != Phase::PreRequest {
            return Err(ScriptError::Error(
                "pm.request is read-only after the request has been sent".to_string(),
            ));
        }
        match property {
            "url" => {
                self.ctx.request_url = value.display_string();
                Ok(())
            }
            "body" => {
                self.ctx.request_body = match value {
                    Value::Null => None,
                    Value::Str(s) => Some(s),
                    other => Some(other.to_json().to_string()),
                };
                Ok(())
            }
            "headers" => match value {
                Value::Object(props) => {
                    self.ctx.request_headers = props
                        .into_iter()
                        .map(|(k, v)| (k, v.display_string()))
                        .collect();
                    Ok(())
                }
                other => Err(ScriptError::Error(format!(
                    "pm.request.headers expects an object, got {}",
                    other.inspect_string()
                ))),
            },
            other => Err(ScriptError::Error(format!(
                "unknown pm.request field: {}",
                other
            ))),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Value, ScriptError> {
        // Logical operators short-circuit and yield the deciding operand.
        if op == BinaryOp::And {
            let left = self.eval_expr(left)?;
            return if left.truthy() {
                self.eval_expr(right)
            } else {
                Ok(left)
            };
        }
        if op == BinaryOp::Or {
            let left = self.eval_expr(left)?;
            return if left.truthy() {
                Ok(left)
            } else {
                self.eval_expr(right)
            };
        }

        let left = self.eval_expr(left)?;
        let right = self.eval_expr(right)?;

        match op {
            BinaryOp::Eq => Ok(Value::Bool(left.equals(&right))),
            BinaryOp::NotEq => Ok(Value::Bool(!left.equals(&right))),
            BinaryOp::Add => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!(
                    "{}{}",
                    left.display_string(),
                    right.display_string()
                ))),
                _ => Err(ScriptError::Error(format!(
                    "cannot add {} and {}",
                    left.inspect_string(),
                    right.inspect_string()
                ))),
            },
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let (a, b) = match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => (*a, *b),
                    _ => {
                        return Err(ScriptError::Error(format!(
                            "arithmetic on non-numbers: {} and {}",
                            left.inspect_string(),
                            right.inspect_string()
                        )))
                    }
                };
                let result = match op {
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                };
                Ok(Value::Number(result))
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
                let ordering = match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                    _ => None,
                };
                let ordering = ordering.ok_or_else(|| {
                    ScriptError::Error(format!(
                        "cannot compare {} and {}",
                        left.inspect_string(),
                        right.inspect_string()
                    ))
                })?;
                let result = match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Gt => ordering.is_gt(),
                    BinaryOp::Le => ordering.is_le(),
                    _ => ordering.is_ge(),
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn get_index(&mut self, object: &Value, index: &Value) -> Result<Value, ScriptError> {
        match (object, index) {
            (Value::Array(items), Value::Number(n)) => {
                let idx = *n as usize;
                Ok(items.get(idx).cloned().unwrap_or(Value::Null))
            }
            (Value::Object(_), Value::Str(key)) => {
                Ok(object.get_property(key).cloned().unwrap_or(Value::Null))
            }
            _ => Err(ScriptError::Error(format!(
                "cannot index {} with {}",
                object.inspect_string(),
                index.inspect_string()
            ))),
        }
    }

    // ---- member access ----

    fn get_member(&mut self, object: &Value, property: &str) -> Result<Value, ScriptError> {
        match object {
            Value::Host(host) => self.get_host_member(host.clone(), property),
            Value::Object(_) => Ok(object.get_property(property).cloned().unwrap_or(Value::Null)),
            Value::Array(items) => match property {
                "length" => Ok(Value::Number(items.len() as f64)),
                _ => Ok(Value::Null),
            },
            Value::Str(s) => match property {
                "length" => Ok(Value::Number(s.chars().count() as f64)),
                _ => Ok(Value::Null),
            },
            other => Err(ScriptError::Error(format!(
                "cannot read property '{}' of {}",
                property,
                other.inspect_string()
            ))),
        }
    }

    fn get_host_member(&mut self, host: HostValue, property: &str) -> Result<Value, ScriptError> {
        match host {
            HostValue::Pm => match property {
                "request" => Ok(Value::Host(HostValue::Request)),
                "response" => {
                    if self.phase != Phase::PostResponse {
                        return Err(ScriptError::Error(
                            "pm.response is only available in post-response scripts".to_string(),
                        ));
                    }
                    Ok(Value::Host(HostValue::Response))
                }
                "globals" => Ok(Value::Host(HostValue::Scope(ScopeKind::Globals))),
                "environment" => Ok(Value::Host(HostValue::Scope(ScopeKind::Environment))),
                "collectionVariables" => Ok(Value::Host(HostValue::Scope(ScopeKind::Collection))),
                "variables" => Ok(Value::Host(HostValue::Scope(ScopeKind::Vars))),
                other => Err(ScriptError::Error(format!("unknown pm member: {}", other))),
            },
            HostValue::Request => match property {
                "url" => Ok(Value::Str(self.ctx.request_url.clone())),
                "method" => Ok(Value::Str(self.ctx.request_method.to_string())),
                "body" => Ok(self
                    .ctx
                    .request_body
                    .clone()
                    .map(Value::Str)
                    .unwrap_or(Value::Null)),
                "headers" => Ok(map_to_object(&self.ctx.request_headers)),
                other => Err(ScriptError::Error(format!(
                    "unknown pm.request member: {}",
                    other
                ))),
            },
            HostValue::Response => match property {
                "code" => Ok(self
                    .ctx
                    .response_status
                    .map(|code| Value::Number(code as f64))
                    .unwrap_or(Value::Null)),
                "status" => Ok(self
                    .ctx
                    .response_status_text
                    .clone()
                    .map(Value::Str)
                    .unwrap_or(Value::Null)),
                "responseTime" => Ok(self
                    .ctx
                    .response_time_ms
                    .map(|ms| Value::Number(ms as f64))
                    .unwrap_or(Value::Null)),
                "headers" => Ok(map_to_object(&self.ctx.response_headers)),
                other => Err(ScriptError::Error(format!(
                    "unknown pm.response member: {}",
                    other
                ))),
            },
            HostValue::Expect { value, negated } => match property {
                // Chain words keep the expectation flowing.
                "to" | "be" | "been" | "is" | "that" | "and" | "have" | "with" | "deep" => {
                    Ok(Value::Host(HostValue::Expect { value, negated }))
                }
                "not" => Ok(Value::Host(HostValue::Expect {
                    value,
                    negated: !negated,
                })),
                // Terminal getters assert on property access.
                "true" | "false" | "null" | "empty" | "ok" => {
                    expect::terminal_getter(&value, property, negated)
                        .map_err(ScriptError::AssertionFailed)?;
                    Ok(Value::Null)
                }
                other => Err(ScriptError::Error(format!("unknown matcher: {}", other))),
            },
            HostValue::Console | HostValue::Json | HostValue::Scope(_) => Err(ScriptError::Error(
                format!("unknown member: {}", property),
            )),
        }
    }

    // ---- calls ----

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, ScriptError> {
        // Method calls on host objects dispatch directly; everything else
        // evaluates the callee to a function value.
        if let Expr::Member { object, property } = callee {
            let object = self.eval_expr(object)?;
            if let Value::Host(host) = object {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg)?);
                }
                return self.call_host_method(host, property, values);
            }
            let method = self.get_member(&object, property)?;
            return self.call_value(method, args);
        }

        let callee = self.eval_expr(callee)?;
        self.call_value(callee, args)
    }

    fn call_value(&mut self, callee: Value, args: &[Expr]) -> Result<Value, ScriptError> {
        match callee {
            Value::Function { params, body } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg)?);
                }
                self.call_function(&params, &body, values)
            }
            other => Err(ScriptError::Error(format!(
                "{} is not a function",
                other.inspect_string()
            ))),
        }
    }

    fn call_function(
        &mut self,
        params: &[String],
        body: &[Stmt],
        args: Vec<Value>,
    ) -> Result<Value, ScriptError> {
        let mut frame = HashMap::new();
        for (i, param) in params.iter().enumerate() {
            frame.insert(param.clone(), args.get(i).cloned().unwrap_or(Value::Null));
        }

        self.scopes.push(frame);
        let mut result = Value::Null;
        let mut error = None;
        for stmt in body {
            match self.exec_stmt(stmt) {
                Ok(Flow::Normal) => {}
                Ok(Flow::Return(value)) => {
                    result = value;
                    break;
                }
                Ok(Flow::Break) | Ok(Flow::Continue) => {
                    error = Some(ScriptError::Error(
                        "'break' or 'continue' outside of a loop".to_string(),
                    ));
                    break;
                }
                Err(err) => {
                    error = Some(err);
                    break;
                }
            }
        }
        self.scopes.pop();

        match error {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }

    fn call_host_method(
        &mut self,
        host: HostValue,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, ScriptError> {
        match host {
            HostValue::Pm => match method {
                "test" => self.pm_test(args),
                "expect" => {
                    let value = args.into_iter().next().unwrap_or(Value::Null);
                    Ok(Value::Host(HostValue::Expect {
                        value: Box::new(value),
                        negated: false,
                    }))
                }
                other => Err(ScriptError::Error(format!("unknown pm method: {}", other))),
            },
            HostValue::Console => {
                let line = args
                    .iter()
                    .map(Value::display_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                match method {
                    "log" => {
                        self.ctx.console_output.push(line);
                        Ok(Value::Null)
                    }
                    "warn" => {
                        self.ctx.console_output.push(format!("[WARN] {}", line));
                        Ok(Value::Null)
                    }
                    other => Err(ScriptError::Error(format!(
                        "unknown console method: {}",
                        other
                    ))),
                }
            }
            HostValue::Json => match method {
                "parse" => match args.first() {
                    Some(Value::Str(text)) => serde_json::from_str::<serde_json::Value>(text)
                        .map(|json| Value::from_json(&json))
                        .map_err(|err| ScriptError::Error(format!("JSON.parse: {}", err))),
                    _ => Err(ScriptError::Error(
                        "JSON.parse expects a string".to_string(),
                    )),
                },
                "stringify" => {
                    let value = args.first().cloned().unwrap_or(Value::Null);
                    Ok(Value::Str(value.to_json().to_string()))
                }
                other => Err(ScriptError::Error(format!(
                    "unknown JSON method: {}",
                    other
                ))),
            },
            HostValue::Scope(kind) => self.scope_method(kind, method, args),
            HostValue::Request => match method {
                "cancel" => {
                    if self.phase != Phase::PreRequest {
                        return Err(ScriptError::Error(
                            "pm.request.cancel() is only available in pre-request scripts"
                                .to_string(),
                        ));
                    }
                    self.ctx.cancelled = true;
                    Ok(Value::Null)
                }
                other => Err(ScriptError::Error(format!(
                    "unknown pm.request method: {}",
                    other
                ))),
            },
            HostValue::Response => match method {
                "text" => Ok(Value::Str(
                    self.ctx.response_body.clone().unwrap_or_default(),
                )),
                "json" => {
                    let body = self.ctx.response_body.clone().unwrap_or_default();
                    serde_json::from_str::<serde_json::Value>(&body)
                        .map(|json| Value::from_json(&json))
                        .map_err(|err| {
                            ScriptError::Error(format!("response body is not valid JSON: {}", err))
                        })
                }
                other => Err(ScriptError::Error(format!(
                    "unknown pm.response method: {}",
                    other
                ))),
            },
            HostValue::Expect { value, negated } => {
                self.expect_matcher(&value, negated, method, args)
            }
        }
    }

    /// Runs a `pm.test` block, converting assertion and runtime failures
    /// inside the callback into a failing recorded test. Timeouts still
    /// propagate so a runaway callback cannot hide from the deadline.
    fn pm_test(&mut self, args: Vec<Value>) -> Result<Value, ScriptError> {
        let mut args = args.into_iter();
        let name = match args.next() {
            Some(Value::Str(name)) => name,
            Some(other) => other.display_string(),
            None => return Err(ScriptError::Error("pm.test expects a name".to_string())),
        };
        let callback = match args.next() {
            Some(Value::Function { params, body }) => (params, body),
            _ => {
                return Err(ScriptError::Error(
                    "pm.test expects a function callback".to_string(),
                ))
            }
        };

        match self.call_function(&callback.0, &callback.1, Vec::new()) {
            Ok(_) => {
                self.ctx.assertions.push(AssertionResult::pass(&name));
            }
            Err(ScriptError::Timeout) => return Err(ScriptError::Timeout),
            Err(ScriptError::AssertionFailed(message)) | Err(ScriptError::Error(message)) => {
                self.ctx
                    .assertions
                    .push(AssertionResult::fail(&name, message));
            }
        }

        Ok(Value::Null)
    }

    fn expect_matcher(
        &mut self,
        value: &Value,
        negated: bool,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, ScriptError> {
        let arg = args.into_iter().next().unwrap_or(Value::Null);

        let outcome = match method {
            "equal" | "eql" => expect::equal(value, &arg, negated),
            "above" => expect::above(value, &arg, negated),
            "below" => expect::below(value, &arg, negated),
            "a" | "an" => expect::a_type(value, &arg, negated),
            "property" => expect::have_property(value, &arg, negated),
            "include" | "includes" | "contain" => expect::include(value, &arg, negated),
            "lengthOf" => expect::have_length_of(value, &arg, negated),
            other => Err(format!("unknown matcher: {}", other)),
        };

        outcome.map_err(ScriptError::AssertionFailed)?;

        // Matchers return the expectation for `.and` chaining.
        Ok(Value::Host(HostValue::Expect {
            value: Box::new(value.clone()),
            negated: false,
        }))
    }

    fn scope_method(
        &mut self,
        kind: ScopeKind,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, ScriptError> {
        let mut args = args.into_iter();

        match method {
            "get" => {
                let key = string_arg(args.next(), "get")?;
                let value = match kind {
                    ScopeKind::Vars => self.ctx.effective_variable(&key).cloned(),
                    _ => self.scope_map(kind).get(&key).cloned(),
                };
                Ok(value.map(Value::Str).unwrap_or(Value::Null))
            }
            "set" => {
                let key = string_arg(args.next(), "set")?;
                let value = args.next().unwrap_or(Value::Null).display_string();
                self.scope_map_mut(kind).insert(key, value);
                Ok(Value::Null)
            }
            "unset" => {
                let key = string_arg(args.next(), "unset")?;
                self.scope_map_mut(kind).remove(&key);
                Ok(Value::Null)
            }
            "has" => {
                let key = string_arg(args.next(), "has")?;
                let has = match kind {
                    ScopeKind::Vars => self.ctx.effective_variable(&key).is_some(),
                    _ => self.scope_map(kind).contains_key(&key),
                };
                Ok(Value::Bool(has))
            }
            "toObject" => {
                let map = match kind {
                    ScopeKind::Vars => self.ctx.effective_variables(),
                    _ => self.scope_map(kind).clone(),
                };
                Ok(map_to_object(&map))
            }
            other => Err(ScriptError::Error(format!(
                "unknown variable method: {}",
                other
            ))),
        }
    }

    /// The map a scope namespace reads from (`variables` reads are handled
    /// separately through the effective view).
    fn scope_map(&self, kind: ScopeKind) -> &HashMap<String, String> {
        match kind {
            ScopeKind::Globals => &self.ctx.globals,
            ScopeKind::Environment => &self.ctx.environment,
            ScopeKind::Collection => &self.ctx.collection_variables,
            ScopeKind::Vars => &self.ctx.local_variables,
        }
    }

    /// The map a scope namespace writes to: always its own map; the merged
    /// `variables` namespace writes the local scope.
    fn scope_map_mut(&mut self, kind: ScopeKind) -> &mut HashMap<String, String> {
        match kind {
            ScopeKind::Globals => &mut self.ctx.globals,
            ScopeKind::Environment => &mut self.ctx.environment,
            ScopeKind::Collection => &mut self.ctx.collection_variables,
            ScopeKind::Vars => &mut self.ctx.local_variables,
        }
    }
}

/// Builds a script object from a string map, keys sorted for determinism.
fn map_to_object(map: &HashMap<String, String>) -> Value {
    let mut pairs: Vec<(String, Value)> = map
        .iter()
        .map(|(k, v)| (k.clone(), Value::Str(v.clone())))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    Value::Object(pairs)
}

fn string_arg(arg: Option<Value>, method: &str) -> Result<String, ScriptError> {
    match arg {
        Some(Value::Str(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(format_number(n)),
        _ => Err(ScriptError::Error(format!(
            "{}() expects a string key",
            method
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_program;

    fn run_phase(script: &str, ctx: &mut ScriptContext, phase: Phase) -> Result<(), ScriptError> {
        let program = parse_program(script).expect("script should parse");
        Interpreter::new(ctx, phase, Duration::from_secs(2)).run(&program)
    }

    fn run(script: &str, ctx: &mut ScriptContext) -> Result<(), ScriptError> {
        run_phase(script, ctx, Phase::PreRequest)
    }

    #[test]
    fn test_arithmetic_and_variables() {
        let mut ctx = ScriptContext::new();
        run("var a = 2; var b = 3; console.log(a * b + 1);", &mut ctx).unwrap();
        assert_eq!(ctx.console_output, vec!["7"]);
    }

    #[test]
    fn test_console_log_joins_arguments() {
        let mut ctx = ScriptContext::new();
        run("console.log('status', 200, true);", &mut ctx).unwrap();
        assert_eq!(ctx.console_output, vec!["status 200 true"]);
    }

    #[test]
    fn test_console_warn_prefix() {
        let mut ctx = ScriptContext::new();
        run("console.warn('slow response');", &mut ctx).unwrap();
        assert_eq!(ctx.console_output, vec!["[WARN] slow response"]);
    }

    #[test]
    fn test_scope_namespaces_write_their_own_map() {
        let mut ctx = ScriptContext::new();
        run(
            "pm.globals.set('g', '1'); pm.environment.set('e', '2'); \
             pm.collectionVariables.set('c', '3'); pm.variables.set('l', '4');",
            &mut ctx,
        )
        .unwrap();

        assert_eq!(ctx.globals.get("g").map(String::as_str), Some("1"));
        assert_eq!(ctx.environment.get("e").map(String::as_str), Some("2"));
        assert_eq!(
            ctx.collection_variables.get("c").map(String::as_str),
            Some("3")
        );
        assert_eq!(ctx.local_variables.get("l").map(String::as_str), Some("4"));
    }

    #[test]
    fn test_variables_namespace_reads_effective_precedence() {
        let mut ctx = ScriptContext::new();
        ctx.globals.insert("k".to_string(), "global".to_string());
        ctx.environment.insert("k".to_string(), "env".to_string());

        run("console.log(pm.variables.get('k'));", &mut ctx).unwrap();
        assert_eq!(ctx.console_output, vec!["env"]);

        ctx.console_output.clear();
        ctx.local_variables.insert("k".to_string(), "local".to_string());
        run("console.log(pm.variables.get('k'));", &mut ctx).unwrap();
        assert_eq!(ctx.console_output, vec!["local"]);
    }

    #[test]
    fn test_scope_get_unset_has_to_object() {
        let mut ctx = ScriptContext::new();
        ctx.environment.insert("a".to_string(), "1".to_string());

        run(
            "console.log(pm.environment.has('a')); \
             console.log(pm.environment.get('missing')); \
             pm.environment.unset('a'); \
             console.log(pm.environment.has('a'));",
            &mut ctx,
        )
        .unwrap();
        assert_eq!(ctx.console_output, vec!["true", "null", "false"]);

        ctx.console_output.clear();
        ctx.globals.insert("x".to_string(), "9".to_string());
        run(
            "var all = pm.globals.toObject(); console.log(all.x);",
            &mut ctx,
        )
        .unwrap();
        assert_eq!(ctx.console_output, vec!["9"]);
    }

    #[test]
    fn test_request_rewrite_in_pre_phase() {
        let mut ctx = ScriptContext::new();
        ctx.request_url = "https://old.example.com".to_string();

        run(
            "pm.request.url = 'https://new.example.com'; \
             pm.request.headers = { 'X-Trace': 'on' }; \
             pm.request.body = '{\"n\":1}';",
            &mut ctx,
        )
        .unwrap();

        assert_eq!(ctx.request_url, "https://new.example.com");
        assert_eq!(
            ctx.request_headers.get("X-Trace").map(String::as_str),
            Some("on")
        );
        assert_eq!(ctx.request_body.as_deref(), Some("{\"n\":1}"));
    }

    #[test]
    fn test_request_is_read_only_after_send() {
        let mut ctx = ScriptContext::new();
        let err = run_phase(
            "pm.request.url = 'https://nope';",
            &mut ctx,
            Phase::PostResponse,
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::Error(_)));
    }

    #[test]
    fn test_cancel_sets_flag() {
        let mut ctx = ScriptContext::new();
        run("pm.request.cancel();", &mut ctx).unwrap();
        assert!(ctx.cancelled);
    }

    #[test]
    fn test_response_not_available_in_pre_phase() {
        let mut ctx = ScriptContext::new();
        let err = run("pm.response.code;", &mut ctx).unwrap_err();
        assert!(matches!(err, ScriptError::Error(_)));
    }

    #[test]
    fn test_response_reads_in_post_phase() {
        let mut ctx = ScriptContext::new();
        ctx.response_status = Some(200);
        ctx.response_status_text = Some("OK".to_string());
        ctx.response_body = Some(r#"{"id": 42, "tags": ["a"]}"#.to_string());
        ctx.response_time_ms = Some(12);

        run_phase(
            "var data = pm.response.json(); \
             console.log(pm.response.code, pm.response.status, pm.response.responseTime); \
             console.log(data.id, data.tags.length); \
             console.log(pm.response.text());",
            &mut ctx,
            Phase::PostResponse,
        )
        .unwrap();

        assert_eq!(ctx.console_output[0], "200 OK 12");
        assert_eq!(ctx.console_output[1], "42 1");
        assert_eq!(ctx.console_output[2], r#"{"id": 42, "tags": ["a"]}"#);
    }

    #[test]
    fn test_pm_test_records_pass_and_fail() {
        let mut ctx = ScriptContext::new();
        ctx.response_status = Some(404);

        run_phase(
            "pm.test('status ok', function () { pm.expect(pm.response.code).to.equal(200); }); \
             pm.test('status is 404', function () { pm.expect(pm.response.code).to.equal(404); }); \
             pm.test('body short', function () { pm.expect('ab').to.have.lengthOf(2); });",
            &mut ctx,
            Phase::PostResponse,
        )
        .unwrap();

        assert_eq!(ctx.assertions.len(), 3);
        let failed: Vec<_> = ctx.assertions.iter().filter(|a| !a.passed).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "status ok");
        let message = failed[0].message.as_ref().unwrap();
        assert!(message.contains("404"));
        assert!(message.contains("200"));
    }

    #[test]
    fn test_expect_not_chain() {
        let mut ctx = ScriptContext::new();
        run(
            "pm.test('differs', function () { pm.expect(1).to.not.equal(2); });",
            &mut ctx,
        )
        .unwrap();
        assert!(ctx.assertions[0].passed);
    }

    #[test]
    fn test_expect_terminal_getters() {
        let mut ctx = ScriptContext::new();
        run(
            "pm.test('flags', function () { \
                pm.expect(true).to.be.true; \
                pm.expect(false).to.be.false; \
                pm.expect(null).to.be.null; \
                pm.expect('').to.be.empty; \
                pm.expect('x').to.be.ok; \
             });",
            &mut ctx,
        )
        .unwrap();
        assert!(ctx.assertions[0].passed);
    }

    #[test]
    fn test_expect_type_and_property_matchers() {
        let mut ctx = ScriptContext::new();
        run(
            "pm.test('shapes', function () { \
                pm.expect('s').to.be.a('string'); \
                pm.expect(5).to.be.a('number'); \
                pm.expect([1]).to.be.an('array'); \
                pm.expect({ a: 1 }).to.have.property('a'); \
                pm.expect('hello world').to.include('world'); \
                pm.expect(10).to.be.above(5); \
                pm.expect(3).to.be.below(5); \
             });",
            &mut ctx,
        )
        .unwrap();
        assert!(ctx.assertions[0].passed, "{:?}", ctx.assertions[0].message);
    }

    #[test]
    fn test_expect_failure_outside_test_aborts_script() {
        let mut ctx = ScriptContext::new();
        let err = run("pm.expect(1).to.equal(2);", &mut ctx).unwrap_err();
        assert!(matches!(err, ScriptError::AssertionFailed(_)));
    }

    #[test]
    fn test_runtime_error_inside_test_marks_it_failed() {
        let mut ctx = ScriptContext::new();
        run(
            "pm.test('boom', function () { missingFn(); });",
            &mut ctx,
        )
        .unwrap();
        assert!(!ctx.assertions[0].passed);
        assert!(ctx.assertions[0]
            .message
            .as_ref()
            .unwrap()
            .contains("not defined"));
    }

    #[test]
    fn test_loops_with_break_and_continue() {
        let mut ctx = ScriptContext::new();
        run(
            "var total = 0; \
             for (var i = 0; i < 10; i = i + 1) { \
                if (i == 3) { continue; } \
                if (i > 5) { break; } \
                total = total + i; \
             } \
             console.log(total);",
            &mut ctx,
        )
        .unwrap();
        // 0 + 1 + 2 + 4 + 5
        assert_eq!(ctx.console_output, vec!["12"]);
    }

    #[test]
    fn test_while_loop_and_assignment() {
        let mut ctx = ScriptContext::new();
        run(
            "var n = 0; while (n < 4) { n = n + 1; } console.log(n);",
            &mut ctx,
        )
        .unwrap();
        assert_eq!(ctx.console_output, vec!["4"]);
    }

    #[test]
    fn test_json_parse_and_stringify() {
        let mut ctx = ScriptContext::new();
        run(
            "var parsed = JSON.parse('{\"a\": [1, 2]}'); \
             console.log(parsed.a.length); \
             console.log(JSON.stringify({ b: 1 }));",
            &mut ctx,
        )
        .unwrap();
        assert_eq!(ctx.console_output[0], "2");
        assert_eq!(ctx.console_output[1], r#"{"b":1.0}"#);
    }

    #[test]
    fn test_timeout_inside_test_callback_propagates() {
        let mut ctx = ScriptContext::new();
        let program =
            parse_program("pm.test('spin', function () { while (true) { } });").unwrap();
        let err = Interpreter::new(&mut ctx, Phase::PreRequest, Duration::from_millis(50))
            .run(&program)
            .unwrap_err();
        assert_eq!(err, ScriptError::Timeout);
        // The timeout is not recorded as a failed test; the caller records
        // the single script-level failure.
        assert!(ctx.assertions.is_empty());
    }

    #[test]
    fn test_string_concatenation_and_comparison() {
        let mut ctx = ScriptContext::new();
        run(
            "var s = 'a' + 1 + true; console.log(s); console.log('abc' < 'abd');",
            &mut ctx,
        )
        .unwrap();
        assert_eq!(ctx.console_output, vec!["a1true", "true"]);
    }

    #[test]
    fn test_arrow_callback_in_pm_test() {
        let mut ctx = ScriptContext::new();
        run(
            "pm.test('arrow', () => { pm.expect(2).to.be.above(1); });",
            &mut ctx,
        )
        .unwrap();
        assert!(ctx.assertions[0].passed);
    }
}
