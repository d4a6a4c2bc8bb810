//! Script runtime values.

use super::ast::Stmt;
use std::rc::Rc;

/// Variable scope namespaces reachable from `pm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// `pm.globals`: team-wide globals (run-local snapshot).
    Globals,
    /// `pm.environment`: environment scope.
    Environment,
    /// `pm.collectionVariables`: collection scope.
    Collection,
    /// `pm.variables`: merged read view, local writes.
    Vars,
}

/// Host objects exposed to scripts.
///
/// These are the only capabilities reachable from script code; everything a
/// script can do goes through one of them.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// The `pm` root object.
    Pm,
    /// The `console` object.
    Console,
    /// The `JSON` object (`parse` / `stringify`).
    Json,
    /// One of the variable scope namespaces.
    Scope(ScopeKind),
    /// `pm.request`.
    Request,
    /// `pm.response`.
    Response,
    /// An in-flight `pm.expect(...)` chain.
    Expect {
        /// The asserted value.
        value: Box<Value>,
        /// Whether the chain passed through `.not`.
        negated: bool,
    },
}

/// A script runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    /// Object properties in insertion order.
    Object(Vec<(String, Value)>),
    /// A user-defined function value.
    Function {
        params: Vec<String>,
        body: Rc<Vec<Stmt>>,
    },
    /// A host capability.
    Host(HostValue),
}

impl Value {
    /// The type name used by the `a(type)` matcher and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function { .. } => "function",
            Value::Host(_) => "object",
        }
    }

    /// JavaScript-style truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function { .. } | Value::Host(_) => true,
        }
    }

    /// Deep equality across same-typed values. Values of different types are
    /// never equal (except that all `Null`s are).
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter()
                            .find(|(k, _)| k == key)
                            .map_or(false, |(_, v)| value.equals(v))
                    })
            }
            _ => false,
        }
    }

    /// Looks up an object property by key.
    pub fn get_property(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(props) => props.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Converts a parsed JSON document into a script value.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts a script value into JSON. Functions and host objects render
    /// as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(props) => serde_json::Value::Object(
                props
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Function { .. } | Value::Host(_) => serde_json::Value::Null,
        }
    }

    /// Human-readable rendering used by `console.log` and matcher messages.
    /// Strings render bare; everything else renders as JSON.
    pub fn display_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::Function { .. } => "[Function]".to_string(),
            Value::Host(_) => "[object Object]".to_string(),
            other => other.to_json().to_string(),
        }
    }

    /// Rendering used inside assertion messages: like `display_string` but
    /// with strings quoted, so "1" and 1 are distinguishable.
    pub fn inspect_string(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s),
            other => other.display_string(),
        }
    }
}

/// Formats a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
