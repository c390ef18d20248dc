//! Compiled expression tree and its evaluator.
//!
//! Every operation is a direct [`LogicNode`] variant, so evaluation is a
//! match over the tree with no name lookups. Trees are immutable after
//! compilation and can be shared across threads.

use serde_json::Value as Json;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{EvalError, EvalResult};
use crate::path::{self, PathResolver};
use crate::value::{Object, Value};

/// Evaluation hook for nodes built by host extensions.
pub trait Evaluate: fmt::Debug + Send + Sync {
    fn evaluate(&self, context: &Value) -> EvalResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    TypeOf,
    Not,
    Capitalize,
}

/// Operations folded pairwise, left to right, over two or more operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    And,
    Or,
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Concat,
}

#[derive(Debug)]
pub enum LogicNode {
    /// Constant value.
    Literal(Value),
    ValueTemplate(ValueTemplate),
    StringTemplate(StringTemplate),
    If {
        condition: Box<LogicNode>,
        then: Box<LogicNode>,
        otherwise: Option<Box<LogicNode>>,
    },
    Unary(UnaryOp, Box<LogicNode>),
    Reduce(ReduceOp, Vec<LogicNode>),
    Split(Box<LogicNode>, Box<LogicNode>),
    Join(Box<LogicNode>, Box<LogicNode>),
    Array(Vec<LogicNode>),
    Object(Vec<(String, LogicNode)>),
    ObjectProperty(Vec<LogicNode>),
    Map {
        source: Box<LogicNode>,
        body: Box<LogicNode>,
    },
    Debug(DebugNode),
    Custom(Box<dyn Evaluate>),
}

impl LogicNode {
    pub fn evaluate(&self, context: &Value) -> EvalResult {
        match self {
            LogicNode::Literal(v) => Ok(v.clone()),
            LogicNode::ValueTemplate(t) => Ok(t.lookup(context)),
            LogicNode::StringTemplate(t) => t.render(context),
            LogicNode::If {
                condition,
                then,
                otherwise,
            } => {
                if condition.evaluate(context)?.is_truthy() {
                    then.evaluate(context)
                } else if let Some(otherwise) = otherwise {
                    otherwise.evaluate(context)
                } else {
                    Ok(Value::Undefined)
                }
            }
            LogicNode::Unary(op, operand) => eval_unary(*op, operand.evaluate(context)?),
            LogicNode::Reduce(op, operands) => eval_reduce(*op, operands, context),
            LogicNode::Split(value, separator) => {
                let value = value.evaluate(context)?;
                let separator = separator.evaluate(context)?;
                split(&value, &separator)
            }
            LogicNode::Join(value, separator) => {
                let value = value.evaluate(context)?;
                let separator = separator.evaluate(context)?;
                join(&value, &separator)
            }
            LogicNode::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.evaluate(context)?);
                }
                Ok(Value::array(out))
            }
            LogicNode::Object(entries) => {
                let mut out = Object::new();
                for (key, node) in entries {
                    out.insert(key.clone(), node.evaluate(context)?);
                }
                Ok(Value::object(out))
            }
            LogicNode::ObjectProperty(nodes) => {
                let mut values = Vec::with_capacity(nodes.len());
                for node in nodes {
                    values.push(node.evaluate(context)?);
                }
                Ok(object_property(values))
            }
            LogicNode::Map { source, body } => eval_map(source, body, context),
            LogicNode::Debug(debug) => debug.evaluate(context),
            LogicNode::Custom(node) => node.evaluate(context),
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            LogicNode::Literal(v) => Some(v),
            _ => None,
        }
    }
}

/// Dotted context lookup.
#[derive(Debug, Clone)]
pub struct ValueTemplate {
    path: Vec<String>,
    resolver: Arc<dyn PathResolver>,
}

impl ValueTemplate {
    pub fn new(path: Vec<String>, resolver: Arc<dyn PathResolver>) -> Self {
        Self { path, resolver }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    fn lookup(&self, context: &Value) -> Value {
        self.resolver.resolve(context, &self.path)
    }
}

#[derive(Debug)]
pub enum TemplateSegment {
    Text(String),
    /// `${name}` placeholder. `raw` is written back when the lookup is
    /// undefined.
    Placeholder { raw: String, node: LogicNode },
}

/// Text with `${path}` placeholders, split into segments at compile time.
#[derive(Debug)]
pub struct StringTemplate {
    source: String,
    segments: Vec<TemplateSegment>,
}

impl StringTemplate {
    pub fn new(source: String, segments: Vec<TemplateSegment>) -> Self {
        Self { source, segments }
    }

    /// Template text between the delimiters.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }

    fn render(&self, context: &Value) -> EvalResult {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                TemplateSegment::Text(text) => out.push_str(text),
                TemplateSegment::Placeholder { raw, node } => match node.evaluate(context)? {
                    Value::Undefined => out.push_str(raw),
                    value => out.push_str(&value.display_string()),
                },
            }
        }
        Ok(Value::from(out))
    }
}

/// Evaluation counter shared by every node under one `debug` operation.
#[derive(Debug, Default)]
pub struct DebugCounter(AtomicU64);

impl DebugCounter {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of wrapped evaluations so far.
    pub fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wrapper that logs every evaluation of the node it owns.
#[derive(Debug)]
pub struct DebugNode {
    counter: Arc<DebugCounter>,
    definition: Json,
    inner: Box<LogicNode>,
}

impl DebugNode {
    pub fn new(counter: Arc<DebugCounter>, definition: Json, inner: LogicNode) -> Self {
        Self {
            counter,
            definition,
            inner: Box::new(inner),
        }
    }

    pub fn counter(&self) -> &Arc<DebugCounter> {
        &self.counter
    }

    pub fn inner(&self) -> &LogicNode {
        &self.inner
    }

    fn evaluate(&self, context: &Value) -> EvalResult {
        let id = self.counter.next();
        tracing::info!(
            target: "userlogic::debug",
            id,
            definition = %self.definition,
            context = %context.to_json(),
            "evaluating"
        );
        let result = self.inner.evaluate(context)?;
        tracing::info!(target: "userlogic::debug", id, result = %result.to_json(), "result");
        Ok(result)
    }
}

fn eval_unary(op: UnaryOp, value: Value) -> EvalResult {
    match op {
        UnaryOp::TypeOf => Ok(Value::string(value.type_name())),
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Capitalize => {
            let s = value
                .as_str()
                .ok_or_else(|| EvalError::type_mismatch("capitalize", "a string", &value))?;
            let mut chars = s.chars();
            let out = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            };
            Ok(Value::from(out))
        }
    }
}

/// Every operand is evaluated before folding; nothing short-circuits.
fn eval_reduce(op: ReduceOp, operands: &[LogicNode], context: &Value) -> EvalResult {
    let mut values = Vec::with_capacity(operands.len());
    for operand in operands {
        values.push(operand.evaluate(context)?);
    }
    let mut iter = values.into_iter();
    let Some(mut acc) = iter.next() else {
        return Ok(Value::Undefined);
    };
    for right in iter {
        acc = reduce_pair(op, acc, right);
    }
    Ok(acc)
}

fn reduce_pair(op: ReduceOp, left: Value, right: Value) -> Value {
    use std::cmp::Ordering::{Equal, Greater, Less};

    match op {
        ReduceOp::And => {
            if left.is_truthy() {
                right
            } else {
                left
            }
        }
        ReduceOp::Or => {
            if left.is_truthy() {
                left
            } else {
                right
            }
        }
        ReduceOp::Eq => Value::Bool(left == right),
        ReduceOp::Gt => Value::Bool(left.compare(&right) == Some(Greater)),
        ReduceOp::Gte => Value::Bool(matches!(left.compare(&right), Some(Greater | Equal))),
        ReduceOp::Lt => Value::Bool(left.compare(&right) == Some(Less)),
        ReduceOp::Lte => Value::Bool(matches!(left.compare(&right), Some(Less | Equal))),
        ReduceOp::Concat => {
            let mut out = left.display_string();
            out.push_str(&right.display_string());
            Value::from(out)
        }
    }
}

fn split(value: &Value, separator: &Value) -> EvalResult {
    let s = value
        .as_str()
        .ok_or_else(|| EvalError::type_mismatch("split", "a string", value))?;
    let sep = separator
        .as_str()
        .ok_or_else(|| EvalError::type_mismatch("split", "a string separator", separator))?;
    let parts: Vec<Value> = if sep.is_empty() {
        s.chars().map(|c| Value::from(c.to_string())).collect()
    } else {
        s.split(sep).map(Value::from).collect()
    };
    Ok(Value::array(parts))
}

fn join(value: &Value, separator: &Value) -> EvalResult {
    let items = value
        .as_array()
        .ok_or_else(|| EvalError::type_mismatch("join", "an array", value))?;
    let sep = separator
        .as_str()
        .ok_or_else(|| EvalError::type_mismatch("join", "a string separator", separator))?;
    let parts: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Undefined | Value::Null => String::new(),
            other => other.display_string(),
        })
        .collect();
    Ok(Value::from(parts.join(sep)))
}

/// Walk `values[0]` through every following key. A key may be a dotted
/// string, an index or an array of segments; undefined and null keys leave
/// the current value as is.
fn object_property(values: Vec<Value>) -> Value {
    let mut iter = values.into_iter();
    let Some(mut current) = iter.next() else {
        return Value::Undefined;
    };
    for key in iter {
        let segments = match &key {
            Value::Undefined | Value::Null => continue,
            Value::Str(s) => path::split_path(s),
            Value::Array(items) => items.iter().map(Value::display_string).collect(),
            other => vec![other.display_string()],
        };
        for segment in &segments {
            current = path::step(&current, segment)
                .cloned()
                .unwrap_or(Value::Undefined);
        }
    }
    current
}

fn eval_map(source: &LogicNode, body: &LogicNode, context: &Value) -> EvalResult {
    match source.evaluate(context)? {
        Value::Object(entries) => {
            let mut out = Object::new();
            for (key, value) in entries.iter() {
                let binding = binding([("key", Value::string(key)), ("value", value.clone())]);
                out.insert(key.clone(), body.evaluate(&with_map_binding(context, binding))?);
            }
            Ok(Value::object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, value) in items.iter().enumerate() {
                let binding = binding([("index", Value::Int(index as i64)), ("value", value.clone())]);
                out.push(body.evaluate(&with_map_binding(context, binding))?);
            }
            Ok(Value::array(out))
        }
        other => Err(EvalError::type_mismatch("map", "an object or array", &other)),
    }
}

fn binding<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::object(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

/// Copy of `context` with `map` bound; the caller's context is not touched.
fn with_map_binding(context: &Value, binding: Value) -> Value {
    let mut scope = context.as_object().cloned().unwrap_or_default();
    scope.insert("map".to_string(), binding);
    Value::object(scope)
}
