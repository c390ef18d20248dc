//! Definition to [`LogicNode`] compiler.
//!
//! Dispatch is syntax-directed:
//!
//! | definition | operation |
//! |---|---|
//! | `"$a.b"` | `value-template` over `["a", "b"]` |
//! | `` "`text`" `` | `string-template` |
//! | any other string, number, bool, null | `literal` |
//! | array | `array` |
//! | `{"op": sub}` | registry entry `op`, called with `sub` |
//!
//! Lookups are reported while compiling, once per value template, in
//! definition order.

use serde_json::Value as Json;
use std::sync::Arc;

use crate::error::{CompileError, CompileResult};
use crate::node::{
    DebugCounter, DebugNode, LogicNode, ReduceOp, StringTemplate, TemplateSegment, UnaryOp,
    ValueTemplate,
};
use crate::operations::{Builtin, Operation, Operations};
use crate::path::{split_path, PathResolver, PlainResolver};
use crate::value::{Object, Value};

const VALUE_SIGIL: char = '$';
const TEMPLATE_MARKER: char = '`';
/// Key that embeds a full expression inside a literal.
pub const EMBEDDED_LOGIC_KEY: &str = "$logic";

/// Callback receiving every path a definition reads.
pub type LookupReporter<'a> = dyn FnMut(&[String]) + 'a;

/// Options for [`compile`]. Unset fields fall back to the default registry,
/// no lookup reporting and [`PlainResolver`].
#[derive(Default)]
pub struct CompileOptions<'a> {
    pub operations: Option<&'a Operations>,
    pub report_lookup: Option<&'a mut LookupReporter<'a>>,
    pub resolver: Option<Arc<dyn PathResolver>>,
}

/// Compile `definition` into an evaluatable tree.
pub fn compile(definition: &Json, options: CompileOptions<'_>) -> CompileResult<LogicNode> {
    let operations = options.operations.unwrap_or_else(|| Operations::defaults());
    let resolver = options
        .resolver
        .unwrap_or_else(|| Arc::new(PlainResolver) as Arc<dyn PathResolver>);
    match options.report_lookup {
        Some(report) => Compiler::new(operations, report, resolver).parse(definition),
        None => Compiler::new(operations, &mut |_: &[String]| {}, resolver).parse(definition),
    }
}

/// Every context path `definition` reads, in definition order.
pub fn collect_lookups(definition: &Json) -> CompileResult<Vec<Vec<String>>> {
    let mut paths = Vec::new();
    let mut record = |path: &[String]| paths.push(path.to_vec());
    compile(
        definition,
        CompileOptions {
            report_lookup: Some(&mut record),
            ..Default::default()
        },
    )?;
    Ok(paths)
}

/// Compilation state threaded through the whole tree.
///
/// Operation factories receive it and call [`Compiler::parse`] for their
/// children so the registry, lookup reporter, resolver and any enclosing
/// `debug` wrapper apply at every depth.
pub struct Compiler<'a> {
    operations: &'a Operations,
    report_lookup: &'a mut LookupReporter<'a>,
    resolver: Arc<dyn PathResolver>,
    debug: Option<Arc<DebugCounter>>,
}

impl<'a> Compiler<'a> {
    pub fn new(
        operations: &'a Operations,
        report_lookup: &'a mut LookupReporter<'a>,
        resolver: Arc<dyn PathResolver>,
    ) -> Self {
        Self {
            operations,
            report_lookup,
            resolver,
            debug: None,
        }
    }

    pub fn operations(&self) -> &Operations {
        self.operations
    }

    pub fn resolver(&self) -> Arc<dyn PathResolver> {
        Arc::clone(&self.resolver)
    }

    /// Forward a context path to the lookup reporter.
    pub fn report(&mut self, path: &[String]) {
        tracing::trace!(path = ?path, "lookup");
        (self.report_lookup)(path);
    }

    /// Compile a child definition. Inside a `debug` operation the result is
    /// wrapped so each evaluation is logged.
    pub fn parse(&mut self, definition: &Json) -> CompileResult<LogicNode> {
        let node = self.dispatch(definition)?;
        Ok(match &self.debug {
            Some(counter) => LogicNode::Debug(DebugNode::new(
                Arc::clone(counter),
                definition.clone(),
                node,
            )),
            None => node,
        })
    }

    /// Compile each element of an array sub-definition.
    pub fn parse_all(&mut self, definitions: &[Json]) -> CompileResult<Vec<LogicNode>> {
        definitions.iter().map(|d| self.parse(d)).collect()
    }

    fn dispatch(&mut self, definition: &Json) -> CompileResult<LogicNode> {
        match definition {
            Json::String(s) => {
                if let Some(path) = s.strip_prefix(VALUE_SIGIL) {
                    self.invoke(Builtin::ValueTemplate.name(), &Json::String(path.to_string()))
                } else if let Some(body) = s.strip_prefix(TEMPLATE_MARKER) {
                    // a lone marker opens and closes at once
                    let inner = if body.is_empty() {
                        body
                    } else {
                        body.strip_suffix(TEMPLATE_MARKER)
                            .ok_or_else(|| CompileError::MalformedTemplate(s.clone()))?
                    };
                    self.invoke(Builtin::StringTemplate.name(), &Json::String(inner.to_string()))
                } else {
                    self.invoke(Builtin::Literal.name(), definition)
                }
            }
            Json::Array(_) => self.invoke(Builtin::Array.name(), definition),
            Json::Object(entries) => match entries.iter().next() {
                Some((name, sub)) => self.invoke(name, sub),
                None => self.invoke(Builtin::Literal.name(), definition),
            },
            _ => self.invoke(Builtin::Literal.name(), definition),
        }
    }

    fn invoke(&mut self, name: &str, definition: &Json) -> CompileResult<LogicNode> {
        tracing::trace!(operation = name, "compile");
        match self.operations.get(name) {
            Some(Operation::Builtin(builtin)) => self.builtin(builtin, definition),
            Some(Operation::Extension(factory)) => factory(definition, self),
            None => Err(CompileError::UnknownOperation(name.to_string())),
        }
    }

    fn builtin(&mut self, builtin: Builtin, definition: &Json) -> CompileResult<LogicNode> {
        let name = builtin.name();
        match builtin {
            Builtin::Literal => self.literal(definition),
            Builtin::ValueTemplate => {
                let path = definition
                    .as_str()
                    .ok_or_else(|| CompileError::invalid_arguments(name, "a dotted path string"))?;
                let path = split_path(path);
                self.report(&path);
                Ok(LogicNode::ValueTemplate(ValueTemplate::new(path, self.resolver())))
            }
            Builtin::StringTemplate => {
                let text = definition
                    .as_str()
                    .ok_or_else(|| CompileError::invalid_arguments(name, "template text"))?;
                self.string_template(text)
            }
            Builtin::Array => {
                let items = operands(name, definition, 0, None)?;
                Ok(LogicNode::Array(self.parse_all(items)?))
            }
            Builtin::If => {
                let args = operands(name, definition, 2, Some(3))?;
                Ok(LogicNode::If {
                    condition: Box::new(self.parse(&args[0])?),
                    then: Box::new(self.parse(&args[1])?),
                    otherwise: match args.get(2) {
                        Some(otherwise) => Some(Box::new(self.parse(otherwise)?)),
                        None => None,
                    },
                })
            }
            Builtin::TypeOf => self.unary(UnaryOp::TypeOf, definition),
            Builtin::Not => self.unary(UnaryOp::Not, definition),
            Builtin::Capitalize => self.unary(UnaryOp::Capitalize, definition),
            Builtin::And => self.reduce(name, ReduceOp::And, definition),
            Builtin::Or => self.reduce(name, ReduceOp::Or, definition),
            Builtin::Eq => self.reduce(name, ReduceOp::Eq, definition),
            Builtin::Gt => self.reduce(name, ReduceOp::Gt, definition),
            Builtin::Gte => self.reduce(name, ReduceOp::Gte, definition),
            Builtin::Lt => self.reduce(name, ReduceOp::Lt, definition),
            Builtin::Lte => self.reduce(name, ReduceOp::Lte, definition),
            Builtin::Concat => self.reduce(name, ReduceOp::Concat, definition),
            Builtin::Split => {
                let args = operands(name, definition, 2, Some(2))?;
                Ok(LogicNode::Split(
                    Box::new(self.parse(&args[0])?),
                    Box::new(self.parse(&args[1])?),
                ))
            }
            Builtin::Join => {
                let args = operands(name, definition, 2, Some(2))?;
                Ok(LogicNode::Join(
                    Box::new(self.parse(&args[0])?),
                    Box::new(self.parse(&args[1])?),
                ))
            }
            Builtin::Object => {
                let entries = definition
                    .as_object()
                    .ok_or_else(|| CompileError::invalid_arguments(name, "a mapping of definitions"))?;
                let mut nodes = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    nodes.push((key.clone(), self.parse(value)?));
                }
                Ok(LogicNode::Object(nodes))
            }
            Builtin::ObjectProperty => {
                let args = operands(name, definition, 2, None)?;
                Ok(LogicNode::ObjectProperty(self.parse_all(args)?))
            }
            Builtin::Map => {
                let args = operands(name, definition, 2, Some(2))?;
                Ok(LogicNode::Map {
                    source: Box::new(self.parse(&args[0])?),
                    body: Box::new(self.parse(&args[1])?),
                })
            }
            Builtin::Debug => {
                let outer = self.debug.replace(Arc::new(DebugCounter::default()));
                let node = self.parse(definition);
                self.debug = outer;
                node
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, definition: &Json) -> CompileResult<LogicNode> {
        Ok(LogicNode::Unary(op, Box::new(self.parse(definition)?)))
    }

    fn reduce(&mut self, name: &str, op: ReduceOp, definition: &Json) -> CompileResult<LogicNode> {
        let args = operands(name, definition, 2, None)?;
        Ok(LogicNode::Reduce(op, self.parse_all(args)?))
    }

    /// Literal compilation. Arrays and mappings recurse as literals, a
    /// mapping holding [`EMBEDDED_LOGIC_KEY`] compiles that value as a full
    /// expression. Subtrees without embedded logic fold into one constant.
    fn literal(&mut self, definition: &Json) -> CompileResult<LogicNode> {
        match definition {
            Json::Array(items) => {
                let mut nodes = Vec::with_capacity(items.len());
                for item in items {
                    nodes.push(self.literal(item)?);
                }
                if let Some(values) = all_literals(nodes.iter()) {
                    return Ok(LogicNode::Literal(Value::array(values)));
                }
                Ok(LogicNode::Array(nodes))
            }
            Json::Object(entries) => {
                if let Some(embedded) = entries.get(EMBEDDED_LOGIC_KEY) {
                    return self.parse(embedded);
                }
                let mut nodes = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    nodes.push((key.clone(), self.literal(value)?));
                }
                if let Some(values) = all_literals(nodes.iter().map(|(_, node)| node)) {
                    let object: Object = nodes.iter().map(|(key, _)| key.clone()).zip(values).collect();
                    return Ok(LogicNode::Literal(Value::object(object)));
                }
                Ok(LogicNode::Object(nodes))
            }
            other => Ok(LogicNode::Literal(Value::from(other))),
        }
    }

    /// Split `text` on `${name}` placeholders. Each placeholder compiles as
    /// the value template `$name`.
    fn string_template(&mut self, text: &str) -> CompileResult<LogicNode> {
        let mut segments = Vec::new();
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            let after = &rest[start + 2..];
            let Some(len) = after.find('}') else {
                break;
            };
            if len == 0 {
                // `${}` is plain text
                push_text(&mut segments, &rest[..start + 3]);
                rest = &rest[start + 3..];
                continue;
            }
            push_text(&mut segments, &rest[..start]);
            let name = &after[..len];
            let node = self.parse(&Json::String(format!("{}{}", VALUE_SIGIL, name)))?;
            segments.push(TemplateSegment::Placeholder {
                raw: format!("${{{name}}}"),
                node,
            });
            rest = &after[len + 1..];
        }
        push_text(&mut segments, rest);
        Ok(LogicNode::StringTemplate(StringTemplate::new(
            text.to_string(),
            segments,
        )))
    }
}

fn push_text(segments: &mut Vec<TemplateSegment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(TemplateSegment::Text(last)) = segments.last_mut() {
        last.push_str(text);
    } else {
        segments.push(TemplateSegment::Text(text.to_string()));
    }
}

fn all_literals<'n>(nodes: impl Iterator<Item = &'n LogicNode>) -> Option<Vec<Value>> {
    nodes.map(|node| node.as_literal().cloned()).collect()
}

/// Positional operands of an operation, with arity checked.
fn operands<'d>(
    name: &str,
    definition: &'d Json,
    min: usize,
    max: Option<usize>,
) -> CompileResult<&'d [Json]> {
    let expected = match (min, max) {
        (0, None) => "an array of definitions",
        (2, Some(2)) => "exactly 2 operands",
        (2, Some(3)) => "2 or 3 operands",
        _ => "at least 2 operands",
    };
    let args = definition
        .as_array()
        .ok_or_else(|| CompileError::invalid_arguments(name, expected))?;
    if args.len() < min || max.is_some_and(|max| args.len() > max) {
        return Err(CompileError::invalid_arguments(name, expected));
    }
    Ok(args)
}
