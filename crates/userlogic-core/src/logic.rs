use serde_json::Value as Json;
use std::sync::Arc;

use crate::compiler::{compile, CompileOptions, LookupReporter};
use crate::error::{CompileResult, EvalError, EvalResult};
use crate::node::LogicNode;
use crate::operations::Operations;
use crate::path::PathResolver;
use crate::value::{Object, Value};

/// Construction options for [`Logic`].
#[derive(Default)]
pub struct LogicOptions<'a> {
    /// Entries merged over the default registry, replacing same-named ones.
    pub operations: Option<&'a Operations>,
    pub report_lookup: Option<&'a mut LookupReporter<'a>>,
    /// Context keys every evaluation starts from.
    pub base_context: Option<Object>,
    pub resolver: Option<Arc<dyn PathResolver>>,
}

/// A definition compiled once and evaluated any number of times.
///
/// The compiled tree is immutable, so one `Logic` can be evaluated from
/// several threads at once.
#[derive(Debug)]
pub struct Logic {
    root: LogicNode,
    base_context: Object,
}

impl Logic {
    /// Compile with the default registry and no base context.
    pub fn new(definition: &Json) -> CompileResult<Self> {
        Self::with_options(definition, LogicOptions::default())
    }

    pub fn with_options(definition: &Json, options: LogicOptions<'_>) -> CompileResult<Self> {
        let merged = options.operations.map(Operations::with_overrides);
        let root = compile(
            definition,
            CompileOptions {
                operations: merged.as_ref(),
                // reborrow with a shorter bound so `merged` can be borrowed here
                report_lookup: options
                    .report_lookup
                    .map(|report| -> &mut LookupReporter<'_> { report }),
                resolver: options.resolver,
            },
        )?;
        Ok(Self {
            root,
            base_context: options.base_context.unwrap_or_default(),
        })
    }

    pub fn root(&self) -> &LogicNode {
        &self.root
    }

    pub fn base_context(&self) -> &Object {
        &self.base_context
    }

    /// Evaluate against `context` layered over the base context. Keys of
    /// `context` win; neither object is modified.
    pub fn evaluate(&self, context: &Value) -> EvalResult {
        if self.base_context.is_empty() {
            return self.root.evaluate(context);
        }
        let mut scope = self.base_context.clone();
        if let Some(entries) = context.as_object() {
            scope.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self.root.evaluate(&Value::object(scope))
    }

    /// [`Logic::evaluate`] for hosts working in `serde_json` values.
    pub fn evaluate_json(&self, context: &Json) -> Result<Json, EvalError> {
        Ok(self.evaluate(&Value::from(context))?.to_json())
    }
}
