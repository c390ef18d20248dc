//! Operation registry.
//!
//! Maps an operation name to the factory that builds its node. Built-in
//! operations are a closed [`Builtin`] enum; hosts add their own through
//! [`Operation::Extension`].

use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::compiler::Compiler;
use crate::error::CompileResult;
use crate::node::LogicNode;

/// Factory for a host-provided operation. Receives the sub-definition stored
/// under the operation key and the compiler, which it uses to compile any
/// child definitions.
pub type OperationFactory = fn(&Json, &mut Compiler<'_>) -> CompileResult<LogicNode>;

/// Every operation shipped in the default registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Literal,
    ValueTemplate,
    StringTemplate,
    Array,
    If,
    TypeOf,
    Not,
    And,
    Or,
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Object,
    ObjectProperty,
    Map,
    Debug,
    Capitalize,
    Concat,
    Split,
    Join,
}

impl Builtin {
    pub const ALL: [Builtin; 22] = [
        Builtin::Literal,
        Builtin::ValueTemplate,
        Builtin::StringTemplate,
        Builtin::Array,
        Builtin::If,
        Builtin::TypeOf,
        Builtin::Not,
        Builtin::And,
        Builtin::Or,
        Builtin::Eq,
        Builtin::Gt,
        Builtin::Gte,
        Builtin::Lt,
        Builtin::Lte,
        Builtin::Object,
        Builtin::ObjectProperty,
        Builtin::Map,
        Builtin::Debug,
        Builtin::Capitalize,
        Builtin::Concat,
        Builtin::Split,
        Builtin::Join,
    ];

    /// Registry key for this operation.
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Literal => "literal",
            Builtin::ValueTemplate => "value-template",
            Builtin::StringTemplate => "string-template",
            Builtin::Array => "array",
            Builtin::If => "if",
            Builtin::TypeOf => "typeof",
            Builtin::Not => "not",
            Builtin::And => "and",
            Builtin::Or => "or",
            Builtin::Eq => "eq",
            Builtin::Gt => "gt",
            Builtin::Gte => "gte",
            Builtin::Lt => "lt",
            Builtin::Lte => "lte",
            Builtin::Object => "object",
            Builtin::ObjectProperty => "object-property",
            Builtin::Map => "map",
            Builtin::Debug => "debug",
            Builtin::Capitalize => "capitalize",
            Builtin::Concat => "concat",
            Builtin::Split => "split",
            Builtin::Join => "join",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Operation {
    Builtin(Builtin),
    Extension(OperationFactory),
}

/// Name to operation table.
///
/// Registries are never changed once a compilation borrows them; per-instance
/// customisation builds a new table with [`Operations::merged`].
#[derive(Debug, Clone)]
pub struct Operations {
    ops: HashMap<String, Operation>,
}

impl Operations {
    /// Registry preloaded with every built-in.
    pub fn new() -> Self {
        let mut ops = HashMap::with_capacity(Builtin::ALL.len());
        for builtin in Builtin::ALL {
            ops.insert(builtin.name().to_string(), Operation::Builtin(builtin));
        }
        Self { ops }
    }

    /// Registry with no operations, typically used to collect overrides.
    pub fn empty() -> Self {
        Self {
            ops: HashMap::new(),
        }
    }

    /// Process-wide default registry.
    pub fn defaults() -> &'static Operations {
        static DEFAULTS: OnceLock<Operations> = OnceLock::new();
        DEFAULTS.get_or_init(Operations::new)
    }

    /// Registry containing the defaults with `overrides` applied on top.
    pub fn with_overrides(overrides: &Operations) -> Self {
        Self::defaults().merged(overrides)
    }

    /// New registry where entries of `overrides` replace same-named entries
    /// of `self`.
    pub fn merged(&self, overrides: &Operations) -> Self {
        let mut ops = self.ops.clone();
        for (name, op) in &overrides.ops {
            ops.insert(name.clone(), *op);
        }
        Self { ops }
    }

    /// Register or replace an operation.
    pub fn register(&mut self, name: impl Into<String>, operation: Operation) -> Option<Operation> {
        self.ops.insert(name.into(), operation)
    }

    /// Register or replace a host extension.
    pub fn register_extension(
        &mut self,
        name: impl Into<String>,
        factory: OperationFactory,
    ) -> Option<Operation> {
        self.register(name, Operation::Extension(factory))
    }

    pub fn get(&self, name: &str) -> Option<Operation> {
        self.ops.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ops.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl Default for Operations {
    fn default() -> Self {
        Self::new()
    }
}
