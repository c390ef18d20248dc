use thiserror::Error;

use crate::value::Value;

pub type CompileResult<T> = Result<T, CompileError>;
pub type EvalResult = Result<Value, EvalError>;

/// Failure while turning a definition into a node tree. Compilation never
/// returns a partial tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("no such operation: {0}")]
    UnknownOperation(String),

    #[error("template strings beginning with ` must end with a `: {0}")]
    MalformedTemplate(String),

    #[error("operation '{op}' expects {expected}")]
    InvalidArguments { op: String, expected: &'static str },

    #[error("logic map definition must be a string, array or object, got {0}")]
    InvalidLogicMap(String),
}

impl CompileError {
    pub fn invalid_arguments(op: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidArguments {
            op: op.into(),
            expected,
        }
    }
}

/// Failure raised while evaluating a compiled tree against a context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{op}: expected {expected}, got {found}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0}")]
    Message(String),
}

impl EvalError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    pub fn type_mismatch(op: &'static str, expected: &'static str, found: &Value) -> Self {
        Self::TypeMismatch {
            op,
            expected,
            found: found.type_name(),
        }
    }
}
