//! Userlogic core crate.
//!
//! Compiles JSON-shaped definitions into immutable expression trees and
//! evaluates them against a runtime context. Layers, leaves first:
//!
//! - `value`: closed runtime value model and JSON conversions.
//! - `path`: context path resolution, injectable per compilation.
//! - `operations`: name to operation registry, built-ins plus extensions.
//! - `compiler` + `node`: syntax-directed compilation into [`LogicNode`]
//!   trees and their evaluation.
//! - `logic`: compile-once, evaluate-many facade with a base context.
//! - `logic_map`: named and conditional groups of definitions merged into a
//!   single result object.
//!
//! Compile errors surface at construction, never mid-evaluation. A missing
//! context path is not an error: it evaluates to [`Value::Undefined`].

pub mod compiler;
pub mod error;
pub mod logic;
pub mod logic_map;
pub mod node;
pub mod operations;
pub mod path;
pub mod value;

pub use compiler::{collect_lookups, compile, CompileOptions, Compiler, LookupReporter};
pub use error::{CompileError, CompileResult, EvalError, EvalResult};
pub use logic::{Logic, LogicOptions};
pub use logic_map::{
    build_logic_map, build_logic_map_with, eval_logic_map, ConditionalEntry, LogicMap,
};
pub use node::{Evaluate, LogicNode};
pub use operations::{Builtin, Operation, OperationFactory, Operations};
pub use path::{InheritingResolver, PathResolver, PlainResolver};
pub use value::{Object, Value};
