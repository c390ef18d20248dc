//! Logic maps: several named or conditional definitions evaluated into one
//! result object.
//!
//! Accepted shapes:
//!
//! - `"$path"` or `{"$logic": definition}`: a single expression whose result
//!   is returned as is.
//! - `{"key": definition, ...}`: one expression per key.
//! - `[{"if": condition, ...fields}, ...]`: entries merged in order, skipping
//!   those whose condition is falsy. The remaining fields of an entry are a
//!   logic map of their own.

use serde_json::{Map, Value as Json};

use crate::compiler::EMBEDDED_LOGIC_KEY;
use crate::error::{CompileError, CompileResult, EvalError, EvalResult};
use crate::logic::Logic;
use crate::value::{Object, Value};

/// Key holding an array entry's condition.
pub const CONDITION_KEY: &str = "if";

#[derive(Debug)]
pub enum LogicMap {
    /// Pass-through expression standing for the whole map.
    Single(Logic),
    Keyed(Vec<(String, Logic)>),
    Conditional(Vec<ConditionalEntry>),
}

#[derive(Debug)]
pub struct ConditionalEntry {
    /// `None` means the entry is always included.
    pub condition: Option<Logic>,
    pub content: LogicMap,
}

/// Build a logic map compiling every definition with [`Logic::new`].
pub fn build_logic_map(definition: &Json) -> CompileResult<LogicMap> {
    build_logic_map_with(definition, &mut Logic::new)
}

/// Build a logic map with a caller-supplied facade factory, used for every
/// expression in the map including conditions and nested entries.
pub fn build_logic_map_with<F>(definition: &Json, factory: &mut F) -> CompileResult<LogicMap>
where
    F: FnMut(&Json) -> CompileResult<Logic>,
{
    match definition {
        Json::String(_) => Ok(LogicMap::Single(factory(definition)?)),
        Json::Array(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for entry in entries {
                out.push(build_entry(entry, factory)?);
            }
            Ok(LogicMap::Conditional(out))
        }
        Json::Object(fields) => {
            if let Some(logic) = fields.get(EMBEDDED_LOGIC_KEY) {
                return Ok(LogicMap::Single(factory(logic)?));
            }
            let mut out = Vec::with_capacity(fields.len());
            for (key, value) in fields {
                out.push((key.clone(), factory(value)?));
            }
            Ok(LogicMap::Keyed(out))
        }
        other => Err(CompileError::InvalidLogicMap(Value::from(other).type_name().to_string())),
    }
}

fn build_entry<F>(entry: &Json, factory: &mut F) -> CompileResult<ConditionalEntry>
where
    F: FnMut(&Json) -> CompileResult<Logic>,
{
    let Some(condition) = entry.as_object().and_then(|fields| fields.get(CONDITION_KEY)) else {
        return Ok(ConditionalEntry {
            condition: None,
            content: build_logic_map_with(entry, factory)?,
        });
    };
    let condition = factory(condition)?;
    let rest: Map<String, Json> = entry
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(key, _)| key.as_str() != CONDITION_KEY)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Ok(ConditionalEntry {
        condition: Some(condition),
        content: build_logic_map_with(&Json::Object(rest), factory)?,
    })
}

impl LogicMap {
    pub fn evaluate(&self, context: &Value) -> EvalResult {
        match self {
            LogicMap::Single(logic) => logic.evaluate(context),
            LogicMap::Keyed(entries) => {
                let mut out = Object::new();
                for (key, logic) in entries {
                    out.insert(key.clone(), logic.evaluate(context)?);
                }
                Ok(Value::object(out))
            }
            LogicMap::Conditional(entries) => {
                let mut out = Object::new();
                for entry in entries {
                    if let Some(condition) = &entry.condition {
                        if !condition.evaluate(context)?.is_truthy() {
                            continue;
                        }
                    }
                    // later entries overwrite earlier keys
                    match entry.content.evaluate(context)? {
                        Value::Object(fields) => {
                            out.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                        }
                        Value::Undefined | Value::Null => {}
                        other => {
                            return Err(EvalError::type_mismatch(
                                "logic map entry",
                                "an object",
                                &other,
                            ))
                        }
                    }
                }
                Ok(Value::object(out))
            }
        }
    }
}

/// Evaluate `logic_map` against `context`.
pub fn eval_logic_map(logic_map: &LogicMap, context: &Value) -> EvalResult {
    logic_map.evaluate(context)
}
