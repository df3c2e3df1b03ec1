//! Program model - steps, calls and expressions, with the `@`-keyed wire
//! format models are prompted to produce.

use indexmap::IndexMap;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Contract text for the program wire format, sent to the model alongside
/// the API surface description when translating a request into a program.
pub const PROGRAM_SCHEMA_TEXT: &str = r#"type Expression = JsonValue | FunctionCall | ResultReference;

// A plain JSON value: null, boolean, number, string, array or object.
type JsonValue = null | boolean | number | string | Expression[] | { [key: string]: Expression };

interface Program {
  // Steps run in order; the last step's result is the program's result.
  "@steps": Expression[];
  // Fragments of the request that could not be mapped to any function.
  not_translated?: string[];
  // Free-text remarks about the translation.
  notes?: string;
}

interface FunctionCall {
  // Name of a function from the API surface.
  "@func": string;
  // Arguments, in declaration order. Omit for zero-argument functions.
  "@args"?: Expression[];
}

interface ResultReference {
  // Index of a previous step whose result to substitute here.
  "@ref": number;
}
"#;

/// A call to a named function of the host API.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Function name.
    pub func: String,
    /// Argument expressions in declaration order.
    pub args: Vec<Expr>,
}

impl FunctionCall {
    /// Create a call with no arguments.
    pub fn new(func: impl Into<String>) -> Self {
        Self {
            func: func.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, expr: Expr) -> Self {
        self.args.push(expr);
        self
    }
}

/// An argument expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A plain JSON scalar (null, boolean, number or string).
    Literal(Value),
    /// A back-reference to the result of an earlier step.
    Ref(usize),
    /// An array of expressions.
    Array(Vec<Expr>),
    /// An object whose values are expressions.
    Object(IndexMap<String, Expr>),
    /// A nested call, resolved before the enclosing call runs.
    Call(FunctionCall),
}

impl Expr {
    /// A literal expression from any JSON-serializable scalar.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// A back-reference to the result of step `index`.
    pub fn result(index: usize) -> Self {
        Expr::Ref(index)
    }

    /// Build an expression from a JSON value, recognizing the `@func` /
    /// `@ref` object encodings.
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Array(items) => {
                let exprs = items
                    .into_iter()
                    .map(Expr::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::Array(exprs))
            }
            Value::Object(map) => {
                if let Some(reference) = map.get("@ref") {
                    let index = reference
                        .as_u64()
                        .ok_or_else(|| "'@ref' must be a non-negative integer".to_string())?;
                    return Ok(Expr::Ref(index as usize));
                }
                if map.contains_key("@func") {
                    return call_from_map(map).map(Expr::Call);
                }
                let mut fields = IndexMap::new();
                for (key, value) in map {
                    fields.insert(key, Expr::from_value(value)?);
                }
                Ok(Expr::Object(fields))
            }
            scalar => Ok(Expr::Literal(scalar)),
        }
    }

    /// Encode the expression back into its JSON wire form.
    pub fn to_value(&self) -> Value {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Ref(index) => serde_json::json!({ "@ref": index }),
            Expr::Array(items) => Value::Array(items.iter().map(Expr::to_value).collect()),
            Expr::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, expr)| (key.clone(), expr.to_value()))
                    .collect(),
            ),
            Expr::Call(call) => {
                let args: Vec<Value> = call.args.iter().map(Expr::to_value).collect();
                if args.is_empty() {
                    serde_json::json!({ "@func": call.func })
                } else {
                    serde_json::json!({ "@func": call.func, "@args": args })
                }
            }
        }
    }
}

fn call_from_map(map: serde_json::Map<String, Value>) -> Result<FunctionCall, String> {
    let func = map
        .get("@func")
        .and_then(Value::as_str)
        .ok_or_else(|| "'@func' must be a string".to_string())?
        .to_string();

    let args = match map.get("@args") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .cloned()
            .map(Expr::from_value)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err("'@args' must be an array".to_string()),
    };

    Ok(FunctionCall { func, args })
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Expr::from_value(value).map_err(D::Error::custom)
    }
}

/// One step of a program: a function call, or a terminal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Call a host function and store its result at this step's index.
    Call(FunctionCall),
    /// Produce a value directly (may still contain back-references).
    Value(Expr),
}

impl From<Expr> for Step {
    fn from(expr: Expr) -> Self {
        match expr {
            Expr::Call(call) => Step::Call(call),
            other => Step::Value(other),
        }
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Step::Call(call) => Expr::Call(call.clone()).serialize(serializer),
            Step::Value(expr) => expr.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Expr::deserialize(deserializer)?.into())
    }
}

/// A complete program: an ordered list of steps plus translation remarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Steps, executed strictly in order.
    #[serde(rename = "@steps")]
    pub steps: Vec<Step>,
    /// Request fragments the model could not map to any call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_translated: Vec<String>,
    /// Free-text notes from the translation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Program {
    /// Create a program from its steps.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            not_translated: Vec::new(),
            notes: None,
        }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the program has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
