//! API surface - the host functions a program may call, with parameter and
//! return type metadata for validation and an async handler for dispatch.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

/// Error type host functions return. Boxed so embedders can use their own
/// error enums.
pub type ApiError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A callable host function.
#[async_trait]
pub trait ApiFunction: Send + Sync {
    /// Invoke the function with already-resolved argument values.
    async fn call(&self, args: Vec<Value>) -> Result<Value, ApiError>;
}

/// The JSON-level type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Any JSON value.
    Any,
    Boolean,
    Number,
    String,
    Object,
    Array,
}

impl ParamType {
    /// Whether a concrete JSON value satisfies this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::Any => true,
            ParamType::Boolean => value.is_boolean(),
            ParamType::Number => value.is_number(),
            ParamType::String => value.is_string(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }

    /// The JSON-level type of a concrete value.
    pub fn of(value: &Value) -> ParamType {
        match value {
            Value::Null => ParamType::Any,
            Value::Bool(_) => ParamType::Boolean,
            Value::Number(_) => ParamType::Number,
            Value::String(_) => ParamType::String,
            Value::Array(_) => ParamType::Array,
            Value::Object(_) => ParamType::Object,
        }
    }

    /// Whether a value of type `other` could satisfy this type.
    pub fn compatible(&self, other: &ParamType) -> bool {
        *self == ParamType::Any || *other == ParamType::Any || self == other
    }

    /// Short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Any => "any value",
            ParamType::Boolean => "a boolean",
            ParamType::Number => "a number",
            ParamType::String => "a string",
            ParamType::Object => "an object",
            ParamType::Array => "an array",
        }
    }

    /// TypeScript-style name, used when rendering the surface into a prompt.
    pub fn ts_name(&self) -> &'static str {
        match self {
            ParamType::Any => "any",
            ParamType::Boolean => "boolean",
            ParamType::Number => "number",
            ParamType::String => "string",
            ParamType::Object => "object",
            ParamType::Array => "any[]",
        }
    }
}

/// Declared signature of a host function.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    /// Parameter types in declaration order.
    pub params: Vec<ParamType>,
    /// Return type.
    pub returns: ParamType,
}

impl FunctionDecl {
    /// Create a declaration.
    pub fn new(params: impl IntoIterator<Item = ParamType>, returns: ParamType) -> Self {
        Self {
            params: params.into_iter().collect(),
            returns,
        }
    }
}

struct Registration {
    decl: FunctionDecl,
    handler: Arc<dyn ApiFunction>,
}

/// A name-to-callable registry with type metadata.
///
/// Built once at configuration time and shared read-only between concurrent
/// translations.
#[derive(Default)]
pub struct ApiSurface {
    functions: IndexMap<String, Registration>,
}

impl ApiSurface {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function implementing [`ApiFunction`].
    pub fn register(
        &mut self,
        name: impl Into<String>,
        decl: FunctionDecl,
        function: impl ApiFunction + 'static,
    ) {
        self.functions.insert(
            name.into(),
            Registration {
                decl,
                handler: Arc::new(function),
            },
        );
    }

    /// Register an async closure as a function.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, decl: FunctionDecl, f: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        self.register(name, decl, FnFunction { f });
    }

    /// Look up a function's declared signature.
    pub fn decl(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.get(name).map(|r| &r.decl)
    }

    /// Look up a function's handler.
    pub fn handler(&self, name: &str) -> Option<&dyn ApiFunction> {
        self.functions.get(name).map(|r| r.handler.as_ref())
    }

    /// Iterate declared functions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FunctionDecl)> {
        self.functions.iter().map(|(name, r)| (name.as_str(), &r.decl))
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether no functions are registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

struct FnFunction<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ApiFunction for FnFunction<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ApiError>> + Send,
{
    async fn call(&self, args: Vec<Value>) -> Result<Value, ApiError> {
        (self.f)(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_type_accepts() {
        assert!(ParamType::Number.accepts(&json!(3)));
        assert!(!ParamType::Number.accepts(&json!("3")));
        assert!(ParamType::Any.accepts(&json!({"a": 1})));
        assert!(ParamType::Object.accepts(&json!({"a": 1})));
        assert!(ParamType::Array.accepts(&json!([1, 2])));
    }

    #[test]
    fn test_compatibility() {
        assert!(ParamType::Any.compatible(&ParamType::String));
        assert!(ParamType::String.compatible(&ParamType::Any));
        assert!(ParamType::Number.compatible(&ParamType::Number));
        assert!(!ParamType::Number.compatible(&ParamType::String));
    }

    #[tokio::test]
    async fn test_register_and_dispatch() {
        let mut surface = ApiSurface::new();
        surface.register_fn(
            "add",
            FunctionDecl::new([ParamType::Number, ParamType::Number], ParamType::Number),
            |args: Vec<Value>| async move {
                let a = args[0].as_f64().unwrap_or(0.0);
                let b = args[1].as_f64().unwrap_or(0.0);
                Ok(json!(a + b))
            },
        );

        assert_eq!(surface.len(), 1);
        assert_eq!(surface.decl("add").map(|d| d.params.len()), Some(2));

        let handler = surface.handler("add").unwrap();
        let result = handler.call(vec![json!(3), json!(4)]).await.unwrap();
        assert_eq!(result, json!(7.0));
    }
}
