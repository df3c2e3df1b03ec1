//! Schema model - the target data shape, independent of any host type system.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A type node in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaType {
    /// A string value.
    String,
    /// A numeric value (integer or float).
    Number,
    /// A boolean value.
    Boolean,
    /// An exact string literal.
    Literal { value: String },
    /// An array of a single element type.
    Array { element: Box<SchemaType> },
    /// A reference to a named object defined in the schema.
    Object { name: String },
    /// A tagged union over named object variants. The discriminator field's
    /// value selects the variant; it must equal the variant's own name.
    Union {
        variants: Vec<String>,
        discriminator: String,
    },
}

impl SchemaType {
    pub fn string() -> Self {
        SchemaType::String
    }

    pub fn number() -> Self {
        SchemaType::Number
    }

    pub fn boolean() -> Self {
        SchemaType::Boolean
    }

    pub fn literal(value: impl Into<String>) -> Self {
        SchemaType::Literal {
            value: value.into(),
        }
    }

    pub fn array(element: SchemaType) -> Self {
        SchemaType::Array {
            element: Box::new(element),
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        SchemaType::Object { name: name.into() }
    }

    pub fn union(
        variants: impl IntoIterator<Item = impl Into<String>>,
        discriminator: impl Into<String>,
    ) -> Self {
        SchemaType::Union {
            variants: variants.into_iter().map(Into::into).collect(),
            discriminator: discriminator.into(),
        }
    }
}

/// A value constraint declared on a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Numeric range, inclusive on both ends.
    Range { min: Option<f64>, max: Option<f64> },
    /// String length in characters, inclusive on both ends.
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    /// String or array must not be empty.
    NonEmpty,
}

impl Constraint {
    /// Human-readable rule text, used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Constraint::Range { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => format!("must be between {lo} and {hi}"),
                (Some(lo), None) => format!("must be at least {lo}"),
                (None, Some(hi)) => format!("must be at most {hi}"),
                (None, None) => "must be a number".to_string(),
            },
            Constraint::Length { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => format!("length must be between {lo} and {hi}"),
                (Some(lo), None) => format!("length must be at least {lo}"),
                (None, Some(hi)) => format!("length must be at most {hi}"),
                (None, None) => "must be a string".to_string(),
            },
            Constraint::NonEmpty => "must not be empty".to_string(),
        }
    }
}

/// A field of an object definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Field type.
    #[serde(rename = "type")]
    pub ty: SchemaType,
    /// Whether the field may be absent or null.
    #[serde(default)]
    pub optional: bool,
    /// Documentation emitted as a comment in the rendered contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Name of a vocabulary restricting this field's string values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocab: Option<String>,
    /// Value constraints checked during validation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
}

impl Field {
    /// Create a required field with the given type.
    pub fn new(name: impl Into<String>, ty: SchemaType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            doc: None,
            vocab: None,
            constraints: Vec::new(),
        }
    }

    /// Mark the field optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Attach a doc comment.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Restrict string values to a named vocabulary.
    pub fn vocab(mut self, name: impl Into<String>) -> Self {
        self.vocab = Some(name.into());
        self
    }

    /// Add a value constraint.
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// A named object definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
    /// Object name, unique within a schema.
    pub name: String,
    /// Documentation emitted above the rendered interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<Field>,
}

impl ObjectDef {
    /// Create an empty object definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            fields: Vec::new(),
        }
    }

    /// Attach a doc comment.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Add a field.
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }
}

/// Errors from schema construction and rendering.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("duplicate object definition: {0}")]
    DuplicateObject(String),

    #[error("unknown object referenced: {0}")]
    UnknownObject(String),

    #[error("unknown vocabulary referenced: {0}")]
    UnknownVocabulary(String),

    #[error("union has no variants")]
    EmptyUnion,
}

/// A complete, immutable schema: a root type plus its object definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    root: SchemaType,
    objects: IndexMap<String, ObjectDef>,
}

impl Schema {
    /// Start building a schema with the given root type.
    pub fn builder(root: SchemaType) -> SchemaBuilder {
        SchemaBuilder {
            root,
            objects: Vec::new(),
        }
    }

    /// The root type the model's response must conform to.
    pub fn root(&self) -> &SchemaType {
        &self.root
    }

    /// Look up an object definition by name.
    pub fn object(&self, name: &str) -> Option<&ObjectDef> {
        self.objects.get(name)
    }

    /// All object definitions in declaration order.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectDef> {
        self.objects.values()
    }

    /// Name of the response type as it appears in the rendered contract.
    ///
    /// For an object root this is the object's name; any other root is
    /// rendered as a `Response` type alias.
    pub fn response_type(&self) -> &str {
        match &self.root {
            SchemaType::Object { name } => name,
            _ => "Response",
        }
    }
}

/// Builder for [`Schema`]. Checks structural invariants on `build`.
#[derive(Debug)]
pub struct SchemaBuilder {
    root: SchemaType,
    objects: Vec<ObjectDef>,
}

impl SchemaBuilder {
    /// Add an object definition.
    pub fn object(mut self, def: ObjectDef) -> Self {
        self.objects.push(def);
        self
    }

    /// Finish the schema, checking that object names are unique and every
    /// object and union-variant reference resolves.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut objects = IndexMap::new();
        for def in self.objects {
            let name = def.name.clone();
            if objects.insert(name.clone(), def).is_some() {
                return Err(SchemaError::DuplicateObject(name));
            }
        }

        let schema = Schema {
            root: self.root,
            objects,
        };

        check_type(&schema.root, &schema)?;
        for def in schema.objects() {
            for field in &def.fields {
                check_type(&field.ty, &schema)?;
            }
        }

        Ok(schema)
    }
}

fn check_type(ty: &SchemaType, schema: &Schema) -> Result<(), SchemaError> {
    match ty {
        SchemaType::Object { name } => {
            if schema.object(name).is_none() {
                return Err(SchemaError::UnknownObject(name.clone()));
            }
        }
        SchemaType::Array { element } => check_type(element, schema)?,
        SchemaType::Union { variants, .. } => {
            if variants.is_empty() {
                return Err(SchemaError::EmptyUnion);
            }
            for variant in variants {
                if schema.object(variant).is_none() {
                    return Err(SchemaError::UnknownObject(variant.clone()));
                }
            }
        }
        _ => {}
    }
    Ok(())
}
