//! Response validation - maps raw JSON text onto a schema, aggregating every
//! violation so one repair prompt can address all of them.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::model::{Constraint, Field, ObjectDef, Schema, SchemaType};
use crate::vocab::VocabularyCollection;

/// A single validation violation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("response is not valid JSON: {message} (line {line}, column {column})")]
    ParseFailure {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("'{path}': required field is missing")]
    MissingField { path: String },

    #[error("'{path}': expected {expected}, found {found}")]
    WrongType {
        path: String,
        expected: String,
        found: String,
    },

    #[error("'{path}': '{value}' does not name a known variant (expected one of: {})", .expected.join(", "))]
    UnknownVariant {
        path: String,
        value: String,
        expected: Vec<String>,
    },

    #[error("'{path}': '{value}' is not an allowed value (allowed: {})", .allowed.join(", "))]
    VocabViolation {
        path: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("'{path}': {rule}")]
    ConstraintViolation { path: String, rule: String },

    #[error("'{path}': references unknown vocabulary '{vocab}'")]
    UnknownVocabulary { path: String, vocab: String },

    #[error("response does not match the target type: {message}")]
    Shape { message: String },
}

/// The aggregated verdict of a failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    violations: Vec<Violation>,
}

impl Diagnostics {
    fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Every violation discovered, in schema declaration order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Whether there are no violations. Never true for a returned error.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- {}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

impl From<Violation> for Diagnostics {
    fn from(violation: Violation) -> Self {
        Self::new(vec![violation])
    }
}

/// Validate raw JSON text against a schema, returning the parsed value with
/// vocabulary-constrained fields normalized to their canonical casing.
///
/// Unknown fields are tolerated (models routinely add extras); all other
/// violations are aggregated into a single [`Diagnostics`]. Pure function of
/// its inputs.
pub fn validate_value(
    raw: &str,
    schema: &Schema,
    vocabs: &VocabularyCollection,
) -> Result<Value, Diagnostics> {
    let mut value: Value = serde_json::from_str(raw).map_err(|e| {
        Diagnostics::from(Violation::ParseFailure {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        })
    })?;

    let mut violations = Vec::new();
    check_type(schema.root(), &mut value, schema, vocabs, "$", &mut violations);

    if violations.is_empty() {
        Ok(value)
    } else {
        Err(Diagnostics::new(violations))
    }
}

/// Validate raw JSON text and deserialize the normalized value into `T`.
pub fn validate<T: DeserializeOwned>(
    raw: &str,
    schema: &Schema,
    vocabs: &VocabularyCollection,
) -> Result<T, Diagnostics> {
    let value = validate_value(raw, schema, vocabs)?;
    serde_json::from_value(value).map_err(|e| {
        Violation::Shape {
            message: e.to_string(),
        }
        .into()
    })
}

fn check_type(
    ty: &SchemaType,
    value: &mut Value,
    schema: &Schema,
    vocabs: &VocabularyCollection,
    path: &str,
    out: &mut Vec<Violation>,
) {
    match ty {
        SchemaType::String => {
            if !value.is_string() {
                push_wrong_type(path, "a string", value, out);
            }
        }
        SchemaType::Number => {
            if !value.is_number() {
                push_wrong_type(path, "a number", value, out);
            }
        }
        SchemaType::Boolean => {
            if !value.is_boolean() {
                push_wrong_type(path, "a boolean", value, out);
            }
        }
        SchemaType::Literal { value: literal } => {
            if value.as_str() != Some(literal.as_str()) {
                push_wrong_type(path, &format!("the literal \"{}\"", literal), value, out);
            }
        }
        SchemaType::Array { element } => match value.as_array_mut() {
            Some(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    check_type(element, item, schema, vocabs, &item_path, out);
                }
            }
            None => push_wrong_type(path, "an array", value, out),
        },
        SchemaType::Object { name } => match schema.object(name) {
            Some(def) => check_object(def, value, schema, vocabs, path, out),
            None => out.push(Violation::Shape {
                message: format!("schema references unknown object '{}'", name),
            }),
        },
        SchemaType::Union {
            variants,
            discriminator,
        } => check_union(variants, discriminator, value, schema, vocabs, path, out),
    }
}

fn check_union(
    variants: &[String],
    discriminator: &str,
    value: &mut Value,
    schema: &Schema,
    vocabs: &VocabularyCollection,
    path: &str,
    out: &mut Vec<Violation>,
) {
    if !value.is_object() {
        push_wrong_type(path, "an object", value, out);
        return;
    }

    let tag_path = format!("{}.{}", path, discriminator);
    let tag = match value.get(discriminator) {
        Some(Value::String(tag)) => tag.clone(),
        Some(other) => {
            push_wrong_type(&tag_path, "a string", other, out);
            return;
        }
        None => {
            out.push(Violation::MissingField { path: tag_path });
            return;
        }
    };

    // Closed-world tag: the discriminator value must equal a variant's name.
    let Some(variant) = variants.iter().find(|name| **name == tag) else {
        out.push(Violation::UnknownVariant {
            path: tag_path,
            value: tag,
            expected: variants.to_vec(),
        });
        return;
    };

    match schema.object(variant) {
        Some(def) => check_object(def, value, schema, vocabs, path, out),
        None => out.push(Violation::Shape {
            message: format!("schema references unknown object '{}'", variant),
        }),
    }
}

fn check_object(
    def: &ObjectDef,
    value: &mut Value,
    schema: &Schema,
    vocabs: &VocabularyCollection,
    path: &str,
    out: &mut Vec<Violation>,
) {
    let Some(map) = value.as_object_mut() else {
        push_wrong_type(path, "an object", value, out);
        return;
    };

    for field in &def.fields {
        let field_path = format!("{}.{}", path, field.name);
        match map.get_mut(&field.name) {
            None | Some(Value::Null) => {
                if !field.optional {
                    out.push(Violation::MissingField { path: field_path });
                }
            }
            Some(field_value) => {
                check_field(field, field_value, schema, vocabs, &field_path, out);
            }
        }
    }
    // Unknown fields in `map` are deliberately ignored.
}

fn check_field(
    field: &Field,
    value: &mut Value,
    schema: &Schema,
    vocabs: &VocabularyCollection,
    path: &str,
    out: &mut Vec<Violation>,
) {
    if let Some(vocab) = &field.vocab {
        check_vocab(vocab, value, vocabs, path, out);
    } else {
        check_type(&field.ty, value, schema, vocabs, path, out);
    }

    for constraint in &field.constraints {
        check_constraint(constraint, value, path, out);
    }
}

fn check_vocab(
    vocab: &str,
    value: &mut Value,
    vocabs: &VocabularyCollection,
    path: &str,
    out: &mut Vec<Violation>,
) {
    if !vocabs.contains(vocab) {
        out.push(Violation::UnknownVocabulary {
            path: path.to_string(),
            vocab: vocab.to_string(),
        });
        return;
    }

    let Some(candidate) = value.as_str() else {
        push_wrong_type(path, "a string", value, out);
        return;
    };

    match vocabs.canonical(vocab, candidate) {
        // Accepted values are normalized to the canonical stored casing.
        Some(canonical) => {
            if canonical != candidate {
                *value = Value::String(canonical.to_string());
            }
        }
        None => out.push(Violation::VocabViolation {
            path: path.to_string(),
            value: candidate.to_string(),
            allowed: vocabs.get(vocab).unwrap_or(&[]).to_vec(),
        }),
    }
}

fn check_constraint(constraint: &Constraint, value: &Value, path: &str, out: &mut Vec<Violation>) {
    let ok = match constraint {
        Constraint::Range { min, max } => match value.as_f64() {
            Some(n) => min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi),
            None => true, // type mismatch reported separately
        },
        Constraint::Length { min, max } => match value.as_str() {
            Some(s) => {
                let len = s.chars().count();
                min.map_or(true, |lo| len >= lo) && max.map_or(true, |hi| len <= hi)
            }
            None => true,
        },
        Constraint::NonEmpty => match value {
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        },
    };

    if !ok {
        out.push(Violation::ConstraintViolation {
            path: path.to_string(),
            rule: constraint.describe(),
        });
    }
}

fn push_wrong_type(path: &str, expected: &str, found: &Value, out: &mut Vec<Violation>) {
    out.push(Violation::WrongType {
        path: path.to_string(),
        expected: expected.to_string(),
        found: found_kind(found).to_string(),
    });
}

fn found_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, ObjectDef};
    use serde::Deserialize;

    fn sentiment_schema() -> Schema {
        Schema::builder(SchemaType::object("Sentiment"))
            .object(
                ObjectDef::new("Sentiment")
                    .field(Field::new("sentiment", SchemaType::string()).vocab("sentiment")),
            )
            .build()
            .unwrap()
    }

    fn sentiment_vocabs() -> VocabularyCollection {
        VocabularyCollection::new().with("sentiment", ["negative", "neutral", "positive"])
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sentiment {
        sentiment: String,
    }

    #[test]
    fn test_parse_failure() {
        let result = validate_value("not json", &sentiment_schema(), &sentiment_vocabs());
        let diag = result.unwrap_err();
        assert!(matches!(
            diag.violations()[0],
            Violation::ParseFailure { .. }
        ));
    }

    #[test]
    fn test_vocab_accepts_any_casing_and_normalizes() {
        let value: Sentiment = validate(
            r#"{"sentiment": "POSITIVE"}"#,
            &sentiment_schema(),
            &sentiment_vocabs(),
        )
        .unwrap();

        assert_eq!(value.sentiment, "positive");
    }

    #[test]
    fn test_vocab_rejects_outsiders_with_allowed_list() {
        let diag = validate_value(
            r#"{"sentiment": "happy"}"#,
            &sentiment_schema(),
            &sentiment_vocabs(),
        )
        .unwrap_err();

        match &diag.violations()[0] {
            Violation::VocabViolation { value, allowed, .. } => {
                assert_eq!(value, "happy");
                assert_eq!(allowed, &["negative", "neutral", "positive"]);
            }
            other => panic!("unexpected violation: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let result = validate_value(
            r#"{"sentiment": "neutral", "extra": 42}"#,
            &sentiment_schema(),
            &sentiment_vocabs(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let diag = validate_value(r#"{}"#, &sentiment_schema(), &sentiment_vocabs()).unwrap_err();
        assert!(matches!(
            &diag.violations()[0],
            Violation::MissingField { path } if path == "$.sentiment"
        ));
    }

    #[test]
    fn test_optional_field_may_be_null_or_absent() {
        let schema = Schema::builder(SchemaType::object("Note"))
            .object(
                ObjectDef::new("Note")
                    .field(Field::new("text", SchemaType::string()))
                    .field(Field::new("author", SchemaType::string()).optional()),
            )
            .build()
            .unwrap();
        let vocabs = VocabularyCollection::new();

        assert!(validate_value(r#"{"text": "hi"}"#, &schema, &vocabs).is_ok());
        assert!(validate_value(r#"{"text": "hi", "author": null}"#, &schema, &vocabs).is_ok());
    }

    #[test]
    fn test_union_dispatch() {
        let schema = Schema::builder(SchemaType::union(["Cat", "Dog"], "kind"))
            .object(ObjectDef::new("Cat").field(Field::new("lives", SchemaType::number())))
            .object(ObjectDef::new("Dog").field(Field::new("good_boy", SchemaType::boolean())))
            .build()
            .unwrap();
        let vocabs = VocabularyCollection::new();

        assert!(validate_value(r#"{"kind": "Cat", "lives": 9}"#, &schema, &vocabs).is_ok());

        let diag =
            validate_value(r#"{"kind": "Hamster"}"#, &schema, &vocabs).unwrap_err();
        match &diag.violations()[0] {
            Violation::UnknownVariant { value, expected, .. } => {
                assert_eq!(value, "Hamster");
                assert_eq!(expected, &["Cat", "Dog"]);
            }
            other => panic!("unexpected violation: {other:?}"),
        }
    }

    #[test]
    fn test_union_non_string_discriminator_is_wrong_type() {
        let schema = Schema::builder(SchemaType::union(["Cat", "Dog"], "kind"))
            .object(ObjectDef::new("Cat").field(Field::new("lives", SchemaType::number())))
            .object(ObjectDef::new("Dog").field(Field::new("good_boy", SchemaType::boolean())))
            .build()
            .unwrap();
        let vocabs = VocabularyCollection::new();

        let diag = validate_value(r#"{"kind": 3}"#, &schema, &vocabs).unwrap_err();
        match &diag.violations()[0] {
            Violation::WrongType {
                path,
                expected,
                found,
            } => {
                assert_eq!(path, "$.kind");
                assert_eq!(expected, "a string");
                assert_eq!(found, "a number");
            }
            other => panic!("unexpected violation: {other:?}"),
        }
    }

    #[test]
    fn test_constraints() {
        let schema = Schema::builder(SchemaType::object("Player"))
            .object(
                ObjectDef::new("Player")
                    .field(Field::new("name", SchemaType::string()).constraint(Constraint::NonEmpty))
                    .field(Field::new("level", SchemaType::number()).constraint(
                        Constraint::Range {
                            min: Some(1.0),
                            max: Some(99.0),
                        },
                    )),
            )
            .build()
            .unwrap();
        let vocabs = VocabularyCollection::new();

        assert!(validate_value(r#"{"name": "ada", "level": 12}"#, &schema, &vocabs).is_ok());

        let diag =
            validate_value(r#"{"name": "  ", "level": 120}"#, &schema, &vocabs).unwrap_err();
        assert_eq!(diag.len(), 2);
        assert!(diag
            .violations()
            .iter()
            .all(|v| matches!(v, Violation::ConstraintViolation { .. })));
    }

    #[test]
    fn test_length_constraint() {
        let schema = Schema::builder(SchemaType::object("Profile"))
            .object(ObjectDef::new("Profile").field(
                Field::new("handle", SchemaType::string()).constraint(Constraint::Length {
                    min: Some(3),
                    max: Some(8),
                }),
            ))
            .build()
            .unwrap();
        let vocabs = VocabularyCollection::new();

        assert!(validate_value(r#"{"handle": "ada"}"#, &schema, &vocabs).is_ok());

        let diag = validate_value(r#"{"handle": "ab"}"#, &schema, &vocabs).unwrap_err();
        match &diag.violations()[0] {
            Violation::ConstraintViolation { path, rule } => {
                assert_eq!(path, "$.handle");
                assert_eq!(rule, "length must be between 3 and 8");
            }
            other => panic!("unexpected violation: {other:?}"),
        }

        let diag =
            validate_value(r#"{"handle": "adalovelace"}"#, &schema, &vocabs).unwrap_err();
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn test_all_violations_aggregated() {
        let schema = Schema::builder(SchemaType::object("Order"))
            .object(
                ObjectDef::new("Order")
                    .field(Field::new("item", SchemaType::string()))
                    .field(Field::new("quantity", SchemaType::number()))
                    .field(Field::new("size", SchemaType::string()).vocab("size")),
            )
            .build()
            .unwrap();
        let vocabs = VocabularyCollection::new().with("size", ["small", "medium", "large"]);

        let diag = validate_value(
            r#"{"quantity": "two", "size": "enormous"}"#,
            &schema,
            &vocabs,
        )
        .unwrap_err();

        // Missing field, wrong type and vocab violation all reported at once.
        assert_eq!(diag.len(), 3);
        let text = diag.to_string();
        assert!(text.contains("$.item"));
        assert!(text.contains("$.quantity"));
        assert!(text.contains("enormous"));
    }

    #[test]
    fn test_round_trip_value_preserved() {
        let schema = Schema::builder(SchemaType::object("Note"))
            .object(
                ObjectDef::new("Note")
                    .field(Field::new("text", SchemaType::string()))
                    .field(Field::new("tags", SchemaType::array(SchemaType::string()))),
            )
            .build()
            .unwrap();
        let vocabs = VocabularyCollection::new();

        let original = serde_json::json!({"text": "hello", "tags": ["a", "b"]});
        let raw = serde_json::to_string(&original).unwrap();
        let validated = validate_value(&raw, &schema, &vocabs).unwrap();
        assert_eq!(validated, original);
    }
}
