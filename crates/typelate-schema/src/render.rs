//! Renders a schema into the TypeScript-like contract text sent to the model.

use std::fmt::Write;

use indexmap::IndexMap;

use crate::model::{Schema, SchemaError, SchemaType};
use crate::vocab::VocabularyCollection;

/// Render a schema and its vocabularies into contract text.
///
/// Output is deterministic: objects and fields appear in declaration order.
/// A vocabulary referenced by a single field is rendered inline as a literal
/// union; one shared by several fields becomes a named reusable type alias.
pub fn render(schema: &Schema, vocabs: &VocabularyCollection) -> Result<String, SchemaError> {
    // Count vocabulary references and verify every one resolves.
    let mut usage: IndexMap<&str, usize> = IndexMap::new();
    for def in schema.objects() {
        for field in &def.fields {
            if let Some(name) = &field.vocab {
                if !vocabs.contains(name) {
                    return Err(SchemaError::UnknownVocabulary(name.clone()));
                }
                *usage.entry(name.as_str()).or_insert(0) += 1;
            }
        }
    }

    // Discriminator fields contributed by union nodes. Each variant object
    // is tagged with a literal equal to its own name.
    let mut tags: IndexMap<&str, &str> = IndexMap::new();
    collect_tags(schema.root(), &mut tags);
    for def in schema.objects() {
        for field in &def.fields {
            collect_tags(&field.ty, &mut tags);
        }
    }

    let mut out = String::new();

    let shared: Vec<&str> = usage
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(name, _)| *name)
        .collect();
    for name in &shared {
        let literals = vocabs.get(name).unwrap_or(&[]);
        writeln!(out, "type {} = {};", alias_name(name), literal_union(literals)).unwrap();
    }
    if !shared.is_empty() {
        writeln!(out).unwrap();
    }

    for def in schema.objects() {
        if let Some(doc) = &def.doc {
            writeln!(out, "// {}", doc).unwrap();
        }
        writeln!(out, "interface {} {{", def.name).unwrap();

        if let Some(discriminator) = tags.get(def.name.as_str()) {
            writeln!(out, "  {}: \"{}\";", discriminator, def.name).unwrap();
        }

        for field in &def.fields {
            if let Some(doc) = &field.doc {
                writeln!(out, "  // {}", doc).unwrap();
            }
            let ty_text = match &field.vocab {
                Some(name) if shared.contains(&name.as_str()) => alias_name(name),
                Some(name) => literal_union(vocabs.get(name).unwrap_or(&[])),
                None => type_text(&field.ty),
            };
            let marker = if field.optional { "?" } else { "" };
            writeln!(out, "  {}{}: {};", field.name, marker, ty_text).unwrap();
        }

        writeln!(out, "}}").unwrap();
        writeln!(out).unwrap();
    }

    // A non-object root gets an explicit alias so the prompt can name it.
    if !matches!(schema.root(), SchemaType::Object { .. }) {
        writeln!(
            out,
            "type {} = {};",
            schema.response_type(),
            type_text(schema.root())
        )
        .unwrap();
    }

    Ok(out.trim_end().to_string() + "\n")
}

fn collect_tags<'a>(ty: &'a SchemaType, tags: &mut IndexMap<&'a str, &'a str>) {
    match ty {
        SchemaType::Union {
            variants,
            discriminator,
        } => {
            for variant in variants {
                tags.entry(variant.as_str()).or_insert(discriminator);
            }
        }
        SchemaType::Array { element } => collect_tags(element, tags),
        _ => {}
    }
}

fn type_text(ty: &SchemaType) -> String {
    match ty {
        SchemaType::String => "string".to_string(),
        SchemaType::Number => "number".to_string(),
        SchemaType::Boolean => "boolean".to_string(),
        SchemaType::Literal { value } => format!("\"{}\"", value),
        SchemaType::Array { element } => {
            let inner = type_text(element);
            if inner.contains('|') {
                format!("({})[]", inner)
            } else {
                format!("{}[]", inner)
            }
        }
        SchemaType::Object { name } => name.clone(),
        SchemaType::Union { variants, .. } => variants.join(" | "),
    }
}

fn literal_union(literals: &[String]) -> String {
    literals
        .iter()
        .map(|literal| format!("\"{}\"", literal))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn alias_name(name: &str) -> String {
    name.split(['_', '-', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}
