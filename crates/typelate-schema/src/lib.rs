//! # Typelate Schema
//!
//! Language-neutral schema model used to both render a model-facing type
//! contract and validate model responses against it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Schema Model   │ --> │    Renderer     │ --> │  Contract Text  │
//! │  + Vocabularies │     │  (TS-like)      │     │  (in prompt)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!         │
//!         v
//! ┌─────────────────┐     ┌─────────────────┐
//! │    Validator    │ <-- │  Raw response   │
//! │  (aggregating)  │     │  (JSON text)    │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! Schemas are built once with the builder API, shared read-only, and never
//! mutated afterwards. The validator is a pure function of its inputs and
//! aggregates every violation it finds so a single repair prompt can address
//! all of them.

mod model;
mod render;
mod validate;
mod vocab;

pub use model::{Constraint, Field, ObjectDef, Schema, SchemaBuilder, SchemaError, SchemaType};
pub use render::render;
pub use validate::{validate, validate_value, Diagnostics, Violation};
pub use vocab::{VocabError, VocabularyCollection};
