//! # Typelate Engine
//!
//! Turns natural-language requests into schema-validated typed values, or
//! into validated programs over a host API, by prompting a language model and
//! repairing invalid output through a bounded retry loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  User request   │ --> │   Translator    │ --> │  Typed value /  │
//! │  (free text)    │     │  (repair loop)  │     │  Program        │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!                               │      ^
//!                        prompt │      │ diagnostic
//!                               v      │
//!                         ┌────────────────┐
//!                         │ LanguageModel  │
//!                         │ (Claude/Ollama)│
//!                         └────────────────┘
//! ```
//!
//! One translation is one logical task: the only suspension points are the
//! model call and, for programs, host function calls. Engines share only
//! read-only state (schema, vocabularies, API surface), so independent
//! translations can run concurrently without locks.
//!
//! ## Usage
//!
//! ```ignore
//! use typelate_engine::{ClaudeClient, EngineConfig, Translator};
//!
//! let config = EngineConfig::from_env();
//! let client = ClaudeClient::new(&config)?;
//! let translator = Translator::new(schema, vocabs, config, client)?;
//!
//! let sentiment: Sentiment = translator.translate("this rocks!").await?;
//! ```

mod client;
mod config;
mod engine;
mod prompt;

pub use client::{ClaudeClient, ClientError, LanguageModel, OllamaClient, DEFAULT_OLLAMA_URL};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::{EngineError, ProgramTranslator, Translator};
pub use prompt::PromptContext;

// Re-export the building blocks callers need alongside the engine.
pub use typelate_program::{
    run, ApiError, ApiSurface, FunctionDecl, ParamType, Program, ProgramError,
};
pub use typelate_schema::{
    Constraint, Diagnostics, Field, ObjectDef, Schema, SchemaError, SchemaType, Violation,
    VocabularyCollection,
};
