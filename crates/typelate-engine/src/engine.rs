//! Translation engine - the bounded prompt/validate/repair state machine.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use typelate_program::{run_with, validate_program, Program, ProgramError};
use typelate_schema::{
    render, validate, validate_value, Diagnostics, Schema, SchemaError, Violation,
    VocabularyCollection,
};

use crate::client::{ClientError, LanguageModel};
use crate::config::EngineConfig;
use crate::prompt::{self, PromptContext};

use typelate_program::ApiSurface;

/// Errors from the translation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The model could not be reached after transport retries.
    #[error("model transport failed: {0}")]
    Transport(#[from] ClientError),

    /// Repair attempts were exhausted; carries the last diagnostic.
    #[error("translation failed after {attempts} attempt(s):\n{last}")]
    TranslationFailed { attempts: usize, last: Diagnostics },

    /// The schema could not be rendered.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The translated program is structurally unrunnable, or failed to run.
    #[error(transparent)]
    Program(#[from] ProgramError),

    /// The operation was abandoned by caller request.
    #[error("translation was cancelled")]
    Cancelled,
}

/// Translates natural-language requests into values of a target schema.
///
/// Holds only read-only state; one instance can serve concurrent
/// translations, each running as an independent task.
pub struct Translator<M> {
    schema: Schema,
    vocabs: VocabularyCollection,
    config: EngineConfig,
    model: M,
    schema_text: String,
}

impl<M: LanguageModel> Translator<M> {
    /// Create a translator. Renders the schema contract once up front.
    pub fn new(
        schema: Schema,
        vocabs: VocabularyCollection,
        config: EngineConfig,
        model: M,
    ) -> Result<Self, EngineError> {
        let schema_text = render(&schema, &vocabs)?;
        Ok(Self {
            schema,
            vocabs,
            config,
            model,
            schema_text,
        })
    }

    /// The rendered contract text sent to the model.
    pub fn schema_text(&self) -> &str {
        &self.schema_text
    }

    /// Translate a request into a typed value.
    pub async fn translate<T: DeserializeOwned>(&self, request: &str) -> Result<T, EngineError> {
        self.translate_with(request, None, &CancellationToken::new())
            .await
    }

    /// Translate with conversation context and a cancellation token.
    pub async fn translate_with<T: DeserializeOwned>(
        &self,
        request: &str,
        context: Option<&PromptContext>,
        cancel: &CancellationToken,
    ) -> Result<T, EngineError> {
        let context = context.map(|c| c.clamped(self.config.context_budget));
        let base_prompt = prompt::request_prompt(
            &self.schema_text,
            self.schema.response_type(),
            self.config.instructions.as_deref(),
            context.as_ref(),
            request,
        );

        translate_loop(&self.model, &self.config, base_prompt, cancel, |json| {
            validate::<T>(json, &self.schema, &self.vocabs)
        })
        .await
    }

    /// Translate a request into a validated, normalized JSON value.
    pub async fn translate_value(&self, request: &str) -> Result<Value, EngineError> {
        let base_prompt = prompt::request_prompt(
            &self.schema_text,
            self.schema.response_type(),
            self.config.instructions.as_deref(),
            None,
            request,
        );

        translate_loop(
            &self.model,
            &self.config,
            base_prompt,
            &CancellationToken::new(),
            |json| validate_value(json, &self.schema, &self.vocabs),
        )
        .await
    }
}

/// Translates natural-language requests into programs over an API surface,
/// and optionally executes them.
pub struct ProgramTranslator<M> {
    surface: ApiSurface,
    config: EngineConfig,
    model: M,
}

impl<M: LanguageModel> ProgramTranslator<M> {
    /// Create a program translator over the given API surface.
    pub fn new(surface: ApiSurface, config: EngineConfig, model: M) -> Self {
        Self {
            surface,
            config,
            model,
        }
    }

    /// The API surface programs are validated and executed against.
    pub fn surface(&self) -> &ApiSurface {
        &self.surface
    }

    /// Translate a request into a validated program. Schema-level problems in
    /// the model's JSON are repaired; a structurally unrunnable program is
    /// surfaced as an error without re-prompting.
    pub async fn translate(&self, request: &str) -> Result<Program, EngineError> {
        self.translate_with(request, None, &CancellationToken::new())
            .await
    }

    /// Translate with conversation context and a cancellation token.
    pub async fn translate_with(
        &self,
        request: &str,
        context: Option<&PromptContext>,
        cancel: &CancellationToken,
    ) -> Result<Program, EngineError> {
        let context = context.map(|c| c.clamped(self.config.context_budget));
        let base_prompt = prompt::program_prompt(
            &self.surface,
            self.config.instructions.as_deref(),
            context.as_ref(),
            request,
        );

        let program = translate_loop(
            &self.model,
            &self.config,
            base_prompt,
            cancel,
            parse_program,
        )
        .await?;

        validate_program(&program, &self.surface)?;
        Ok(program)
    }

    /// Translate a request and execute the resulting program, returning the
    /// final step's result.
    pub async fn execute(&self, request: &str) -> Result<Value, EngineError> {
        self.execute_with(request, None, &CancellationToken::new())
            .await
    }

    /// Translate and execute with context and cancellation.
    pub async fn execute_with(
        &self,
        request: &str,
        context: Option<&PromptContext>,
        cancel: &CancellationToken,
    ) -> Result<Value, EngineError> {
        let program = self.translate_with(request, context, cancel).await?;
        info!(steps = program.len(), "executing translated program");
        let result = run_with(&program, &self.surface, cancel).await?;
        Ok(result)
    }
}

/// The prompt → model → validate → repair loop shared by both translators.
///
/// Makes at most `max_repair_attempts + 1` model calls, strictly
/// sequentially. Each repair prompt carries only the immediately preceding
/// failure, which bounds prompt growth.
async fn translate_loop<M, T>(
    model: &M,
    config: &EngineConfig,
    base_prompt: String,
    cancel: &CancellationToken,
    check: impl Fn(&str) -> Result<T, Diagnostics>,
) -> Result<T, EngineError>
where
    M: LanguageModel,
{
    let mut prompt = base_prompt.clone();
    let mut attempt = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        debug!(attempt, "prompting model");
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = model.complete(&prompt) => result?,
        };

        let json = extract_json(&response);
        match check(json) {
            Ok(value) => {
                info!(attempts = attempt + 1, "translation validated");
                return Ok(value);
            }
            Err(diagnostic) => {
                warn!(attempt, %diagnostic, "validation failed");
                if attempt >= config.max_repair_attempts {
                    return Err(EngineError::TranslationFailed {
                        attempts: attempt + 1,
                        last: diagnostic,
                    });
                }
                prompt = prompt::repair_prompt(&base_prompt, &response, &diagnostic);
                attempt += 1;
            }
        }
    }
}

/// Parse translated JSON into a [`Program`], folding parse and shape errors
/// into repairable diagnostics.
fn parse_program(json: &str) -> Result<Program, Diagnostics> {
    let value: Value = serde_json::from_str(json).map_err(|e| {
        Diagnostics::from(Violation::ParseFailure {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        })
    })?;

    serde_json::from_value(value).map_err(|e| {
        Violation::Shape {
            message: e.to_string(),
        }
        .into()
    })
}

/// Slice the first JSON value out of a response that may wrap it in prose or
/// code fences.
fn extract_json(text: &str) -> &str {
    let start = text.find(['{', '[']);
    let end = text.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if end >= start => &text[start..=end],
        _ => text,
    }
}
