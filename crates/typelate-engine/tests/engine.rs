//! End-to-end engine tests against a scripted model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use typelate_engine::{
    ApiError, ApiSurface, ClientError, EngineConfig, EngineError, Field, FunctionDecl,
    LanguageModel, ObjectDef, ParamType, ProgramError, ProgramTranslator, PromptContext, Schema,
    SchemaType, Translator, VocabularyCollection,
};

/// A model that replays scripted responses and records every prompt. Once
/// the script runs out, the last response repeats.
struct MockModel {
    responses: Vec<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockModel {
    fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, prompt: &str) -> Result<String, ClientError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let index = index.min(self.responses.len() - 1);
        Ok(self.responses[index].clone())
    }
}

/// A model whose transport always fails with a non-retryable error.
struct BrokenModel;

#[async_trait]
impl LanguageModel for BrokenModel {
    async fn complete(&self, _prompt: &str) -> Result<String, ClientError> {
        Err(ClientError::Api {
            status: 400,
            message: "bad request".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Sentiment {
    sentiment: String,
}

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

fn translator(model: MockModel, repairs: usize) -> Translator<MockModel> {
    let config = EngineConfig::builder().max_repair_attempts(repairs).build();
    Translator::new(sentiment_schema(), sentiment_vocabs(), config, model).unwrap()
}

fn math_surface(executed: Arc<AtomicUsize>) -> ApiSurface {
    let mut surface = ApiSurface::new();
    let decl = || FunctionDecl::new([ParamType::Number, ParamType::Number], ParamType::Number);

    let ops: [(&str, fn(f64, f64) -> f64); 4] = [
        ("add", |a, b| a + b),
        ("sub", |a, b| a - b),
        ("mul", |a, b| a * b),
        ("max", f64::max),
    ];
    for (name, op) in ops {
        let executed = executed.clone();
        surface.register_fn(name, decl(), move |args: Vec<Value>| {
            let executed = executed.clone();
            async move {
                executed.fetch_add(1, Ordering::SeqCst);
                let a = args[0].as_f64().ok_or("expected a number")?;
                let b = args[1].as_f64().ok_or("expected a number")?;
                Ok::<Value, ApiError>(json!(op(a, b)))
            }
        });
    }
    surface
}

#[tokio::test]
async fn valid_response_translates_first_try() {
    let model = Arc::new(MockModel::new([r#"{"sentiment": "neutral"}"#]));
    let translator = Translator::new(
        sentiment_schema(),
        sentiment_vocabs(),
        EngineConfig::default(),
        model.clone(),
    )
    .unwrap();

    let value: Sentiment = translator.translate("the weather exists").await.unwrap();
    assert_eq!(value.sentiment, "neutral");
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn casing_is_normalized_to_vocabulary() {
    let model = MockModel::new([r#"{"sentiment": "POSITIVE"}"#]);
    let translator = translator(model, 0);

    let value: Sentiment = translator.translate("this rocks").await.unwrap();
    assert_eq!(value.sentiment, "positive");
}

#[tokio::test]
async fn vocab_violation_triggers_one_repair_with_details() {
    let model = Arc::new(MockModel::new([
        r#"{"sentiment": "happy"}"#,
        r#"{"sentiment": "positive"}"#,
    ]));
    let config = EngineConfig::builder().max_repair_attempts(2).build();
    let translator = Translator::new(
        sentiment_schema(),
        sentiment_vocabs(),
        config,
        model.clone(),
    )
    .unwrap();

    let value: Sentiment = translator.translate("what a day").await.unwrap();
    assert_eq!(value.sentiment, "positive");
    assert_eq!(model.calls(), 2);

    // The repair prompt names the rejected value and the allowed list.
    let repair = model.prompt(1);
    assert!(repair.contains("happy"));
    assert!(repair.contains("negative, neutral, positive"));
    assert!(repair.contains("invalid"));
}

#[tokio::test]
async fn repair_is_bounded_to_n_plus_one_calls() {
    let model = Arc::new(MockModel::new([r#"{"sentiment": "happy"}"#]));
    let config = EngineConfig::builder().max_repair_attempts(2).build();
    let translator = Translator::new(
        sentiment_schema(),
        sentiment_vocabs(),
        config,
        model.clone(),
    )
    .unwrap();

    let result: Result<Sentiment, _> = translator.translate("always wrong").await;
    match result {
        Err(EngineError::TranslationFailed { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert!(last.to_string().contains("happy"));
        }
        other => panic!("expected TranslationFailed, got {other:?}"),
    }
    assert_eq!(model.calls(), 3);
}

#[tokio::test]
async fn prose_wrapped_json_is_accepted() {
    let model = MockModel::new([
        "Here is the translation:\n```json\n{\"sentiment\": \"negative\"}\n```",
    ]);
    let translator = translator(model, 0);

    let value: Sentiment = translator.translate("ugh").await.unwrap();
    assert_eq!(value.sentiment, "negative");
}

#[tokio::test]
async fn transport_errors_are_not_repaired() {
    let config = EngineConfig::builder().max_repair_attempts(2).build();
    let translator =
        Translator::new(sentiment_schema(), sentiment_vocabs(), config, BrokenModel).unwrap();

    let result: Result<Sentiment, _> = translator.translate("hello").await;
    assert!(matches!(result, Err(EngineError::Transport(_))));
}

#[tokio::test]
async fn conversation_context_is_capped_to_configured_budget() {
    let model = Arc::new(MockModel::new([r#"{"sentiment": "neutral"}"#]));
    let config = EngineConfig::builder().context_budget(24).build();
    let translator = Translator::new(
        sentiment_schema(),
        sentiment_vocabs(),
        config,
        model.clone(),
    )
    .unwrap();

    let mut context = PromptContext::new(4096);
    context.push("user: the first long-forgotten message");
    context.push("user: the latest message");

    let _: Sentiment = translator
        .translate_with("how do I feel", Some(&context), &CancellationToken::new())
        .await
        .unwrap();

    // Oldest entries beyond the engine's budget are dropped from the prompt.
    let prompt = model.prompt(0);
    assert!(prompt.contains("user: the latest message"));
    assert!(!prompt.contains("long-forgotten"));
}

#[tokio::test]
async fn cancellation_short_circuits_before_any_model_call() {
    let model = Arc::new(MockModel::new([r#"{"sentiment": "neutral"}"#]));
    let translator = Translator::new(
        sentiment_schema(),
        sentiment_vocabs(),
        EngineConfig::default(),
        model.clone(),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result: Result<Sentiment, _> = translator.translate_with("hi", None, &cancel).await;
    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn translated_program_executes_to_final_result() {
    let model = MockModel::new([
        r#"{"@steps": [
            {"@func": "add", "@args": [3, 4]},
            {"@func": "mul", "@args": [{"@ref": 0}, 2]}
        ]}"#,
    ]);
    let executed = Arc::new(AtomicUsize::new(0));
    let translator = ProgramTranslator::new(
        math_surface(executed.clone()),
        EngineConfig::default(),
        model,
    );

    let result = translator.execute("add three and four, then double it").await.unwrap();
    assert_eq!(result, json!(14.0));
    assert_eq!(executed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_function_rejected_before_any_step_runs() {
    let model = MockModel::new([
        r#"{"@steps": [{"@func": "divide", "@args": [8, 2]}]}"#,
    ]);
    let executed = Arc::new(AtomicUsize::new(0));
    let translator = ProgramTranslator::new(
        math_surface(executed.clone()),
        EngineConfig::default(),
        model,
    );

    let err = translator.execute("divide eight by two").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Program(ProgramError::FunctionNotFound(name)) if name == "divide"
    ));
    assert_eq!(executed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_program_json_is_repaired() {
    let model = Arc::new(MockModel::new([
        r#"{"@steps": "oops"}"#,
        r#"{"@steps": [{"@func": "add", "@args": [1, 2]}]}"#,
    ]));
    let executed = Arc::new(AtomicUsize::new(0));
    let config = EngineConfig::builder().max_repair_attempts(1).build();
    let translator =
        ProgramTranslator::new(math_surface(executed.clone()), config, model.clone());

    let result = translator.execute("one plus two").await.unwrap();
    assert_eq!(result, json!(3.0));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn not_translated_fragments_surface_to_caller() {
    let model = MockModel::new([
        r#"{
            "@steps": [{"@func": "add", "@args": [1, 2]}],
            "not_translated": ["and email it to my boss"]
        }"#,
    ]);
    let executed = Arc::new(AtomicUsize::new(0));
    let translator =
        ProgramTranslator::new(math_surface(executed), EngineConfig::default(), model);

    let program = translator
        .translate("one plus two and email it to my boss")
        .await
        .unwrap();
    assert_eq!(program.not_translated, vec!["and email it to my boss"]);
}
