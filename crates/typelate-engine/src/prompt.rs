//! Prompt assembly for translation and repair.

use std::collections::VecDeque;

use typelate_program::{ApiSurface, PROGRAM_SCHEMA_TEXT};
use typelate_schema::Diagnostics;

/// Bounded conversation context included in prompts.
///
/// Entries are kept in arrival order; when the character budget is exceeded,
/// the oldest entries are dropped first.
#[derive(Debug, Clone)]
pub struct PromptContext {
    entries: VecDeque<String>,
    budget: usize,
}

impl PromptContext {
    /// Create a context with the given character budget.
    pub fn new(budget: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            budget,
        }
    }

    /// Append an entry, evicting the oldest entries if over budget.
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push_back(entry.into());
        while self.total_chars() > self.budget && self.entries.len() > 1 {
            self.entries.pop_front();
        }
    }

    /// Whether there is no context.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A copy constrained to the given budget, evicting oldest entries as
    /// needed. Used by the engine to apply its configured budget to
    /// caller-supplied context.
    pub fn clamped(&self, budget: usize) -> PromptContext {
        let mut clamped = PromptContext::new(budget);
        for entry in &self.entries {
            clamped.push(entry.clone());
        }
        clamped
    }

    /// Render the context as one block of text.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn total_chars(&self) -> usize {
        let newlines = self.entries.len().saturating_sub(1);
        self.entries.iter().map(|e| e.chars().count()).sum::<usize>() + newlines
    }
}

/// Build the initial prompt for translating a request into typed JSON.
pub fn request_prompt(
    schema_text: &str,
    type_name: &str,
    instructions: Option<&str>,
    context: Option<&PromptContext>,
    request: &str,
) -> String {
    let mut prompt = format!(
        r#"You are a service that translates user requests into JSON objects of type "{type_name}" according to the following TypeScript definitions:
```
{schema_text}
```
"#
    );

    if let Some(instructions) = instructions {
        prompt.push_str(instructions);
        prompt.push('\n');
    }

    if let Some(context) = context {
        if !context.is_empty() {
            prompt.push_str("The conversation so far:\n\"\"\"\n");
            prompt.push_str(&context.render());
            prompt.push_str("\n\"\"\"\n");
        }
    }

    prompt.push_str(&format!(
        r#"The following is a user request:
"""
{request}
"""
The following is the user request translated into a JSON object with no extra commentary:"#
    ));

    prompt
}

/// Build the prompt for translating a request into a program over the given
/// API surface.
pub fn program_prompt(
    surface: &ApiSurface,
    instructions: Option<&str>,
    context: Option<&PromptContext>,
    request: &str,
) -> String {
    let api = api_text(surface);
    let schema_text = format!(
        "{PROGRAM_SCHEMA_TEXT}\nThe program may only call functions from the following API:\n{api}"
    );
    request_prompt(&schema_text, "Program", instructions, context, request)
}

/// Build a repair prompt from the base prompt, the invalid response and the
/// aggregated diagnostic. Only the immediately preceding failure is included,
/// which bounds prompt growth across attempts.
pub fn repair_prompt(base_prompt: &str, response: &str, diagnostic: &Diagnostics) -> String {
    format!(
        r#"{base_prompt}
"""
{response}
"""
The above JSON is invalid for the following reasons:
{diagnostic}
The following is a revised JSON object that fixes every problem:"#
    )
}

/// Render an API surface as a TypeScript-like interface description.
pub fn api_text(surface: &ApiSurface) -> String {
    let mut out = String::from("interface API {\n");
    for (name, decl) in surface.iter() {
        let params = decl
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| format!("arg{}: {}", i, p.ts_name()))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("  {}({}): {};\n", name, params, decl.returns.ts_name()));
    }
    out.push_str("}\n");
    out
}
