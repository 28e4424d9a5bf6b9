//! Predict: retrieve similar examples and assemble the extraction prompt.
//!
//! With a completion backend configured, the prompt is also sent to the model
//! and the answer is parsed and checked by the output validator.

use exemplar_core::prompt::assemble_prompt;
use exemplar_core::validate::{validate_response_text, ValidationReport};
use exemplar_core::{Candidate, ConfigField, ExemplarError};
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Clone, Serialize)]
pub struct PredictOutcome {
    pub prompt: String,
    /// Inputs of the retrieved examples, closest first.
    pub used_examples: Vec<String>,
    /// The same examples with output, distance and id.
    pub examples: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

pub async fn predict(
    ctx: &AppContext,
    user_input: &str,
    fields: &[ConfigField],
    colors: &[String],
    n_results: Option<i64>,
) -> Result<PredictOutcome, ExemplarError> {
    if user_input.trim().is_empty() {
        return Err(ExemplarError::InvalidInput("user_input must not be empty".to_string()));
    }

    let n = n_results.unwrap_or(ctx.config.retrieval.n_results);
    let examples = ctx.retriever().find_similar(user_input, n).await?;
    let prompt = assemble_prompt(fields, user_input, &examples, colors);

    tracing::info!(
        examples = examples.len(),
        fields = fields.len(),
        colors = colors.len(),
        prompt_chars = prompt.len(),
        "Prompt assembled"
    );

    let mut outcome = PredictOutcome {
        prompt,
        used_examples: examples.iter().map(|c| c.input.clone()).collect(),
        examples,
        result: None,
        validation: None,
        raw_response: None,
    };

    if let Some(completion) = &ctx.completion {
        let raw = completion.complete(&outcome.prompt).await?;
        let (result, report) = validate_response_text(&raw, fields);
        if !report.valid {
            tracing::warn!(errors = ?report.errors, "Model output failed validation");
        }
        outcome.result = result;
        outcome.validation = Some(report);
        outcome.raw_response = Some(raw);
    }

    Ok(outcome)
}
