//! Teach: record a corrected answer for an input so later predictions can retrieve it.

use exemplar_core::models::{example_id, ExampleMetadata, DEFAULT_CATEGORY};
use exemplar_core::ExemplarError;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Clone, Serialize)]
pub struct TeachOutcome {
    pub id: String,
    pub replaced: bool,
    pub category: String,
}

/// Embed `user_input` and upsert it with its correct output.
///
/// The id is the SHA-256 of the input, so teaching the same input again
/// replaces the previous answer.
pub async fn teach(
    ctx: &AppContext,
    user_input: &str,
    correct_output: serde_json::Value,
    category: Option<&str>,
) -> Result<TeachOutcome, ExemplarError> {
    if user_input.trim().is_empty() {
        return Err(ExemplarError::InvalidInput("user_input must not be empty".to_string()));
    }

    let category = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();

    let vector = ctx.embedder.embed(user_input).await?;
    let id = example_id(user_input);

    let outcome = ctx
        .store
        .upsert(
            &id,
            vector,
            user_input,
            ExampleMetadata {
                output: correct_output,
                category: category.clone(),
            },
        )
        .await?;

    tracing::info!(
        id = %id,
        category = %category,
        replaced = outcome.is_replaced(),
        store = ctx.store.name(),
        "Example taught"
    );

    Ok(TeachOutcome {
        id,
        replaced: outcome.is_replaced(),
        category,
    })
}
