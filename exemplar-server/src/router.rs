use exemplar_core::models::{parse_color_list, parse_config_fields};
use exemplar_core::protocol::{ExemplarRequest, ExemplarResponse};
use exemplar_core::validate::{validate_output, validate_response_text};
use exemplar_core::ExemplarError;

use crate::context::AppContext;
use crate::subsystems::{predict, teach};

/// Dispatch one request and wrap the outcome in the response envelope.
pub async fn handle_request(request: ExemplarRequest, ctx: &AppContext) -> ExemplarResponse {
    if matches!(request, ExemplarRequest::Ping) {
        return ExemplarResponse::pong();
    }
    match dispatch(request, ctx).await {
        Ok(data) => ExemplarResponse::ok(data),
        Err(e) => {
            tracing::warn!(code = e.code(), error = %e, "Request failed");
            ExemplarResponse::from_error(&e)
        }
    }
}

pub async fn dispatch(
    request: ExemplarRequest,
    ctx: &AppContext,
) -> Result<serde_json::Value, ExemplarError> {
    match request {
        ExemplarRequest::Ping => Ok(serde_json::json!({"pong": true})),
        ExemplarRequest::Health => {
            let count = ctx
                .store
                .count()
                .await
                .map_err(ExemplarError::RetrievalUnavailable)?;
            Ok(serde_json::json!({
                "status": "healthy",
                "embedder": ctx.embedder.name(),
                "store": ctx.store.name(),
                "collection": ctx.store.collection(),
                "examples": count,
                "generation": ctx.completion.is_some(),
            }))
        }
        ExemplarRequest::Teach {
            user_input,
            correct_output,
            category,
        } => {
            let outcome =
                teach::teach(ctx, &user_input, correct_output, category.as_deref()).await?;
            Ok(serde_json::json!({
                "status": "success",
                "message": "Example embedded and saved.",
                "id": outcome.id,
                "replaced": outcome.replaced,
                "category": outcome.category,
            }))
        }
        ExemplarRequest::Predict {
            user_input,
            config_json,
            color_list,
            n_results,
        } => {
            let fields = parse_config_fields(&config_json)?;
            let colors = parse_color_list(&color_list)?;
            let outcome = predict::predict(ctx, &user_input, &fields, &colors, n_results).await?;
            serde_json::to_value(outcome).map_err(|e| ExemplarError::MalformedOutput(e.to_string()))
        }
        ExemplarRequest::Validate {
            output,
            raw,
            config_json,
        } => {
            let fields = parse_config_fields(&config_json)?;
            let (parsed, report) = match raw {
                Some(text) => validate_response_text(&text, &fields),
                None => {
                    let report = validate_output(&output, &fields);
                    (Some(output), report)
                }
            };
            Ok(serde_json::json!({
                "valid": report.valid,
                "errors": report.errors,
                "warnings": report.warnings,
                "output": parsed,
            }))
        }
        ExemplarRequest::GetExample { id } => {
            let record = ctx.store.get(&id).await.map_err(ExemplarError::RetrievalUnavailable)?;
            match record {
                Some(r) => Ok(serde_json::json!({
                    "found": true,
                    "id": r.id,
                    "input": r.input_text,
                    "output": r.expected_output,
                    "category": r.category,
                    "created_at": r.created_at,
                    "updated_at": r.updated_at,
                })),
                None => Ok(serde_json::json!({"found": false, "id": id})),
            }
        }
        ExemplarRequest::DeleteExample { id } => {
            let deleted = ctx.store.delete(&id).await?;
            tracing::info!(id = %id, deleted, "Example delete requested");
            Ok(serde_json::json!({"deleted": deleted, "id": id}))
        }
        ExemplarRequest::Stats => {
            let count = ctx
                .store
                .count()
                .await
                .map_err(ExemplarError::RetrievalUnavailable)?;
            Ok(serde_json::json!({
                "examples": count,
                "collection": ctx.store.collection(),
                "store": ctx.store.name(),
                "distance": ctx.store.distance().to_string(),
                "dimensions": ctx.store.dimensions(),
                "embedder": ctx.embedder.name(),
                "embedder_signature": ctx.embedder.signature(),
                "n_results": ctx.config.retrieval.n_results,
            }))
        }
    }
}
