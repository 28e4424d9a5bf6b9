//! Request/response envelope shared by the service router, the HTTP layer and the CLI.

use serde::{Deserialize, Serialize};

use crate::error::ExemplarError;

pub const PROTOCOL: &str = "exemplar/1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ExemplarRequest {
    Ping,
    Health,
    Teach {
        user_input: String,
        correct_output: serde_json::Value,
        #[serde(default)]
        category: Option<String>,
    },
    Predict {
        user_input: String,
        /// Field list, as an array or a JSON string holding one.
        config_json: serde_json::Value,
        /// Colour list, as an array or a comma-separated string.
        #[serde(default)]
        color_list: serde_json::Value,
        #[serde(default)]
        n_results: Option<i64>,
    },
    Validate {
        /// Parsed output, or the raw model text when `raw` is set.
        #[serde(default)]
        output: serde_json::Value,
        #[serde(default)]
        raw: Option<String>,
        config_json: serde_json::Value,
    },
    GetExample {
        id: String,
    },
    DeleteExample {
        id: String,
    },
    Stats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExemplarResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub version: String,
}

impl ExemplarResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            code: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            code: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn from_error(e: &ExemplarError) -> Self {
        let mut response = Self::err(e.to_string());
        response.code = Some(e.code().to_string());
        response
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
