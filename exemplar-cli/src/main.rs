//! exemplar-cli — command-line client for the Exemplar HTTP API
//!
//! # Subcommands
//! - `teach <input> <output-json> [--category <c>]` — store a corrected example
//! - `predict <input> --fields <json|@file> [--colors "Blue, Red"] [-n <k>] [--json]`
//! - `validate <output-json> --fields <json|@file>` — check a model answer
//! - `show <id>` / `forget <id>`                     — inspect or delete one example
//! - `status`                                        — show server health and stats

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8766";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "exemplar-cli",
    version,
    about = "Teach and query the Exemplar order-extraction example store"
)]
struct Cli {
    /// Exemplar HTTP server URL (overrides EXEMPLAR_HTTP_URL env var)
    #[arg(long, env = "EXEMPLAR_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Store the correct output for an input
    Teach {
        /// The raw order text
        input: String,

        /// Correct extraction, as JSON
        output: String,

        #[arg(long)]
        category: Option<String>,
    },

    /// Build the extraction prompt for an input
    Predict {
        input: String,

        /// Field list as JSON, or @path to a JSON file
        #[arg(long)]
        fields: String,

        /// Comma-separated supported colours
        #[arg(long, default_value = "")]
        colors: String,

        /// Number of similar examples to include
        #[arg(short = 'n', long)]
        n_results: Option<i64>,

        /// Print the full JSON response instead of the prompt
        #[arg(long)]
        json: bool,
    },

    /// Validate a model answer against a field list
    Validate {
        /// Model answer (code fences allowed), or @path
        output: String,

        /// Field list as JSON, or @path to a JSON file
        #[arg(long)]
        fields: String,
    },

    /// Show one taught example
    Show { id: String },

    /// Delete one taught example
    Forget { id: String },

    /// Show Exemplar server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// One retrieved example as listed under `examples`.
#[derive(Debug, Deserialize)]
pub struct RetrievedExample {
    #[serde(default)]
    pub distance: f64,
}

/// Response from POST /predict
#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    pub prompt: String,
    /// Inputs of the retrieved examples, closest first.
    #[serde(default)]
    pub used_examples: Vec<String>,
    #[serde(default)]
    pub examples: Vec<RetrievedExample>,
    pub result: Option<serde_json::Value>,
    pub took_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Read `@path` arguments from disk; anything else is returned as-is.
pub fn read_arg(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix('@') {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => Ok(value.to_string()),
    }
}

/// Parse a JSON argument, naming it in the error.
pub fn parse_json_arg(name: &str, value: &str) -> anyhow::Result<serde_json::Value> {
    serde_json::from_str(value).map_err(|e| anyhow::anyhow!("{} is not valid JSON: {}", name, e))
}

/// First 12 hex chars of an example id.
pub fn short_id(id: &str) -> &str {
    &id[..12.min(id.len())]
}

/// Human-readable summary of a predict response.
pub fn render_prediction(resp: &PredictResponse) -> String {
    let mut out = String::new();
    if resp.used_examples.is_empty() {
        out.push_str("No similar examples.\n");
    } else {
        out.push_str(&format!("{} similar example(s):\n", resp.used_examples.len()));
        for (i, input) in resp.used_examples.iter().enumerate() {
            match resp.examples.get(i) {
                Some(ex) => out.push_str(&format!("  [{:.3}] {}\n", ex.distance, input)),
                None => out.push_str(&format!("  {}\n", input)),
            }
        }
    }
    if let Some(result) = &resp.result {
        out.push_str(&format!("\nResult: {}\n", result));
    }
    if let Some(ms) = resp.took_ms {
        out.push_str(&format!("({} ms)\n", ms));
    }
    out.push('\n');
    out.push_str(&resp.prompt);
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a request and return the JSON body, exiting on transport or HTTP errors.
fn send(req: reqwest::blocking::RequestBuilder, url: &str) -> serde_json::Value {
    let resp = match req.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("exemplar-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        let msg = body["error"].as_str().unwrap_or("unknown error");
        eprintln!("exemplar-cli: server returned {}: {}", status, msg);
        std::process::exit(1);
    }
    body
}

fn do_teach(server: &str, input: &str, output: &str, category: Option<String>) -> anyhow::Result<()> {
    let output = parse_json_arg("output", &read_arg(output)?)?;
    let url = format!("{}/train", server);
    let body = serde_json::json!({
        "user_input": input,
        "correct_output": output,
        "category": category,
    });

    let resp = send(client(60)?.post(&url).json(&body), &url);
    let id = resp["id"].as_str().unwrap_or("?");
    let verb = if resp["replaced"] == true { "Replaced" } else { "Saved" };
    println!("{} example {} ({})", verb, short_id(id), resp["category"].as_str().unwrap_or("general"));
    Ok(())
}

fn do_predict(
    server: &str,
    input: &str,
    fields: &str,
    colors: &str,
    n_results: Option<i64>,
    json_output: bool,
) -> anyhow::Result<()> {
    let fields = parse_json_arg("fields", &read_arg(fields)?)?;
    let url = format!("{}/predict", server);
    let body = serde_json::json!({
        "user_input": input,
        "config_json": fields,
        "color_list": colors,
        "n_results": n_results,
    });

    let resp = send(client(120)?.post(&url).json(&body), &url);
    if json_output {
        println!("{}", serde_json::to_string_pretty(&resp)?);
        return Ok(());
    }

    let parsed: PredictResponse = serde_json::from_value(resp)?;
    println!("{}", render_prediction(&parsed));
    Ok(())
}

fn do_validate(server: &str, output: &str, fields: &str) -> anyhow::Result<()> {
    let raw = read_arg(output)?;
    let fields = parse_json_arg("fields", &read_arg(fields)?)?;
    let url = format!("{}/validate", server);
    let body = serde_json::json!({"raw": raw, "config_json": fields});

    let resp: ValidateResponse = serde_json::from_value(send(client(30)?.post(&url).json(&body), &url))?;
    println!("Valid: {}", resp.valid);
    for e in &resp.errors {
        println!("  error:   {}", e);
    }
    for w in &resp.warnings {
        println!("  warning: {}", w);
    }
    if !resp.valid {
        std::process::exit(2);
    }
    Ok(())
}

fn do_show(server: &str, id: &str) -> anyhow::Result<()> {
    let url = format!("{}/examples/{}", server, id);
    let resp = send(client(10)?.get(&url), &url);
    println!("Id:       {}", resp["id"].as_str().unwrap_or(id));
    println!("Category: {}", resp["category"].as_str().unwrap_or("?"));
    println!("Input:    {}", resp["input"].as_str().unwrap_or(""));
    println!("Output:   {}", resp["output"]);
    println!("Updated:  {}", resp["updated_at"].as_str().unwrap_or("?"));
    Ok(())
}

fn do_forget(server: &str, id: &str) -> anyhow::Result<()> {
    let url = format!("{}/examples/{}", server, id);
    send(client(10)?.delete(&url), &url);
    println!("Deleted example {}", short_id(id));
    Ok(())
}

/// Show the server status by calling GET /health and GET /stats.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = client(10)?;
    let url = format!("{}/health", server);
    let health = send(client.get(&url), &url);
    let url = format!("{}/stats", server);
    let stats = send(client.get(&url), &url);

    println!("Exemplar server: {}", health["status"].as_str().unwrap_or("unknown"));
    println!("Version:         {}", health["version"].as_str().unwrap_or("?"));
    println!("Embedder:        {}", stats["embedder_signature"].as_str().unwrap_or("?"));
    println!(
        "Store:           {} ({})",
        stats["store"].as_str().unwrap_or("?"),
        stats["collection"].as_str().unwrap_or("?")
    );
    println!("Distance:        {}", stats["distance"].as_str().unwrap_or("?"));
    println!("Examples:        {}", stats["examples"]);
    println!("Generation:      {}", health["generation"]);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Teach { input, output, category } => do_teach(&server, &input, &output, category),
        Commands::Predict {
            input,
            fields,
            colors,
            n_results,
            json,
        } => do_predict(&server, &input, &fields, &colors, n_results, json),
        Commands::Validate { output, fields } => do_validate(&server, &output, &fields),
        Commands::Show { id } => do_show(&server, &id),
        Commands::Forget { id } => do_forget(&server, &id),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("exemplar-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
