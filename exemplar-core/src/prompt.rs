//! Prompt assembly: fields, colours, retrieved examples and the user input,
//! rendered in a fixed section order.
//!
//! `assemble_prompt` is pure. The same arguments always produce the same
//! string, byte for byte.

use std::fmt::Write;

use serde_json::Value;

use crate::models::{Candidate, ConfigField};

pub const PROMPT_INTRO: &str = "You are an AI assistant that processes customer orders. \
Your task is to analyse the customer's input and extract the information as JSON.";

pub const NO_COLORS_PLACEHOLDER: &str = "No colors specified";

const NO_FIELDS_LINE: &str = "- (no fields configured)";

const REQUIREMENTS: [&str; 4] = [
    "Analyse the input and extract information according to the fields defined above",
    "If a color is mentioned, map it to the closest color in the supported list",
    "Return the result as a JSON array",
    "Return only JSON, with no explanation",
];

/// Render one example output: strings verbatim, `null` as nothing, anything
/// else as compact JSON.
fn render_output(output: &Value) -> String {
    match output {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_fields(fields: &[ConfigField]) -> String {
    if fields.is_empty() {
        return NO_FIELDS_LINE.to_string();
    }

    fields
        .iter()
        .map(|field| {
            let mut line = format!("- {} (type: {})", field.name, field.field_type);
            if let Some(options) = field.rendered_options() {
                let _ = write!(line, " - options: {}", options);
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_examples(candidates: &[Candidate]) -> String {
    let mut out = String::from("**Similar examples:**\n");
    for (i, case) in candidates.iter().enumerate() {
        let _ = write!(
            out,
            "\nExample {}:\nInput: {}\nOutput: {}\n",
            i + 1,
            case.input,
            render_output(&case.output)
        );
    }
    out
}

/// Build the instruction prompt for one extraction request.
///
/// Sections, in order: intro, fields, supported colours, similar examples
/// (omitted entirely when `candidates` is empty), the input to process, the
/// requirements list and the output cue.
pub fn assemble_prompt(
    fields: &[ConfigField],
    user_input: &str,
    candidates: &[Candidate],
    colors: &[String],
) -> String {
    let colors_text = if colors.is_empty() {
        NO_COLORS_PLACEHOLDER.to_string()
    } else {
        colors.join(", ")
    };

    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "{}\n\n**Fields to extract:**\n{}\n\n**Supported colors:** {}\n\n",
        PROMPT_INTRO,
        render_fields(fields),
        colors_text
    );

    if !candidates.is_empty() {
        prompt.push_str(&render_examples(candidates));
        prompt.push('\n');
    }

    let _ = write!(prompt, "**Input to process:**\n{}\n\n**Requirements:**\n", user_input);
    for (i, req) in REQUIREMENTS.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, req);
    }
    prompt.push_str("\n**Output (JSON only):**");

    prompt
}
