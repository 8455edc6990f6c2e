//! Prompt construction for the tool-selection call.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use intentforge_core::{Catalog, OperationDescriptor};

/// The fixed two-field schema every oracle reply must match.
pub static TOOL_CALL_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "tool": {
                "type": "string",
                "description": "The exact name of the tool to be called. If no tool is appropriate, set to 'None'."
            },
            "params": {
                "type": "object",
                "description": "Parameters and their extracted values required for the tool.",
                "minProperties": 0
            }
        },
        "required": ["tool", "params"]
    })
});

/// Render one operation as the three-line block the oracle sees.
pub fn render_descriptor(descriptor: &OperationDescriptor) -> String {
    let params: Vec<String> = descriptor
        .parameters
        .iter()
        .map(|(name, spec)| match spec.description.as_deref() {
            Some(desc) if !desc.is_empty() => format!("'{name}' ({}) - {desc}", spec.param_type),
            _ => format!("'{name}' ({})", spec.param_type),
        })
        .collect();
    let params_line = if params.is_empty() {
        "None".to_string()
    } else {
        params.join("; ")
    };
    format!(
        "- Name: {}\n  Description: {}\n  Parameters: {}",
        descriptor.name, descriptor.description, params_line
    )
}

/// Render every operation in catalog order, one block per operation.
pub fn render_catalog(catalog: &Catalog) -> String {
    catalog
        .descriptors()
        .map(render_descriptor)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Persona, date rules, output rules, and the tool list.
pub fn system_instruction(reference_date: NaiveDate, tools_context: &str) -> String {
    let today = reference_date.format("%Y-%m-%d");
    let year = reference_date.format("%Y");
    format!(
        "Assume today is {today} when interpreting date-related queries. \
         If the user refers to a month only (e.g., 'October expenses'), use the year {year} unless another year is stated, \
         and cover that whole month from its first to its last day. \
         If the user asks for a listing without any time qualifier, cover the full year {year} (from {year}-01-01 to {year}-12-31). \
         Write every date as YYYY-MM-DD. \
         You are an AI financial assistant. Your sole task is to determine which tool to call based on the user's request \
         and the list of available tools provided below. \
         You MUST respond ONLY with a single JSON object that strictly adheres to the provided schema. \
         Do not include any other text, explanation, or markdown formatting. \
         Use the parameter names exactly as listed. \
         If no tool is appropriate, set 'tool' to 'None' and 'params' to an empty object ({{}}).\n\
         Available Tools:\n\
         ---BEGIN_TOOLS---\n{tools_context}\n---END_TOOLS---"
    )
}
