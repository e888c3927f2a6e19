//! List agent tools.

use crate::agent::tool_definitions;
use crate::cli::Output;
use console::style;

/// Print every tool with its description and parameters.
pub fn run_tools() {
    Output::header("Tools");
    for tool in tool_definitions() {
        let function = tool.function;
        println!("\n  {}", style(&function.name).bold());
        if let Some(description) = &function.description {
            println!("    {}", description);
        }

        let params = parameter_names(function.parameters.as_ref());
        if !params.is_empty() {
            println!("    {} {}", style("parameters:").dim(), params.join(", "));
        }
    }
    println!();
}

/// Parameter names, required ones first and unmarked, optional ones with `?`.
fn parameter_names(schema: Option<&serde_json::Value>) -> Vec<String> {
    let Some(schema) = schema else {
        return Vec::new();
    };
    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let mut names: Vec<String> = required.iter().map(|r| r.to_string()).collect();
    if let Some(props) = schema["properties"].as_object() {
        names.extend(
            props
                .keys()
                .filter(|k| !required.contains(&k.as_str()))
                .map(|k| format!("{}?", k)),
        );
    }
    names
}
