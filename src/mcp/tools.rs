//! MCP tool definitions for the research node

use serde_json::json;

use super::protocol::ToolDefinition;

/// All tool definitions, in listing order
pub const TOOL_DEFINITIONS: &[(&str, &str, &str)] = &[
    (
        "query_knowledge_base",
        "Primary research tool. Retrieves the most similar documents from the knowledge store and answers questions about physics, math, tech or social science from that context.",
        r#"{
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The research question"},
                "domain": {"type": "string", "default": "general", "description": "Domain the answer should be framed in"}
            },
            "required": ["query"]
        }"#,
    ),
    (
        "perform_complex_calculation",
        "Evaluates a math expression using only whitelisted math functions and constants. Useful for physics and math verifications.",
        r#"{
            "type": "object",
            "properties": {
                "expression": {"type": "string", "description": "Expression such as 'sqrt(2) * pi' or '2 ** 10'"}
            },
            "required": ["expression"]
        }"#,
    ),
    (
        "get_interaction_history",
        "Retrieves past research logs for audit, most recent first.",
        r#"{
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "default": 5, "minimum": 0, "description": "Maximum number of rows"}
            }
        }"#,
    ),
];

/// Get all tool definitions as ToolDefinition structs
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    TOOL_DEFINITIONS
        .iter()
        .map(|(name, description, schema)| ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: serde_json::from_str(schema).unwrap_or(json!({})),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schemas_parse() {
        for (name, _, schema) in TOOL_DEFINITIONS {
            let parsed: serde_json::Value = serde_json::from_str(schema)
                .unwrap_or_else(|e| panic!("schema for {} is invalid: {}", name, e));
            assert_eq!(parsed["type"], "object");
        }
    }

    #[test]
    fn test_definitions_order() {
        let names: Vec<String> = get_tool_definitions().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "query_knowledge_base",
                "perform_complex_calculation",
                "get_interaction_history"
            ]
        );
    }
}
