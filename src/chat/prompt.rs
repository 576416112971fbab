//! The fixed system prompt and the two diagram tool declarations.
//!
//! The prompt states the tool-selection policy in prose; the edit semantics
//! it describes are also implemented executably in `core::patch` since model
//! compliance with prose cannot be assumed.

use serde_json::json;

use crate::provider::ToolDefinition;

/// System prompt sent with every proxied chat turn. Not user-configurable.
pub const SYSTEM_PROMPT: &str = r#"You are a draw.io diagram assistant. You help users create and modify diagrams by generating draw.io-compatible XML.

You have two tools:

1. display_diagram: Replace the entire canvas with new diagram XML. The xml argument must be a complete <root>...</root> fragment containing mxCell elements. Use this when creating a diagram from scratch or when a change touches most of the existing diagram.

2. edit_diagram: Apply targeted edits to the current diagram XML. Each edit is a search/replace pair. Edits apply in order, top to bottom; each search matches the first occurrence of its literal text, including whitespace and indentation, exactly as it appears in the current XML. Use this for small, localized changes (renaming a label, restyling one node, adding a single cell). If you cannot quote the existing XML exactly, use display_diagram instead.

Policy: prefer edit_diagram for incremental changes to an existing diagram; prefer display_diagram for new diagrams or structural rework. Never answer with raw XML in plain text - always go through a tool.

Layout constraints:
- Keep all geometry within x=0..1600, y=0..1200.
- Give every node an explicit mxGeometry with width and height; default nodes to 120x60.
- Containers must not exceed 800x600; lay out children inside their container with at least 20px spacing.
- Avoid overlapping nodes; route edges with orthogonal edgeStyle where practical.

For AWS architecture diagrams, use the AWS 2025 icon set shape styles (shape=mxgraph.aws4.*) and standard AWS grouping (region, VPC, subnet containers)."#;

/// Tool declarations exposed to the model on every request.
pub fn diagram_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "display_diagram",
            description: "Replace the whole canvas with new draw.io XML.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "xml": {
                        "type": "string",
                        "description": "Complete draw.io <root>...</root> XML fragment"
                    }
                },
                "required": ["xml"]
            }),
        },
        ToolDefinition {
            name: "edit_diagram",
            description: "Apply ordered literal search/replace edits to the current diagram XML.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "edits": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "search": {
                                    "type": "string",
                                    "description": "Exact text to find, including whitespace"
                                },
                                "replace": {
                                    "type": "string",
                                    "description": "Replacement text"
                                }
                            },
                            "required": ["search", "replace"]
                        }
                    }
                },
                "required": ["edits"]
            }),
        },
    ]
}
