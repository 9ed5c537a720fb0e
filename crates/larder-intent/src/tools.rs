//! The fixed tool catalog offered to the model on every extraction call.

use larder_llm_api::ToolDefinition;
use serde_json::{json, Value};

pub const ADD_ITEMS: &str = "add_items";
pub const CONSUME_ITEMS: &str = "consume_items";
pub const WASTE_ITEMS: &str = "waste_items";
pub const QUERY_INVENTORY: &str = "query_inventory";
pub const SUGGEST_RECIPES: &str = "suggest_recipes";

/// Which intent a tool call stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryTool {
    Add,
    Consume,
    Waste,
    Query,
    Recipe,
}

impl InventoryTool {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            ADD_ITEMS => Some(Self::Add),
            CONSUME_ITEMS => Some(Self::Consume),
            WASTE_ITEMS => Some(Self::Waste),
            QUERY_INVENTORY => Some(Self::Query),
            SUGGEST_RECIPES => Some(Self::Recipe),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Add => ADD_ITEMS,
            Self::Consume => CONSUME_ITEMS,
            Self::Waste => WASTE_ITEMS,
            Self::Query => QUERY_INVENTORY,
            Self::Recipe => SUGGEST_RECIPES,
        }
    }
}

fn response_property() -> Value {
    json!({
        "type": "string",
        "description": "Short, friendly confirmation to show the user"
    })
}

fn items_schema(extra: Value) -> Value {
    let mut properties = json!({
        "name": { "type": "string", "description": "Item name, e.g. \"Milk\"" },
        "quantity": { "type": "number", "description": "How many (default 1)" },
        "unit": { "type": "string", "description": "Unit such as item, lb, gallon, dozen" }
    });
    if let (Some(target), Some(source)) = (properties.as_object_mut(), extra.as_object()) {
        target.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": properties,
            "required": ["name"]
        }
    })
}

/// All five tools, in catalog order
pub fn inventory_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: ADD_ITEMS.to_string(),
            description: "Add groceries the user bought or received to the inventory".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "items": items_schema(json!({
                        "location": { "type": "string", "enum": ["fridge", "freezer", "pantry"] },
                        "expiration_days": { "type": "integer", "description": "Days until the item expires" },
                        "category": { "type": "string" }
                    })),
                    "response": response_property()
                },
                "required": ["items"]
            }),
        },
        ToolDefinition {
            name: CONSUME_ITEMS.to_string(),
            description: "Record items the user ate, drank or used up".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "items": items_schema(json!({})),
                    "response": response_property()
                },
                "required": ["items"]
            }),
        },
        ToolDefinition {
            name: WASTE_ITEMS.to_string(),
            description: "Record items the user threw away or that went bad".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "items": items_schema(json!({
                        "reason": { "type": "string", "description": "Why it was thrown out, e.g. expired, spoiled" }
                    })),
                    "response": response_property()
                },
                "required": ["items"]
            }),
        },
        ToolDefinition {
            name: QUERY_INVENTORY.to_string(),
            description: "Answer a question about what is in the inventory".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query_type": { "type": "string", "enum": ["all", "expiring", "location", "search"] },
                    "filter": { "type": "string", "description": "Location name or search term" },
                    "response": response_property()
                },
                "required": ["query_type"]
            }),
        },
        ToolDefinition {
            name: SUGGEST_RECIPES.to_string(),
            description: "Suggest recipes using what the user has".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "ingredients": { "type": "array", "items": { "type": "string" } },
                    "prioritize_expiring": { "type": "boolean" },
                    "preferences": { "type": "string", "description": "Dietary or cuisine preferences" },
                    "response": response_property()
                }
            }),
        },
    ]
}
