use std::sync::Arc;

use larder_llm_api::{
    ChatMessage, ChatOptions, ChatResponse, LlmClient, Result, ToolCall, ToolChoice, ToolDefinition,
};
use serde_json::Value;

use crate::normalizer::normalize_items;
use crate::prompt::build_system_prompt;
use crate::tools::{inventory_tools, InventoryTool};
use crate::types::{InventoryIntent, ParsedItem, QueryType, RecipeRequest};

/// Sampling temperature for extraction calls
pub const EXTRACTION_TEMPERATURE: f32 = 0.2;

pub const ACTION_CONFIDENCE: f32 = 0.9;
pub const QUERY_CONFIDENCE: f32 = 0.85;
pub const UNKNOWN_CONFIDENCE: f32 = 0.5;

pub const DEFAULT_UNKNOWN_RESPONSE: &str = "I'm not sure what you'd like to do. You can tell me what you bought, \
used up or threw away, ask what's in your kitchen, or ask for recipe ideas.";

pub const TROUBLE_RESPONSE: &str =
    "Sorry, I'm having trouble understanding right now. Please try again in a moment.";

/// What the caller knows about the household when a message arrives
#[derive(Debug, Clone, Default)]
pub struct HouseholdContext {
    /// Output of [`summarize_inventory`](crate::prompt::summarize_inventory)
    pub inventory_summary: Option<String>,
    pub recent_items: Vec<String>,
}

/// Turns free-text messages into [`InventoryIntent`]s with one chat call each
pub struct IntentExtractor {
    client: Arc<dyn LlmClient>,
    tools: Vec<ToolDefinition>,
}

impl IntentExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client, tools: inventory_tools() }
    }

    /// Never fails: backend errors become an `unknown` intent with zero
    /// confidence and a generic apology.
    pub async fn process(&self, message: &str, context: &HouseholdContext) -> InventoryIntent {
        match self.extract(message, context).await {
            Ok(intent) => intent,
            Err(e) => {
                log::error!("intent extraction via {} failed: {}", self.client.backend(), e);
                InventoryIntent::Unknown { response: TROUBLE_RESPONSE.to_string(), confidence: 0.0 }
            }
        }
    }

    async fn extract(&self, message: &str, context: &HouseholdContext) -> Result<InventoryIntent> {
        let system_prompt = build_system_prompt(context.inventory_summary.as_deref(), &context.recent_items);
        let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(message)];
        let options = ChatOptions::default()
            .with_temperature(EXTRACTION_TEMPERATURE)
            .with_tools(self.tools.clone(), ToolChoice::Auto);

        let response = self.client.chat(&messages, &options).await?;
        log::debug!(
            "extraction finished ({}), {} tokens",
            response.finish_reason,
            response.usage.total_tokens
        );
        Ok(intent_from_response(&response))
    }
}

fn fallback_text(content: &str) -> String {
    let content = content.trim();
    if content.is_empty() {
        DEFAULT_UNKNOWN_RESPONSE.to_string()
    } else {
        content.to_string()
    }
}

/// Map a chat response onto an intent. Only the first tool call counts;
/// without one the plain text becomes an `unknown` intent.
pub fn intent_from_response(response: &ChatResponse) -> InventoryIntent {
    let unknown = || InventoryIntent::Unknown {
        response: fallback_text(&response.content),
        confidence: UNKNOWN_CONFIDENCE,
    };

    let Some(call) = response.first_tool_call() else {
        return unknown();
    };

    match InventoryTool::from_name(&call.name) {
        Some(tool) => intent_from_tool_call(tool, call, &response.content),
        None => {
            // fail open: an unrecognised tool leaves the intent unknown
            log::warn!("model called unknown tool '{}', ignoring", call.name);
            unknown()
        }
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn bool_field(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn item_names(items: &[ParsedItem]) -> String {
    match items {
        [] => "nothing".to_string(),
        [one] => one.name.clone(),
        [rest @ .., last] => {
            let rest: Vec<&str> = rest.iter().map(|item| item.name.as_str()).collect();
            format!("{} and {}", rest.join(", "), last.name)
        }
    }
}

fn intent_from_tool_call(tool: InventoryTool, call: &ToolCall, content: &str) -> InventoryIntent {
    let args = &call.arguments;
    // the model's own confirmation, then any text beside the call
    let given = args
        .get("response")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| Some(content.trim()).filter(|s| !s.is_empty()))
        .map(str::to_string);

    match tool {
        InventoryTool::Add => {
            let items = normalize_items(args, false);
            let response = given.unwrap_or_else(|| format!("Added {} to your inventory.", item_names(&items)));
            InventoryIntent::Add { items, response, confidence: ACTION_CONFIDENCE }
        }
        InventoryTool::Consume => {
            let items = normalize_items(args, false);
            let response = given.unwrap_or_else(|| format!("Marked {} as used.", item_names(&items)));
            InventoryIntent::Consume { items, response, confidence: ACTION_CONFIDENCE }
        }
        InventoryTool::Waste => {
            let items = normalize_items(args, true);
            let response = given.unwrap_or_else(|| format!("Logged {} as wasted.", item_names(&items)));
            InventoryIntent::Waste { items, response, confidence: ACTION_CONFIDENCE }
        }
        InventoryTool::Query => {
            let query_type = args
                .get("query_type")
                .and_then(Value::as_str)
                .and_then(QueryType::parse)
                .unwrap_or_default();
            let filter = args
                .get("filter")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            InventoryIntent::Query {
                query_type,
                filter,
                response: given.unwrap_or_else(|| "Let me check your inventory.".to_string()),
                confidence: QUERY_CONFIDENCE,
            }
        }
        InventoryTool::Recipe => {
            let recipe_request = RecipeRequest {
                ingredients: string_list(&args["ingredients"]),
                prioritize_expiring: bool_field(&args["prioritize_expiring"]),
                preferences: args
                    .get("preferences")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            };
            InventoryIntent::Recipe {
                recipe_request,
                response: given.unwrap_or_else(|| "Here are some recipe ideas.".to_string()),
                confidence: ACTION_CONFIDENCE,
            }
        }
    }
}
