use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an item is stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    #[default]
    Fridge,
    Freezer,
    Pantry,
}

impl StorageLocation {
    pub const ALL: [StorageLocation; 3] = [Self::Fridge, Self::Freezer, Self::Pantry];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fridge => "fridge",
            Self::Freezer => "freezer",
            Self::Pantry => "pantry",
        }
    }

    /// Lenient parse of a model- or user-supplied location name
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "fridge" | "refrigerator" | "refrigerated" => Some(Self::Fridge),
            "freezer" | "frozen" => Some(Self::Freezer),
            "pantry" | "cupboard" | "shelf" => Some(Self::Pantry),
            _ => None,
        }
    }

    /// Shelf life when no keyword matches the item name
    pub fn default_expiration_days(&self) -> u32 {
        match self {
            Self::Freezer => 90,
            Self::Pantry => 180,
            Self::Fridge => 7,
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized item attached to an add, consume or waste intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub location: StorageLocation,
    pub expiration_days: u32,
    pub category: String,
    /// Only ever set on waste items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    All,
    Expiring,
    Location,
    Search,
}

impl QueryType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "all" => Some(Self::All),
            "expiring" => Some(Self::Expiring),
            "location" => Some(Self::Location),
            "search" => Some(Self::Search),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeRequest {
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub prioritize_expiring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<String>,
}

/// Typed interpretation of one free-text inventory message.
///
/// Serialises with an `action` tag, e.g.
/// `{"action":"add","items":[...],"response":"...","confidence":0.9}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InventoryIntent {
    Add {
        items: Vec<ParsedItem>,
        response: String,
        confidence: f32,
    },
    Consume {
        items: Vec<ParsedItem>,
        response: String,
        confidence: f32,
    },
    Waste {
        items: Vec<ParsedItem>,
        response: String,
        confidence: f32,
    },
    Query {
        query_type: QueryType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<String>,
        response: String,
        confidence: f32,
    },
    Recipe {
        recipe_request: RecipeRequest,
        response: String,
        confidence: f32,
    },
    Unknown {
        response: String,
        confidence: f32,
    },
}

impl InventoryIntent {
    /// Tag value of this variant
    pub fn action(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Consume { .. } => "consume",
            Self::Waste { .. } => "waste",
            Self::Query { .. } => "query",
            Self::Recipe { .. } => "recipe",
            Self::Unknown { .. } => "unknown",
        }
    }

    pub fn response(&self) -> &str {
        match self {
            Self::Add { response, .. }
            | Self::Consume { response, .. }
            | Self::Waste { response, .. }
            | Self::Query { response, .. }
            | Self::Recipe { response, .. }
            | Self::Unknown { response, .. } => response,
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Self::Add { confidence, .. }
            | Self::Consume { confidence, .. }
            | Self::Waste { confidence, .. }
            | Self::Query { confidence, .. }
            | Self::Recipe { confidence, .. }
            | Self::Unknown { confidence, .. } => *confidence,
        }
    }

    /// Items for add, consume and waste; empty for the rest
    pub fn items(&self) -> &[ParsedItem] {
        match self {
            Self::Add { items, .. } | Self::Consume { items, .. } | Self::Waste { items, .. } => items,
            _ => &[],
        }
    }
}
