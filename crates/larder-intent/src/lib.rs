//! # larder-intent
//!
//! Turns a household member's free-text message ("bought 2 gallons of milk",
//! "threw out the lettuce") into a typed [`InventoryIntent`] by offering the
//! model a fixed tool catalog and reading back its first tool call.
//!
//! Item payloads pass through the keyword [`normalizer`], which fills in
//! location, shelf life and category whenever the model left them out.

pub mod engine;
pub mod normalizer;
pub mod prompt;
pub mod tools;
pub mod types;

pub use engine::{intent_from_response, HouseholdContext, IntentExtractor, TROUBLE_RESPONSE};
pub use prompt::{build_system_prompt, summarize_inventory, InventoryItem};
pub use types::{InventoryIntent, ParsedItem, QueryType, RecipeRequest, StorageLocation};
