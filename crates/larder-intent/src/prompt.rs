use chrono::NaiveDate;
use serde::Deserialize;

use crate::types::StorageLocation;

pub const NO_INVENTORY_DATA: &str = "No inventory data available.";

/// Items expiring within this many days are called out
pub const EXPIRING_SOON_DAYS: i64 = 3;

const SYSTEM_PROMPT_TEMPLATE: &str = "You are a kitchen inventory assistant. \
Turn the user's message into exactly one tool call:
- add_items when they bought or received food
- consume_items when they ate, drank or used something up
- waste_items when something was thrown away or went bad
- query_inventory when they ask what they have
- suggest_recipes when they want meal ideas
Fill in quantity, unit, location and expiration_days only when the message makes them clear. \
Always include a short, friendly `response`. \
If the message is not about food or the inventory, reply in plain text without calling a tool.

Current inventory:
{inventory}";

/// One row of the household inventory, as read from storage
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    #[serde(default)]
    pub location: StorageLocation,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, location: StorageLocation) -> Self {
        Self { name: name.into(), location, quantity: None, unit: None, expiration_date: None }
    }

    pub fn expiring_on(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }

    fn days_left(&self, today: NaiveDate) -> Option<i64> {
        self.expiration_date.map(|date| (date - today).num_days())
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

fn describe_expiry(days_left: i64) -> String {
    match days_left {
        d if d < -1 => format!("expired {} days ago", -d),
        -1 => "expired yesterday".to_string(),
        0 => "expires today".to_string(),
        1 => "expires tomorrow".to_string(),
        d => format!("expires in {} days", d),
    }
}

/// Context string for the system prompt: counts per location, then the
/// items that expire within [`EXPIRING_SOON_DAYS`] (or already have),
/// soonest first, then everything else.
pub fn summarize_inventory(items: &[InventoryItem], today: NaiveDate) -> String {
    if items.is_empty() {
        return "The inventory is empty.".to_string();
    }

    let counts: Vec<String> = StorageLocation::ALL
        .iter()
        .map(|location| {
            let count = items.iter().filter(|item| item.location == *location).count();
            format!("{} in the {}", count, location)
        })
        .collect();

    let mut lines = vec![format!("{}: {}.", plural(items.len(), "item"), counts.join(", "))];

    let (mut soon, rest): (Vec<&InventoryItem>, Vec<&InventoryItem>) = items
        .iter()
        .partition(|item| matches!(item.days_left(today), Some(days) if days <= EXPIRING_SOON_DAYS));
    soon.sort_by_key(|item| item.expiration_date);

    if !soon.is_empty() {
        lines.push("Expiring soon:".to_string());
        for item in soon {
            let days = item.days_left(today).unwrap_or_default();
            lines.push(format!("- {} ({}): {}", item.name, item.location, describe_expiry(days)));
        }
    }

    if !rest.is_empty() {
        let names: Vec<String> = rest.iter().map(|item| format!("{} ({})", item.name, item.location)).collect();
        lines.push(format!("Also on hand: {}", names.join(", ")));
    }

    lines.join("\n")
}

/// Fill the prompt template. `recent_items` are appended as a second
/// paragraph when present.
pub fn build_system_prompt(inventory_summary: Option<&str>, recent_items: &[String]) -> String {
    let summary = inventory_summary
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_INVENTORY_DATA);

    let mut prompt = SYSTEM_PROMPT_TEMPLATE.replace("{inventory}", summary);

    if !recent_items.is_empty() {
        prompt.push_str("\n\nRecently active items: ");
        prompt.push_str(&recent_items.join(", "));
    }

    prompt
}
