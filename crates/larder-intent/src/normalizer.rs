//! Keyword heuristics that fill the gaps in model-supplied items.
//!
//! Everything here is pure: the same name (and location) always yields the
//! same answer. Matching is case-insensitive substring search and the first
//! hit wins, so table order matters.

use serde_json::Value;

use crate::types::{ParsedItem, StorageLocation};

const FREEZER_KEYWORDS: &[&str] = &["frozen", "ice cream", "popsicle", "freezer", "ice pop", "sorbet"];

const PANTRY_KEYWORDS: &[&str] = &[
    "rice", "pasta", "flour", "sugar", "cereal", "canned", "dried beans", "oil", "spice", "sea salt",
    "black pepper", "coffee", "tea bag", "honey", "peanut butter", "oats", "crackers", "chips", "nuts",
    "vinegar", "soup", "noodles", "jam", "syrup",
];

/// Shelf-life tiers, shortest first
const EXPIRATION_TIERS: &[(u32, &[&str])] = &[
    (
        3,
        &[
            "fish", "salmon", "shrimp", "seafood", "chicken", "ground beef", "ground turkey", "berries",
            "strawberr", "raspberr", "lettuce", "spinach", "salad", "herbs", "cilantro", "basil", "mushroom",
        ],
    ),
    (
        7,
        &[
            "milk", "yogurt", "sour cream", "cream cheese", "heavy cream", "cottage cheese", "tofu", "deli",
            "ham", "turkey", "bacon", "bread", "tomato", "avocado", "banana",
        ],
    ),
    (
        14,
        &[
            "cheese", "butter", "eggs", "carrot", "celery", "apple", "orange", "lemon", "lime", "cabbage",
            "pepper", "zucchini", "broccoli",
        ],
    ),
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("Frozen", &["frozen", "ice cream", "popsicle", "ice pop", "sorbet"]),
    ("Dairy", &["milk", "cheese", "yogurt", "butter", "cream", "eggs"]),
    ("Meat", &["chicken", "beef", "pork", "turkey", "ham", "bacon", "sausage", "lamb", "steak", "deli"]),
    ("Seafood", &["fish", "salmon", "tuna", "shrimp", "seafood", "cod", "crab"]),
    (
        "Produce",
        &[
            "lettuce", "spinach", "salad", "apple", "banana", "tomato", "carrot", "onion", "potato", "berr",
            "orange", "lemon", "lime", "avocado", "pepper", "broccoli", "celery", "cabbage", "zucchini",
            "mushroom", "herbs", "cilantro", "basil", "garlic", "grape",
        ],
    ),
    ("Bakery", &["bread", "bagel", "muffin", "tortilla", "croissant", "bun", "cake"]),
    ("Beverages", &["juice", "soda", "coffee", "tea", "bottled water", "beer", "wine"]),
    (
        "Condiments",
        &["ketchup", "mustard", "mayo", "sauce", "dressing", "vinegar", "salt", "spice", "honey", "jam", "syrup", "oil"],
    ),
    ("Grains", &["rice", "pasta", "flour", "cereal", "oats", "noodles", "quinoa"]),
    ("Canned Goods", &["canned", "soup", "beans"]),
    ("Snacks", &["chips", "crackers", "nuts", "cookies", "popcorn", "pretzel"]),
];

pub const DEFAULT_CATEGORY: &str = "Other";
pub const DEFAULT_UNIT: &str = "item";

fn matches_any(name: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| name.contains(keyword))
}

pub fn infer_location(name: &str) -> StorageLocation {
    let name = name.to_lowercase();
    if matches_any(&name, FREEZER_KEYWORDS) {
        StorageLocation::Freezer
    } else if matches_any(&name, PANTRY_KEYWORDS) {
        StorageLocation::Pantry
    } else {
        StorageLocation::Fridge
    }
}

pub fn infer_expiration_days(name: &str, location: StorageLocation) -> u32 {
    let name = name.to_lowercase();
    EXPIRATION_TIERS
        .iter()
        .find(|(_, keywords)| matches_any(&name, keywords))
        .map(|(days, _)| *days)
        .unwrap_or_else(|| location.default_expiration_days())
}

pub fn infer_category(name: &str) -> &'static str {
    let name = name.to_lowercase();
    CATEGORIES
        .iter()
        .find(|(_, keywords)| matches_any(&name, keywords))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

/// An item as the model sent it; every field but the name is optional
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub name: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub location: Option<String>,
    pub expiration_days: Option<u32>,
    pub category: Option<String>,
    pub reason: Option<String>,
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numbers sometimes arrive quoted
fn number_field(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl RawItem {
    /// Read one entry of an `items` array. A bare string is taken as the
    /// name; entries without a usable name yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(name) = value.as_str().map(str::trim).filter(|s| !s.is_empty()) {
            return Some(Self { name: name.to_string(), ..Self::default() });
        }

        let name = text_field(value, "name")?;
        let expiration_days = number_field(value, "expiration_days")
            .or_else(|| number_field(value, "expirationDays"))
            .filter(|days| days.is_finite() && *days >= 0.0)
            .map(|days| days.round() as u32);

        Some(Self {
            name,
            quantity: number_field(value, "quantity"),
            unit: text_field(value, "unit"),
            location: text_field(value, "location"),
            expiration_days,
            category: text_field(value, "category"),
            reason: text_field(value, "reason"),
        })
    }
}

/// Fill the gaps in `raw`. Explicit values always win over inference;
/// `reason` survives only when `keep_reason` is set (the waste path).
pub fn normalize_item(raw: RawItem, keep_reason: bool) -> ParsedItem {
    let location = match raw.location.as_deref() {
        Some(given) => StorageLocation::parse(given).unwrap_or_else(|| {
            log::debug!("unrecognised location '{}' for {}, inferring", given, raw.name);
            infer_location(&raw.name)
        }),
        None => infer_location(&raw.name),
    };

    let quantity = raw.quantity.filter(|q| q.is_finite() && *q > 0.0).unwrap_or(1.0);
    let expiration_days = raw
        .expiration_days
        .unwrap_or_else(|| infer_expiration_days(&raw.name, location));
    let category = raw.category.unwrap_or_else(|| infer_category(&raw.name).to_string());

    ParsedItem {
        quantity,
        unit: raw.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        location,
        expiration_days,
        category,
        reason: if keep_reason { raw.reason } else { None },
        name: raw.name,
    }
}

/// Normalize the `items` array of a tool call's arguments
pub fn normalize_items(arguments: &Value, keep_reason: bool) -> Vec<ParsedItem> {
    let Some(entries) = arguments.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let raw = RawItem::from_value(entry);
            if raw.is_none() {
                log::warn!("dropping item without a name: {}", entry);
            }
            raw
        })
        .map(|raw| normalize_item(raw, keep_reason))
        .collect()
}
